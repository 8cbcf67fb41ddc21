//! Session context
//!
//! The host application owns the identity; components receive it through an
//! explicit [`SessionContext`] at construction.

use feed_client::Credential;
use std::sync::Arc;

/// Supplies the per-session credential
#[cfg_attr(test, mockall::automock)]
pub trait IdentityProvider: Send + Sync {
    /// Current credential, or `None` when the host has no identity
    fn credential(&self) -> Option<Credential>;
}

/// Identity provider with a fixed credential
#[derive(Debug, Clone)]
pub struct StaticIdentity {
    credential: Option<Credential>,
}

impl StaticIdentity {
    /// Provider that always returns `credential`
    pub fn new(credential: impl Into<String>) -> Self {
        Self { credential: Some(Credential::new(credential)) }
    }

    /// Provider with no identity
    pub fn anonymous() -> Self {
        Self { credential: None }
    }
}

impl IdentityProvider for StaticIdentity {
    fn credential(&self) -> Option<Credential> {
        self.credential.clone()
    }
}

/// Per-session state injected into the feed components
#[derive(Clone)]
pub struct SessionContext {
    identity: Arc<dyn IdentityProvider>,
}

impl SessionContext {
    /// Create a session context around an identity provider
    pub fn new(identity: Arc<dyn IdentityProvider>) -> Self {
        Self { identity }
    }

    /// Current usable credential
    ///
    /// Empty credentials count as unavailable.
    pub fn credential(&self) -> Option<Credential> {
        self.identity.credential().filter(|c| !c.is_empty())
    }

    /// Check if an identity is available
    pub fn is_authenticated(&self) -> bool {
        self.credential().is_some()
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("authenticated", &self.is_authenticated())
            .finish()
    }
}
