//! Feed configuration
//!
//! Endpoint locations and transport settings, built in code or read from the
//! environment.

use feed_client::history::DEFAULT_HISTORY_PATH;
use feed_client::subscriptions::DEFAULT_SUBSCRIPTIONS_PATH;
use feed_client::ClientConfig;
use std::time::Duration;

use crate::{Result, StateError};

/// Path of the live endpoint when no explicit URL is configured
pub const DEFAULT_LIVE_PATH: &str = "/api/feed/live";

/// Configuration for the feed components
#[derive(Debug, Clone)]
pub struct FeedConfig {
    /// HTTP transport settings (also used for the push connection)
    pub client: ClientConfig,
    /// Path of the history endpoint
    pub history_path: String,
    /// Path of the subscriptions endpoint
    pub subscriptions_path: String,
    /// Explicit push endpoint URL; derived from the service URL when unset
    pub live_url: Option<String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            client: ClientConfig::default(),
            history_path: DEFAULT_HISTORY_PATH.to_string(),
            subscriptions_path: DEFAULT_SUBSCRIPTIONS_PATH.to_string(),
            live_url: None,
        }
    }
}

impl FeedConfig {
    /// Create a new config with a service URL
    pub fn new(service_url: impl Into<String>) -> Self {
        Self {
            client: ClientConfig::new(service_url),
            ..Default::default()
        }
    }

    /// Set the push endpoint URL
    pub fn with_live_url(mut self, url: impl Into<String>) -> Self {
        self.live_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.client.timeout = timeout;
        self
    }

    /// Push endpoint URL
    pub fn live_url(&self) -> String {
        if let Some(url) = &self.live_url {
            return url.clone();
        }

        let base = self.client.service_url.trim_end_matches('/');
        let base = if let Some(rest) = base.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = base.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            base.to_string()
        };
        format!("{}{}", base, DEFAULT_LIVE_PATH)
    }

    /// Read configuration from the process environment
    ///
    /// Recognized variables: `FEED_SERVICE_URL`, `FEED_LIVE_URL`,
    /// `FEED_AUTH_SCHEME` (empty for a bare credential), `FEED_TIMEOUT_SECS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through a variable lookup function
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = match lookup("FEED_SERVICE_URL") {
            Some(url) => Self::new(url),
            None => Self::default(),
        };

        config.live_url = lookup("FEED_LIVE_URL");

        if let Some(scheme) = lookup("FEED_AUTH_SCHEME") {
            let scheme = scheme.trim().to_string();
            config.client.auth_scheme = (!scheme.is_empty()).then_some(scheme);
        }

        if let Some(secs) = lookup("FEED_TIMEOUT_SECS") {
            let secs: u64 = secs.trim().parse().map_err(|_| {
                StateError::Config(format!("FEED_TIMEOUT_SECS must be a number, got {:?}", secs))
            })?;
            config.client.timeout = Duration::from_secs(secs);
        }

        Ok(config)
    }
}
