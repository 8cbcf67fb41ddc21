//! Feed synchronization state for Channel Feed
//!
//! This crate owns the canonical item set and the feed state machine that
//! reconciles paged history with the live push stream.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod controller;
pub mod merge;
pub mod phase;
pub mod session;

pub use config::FeedConfig;
pub use controller::{FeedController, FeedEvent, FeedSnapshot, RejectReason, RequestOutcome};
pub use merge::{ItemSet, LiveMerge};
pub use phase::{FeedPhase, FeedPresentation, LiveStatus};
pub use session::{IdentityProvider, SessionContext, StaticIdentity};

/// Errors raised while assembling feed state
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// Feed service client error
    #[error(transparent)]
    Client(#[from] feed_client::Error),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for feed state operations
pub type Result<T> = std::result::Result<T, StateError>;
