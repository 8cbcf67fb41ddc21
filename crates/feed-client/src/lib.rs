//! Feed service client library
//!
//! This crate talks to the remote feed service: paginated history, the live
//! push connection, and the channel subscriptions listing. It also defines the
//! wire types shared by every layer above it.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod cancel;
pub mod history;
pub mod http;
pub mod live;
pub mod subscriptions;
pub mod types;

pub use cancel::{CancelHandle, CancelSignal};
pub use history::{HistorySource, HttpHistorySource};
pub use http::{ApiClient, ClientConfig};
pub use live::{LiveEvent, LiveFeed, LiveSubscriber, PushConnector, WebSocketConnector};
pub use subscriptions::{HttpSubscriptionSource, SubscriptionSource};
pub use types::{
    ChannelRef, Credential, FeedItem, HistoryPage, HistoryStatus, ItemKey, MediaItem, PageCursor,
    Reaction,
};

/// Result type for feed service operations
pub type Result<T> = std::result::Result<T, Error>;

/// HTTP statuses treated as transient network failures
const RETRYABLE_STATUSES: &[u16] = &[408, 425, 429, 500, 502, 503, 504, 522, 524];

/// Error types for feed service operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// No session credential is available
    #[error("Not authenticated: no session credential available")]
    Unauthenticated,

    /// Network or connectivity failure, including timeouts
    #[error("Network error: {0}")]
    Transport(String),

    /// Non-success response from the service
    #[error("{message}")]
    Service {
        /// HTTP status code
        status: u16,
        /// Message reported by the service
        message: String,
    },

    /// Malformed response body or push message
    #[error("Decode error: {0}")]
    Decode(String),

    /// Push connection closed unexpectedly
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// The operation was abandoned through its cancellation handle
    #[error("Request cancelled")]
    Cancelled,

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl Error {
    /// Check if the failure is transient and the request could be repeated
    ///
    /// Nothing in this workspace retries automatically; the flag tells the
    /// caller whether offering a manual retry makes sense.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) | Error::ConnectionLost(_) => true,
            Error::Service { status, .. } => RETRYABLE_STATUSES.contains(status),
            _ => false,
        }
    }

    /// Check if the failure cannot be fixed by repeating the request
    pub fn is_terminal(&self) -> bool {
        !self.is_retryable() && !matches!(self, Error::Cancelled)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}
