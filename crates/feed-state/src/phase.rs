//! Feed phases and derived presentation state

use serde::{Deserialize, Serialize};
use std::fmt;

/// Loading phase exposed to the presentation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedPhase {
    /// First page (or a refresh) is loading
    InitialLoading,
    /// Another history page is loading
    LoadingMore,
    /// Items are shown and more history can be requested
    Ready,
    /// Oldest available history reached; the service is still populating
    Backfilling,
    /// No items
    Empty,
    /// A fetch failed; only a manual refresh leaves this phase
    Error,
}

impl FeedPhase {
    /// Check if the initial load has completed successfully
    ///
    /// Live items are only merged in these phases.
    pub fn is_post_initial(&self) -> bool {
        matches!(
            self,
            FeedPhase::LoadingMore | FeedPhase::Ready | FeedPhase::Backfilling | FeedPhase::Empty
        )
    }

    /// Check if a history fetch is running in this phase
    pub fn is_loading(&self) -> bool {
        matches!(self, FeedPhase::InitialLoading | FeedPhase::LoadingMore)
    }

    /// Snake-case name
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedPhase::InitialLoading => "initial_loading",
            FeedPhase::LoadingMore => "loading_more",
            FeedPhase::Ready => "ready",
            FeedPhase::Backfilling => "backfilling",
            FeedPhase::Empty => "empty",
            FeedPhase::Error => "error",
        }
    }
}

impl fmt::Display for FeedPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// State of the live push connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum LiveStatus {
    /// No connection has been opened
    #[default]
    Disconnected,
    /// Connection is being opened
    Connecting,
    /// Connection is open
    Connected,
    /// Connection failed or dropped; not reopened automatically
    Lost(String),
    /// Connection ended normally or was closed on shutdown
    Closed,
}

impl LiveStatus {
    /// Check if the connection is open
    pub fn is_connected(&self) -> bool {
        matches!(self, LiveStatus::Connected)
    }

    /// Check if a connection is open or being opened
    pub fn is_active(&self) -> bool {
        matches!(self, LiveStatus::Connecting | LiveStatus::Connected)
    }
}

/// What the presentation layer should render
///
/// Derived from the phase and the subscriptions collaborator; never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message", rename_all = "snake_case")]
pub enum FeedPresentation {
    /// Full-screen loader
    Loading,
    /// The feed
    Feed,
    /// The feed with a loader at the end
    LoadingMore,
    /// The feed with a "still catching up, pull to refresh" footer
    CatchingUp,
    /// No subscribed channels yet
    NoChannels,
    /// Channels exist but their posts are still being collected
    Populating,
    /// Empty feed, channel state unknown
    EmptyFeed,
    /// Error message replacing the feed
    Error(String),
}

impl FeedPresentation {
    /// Derive the presentation from a phase
    ///
    /// `channel_count` is `None` when the subscriptions were never loaded.
    pub fn derive(phase: FeedPhase, error: Option<&str>, channel_count: Option<usize>) -> Self {
        match phase {
            FeedPhase::InitialLoading => FeedPresentation::Loading,
            FeedPhase::LoadingMore => FeedPresentation::LoadingMore,
            FeedPhase::Ready => FeedPresentation::Feed,
            FeedPhase::Backfilling => FeedPresentation::CatchingUp,
            FeedPhase::Empty => match channel_count {
                Some(0) => FeedPresentation::NoChannels,
                Some(_) => FeedPresentation::Populating,
                None => FeedPresentation::EmptyFeed,
            },
            FeedPhase::Error => {
                FeedPresentation::Error(error.unwrap_or("Unknown error").to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_display() {
        assert_eq!(FeedPhase::InitialLoading.to_string(), "initial_loading");
        assert_eq!(FeedPhase::LoadingMore.to_string(), "loading_more");
        assert_eq!(FeedPhase::Error.as_str(), "error");
    }

    #[test]
    fn test_post_initial_phases() {
        assert!(!FeedPhase::InitialLoading.is_post_initial());
        assert!(!FeedPhase::Error.is_post_initial());
        assert!(FeedPhase::Ready.is_post_initial());
        assert!(FeedPhase::Backfilling.is_post_initial());
        assert!(FeedPhase::Empty.is_post_initial());
        assert!(FeedPhase::LoadingMore.is_post_initial());
    }

    #[test]
    fn test_empty_presentation_uses_channel_count() {
        assert_eq!(
            FeedPresentation::derive(FeedPhase::Empty, None, Some(0)),
            FeedPresentation::NoChannels
        );
        assert_eq!(
            FeedPresentation::derive(FeedPhase::Empty, None, Some(3)),
            FeedPresentation::Populating
        );
        assert_eq!(
            FeedPresentation::derive(FeedPhase::Empty, None, None),
            FeedPresentation::EmptyFeed
        );
    }

    #[test]
    fn test_error_presentation_carries_message() {
        assert_eq!(
            FeedPresentation::derive(FeedPhase::Error, Some("offline"), Some(2)),
            FeedPresentation::Error("offline".to_string())
        );
    }

    #[test]
    fn test_live_status_default() {
        assert_eq!(LiveStatus::default(), LiveStatus::Disconnected);
        assert!(!LiveStatus::Lost("x".to_string()).is_connected());
    }
}
