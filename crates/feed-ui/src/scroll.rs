//! Scroll proximity detection

use feed_state::FeedController;
use serde::{Deserialize, Serialize};

/// Distance from the end of the content at which more history is requested
pub const DEFAULT_MARGIN: f64 = 200.0;

/// Receiver of "near the end" notifications
pub trait LoadMoreTarget: Send + Sync {
    /// Request the next page; must not block
    fn load_more(&self);
}

impl LoadMoreTarget for FeedController {
    fn load_more(&self) {
        let controller = self.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let outcome = controller.request_more().await;
                    tracing::trace!(?outcome, "scroll load-more finished");
                });
            }
            Err(_) => tracing::warn!("no async runtime, load-more ignored"),
        }
    }
}

/// Detects when the viewport approaches the end of the content
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollProximity {
    /// Distance from the end that counts as near
    pub margin: f64,
}

impl Default for ScrollProximity {
    fn default() -> Self {
        Self { margin: DEFAULT_MARGIN }
    }
}

impl ScrollProximity {
    /// Create a detector with a custom margin
    pub fn new(margin: f64) -> Self {
        Self { margin }
    }

    /// Check if the bottom of the viewport is within the margin of the end
    pub fn is_near_end(&self, viewport_bottom: f64, content_height: f64) -> bool {
        content_height - viewport_bottom <= self.margin
    }

    /// Handle a scroll position, asking `target` for more when near the end
    ///
    /// Returns whether `target` was asked. Requests made while a fetch is
    /// outstanding are rejected by the controller, so calling this on every
    /// scroll event is fine.
    pub fn on_scroll(
        &self,
        viewport_bottom: f64,
        content_height: f64,
        target: &dyn LoadMoreTarget,
    ) -> bool {
        if !self.is_near_end(viewport_bottom, content_height) {
            return false;
        }

        target.load_more();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTarget(AtomicUsize);

    impl LoadMoreTarget for CountingTarget {
        fn load_more(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_near_end_uses_margin() {
        let proximity = ScrollProximity::default();
        assert!(!proximity.is_near_end(700.0, 1000.0));
        assert!(proximity.is_near_end(800.0, 1000.0));
        assert!(proximity.is_near_end(1000.0, 1000.0));
    }

    #[test]
    fn test_short_content_is_always_near_end() {
        let proximity = ScrollProximity::default();
        assert!(proximity.is_near_end(600.0, 300.0));
    }

    #[test]
    fn test_on_scroll_asks_target_only_near_end() {
        let proximity = ScrollProximity::new(50.0);
        let target = CountingTarget::default();

        assert!(!proximity.on_scroll(500.0, 1000.0, &target));
        assert!(proximity.on_scroll(960.0, 1000.0, &target));
        assert_eq!(target.0.load(Ordering::SeqCst), 1);
    }
}
