//! Pull-to-refresh gesture
//!
//! A three-state machine driven by pointer coordinates:
//!
//! - `Idle`: waiting for a pointer to go down while the feed is scrolled to
//!   the top.
//! - `Tracking`: one pointer is bound; downward travel is recorded as the
//!   pull distance.
//! - `Committed`: the pull passed the threshold and a refresh was requested;
//!   the indicator stays visible until the settle delay elapses.
//!
//! Time is passed in explicitly so hosts can drive the settle delay from
//! their own frame clock.

use feed_state::FeedController;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

// =============================================================================
// Configuration
// =============================================================================

/// Gesture tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PullConfig {
    /// Divisor applied to the pull distance for the indicator position
    pub resistance: f64,
    /// Indicator position at rest (hidden above the viewport)
    pub offset: f64,
    /// Largest indicator position while pulling
    pub max_extent: f64,
    /// Pull distance that must be exceeded to refresh
    pub threshold: f64,
    /// Indicator position while a committed refresh settles
    pub committed_offset: f64,
    /// How long the committed state lasts
    pub settle: Duration,
}

impl Default for PullConfig {
    fn default() -> Self {
        Self {
            resistance: 2.0,
            offset: -50.0,
            max_extent: 70.0,
            threshold: 70.0,
            committed_offset: 20.0,
            settle: Duration::from_millis(1000),
        }
    }
}

impl PullConfig {
    /// Indicator position for a pull distance
    pub fn indicator_for(&self, distance: f64) -> f64 {
        (distance / self.resistance + self.offset).min(self.max_extent)
    }
}

// =============================================================================
// Refresh Target
// =============================================================================

/// Receiver of committed pulls
pub trait RefreshTarget: Send + Sync {
    /// Request a refresh; must not block
    fn trigger_refresh(&self);
}

impl RefreshTarget for FeedController {
    fn trigger_refresh(&self) {
        let controller = self.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(async move {
                    let outcome = controller.request_refresh().await;
                    tracing::debug!(?outcome, "pull-to-refresh finished");
                });
            }
            Err(_) => tracing::warn!("no async runtime, pull-to-refresh ignored"),
        }
    }
}

// =============================================================================
// Gesture State Machine
// =============================================================================

/// Gesture state
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PullState {
    /// No gesture in progress
    Idle,
    /// A pointer is being tracked
    Tracking {
        /// Bound pointer
        pointer_id: u64,
        /// Vertical position where the pointer went down
        start_y: f64,
        /// Downward travel so far
        distance: f64,
    },
    /// A refresh was requested and the indicator is settling
    Committed {
        /// When the gesture returns to idle
        until: Instant,
    },
}

/// Pull-to-refresh gesture recognizer
pub struct PullToRefresh {
    config: PullConfig,
    state: PullState,
    target: Arc<dyn RefreshTarget>,
}

impl PullToRefresh {
    /// Create a recognizer that refreshes `target`
    pub fn new(config: PullConfig, target: Arc<dyn RefreshTarget>) -> Self {
        Self { config, state: PullState::Idle, target }
    }

    /// Current state
    pub fn state(&self) -> PullState {
        self.state
    }

    /// Gesture tuning
    pub fn config(&self) -> &PullConfig {
        &self.config
    }

    /// Pointer went down
    ///
    /// Starts tracking only when idle and the feed is scrolled to the top.
    /// Returns whether the pointer is now tracked.
    pub fn pointer_down(&mut self, pointer_id: u64, y: f64, scrolled_to_top: bool) -> bool {
        if self.state != PullState::Idle || !scrolled_to_top {
            return false;
        }

        self.state = PullState::Tracking { pointer_id, start_y: y, distance: 0.0 };
        true
    }

    /// Pointer moved
    ///
    /// Moves of other pointers are ignored. Upward travel counts as zero.
    pub fn pointer_move(&mut self, pointer_id: u64, y: f64) {
        if let PullState::Tracking { pointer_id: bound, start_y, distance } = &mut self.state {
            if *bound == pointer_id {
                *distance = (y - *start_y).max(0.0);
            }
        }
    }

    /// Pointer went up
    ///
    /// Returns whether the pull committed a refresh.
    pub fn pointer_up(&mut self, pointer_id: u64, now: Instant) -> bool {
        let distance = match self.state {
            PullState::Tracking { pointer_id: bound, distance, .. } if bound == pointer_id => {
                distance
            }
            _ => return false,
        };

        if distance > self.config.threshold {
            tracing::debug!(distance, "pull committed");
            self.target.trigger_refresh();
            self.state = PullState::Committed { until: now + self.config.settle };
            true
        } else {
            self.state = PullState::Idle;
            false
        }
    }

    /// Pointer sequence was interrupted by the platform
    pub fn pointer_cancel(&mut self, pointer_id: u64) {
        if matches!(self.state, PullState::Tracking { pointer_id: bound, .. } if bound == pointer_id)
        {
            self.state = PullState::Idle;
        }
    }

    /// Advance time; ends the settle period once `now` reaches it
    pub fn tick(&mut self, now: Instant) {
        if let PullState::Committed { until } = self.state {
            if now >= until {
                self.state = PullState::Idle;
            }
        }
    }

    /// Raw downward travel of the tracked pointer
    pub fn pull_distance(&self) -> f64 {
        match self.state {
            PullState::Tracking { distance, .. } => distance,
            _ => 0.0,
        }
    }

    /// Where the refresh indicator should be drawn
    pub fn indicator_offset(&self) -> f64 {
        match self.state {
            PullState::Idle => self.config.offset,
            PullState::Tracking { distance, .. } => self.config.indicator_for(distance),
            PullState::Committed { .. } => self.config.committed_offset,
        }
    }

    /// Check if a committed refresh is still settling
    pub fn is_refreshing(&self) -> bool {
        matches!(self.state, PullState::Committed { .. })
    }
}

impl std::fmt::Debug for PullToRefresh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PullToRefresh")
            .field("config", &self.config)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingTarget(AtomicUsize);

    impl CountingTarget {
        fn count(&self) -> usize {
            self.0.load(Ordering::SeqCst)
        }
    }

    impl RefreshTarget for CountingTarget {
        fn trigger_refresh(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn gesture() -> (PullToRefresh, Arc<CountingTarget>) {
        let target = Arc::new(CountingTarget::default());
        (PullToRefresh::new(PullConfig::default(), target.clone()), target)
    }

    #[test]
    fn test_indicator_resistance() {
        let config = PullConfig::default();
        assert_eq!(config.indicator_for(0.0), -50.0);
        assert_eq!(config.indicator_for(80.0), -10.0);
        assert_eq!(config.indicator_for(1000.0), 70.0);
    }

    #[test]
    fn test_pull_past_threshold_refreshes_once() {
        let (mut gesture, target) = gesture();
        let now = Instant::now();

        assert!(gesture.pointer_down(7, 100.0, true));
        gesture.pointer_move(7, 150.0);
        gesture.pointer_move(7, 180.0);
        assert_eq!(gesture.pull_distance(), 80.0);
        assert_eq!(gesture.indicator_offset(), -10.0);

        assert!(gesture.pointer_up(7, now));
        assert_eq!(target.count(), 1);
        assert!(gesture.is_refreshing());
        assert_eq!(gesture.indicator_offset(), 20.0);

        gesture.tick(now + Duration::from_millis(999));
        assert!(gesture.is_refreshing());
        gesture.tick(now + Duration::from_millis(1000));
        assert_eq!(gesture.state(), PullState::Idle);
        assert_eq!(gesture.indicator_offset(), -50.0);
        assert_eq!(target.count(), 1);
    }

    #[test]
    fn test_short_pull_returns_to_idle() {
        let (mut gesture, target) = gesture();

        gesture.pointer_down(1, 0.0, true);
        gesture.pointer_move(1, 70.0);
        assert!(!gesture.pointer_up(1, Instant::now()));

        assert_eq!(gesture.state(), PullState::Idle);
        assert_eq!(target.count(), 0);
    }

    #[test]
    fn test_pointer_down_requires_top_of_feed() {
        let (mut gesture, _) = gesture();
        assert!(!gesture.pointer_down(1, 0.0, false));
        assert_eq!(gesture.state(), PullState::Idle);
    }

    #[test]
    fn test_second_pointer_is_rejected() {
        let (mut gesture, target) = gesture();
        let now = Instant::now();

        gesture.pointer_down(1, 0.0, true);
        assert!(!gesture.pointer_down(2, 0.0, true));
        gesture.pointer_move(2, 500.0);
        assert_eq!(gesture.pull_distance(), 0.0);
        assert!(!gesture.pointer_up(2, now));

        gesture.pointer_move(1, 100.0);
        assert!(gesture.pointer_up(1, now));
        assert!(!gesture.pointer_down(3, 0.0, true));
        assert_eq!(target.count(), 1);
    }

    #[test]
    fn test_upward_travel_counts_as_zero() {
        let (mut gesture, _) = gesture();
        gesture.pointer_down(1, 200.0, true);
        gesture.pointer_move(1, 50.0);
        assert_eq!(gesture.pull_distance(), 0.0);
        assert_eq!(gesture.indicator_offset(), -50.0);
    }

    #[test]
    fn test_cancel_discards_pull() {
        let (mut gesture, target) = gesture();

        gesture.pointer_down(1, 0.0, true);
        gesture.pointer_move(1, 300.0);
        gesture.pointer_cancel(1);

        assert_eq!(gesture.state(), PullState::Idle);
        assert!(!gesture.pointer_up(1, Instant::now()));
        assert_eq!(target.count(), 0);
    }

    #[test]
    fn test_custom_threshold() {
        let target = Arc::new(CountingTarget::default());
        let config = PullConfig { threshold: 120.0, ..Default::default() };
        let mut gesture = PullToRefresh::new(config, target.clone());

        gesture.pointer_down(1, 0.0, true);
        gesture.pointer_move(1, 100.0);
        assert!(!gesture.pointer_up(1, Instant::now()));
        assert_eq!(target.count(), 0);
    }
}
