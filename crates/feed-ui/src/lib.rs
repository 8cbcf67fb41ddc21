//! Input handling for Channel Feed
//!
//! This crate turns raw pointer and scroll coordinates into feed requests.
//! It never renders anything; the host layer feeds it positions and reads
//! back indicator offsets.
//!
//! # Modules
//!
//! - [`pull_refresh`] - Pull-to-refresh gesture state machine
//! - [`scroll`] - Scroll proximity detection for loading more history
//!
//! # Example
//!
//! ```rust
//! use feed_ui::pull_refresh::{PullConfig, PullToRefresh, RefreshTarget};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::time::Instant;
//!
//! #[derive(Default)]
//! struct Counter(AtomicUsize);
//!
//! impl RefreshTarget for Counter {
//!     fn trigger_refresh(&self) {
//!         self.0.fetch_add(1, Ordering::SeqCst);
//!     }
//! }
//!
//! let counter = Arc::new(Counter::default());
//! let mut gesture = PullToRefresh::new(PullConfig::default(), counter.clone());
//!
//! assert!(gesture.pointer_down(1, 0.0, true));
//! gesture.pointer_move(1, 80.0);
//! assert!(gesture.pointer_up(1, Instant::now()));
//! assert_eq!(counter.0.load(Ordering::SeqCst), 1);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod pull_refresh;
pub mod scroll;

pub use pull_refresh::{PullConfig, PullState, PullToRefresh, RefreshTarget};
pub use scroll::{LoadMoreTarget, ScrollProximity};
