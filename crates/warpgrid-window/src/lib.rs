//! warpgrid-window — time-bucketed counters for recent throughput and latency.
//!
//! A [`RollingWindow`] keeps the last `size` fixed-duration buckets, each
//! holding the sum and count of the observations recorded during its slice.
//! Stale buckets are zeroed lazily whenever the window is touched, so there
//! is no background sweeper.
//!
//! # Architecture
//!
//! ```text
//! RollingWindow
//!   ├── add(value)     ← called per observation
//!   ├── reduce(f)      → visits retained buckets, oldest first
//!   └── Arc<dyn Clock> ← SystemClock in production, ManualClock in tests
//! ```

pub mod clock;
pub mod window;

pub use clock::{Clock, ManualClock, SystemClock};
pub use window::{Bucket, RollingWindow};
