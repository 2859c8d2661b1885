//! Rolling window — a fixed ring of time buckets.
//!
//! Time is divided into slots of `bucket_duration` starting at the window's
//! construction. Slot `n` lives in bucket `n % size`. Whenever the window is
//! touched, every bucket whose slot has been overtaken since the last touch
//! is zeroed before it is reused, so a bucket only ever holds observations
//! from the most recent slot that maps to it.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::trace;

use crate::clock::Clock;

/// Sum and count of the observations recorded during one slot.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bucket {
    pub sum: f64,
    pub count: u64,
}

impl Bucket {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn reset(&mut self) {
        self.sum = 0.0;
        self.count = 0;
    }

    /// Mean of the recorded values, or `None` for an empty bucket.
    pub fn average(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }
}

struct WindowState {
    buckets: Vec<Bucket>,
    /// Absolute slot number of the most recent advance.
    last_slot: u64,
}

impl WindowState {
    /// Zero every bucket overtaken between `last_slot` (exclusive) and
    /// `slot` (inclusive).
    fn advance(&mut self, slot: u64) {
        if slot <= self.last_slot {
            return;
        }

        let size = self.buckets.len() as u64;
        let span = slot - self.last_slot;
        if span >= size {
            self.buckets.iter_mut().for_each(Bucket::reset);
        } else {
            for s in self.last_slot + 1..=slot {
                self.buckets[(s % size) as usize].reset();
            }
        }

        trace!(from = self.last_slot, to = slot, "rolling window advanced");
        self.last_slot = slot;
    }
}

/// A sliding window over the last `size` buckets.
///
/// All operations take a single per-window lock; they are O(size) at worst.
pub struct RollingWindow {
    size: usize,
    bucket_duration: Duration,
    ignore_current: bool,
    epoch: Duration,
    clock: Arc<dyn Clock>,
    state: Mutex<WindowState>,
}

impl RollingWindow {
    /// Create a window of `size` buckets, each covering `bucket_duration`.
    ///
    /// With `ignore_current` set, [`reduce`](Self::reduce) skips the bucket
    /// that is still being filled.
    ///
    /// # Panics
    ///
    /// Panics if `size` is zero or `bucket_duration` is zero.
    pub fn new(
        size: usize,
        bucket_duration: Duration,
        ignore_current: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        assert!(size > 0, "rolling window needs at least one bucket");
        assert!(
            !bucket_duration.is_zero(),
            "rolling window bucket duration must be positive"
        );

        let epoch = clock.now();
        Self {
            size,
            bucket_duration,
            ignore_current,
            epoch,
            clock,
            state: Mutex::new(WindowState {
                buckets: vec![Bucket::default(); size],
                last_slot: 0,
            }),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn bucket_duration(&self) -> Duration {
        self.bucket_duration
    }

    /// Record one observation into the bucket for "now".
    pub fn add(&self, value: f64) {
        let mut state = self.lock();
        let slot = self.current_slot();
        state.advance(slot);
        let idx = (slot % self.size as u64) as usize;
        state.buckets[idx].add(value);
    }

    /// Visit the retained buckets, oldest first.
    ///
    /// Empty buckets are visited too. When the window ignores the current
    /// bucket, the one for "now" is never visited.
    pub fn reduce<F>(&self, mut f: F)
    where
        F: FnMut(&Bucket),
    {
        let mut state = self.lock();
        let slot = self.current_slot();
        state.advance(slot);

        let size = self.size as u64;
        let visible = if self.ignore_current {
            size - 1
        } else {
            size
        };
        for k in 0..visible {
            let idx = ((slot + 1 + k) % size) as usize;
            f(&state.buckets[idx]);
        }
    }

    /// Largest single-bucket sum among the retained buckets holding data.
    pub fn max_sum(&self) -> Option<f64> {
        let mut result: Option<f64> = None;
        self.reduce(|b| {
            if b.count > 0 {
                result = Some(result.map_or(b.sum, |r| r.max(b.sum)));
            }
        });
        result
    }

    /// Smallest per-bucket average, rounded half away from zero.
    ///
    /// Buckets without observations are skipped.
    pub fn min_average(&self) -> Option<f64> {
        let mut result: Option<f64> = None;
        self.reduce(|b| {
            if let Some(avg) = b.average() {
                let avg = avg.round();
                result = Some(result.map_or(avg, |r| r.min(avg)));
            }
        });
        result
    }

    /// Sum and count across all retained buckets.
    pub fn totals(&self) -> Bucket {
        let mut total = Bucket::default();
        self.reduce(|b| {
            total.sum += b.sum;
            total.count += b.count;
        });
        total
    }

    fn current_slot(&self) -> u64 {
        let elapsed = self.clock.now().saturating_sub(self.epoch);
        (elapsed.as_nanos() / self.bucket_duration.as_nanos()) as u64
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, WindowState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl fmt::Debug for RollingWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RollingWindow")
            .field("size", &self.size)
            .field("bucket_duration", &self.bucket_duration)
            .field("ignore_current", &self.ignore_current)
            .finish_non_exhaustive()
    }
}
