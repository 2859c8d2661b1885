//! CPU utilization sources.
//!
//! The shedder polls a [`CpuSampler`] on every admission decision, so
//! implementations should be cheap. [`ProcStatCpu`] caches its reading for a
//! refresh interval; [`FixedCpu`] is a settable value for tests and
//! simulations.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

/// Reports current CPU utilization as a percentage in `[0, 100]`.
pub trait CpuSampler: Send + Sync {
    fn cpu_usage(&self) -> f64;
}

impl<F> CpuSampler for F
where
    F: Fn() -> f64 + Send + Sync,
{
    fn cpu_usage(&self) -> f64 {
        self()
    }
}

/// A CPU reading that only changes when set.
#[derive(Debug, Default)]
pub struct FixedCpu {
    bits: AtomicU64,
}

impl FixedCpu {
    pub fn new(percent: f64) -> Self {
        Self {
            bits: AtomicU64::new(percent.to_bits()),
        }
    }

    pub fn set(&self, percent: f64) {
        self.bits.store(percent.to_bits(), Ordering::Relaxed);
    }
}

impl CpuSampler for FixedCpu {
    fn cpu_usage(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }
}

/// Aggregate tick counters from the `cpu` line of `/proc/stat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CpuTicks {
    busy: u64,
    total: u64,
}

impl CpuTicks {
    /// Parse a line like `cpu  4705 356 584 3699 23 23 0 0 0 0`.
    fn parse(line: &str) -> Option<Self> {
        let mut parts = line.split_whitespace();
        if parts.next()? != "cpu" {
            return None;
        }

        let fields: Vec<u64> = parts.take(8).map_while(|p| p.parse().ok()).collect();
        if fields.len() < 4 {
            return None;
        }

        let total: u64 = fields.iter().sum();
        // idle + iowait
        let idle = fields[3] + fields.get(4).copied().unwrap_or(0);
        Some(Self {
            busy: total - idle,
            total,
        })
    }

    /// Busy percentage between an earlier reading and this one.
    fn usage_since(&self, prev: &CpuTicks) -> Option<f64> {
        let total = self.total.checked_sub(prev.total)?;
        if total == 0 {
            return None;
        }
        let busy = self.busy.saturating_sub(prev.busy);
        Some((busy as f64 / total as f64 * 100.0).clamp(0.0, 100.0))
    }
}

struct ProcStatState {
    prev: Option<CpuTicks>,
    last_read: Option<Instant>,
    usage: f64,
}

/// Linux CPU sampler backed by `/proc/stat`.
///
/// Re-reads the file at most once per refresh interval and returns the
/// cached percentage in between. Failures are logged once and reported as
/// 0%.
pub struct ProcStatCpu {
    path: PathBuf,
    refresh: Duration,
    state: Mutex<ProcStatState>,
    warned: AtomicBool,
}

impl ProcStatCpu {
    pub const DEFAULT_REFRESH: Duration = Duration::from_millis(250);

    pub fn new() -> Self {
        Self::with_source("/proc/stat", Self::DEFAULT_REFRESH)
    }

    /// Read from `path` instead of `/proc/stat`.
    pub fn with_source(path: impl Into<PathBuf>, refresh: Duration) -> Self {
        Self {
            path: path.into(),
            refresh,
            state: Mutex::new(ProcStatState {
                prev: None,
                last_read: None,
                usage: 0.0,
            }),
            warned: AtomicBool::new(false),
        }
    }

    fn read_ticks(&self) -> Option<CpuTicks> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                self.warn_once(&format!("read failed: {e}"));
                return None;
            }
        };
        let ticks = content.lines().find_map(CpuTicks::parse);
        if ticks.is_none() {
            self.warn_once("no aggregate cpu line");
        }
        ticks
    }

    fn warn_once(&self, reason: &str) {
        if !self.warned.swap(true, Ordering::Relaxed) {
            warn!(path = %self.path.display(), reason, "cpu sampler unavailable, reporting 0%");
        }
    }
}

impl Default for ProcStatCpu {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuSampler for ProcStatCpu {
    fn cpu_usage(&self) -> f64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let fresh = state
            .last_read
            .is_some_and(|at| at.elapsed() < self.refresh);
        if fresh {
            return state.usage;
        }

        state.last_read = Some(Instant::now());
        if let Some(ticks) = self.read_ticks() {
            if let Some(prev) = state.prev
                && let Some(usage) = ticks.usage_since(&prev)
            {
                state.usage = usage;
                debug!(usage, "cpu usage sampled");
            }
            state.prev = Some(ticks);
        }
        state.usage
    }
}
