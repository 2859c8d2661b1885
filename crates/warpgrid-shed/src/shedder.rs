//! Adaptive shedder — CPU-gated, Little's-law admission control.
//!
//! A request is rejected only when the system is hot (CPU at or above the
//! threshold, or a rejection happened within the cool-off period) *and*
//! both the instantaneous and the smoothed in-flight counts exceed the
//! concurrency the service has recently proven it can sustain.
//!
//! # Capacity estimate
//!
//! ```text
//! max_pass   = highest per-bucket completion count      (≥ 1)
//! min_rt     = lowest per-bucket mean latency, ms       (≤ configured floor)
//! max_flight = max(1, max_pass * buckets_per_sec * min_rt / 1000)
//! ```
//!
//! Both counters skip the bucket that is still filling, so partial data
//! never skews the estimate.

use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, warn};

use warpgrid_window::{Clock, RollingWindow, SystemClock};

use crate::config::{ShedderConfig, ShedderOptions};
use crate::cpu::CpuSampler;
use crate::error::{ConfigError, Guarded, ShedError, ShedResult};

/// Diagnostics handed to the drop observer on every rejection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DropStats {
    /// CPU percentage at decision time.
    pub cpu: f64,
    pub max_pass: f64,
    /// Milliseconds.
    pub min_rt: f64,
    /// Whether the cool-off from an earlier rejection was still active.
    pub hot: bool,
    pub flying: u64,
    pub avg_flying: f64,
}

/// Point-in-time view of a shedder's internal state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ShedderStats {
    pub flying: u64,
    pub avg_flying: f64,
    pub max_pass: f64,
    pub min_rt: f64,
    pub max_flight: f64,
    pub hot: bool,
    pub passed: u64,
    pub failed: u64,
    pub dropped: u64,
}

#[derive(Debug, Clone, Copy, Default)]
struct Flight {
    flying: u64,
    avg_flying: f64,
}

struct Inner {
    config: ShedderConfig,
    buckets_per_second: f64,
    cpu: Arc<dyn CpuSampler>,
    clock: Arc<dyn Clock>,
    pass_counter: RollingWindow,
    rt_counter: RollingWindow,
    flight: Mutex<Flight>,
    /// Clock time of the last rejection in nanos, offset by one; 0 means
    /// no recent rejection.
    drop_time: AtomicU64,
    passed: AtomicU64,
    failed: AtomicU64,
    dropped: AtomicU64,
}

impl Inner {
    fn lock_flight(&self) -> MutexGuard<'_, Flight> {
        self.flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn flight(&self) -> Flight {
        *self.lock_flight()
    }

    fn admit(&self) {
        self.lock_flight().flying += 1;
    }

    /// Release one in-flight slot and refresh the average.
    fn release(&self) {
        let beta = self.config.flying_beta;
        let mut flight = self.lock_flight();
        flight.flying = flight.flying.saturating_sub(1);
        flight.avg_flying = flight.avg_flying * beta + flight.flying as f64 * (1.0 - beta);
    }

    fn on_pass(&self, admitted_at: Duration) {
        let rt = self.clock.now().saturating_sub(admitted_at);
        self.release();
        self.pass_counter.add(1.0);
        self.rt_counter.add(millis(rt).ceil());
        self.passed.fetch_add(1, Ordering::Relaxed);
    }

    fn on_fail(&self) {
        self.release();
        self.failed.fetch_add(1, Ordering::Relaxed);
    }

    fn should_drop(&self) -> bool {
        let cpu = self.cpu.cpu_usage();
        if !(cpu >= self.config.cpu_threshold || self.still_hot()) {
            return false;
        }
        if !self.high_thru() {
            return false;
        }

        let flight = self.flight();
        let stats = DropStats {
            cpu,
            max_pass: self.max_pass(),
            min_rt: self.min_rt(),
            hot: self.still_hot(),
            flying: flight.flying,
            avg_flying: flight.avg_flying,
        };
        warn!(
            cpu = stats.cpu,
            max_pass = stats.max_pass,
            min_rt = stats.min_rt,
            hot = stats.hot,
            flying = stats.flying,
            avg_flying = stats.avg_flying,
            "request dropped"
        );
        if let Some(observer) = &self.config.on_drop
            && catch_unwind(AssertUnwindSafe(|| observer(&stats))).is_err()
        {
            warn!("drop observer panicked");
        }
        true
    }

    fn record_drop(&self) {
        let now = self.clock.now().as_nanos() as u64;
        self.drop_time.store(now.saturating_add(1), Ordering::Release);
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Whether the last rejection is still within the cool-off period.
    /// Clears the rejection once the period has elapsed.
    fn still_hot(&self) -> bool {
        let marked = self.drop_time.load(Ordering::Acquire);
        if marked == 0 {
            return false;
        }

        let dropped_at = Duration::from_nanos(marked - 1);
        let hot = self.clock.now().saturating_sub(dropped_at) < self.config.cool_off;
        if !hot
            && self
                .drop_time
                .compare_exchange(marked, 0, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
        {
            debug!("shedder cool-off elapsed");
        }
        hot
    }

    fn high_thru(&self) -> bool {
        let max_flight = self.max_flight();
        let flight = self.flight();
        flight.avg_flying > max_flight && flight.flying as f64 > max_flight
    }

    fn max_flight(&self) -> f64 {
        // buckets_per_second turns the per-bucket peak into a per-second
        // rate; min_rt is in milliseconds.
        (self.max_pass() * self.buckets_per_second * self.min_rt() / 1e3).max(1.0)
    }

    fn max_pass(&self) -> f64 {
        self.pass_counter.max_sum().map_or(1.0, |m| m.max(1.0))
    }

    fn min_rt(&self) -> f64 {
        let floor = millis(self.config.min_rt);
        self.rt_counter.min_average().map_or(floor, |m| m.min(floor))
    }
}

/// Adaptive admission gate.
///
/// Cheap to clone; clones share state. Separately constructed shedders are
/// fully independent.
#[derive(Clone)]
pub struct AdaptiveShedder {
    inner: Arc<Inner>,
}

impl AdaptiveShedder {
    /// Create a shedder on the system clock.
    pub fn new(options: ShedderOptions, cpu: Arc<dyn CpuSampler>) -> Result<Self, ConfigError> {
        Self::with_clock(options, cpu, Arc::new(SystemClock::new()))
    }

    /// Create a shedder reading time from `clock`.
    pub fn with_clock(
        options: ShedderOptions,
        cpu: Arc<dyn CpuSampler>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        let config = ShedderConfig::from_options(options)?;
        let counter = || {
            RollingWindow::new(
                config.buckets,
                config.bucket_duration(),
                true,
                Arc::clone(&clock),
            )
        };
        let pass_counter = counter();
        let rt_counter = counter();
        Ok(Self::from_parts(config, cpu, clock, pass_counter, rt_counter))
    }

    fn from_parts(
        config: ShedderConfig,
        cpu: Arc<dyn CpuSampler>,
        clock: Arc<dyn Clock>,
        pass_counter: RollingWindow,
        rt_counter: RollingWindow,
    ) -> Self {
        debug!(
            window = ?config.window,
            buckets = config.buckets,
            cpu_threshold = config.cpu_threshold,
            "adaptive shedder created"
        );
        Self {
            inner: Arc::new(Inner {
                buckets_per_second: config.buckets_per_second(),
                config,
                cpu,
                clock,
                pass_counter,
                rt_counter,
                flight: Mutex::new(Flight::default()),
                drop_time: AtomicU64::new(0),
                passed: AtomicU64::new(0),
                failed: AtomicU64::new(0),
                dropped: AtomicU64::new(0),
            }),
        }
    }

    pub fn config(&self) -> &ShedderConfig {
        &self.inner.config
    }

    /// Decide whether to admit one unit of work.
    ///
    /// On success the returned [`Admission`] must be completed with exactly
    /// one of [`Admission::pass`] or [`Admission::fail`].
    pub fn allow(&self) -> ShedResult<Admission> {
        if self.inner.should_drop() {
            self.inner.record_drop();
            return Err(ShedError::Overloaded);
        }

        self.inner.admit();
        Ok(Admission {
            shedder: Some(Arc::clone(&self.inner)),
            admitted_at: self.inner.clock.now(),
        })
    }

    /// Admit, run `f`, and complete the admission from its outcome.
    pub fn run<T, E, F>(&self, f: F) -> Result<T, Guarded<E>>
    where
        F: FnOnce() -> Result<T, E>,
    {
        let admission = self.allow()?;
        match f() {
            Ok(v) => {
                admission.pass();
                Ok(v)
            }
            Err(e) => {
                admission.fail();
                Err(Guarded::Inner(e))
            }
        }
    }

    /// Async counterpart of [`run`](Self::run). If the future is dropped
    /// before completing, the slot is released as failed.
    pub async fn run_async<T, E, Fut>(&self, fut: Fut) -> Result<T, Guarded<E>>
    where
        Fut: Future<Output = Result<T, E>>,
    {
        let admission = self.allow()?;
        match fut.await {
            Ok(v) => {
                admission.pass();
                Ok(v)
            }
            Err(e) => {
                admission.fail();
                Err(Guarded::Inner(e))
            }
        }
    }

    pub fn stats(&self) -> ShedderStats {
        let inner = &self.inner;
        let flight = inner.flight();
        ShedderStats {
            flying: flight.flying,
            avg_flying: flight.avg_flying,
            max_pass: inner.max_pass(),
            min_rt: inner.min_rt(),
            max_flight: inner.max_flight(),
            hot: inner.still_hot(),
            passed: inner.passed.load(Ordering::Relaxed),
            failed: inner.failed.load(Ordering::Relaxed),
            dropped: inner.dropped.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for AdaptiveShedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdaptiveShedder")
            .field("config", &self.inner.config)
            .field("flight", &self.inner.flight())
            .finish_non_exhaustive()
    }
}

/// An admitted unit of work.
///
/// Complete it with [`pass`](Self::pass) when the work succeeded, or
/// [`fail`](Self::fail) when it did not. Dropping it uncompleted releases
/// the slot as a failure and logs a warning.
#[must_use = "an admission must be completed with pass() or fail()"]
pub struct Admission {
    shedder: Option<Arc<Inner>>,
    admitted_at: Duration,
}

impl Admission {
    /// Successful completion: release the slot and record throughput and
    /// latency.
    pub fn pass(mut self) {
        if let Some(inner) = self.shedder.take() {
            inner.on_pass(self.admitted_at);
        }
    }

    /// Abnormal completion: release the slot without recording statistics.
    pub fn fail(mut self) {
        if let Some(inner) = self.shedder.take() {
            inner.on_fail();
        }
    }
}

impl Drop for Admission {
    fn drop(&mut self) {
        if let Some(inner) = self.shedder.take() {
            warn!("admission dropped without pass or fail, releasing as failed");
            inner.on_fail();
        }
    }
}

impl std::fmt::Debug for Admission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Admission")
            .field("admitted_at", &self.admitted_at)
            .finish()
    }
}

fn millis(d: Duration) -> f64 {
    d.as_nanos() as f64 / 1e6
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    use warpgrid_window::ManualClock;

    use crate::cpu::FixedCpu;

    const INTERVAL: Duration = Duration::from_millis(50);
    const BUCKETS: usize = 10;

    struct Harness {
        shedder: AdaptiveShedder,
        clock: Arc<ManualClock>,
        cpu: Arc<FixedCpu>,
    }

    impl Harness {
        fn new(options: ShedderOptions) -> Self {
            let clock = Arc::new(ManualClock::new());
            let cpu = Arc::new(FixedCpu::new(0.0));
            let shedder =
                AdaptiveShedder::with_clock(options, cpu.clone(), clock.clone()).unwrap();
            Self {
                shedder,
                clock,
                cpu,
            }
        }

        /// Default configuration, but counters of 10 × 50ms buckets.
        fn with_small_counters() -> Self {
            let clock = Arc::new(ManualClock::new());
            let cpu = Arc::new(FixedCpu::new(0.0));
            let counter = || RollingWindow::new(BUCKETS, INTERVAL, true, clock.clone());
            let shedder = AdaptiveShedder::from_parts(
                ShedderConfig::default(),
                cpu.clone(),
                clock.clone(),
                counter(),
                counter(),
            );
            Self {
                shedder,
                clock,
                cpu,
            }
        }

        fn inner(&self) -> &Inner {
            &self.shedder.inner
        }

        fn set_flight(&self, flying: u64, avg_flying: f64) {
            *self.inner().lock_flight() = Flight {
                flying,
                avg_flying,
            };
        }

        /// Ten buckets of passes (100..=1000) and latencies (bucket i holds
        /// i*10+1 ..= i*10+10), leaving the last bucket as the current one.
        fn fill_counters(&self) {
            for i in 0..10 {
                if i > 0 {
                    self.clock.advance(INTERVAL);
                }
                self.inner().pass_counter.add(((i + 1) * 100) as f64);
                for j in i * 10 + 1..=i * 10 + 10 {
                    self.inner().rt_counter.add(j as f64);
                }
            }
        }
    }

    #[test]
    fn max_pass_is_peak_bucket() {
        let h = Harness::with_small_counters();
        for i in 0..=10 {
            h.inner().pass_counter.add((i * 100) as f64);
            h.clock.advance(INTERVAL);
        }
        assert_eq!(h.inner().max_pass(), 1000.0);
    }

    #[test]
    fn max_pass_defaults_to_one() {
        let h = Harness::new(ShedderOptions::default());
        assert_eq!(h.inner().max_pass(), 1.0);
    }

    #[test]
    fn min_rt_is_lowest_rounded_average() {
        let h = Harness::with_small_counters();
        h.fill_counters();
        assert_eq!(h.inner().min_rt(), 6.0);
    }

    #[test]
    fn min_rt_defaults_to_floor() {
        let h = Harness::new(ShedderOptions::default());
        assert_eq!(h.inner().min_rt(), 1000.0);

        let h = Harness::new(ShedderOptions {
            min_rt: Some(Duration::from_millis(250)),
            ..Default::default()
        });
        assert_eq!(h.inner().min_rt(), 250.0);
    }

    #[test]
    fn min_rt_never_exceeds_floor() {
        let h = Harness::with_small_counters();
        h.inner().rt_counter.add(5000.0);
        h.clock.advance(INTERVAL);
        assert_eq!(h.inner().min_rt(), 1000.0);
    }

    #[test]
    fn max_flight_follows_littles_law() {
        let h = Harness::with_small_counters();
        h.fill_counters();
        // max_pass 900, 10 buckets/s, min_rt 6ms.
        assert_eq!(h.inner().max_pass(), 900.0);
        assert!((h.inner().max_flight() - 54.0).abs() < 1e-9);
    }

    #[test]
    fn max_flight_never_below_one() {
        let h = Harness::new(ShedderOptions {
            min_rt: Some(Duration::from_millis(1)),
            ..Default::default()
        });
        // 1 pass * 10/s * 1ms = 0.01
        assert_eq!(h.inner().max_flight(), 1.0);

        let h = Harness::new(ShedderOptions::default());
        assert_eq!(h.inner().max_flight(), 10.0);
    }

    #[test]
    fn should_drop_matrix() {
        let h = Harness::with_small_counters();
        h.fill_counters();

        // Overloaded, in-flight below capacity.
        h.cpu.set(100.0);
        h.set_flight(0, 50.0);
        assert!(!h.inner().should_drop());

        // Overloaded, only the average above capacity.
        h.set_flight(50, 80.0);
        assert!(!h.inner().should_drop());

        // Overloaded, both above capacity.
        h.set_flight(80, 80.0);
        assert!(h.inner().should_drop());

        // Not overloaded.
        h.cpu.set(0.0);
        assert!(!h.inner().should_drop());
    }

    #[test]
    fn should_drop_requires_both_counts() {
        let h = Harness::new(ShedderOptions::default());
        h.cpu.set(95.0);

        h.set_flight(100, 0.0);
        assert!(!h.inner().should_drop());

        h.set_flight(0, 100.0);
        assert!(!h.inner().should_drop());
    }

    #[test]
    fn cpu_threshold_is_inclusive() {
        let h = Harness::new(ShedderOptions::default());
        h.set_flight(100, 100.0);
        h.cpu.set(79.9);
        assert!(!h.inner().should_drop());
        h.cpu.set(80.0);
        assert!(h.inner().should_drop());
    }

    #[test]
    fn cold_shedder_admits_under_high_cpu() {
        let h = Harness::new(ShedderOptions::default());
        h.cpu.set(100.0);
        let admission = h.shedder.allow().unwrap();
        assert_eq!(h.shedder.stats().flying, 1);
        admission.pass();
        assert_eq!(h.shedder.stats().flying, 0);
    }

    #[test]
    fn rejection_leaves_flying_untouched() {
        let h = Harness::new(ShedderOptions::default());
        h.cpu.set(100.0);
        h.set_flight(20, 20.0);

        assert_eq!(h.shedder.allow().unwrap_err(), ShedError::Overloaded);

        let stats = h.shedder.stats();
        assert_eq!(stats.flying, 20);
        assert_eq!(stats.dropped, 1);
        assert!(stats.hot);
    }

    #[test]
    fn cool_off_keeps_rejecting_after_cpu_recovers() {
        let h = Harness::new(ShedderOptions::default());
        h.cpu.set(100.0);
        h.set_flight(20, 20.0);
        assert!(h.shedder.allow().is_err());

        h.cpu.set(10.0);
        h.clock.advance(Duration::from_millis(500));
        assert!(h.inner().still_hot());
        assert!(h.inner().should_drop());

        // Cool-off measured from the last rejection.
        h.clock.advance(Duration::from_millis(500));
        assert!(!h.inner().still_hot());
        let admission = h.shedder.allow().unwrap();
        admission.fail();
    }

    #[test]
    fn cool_off_is_time_bounded_not_cpu_bounded() {
        let h = Harness::new(ShedderOptions {
            cool_off: Some(Duration::from_millis(200)),
            ..Default::default()
        });
        h.cpu.set(100.0);
        h.set_flight(20, 20.0);
        assert!(h.shedder.allow().is_err());
        assert!(h.inner().still_hot());

        h.clock.advance(Duration::from_millis(200));
        assert!(!h.inner().still_hot());
        // Still rejected through the CPU path.
        assert!(h.inner().should_drop());
    }

    #[test]
    fn pass_records_throughput_and_latency() {
        let h = Harness::new(ShedderOptions::default());
        let admission = h.shedder.allow().unwrap();
        h.clock.advance(Duration::from_millis(30));
        admission.pass();

        // Move past the bucket so the counters expose it.
        h.clock.advance(Duration::from_millis(100));
        assert_eq!(h.inner().pass_counter.max_sum(), Some(1.0));
        assert_eq!(h.inner().rt_counter.min_average(), Some(30.0));
        assert_eq!(h.shedder.stats().passed, 1);
    }

    #[test]
    fn pass_rounds_latency_up_to_whole_millis() {
        let h = Harness::new(ShedderOptions::default());
        let admission = h.shedder.allow().unwrap();
        h.clock.advance(Duration::from_micros(12_300));
        admission.pass();

        h.clock.advance(Duration::from_millis(100));
        assert_eq!(h.inner().rt_counter.totals().sum, 13.0);
    }

    #[test]
    fn fail_records_nothing() {
        let h = Harness::new(ShedderOptions::default());
        let admission = h.shedder.allow().unwrap();
        h.clock.advance(Duration::from_millis(30));
        admission.fail();

        h.clock.advance(Duration::from_millis(100));
        assert_eq!(h.inner().pass_counter.totals().count, 0);
        assert_eq!(h.inner().rt_counter.totals().count, 0);

        let stats = h.shedder.stats();
        assert_eq!(stats.flying, 0);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn average_refreshes_only_on_release() {
        let h = Harness::new(ShedderOptions::default());
        let a = h.shedder.allow().unwrap();
        let b = h.shedder.allow().unwrap();
        let c = h.shedder.allow().unwrap();
        assert_eq!(h.shedder.stats().avg_flying, 0.0);

        a.pass();
        let avg = h.shedder.stats().avg_flying;
        assert!((avg - 0.2).abs() < 1e-12, "avg was {avg}");

        b.fail();
        let avg = h.shedder.stats().avg_flying;
        assert!((avg - 0.28).abs() < 1e-12, "avg was {avg}");

        c.pass();
        assert_eq!(h.shedder.stats().flying, 0);
    }

    #[test]
    fn dropped_admission_releases_slot() {
        let h = Harness::new(ShedderOptions::default());
        {
            let _admission = h.shedder.allow().unwrap();
            assert_eq!(h.shedder.stats().flying, 1);
        }
        let stats = h.shedder.stats();
        assert_eq!(stats.flying, 0);
        assert_eq!(stats.failed, 1);
    }

    #[test]
    fn observer_sees_drop_stats() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let h = Harness::new(ShedderOptions {
            on_drop: Some(Arc::new(move |stats: &DropStats| {
                sink.lock().unwrap().push(*stats);
            })),
            ..Default::default()
        });
        h.cpu.set(90.0);
        h.set_flight(20, 15.0);

        assert!(h.shedder.allow().is_err());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(
            seen[0],
            DropStats {
                cpu: 90.0,
                max_pass: 1.0,
                min_rt: 1000.0,
                hot: false,
                flying: 20,
                avg_flying: 15.0,
            }
        );
    }

    #[test]
    fn observer_panic_does_not_hide_overload() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let h = Harness::new(ShedderOptions {
            on_drop: Some(Arc::new(move |_: &DropStats| {
                counter.fetch_add(1, Ordering::SeqCst);
                panic!("observer failure");
            })),
            ..Default::default()
        });
        h.cpu.set(100.0);
        h.set_flight(20, 20.0);

        assert_eq!(h.shedder.allow().unwrap_err(), ShedError::Overloaded);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn run_completes_from_result() {
        let h = Harness::new(ShedderOptions::default());

        let ok: Result<u32, Guarded<&str>> = h.shedder.run(|| Ok(7));
        assert_eq!(ok.unwrap(), 7);

        let err: Result<u32, Guarded<&str>> = h.shedder.run(|| Err("boom"));
        assert!(matches!(err, Err(Guarded::Inner("boom"))));

        let stats = h.shedder.stats();
        assert_eq!(stats.passed, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.flying, 0);
    }

    #[test]
    fn run_reports_overload() {
        let h = Harness::new(ShedderOptions::default());
        h.cpu.set(100.0);
        h.set_flight(20, 20.0);

        let mut called = false;
        let res: Result<(), Guarded<String>> = h.shedder.run(|| {
            called = true;
            Ok(())
        });
        assert!(matches!(res, Err(Guarded::Dropped(ShedError::Overloaded))));
        assert!(!called);
    }

    #[tokio::test]
    async fn run_async_completes_from_result() {
        let h = Harness::new(ShedderOptions::default());
        let value = h
            .shedder
            .run_async(async { Ok::<_, std::io::Error>("done") })
            .await
            .unwrap();
        assert_eq!(value, "done");
        assert_eq!(h.shedder.stats().passed, 1);
    }

    #[test]
    fn clones_share_state() {
        let h = Harness::new(ShedderOptions::default());
        let other = h.shedder.clone();
        let admission = other.allow().unwrap();
        assert_eq!(h.shedder.stats().flying, 1);
        admission.pass();
        assert_eq!(h.shedder.stats().flying, 0);
    }

    #[test]
    fn separate_shedders_are_independent() {
        let a = Harness::new(ShedderOptions::default());
        let b = Harness::new(ShedderOptions::default());
        let admission = a.shedder.allow().unwrap();
        assert_eq!(a.shedder.stats().flying, 1);
        assert_eq!(b.shedder.stats().flying, 0);
        admission.fail();
    }

    #[test]
    fn invalid_options_fail_construction() {
        let err = AdaptiveShedder::new(
            ShedderOptions {
                flying_beta: Some(2.0),
                ..Default::default()
            },
            Arc::new(FixedCpu::new(0.0)),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
