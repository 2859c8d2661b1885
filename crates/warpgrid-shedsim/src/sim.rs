//! Closed-loop load simulation.
//!
//! Each worker repeatedly asks the shedder for admission. Admitted work
//! "runs" for the service time, stretched when more units are in flight
//! than the simulated service can handle concurrently, then completes via
//! `pass` or `fail`. Rejected workers back off briefly and retry.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info};

use warpgrid_shed::{AdaptiveShedder, ShedError, ShedderStats};

/// Pause after a rejection before the worker retries.
const DROP_BACKOFF: Duration = Duration::from_millis(5);

#[derive(Debug, Clone)]
pub struct SimParams {
    pub workers: usize,
    pub duration: Duration,
    pub service_time: Duration,
    /// Concurrent units the simulated service handles at full speed.
    pub capacity: u64,
    /// Fraction of admitted units completed with `fail`.
    pub error_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SimReport {
    pub workers: usize,
    pub elapsed_ms: u64,
    pub admitted: u64,
    pub dropped: u64,
    pub passed: u64,
    pub failed: u64,
    pub drop_ratio: f64,
    pub shedder: ShedderStats,
}

#[derive(Default)]
struct Tally {
    admitted: AtomicU64,
    dropped: AtomicU64,
    passed: AtomicU64,
    failed: AtomicU64,
    in_flight: AtomicU64,
}

/// Run the simulation until `params.duration` elapses or `stop` fires.
pub async fn simulate(
    shedder: AdaptiveShedder,
    params: SimParams,
    mut stop: watch::Receiver<bool>,
) -> SimReport {
    let tally = Arc::new(Tally::default());
    let (halt_tx, halt_rx) = watch::channel(false);
    let started = Instant::now();

    info!(
        workers = params.workers,
        duration_ms = params.duration.as_millis() as u64,
        service_ms = params.service_time.as_millis() as u64,
        capacity = params.capacity,
        "simulation started"
    );

    let mut handles = Vec::with_capacity(params.workers);
    for id in 0..params.workers {
        let shedder = shedder.clone();
        let tally = tally.clone();
        let params = params.clone();
        let halt = halt_rx.clone();
        handles.push(tokio::spawn(async move {
            worker(id, shedder, tally, params, halt).await;
        }));
    }

    tokio::select! {
        _ = tokio::time::sleep(params.duration) => {}
        Ok(()) = stop.changed() => {
            info!("simulation interrupted");
        }
    }
    let _ = halt_tx.send(true);
    for h in handles {
        let _ = h.await;
    }

    let admitted = tally.admitted.load(Ordering::Relaxed);
    let dropped = tally.dropped.load(Ordering::Relaxed);
    let attempts = admitted + dropped;
    SimReport {
        workers: params.workers,
        elapsed_ms: started.elapsed().as_millis() as u64,
        admitted,
        dropped,
        passed: tally.passed.load(Ordering::Relaxed),
        failed: tally.failed.load(Ordering::Relaxed),
        drop_ratio: if attempts > 0 {
            dropped as f64 / attempts as f64
        } else {
            0.0
        },
        shedder: shedder.stats(),
    }
}

async fn worker(
    id: usize,
    shedder: AdaptiveShedder,
    tally: Arc<Tally>,
    params: SimParams,
    halt: watch::Receiver<bool>,
) {
    let mut seq: u64 = 0;
    while !*halt.borrow() {
        match shedder.allow() {
            Ok(admission) => {
                tally.admitted.fetch_add(1, Ordering::Relaxed);
                let in_flight = tally.in_flight.fetch_add(1, Ordering::Relaxed) + 1;
                tokio::time::sleep(stretched(params.service_time, in_flight, params.capacity)).await;
                tally.in_flight.fetch_sub(1, Ordering::Relaxed);

                if should_fail(seq, params.error_rate) {
                    admission.fail();
                    tally.failed.fetch_add(1, Ordering::Relaxed);
                } else {
                    admission.pass();
                    tally.passed.fetch_add(1, Ordering::Relaxed);
                }
                seq += 1;
            }
            Err(ShedError::Overloaded) => {
                tally.dropped.fetch_add(1, Ordering::Relaxed);
                tokio::time::sleep(DROP_BACKOFF).await;
            }
        }
    }
    debug!(worker = id, completed = seq, "worker stopped");
}

/// Service time grows linearly once concurrency exceeds capacity.
fn stretched(base: Duration, in_flight: u64, capacity: u64) -> Duration {
    if capacity == 0 || in_flight <= capacity {
        return base;
    }
    base.mul_f64(in_flight as f64 / capacity as f64)
}

/// Deterministically fail `error_rate` of all units: unit `seq` fails when
/// it carries the running total of failures over an integer boundary.
fn should_fail(seq: u64, error_rate: f64) -> bool {
    let rate = error_rate.clamp(0.0, 1.0);
    ((seq + 1) as f64 * rate).floor() > (seq as f64 * rate).floor()
}
