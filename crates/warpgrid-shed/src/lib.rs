//! warpgrid-shed — adaptive load shedding for WarpGrid services.
//!
//! Decides per unit of work whether to admit or reject it, based on CPU
//! pressure and the concurrency the service has recently sustained.
//! Rejected work is declined immediately; nothing is queued.
//!
//! # Architecture
//!
//! ```text
//! AdaptiveShedder
//!   ├── allow() → Admission | ShedError::Overloaded
//!   │     └── pass() / fail() ← called once per admitted unit
//!   ├── pass counter  (RollingWindow, completions per bucket)
//!   ├── rt counter    (RollingWindow, latency ms per bucket)
//!   ├── in-flight count + EMA
//!   ├── cool-off after each rejection
//!   └── CpuSampler    ← ProcStatCpu, FixedCpu, or any Fn() -> f64
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use warpgrid_shed::{AdaptiveShedder, ProcStatCpu, ShedderOptions};
//!
//! let shedder = AdaptiveShedder::new(ShedderOptions::default(), Arc::new(ProcStatCpu::new()))?;
//! match shedder.allow() {
//!     Ok(admission) => {
//!         // ... handle the request ...
//!         admission.pass();
//!     }
//!     Err(e) => eprintln!("{e}"),
//! }
//! # Ok::<(), warpgrid_shed::ConfigError>(())
//! ```

pub mod config;
pub mod cpu;
pub mod error;
pub mod promise;
pub mod shedder;

pub use config::{DropObserver, ShedderConfig, ShedderFile, ShedderOptions};
pub use cpu::{CpuSampler, FixedCpu, ProcStatCpu};
pub use error::{ConfigError, Guarded, ShedError, ShedResult};
pub use promise::{NopShedder, Promise, Shedder, build_shedder};
pub use shedder::{AdaptiveShedder, Admission, DropStats, ShedderStats};
pub use warpgrid_window::{Clock, ManualClock, SystemClock};
