//! Object-safe admission interface.
//!
//! Lets callers hold either an [`AdaptiveShedder`] or a [`NopShedder`]
//! behind one type, chosen from configuration at startup.

use std::sync::Arc;

use tracing::info;

use crate::config::{ShedderConfig, ShedderFile};
use crate::cpu::CpuSampler;
use crate::error::{ConfigError, ShedResult};
use crate::shedder::{AdaptiveShedder, Admission};

/// Completion handle for admitted work.
pub trait Promise: Send {
    fn pass(self: Box<Self>);
    fn fail(self: Box<Self>);
}

/// An admission gate.
pub trait Shedder: Send + Sync {
    fn allow(&self) -> ShedResult<Box<dyn Promise>>;
}

impl Promise for Admission {
    fn pass(self: Box<Self>) {
        Admission::pass(*self);
    }

    fn fail(self: Box<Self>) {
        Admission::fail(*self);
    }
}

impl Shedder for AdaptiveShedder {
    fn allow(&self) -> ShedResult<Box<dyn Promise>> {
        AdaptiveShedder::allow(self).map(|a| Box::new(a) as Box<dyn Promise>)
    }
}

/// A shedder that admits everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopShedder;

struct NopPromise;

impl Promise for NopPromise {
    fn pass(self: Box<Self>) {}

    fn fail(self: Box<Self>) {}
}

impl Shedder for NopShedder {
    fn allow(&self) -> ShedResult<Box<dyn Promise>> {
        Ok(Box::new(NopPromise))
    }
}

/// Build the shedder described by `file`: adaptive when enabled, a no-op
/// otherwise.
pub fn build_shedder(
    file: &ShedderFile,
    cpu: Arc<dyn CpuSampler>,
) -> Result<Arc<dyn Shedder>, ConfigError> {
    let options = file.to_options()?;
    if !file.enabled() {
        // Still reject bad settings so enabling later doesn't surprise.
        ShedderConfig::from_options(options)?;
        info!("load shedding disabled");
        return Ok(Arc::new(NopShedder));
    }

    let shedder = AdaptiveShedder::new(options, cpu)?;
    info!(
        window = ?shedder.config().window,
        buckets = shedder.config().buckets,
        cpu_threshold = shedder.config().cpu_threshold,
        "load shedding enabled"
    );
    Ok(Arc::new(shedder))
}
