//! Shedder configuration.
//!
//! Callers supply a sparse [`ShedderOptions`]; [`ShedderConfig::from_options`]
//! lays it over the defaults once and validates the result. The same options
//! can be loaded from the `[shedder]` table of a TOML file:
//!
//! ```toml
//! [shedder]
//! enabled = true
//! window = "5s"
//! buckets = 50
//! cpu_threshold = 80
//! min_rt = "1s"
//! flying_beta = 0.9
//! cool_off_duration = "1s"
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::shedder::DropStats;

/// Callback invoked synchronously on every rejection.
pub type DropObserver = Arc<dyn Fn(&DropStats) + Send + Sync>;

/// Caller-supplied overrides. Unset fields take the defaults.
#[derive(Clone, Default)]
pub struct ShedderOptions {
    /// Total observation span.
    pub window: Option<Duration>,
    /// Number of buckets the window is split into.
    pub buckets: Option<usize>,
    /// CPU percentage at or above which the system counts as overloaded.
    pub cpu_threshold: Option<f64>,
    /// Response-time floor used before any latency has been observed.
    pub min_rt: Option<Duration>,
    /// EMA weight given to the previous in-flight average.
    pub flying_beta: Option<f64>,
    /// How long a rejection keeps the shedder in its rejecting posture.
    pub cool_off: Option<Duration>,
    pub on_drop: Option<DropObserver>,
}

impl fmt::Debug for ShedderOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShedderOptions")
            .field("window", &self.window)
            .field("buckets", &self.buckets)
            .field("cpu_threshold", &self.cpu_threshold)
            .field("min_rt", &self.min_rt)
            .field("flying_beta", &self.flying_beta)
            .field("cool_off", &self.cool_off)
            .field("on_drop", &self.on_drop.is_some())
            .finish()
    }
}

/// Fully populated, validated shedder configuration.
#[derive(Clone)]
pub struct ShedderConfig {
    pub window: Duration,
    pub buckets: usize,
    pub cpu_threshold: f64,
    pub min_rt: Duration,
    pub flying_beta: f64,
    pub cool_off: Duration,
    pub on_drop: Option<DropObserver>,
}

impl Default for ShedderConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_secs(5),
            buckets: 50,
            cpu_threshold: 80.0,
            min_rt: Duration::from_secs(1),
            flying_beta: 0.9,
            cool_off: Duration::from_secs(1),
            on_drop: None,
        }
    }
}

impl fmt::Debug for ShedderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ShedderConfig")
            .field("window", &self.window)
            .field("buckets", &self.buckets)
            .field("cpu_threshold", &self.cpu_threshold)
            .field("min_rt", &self.min_rt)
            .field("flying_beta", &self.flying_beta)
            .field("cool_off", &self.cool_off)
            .field("on_drop", &self.on_drop.is_some())
            .finish()
    }
}

impl ShedderConfig {
    /// Apply `opts` over the defaults and validate.
    pub fn from_options(opts: ShedderOptions) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            window: opts.window.unwrap_or(defaults.window),
            buckets: opts.buckets.unwrap_or(defaults.buckets),
            cpu_threshold: opts.cpu_threshold.unwrap_or(defaults.cpu_threshold),
            min_rt: opts.min_rt.unwrap_or(defaults.min_rt),
            flying_beta: opts.flying_beta.unwrap_or(defaults.flying_beta),
            cool_off: opts.cool_off.unwrap_or(defaults.cool_off),
            on_drop: opts.on_drop.or(defaults.on_drop),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window.is_zero() {
            return Err(ConfigError::Invalid("window must be positive".into()));
        }
        if self.buckets == 0 {
            return Err(ConfigError::Invalid("buckets must be positive".into()));
        }
        if u32::try_from(self.buckets).is_err() {
            return Err(ConfigError::Invalid(format!(
                "buckets too large: {}",
                self.buckets
            )));
        }
        if self.bucket_duration().is_zero() {
            return Err(ConfigError::Invalid(format!(
                "window {:?} is too short for {} buckets",
                self.window, self.buckets
            )));
        }
        if !(0.0..=1.0).contains(&self.flying_beta) {
            return Err(ConfigError::Invalid(format!(
                "flying_beta must be within [0, 1], got {}",
                self.flying_beta
            )));
        }
        if !(0.0..=100.0).contains(&self.cpu_threshold) {
            return Err(ConfigError::Invalid(format!(
                "cpu_threshold must be within [0, 100], got {}",
                self.cpu_threshold
            )));
        }
        Ok(())
    }

    /// Duration of a single bucket: `window / buckets`.
    pub fn bucket_duration(&self) -> Duration {
        self.window / self.buckets as u32
    }

    /// How many buckets make up one second.
    pub fn buckets_per_second(&self) -> f64 {
        1e9 / self.bucket_duration().as_nanos() as f64
    }
}

/// On-disk configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShedderFile {
    #[serde(default)]
    pub shedder: ShedderSection,
}

/// The `[shedder]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShedderSection {
    pub enabled: bool,
    pub window: Option<String>,
    pub buckets: Option<usize>,
    pub cpu_threshold: Option<f64>,
    pub min_rt: Option<String>,
    pub flying_beta: Option<f64>,
    pub cool_off_duration: Option<String>,
}

impl Default for ShedderSection {
    fn default() -> Self {
        Self {
            enabled: true,
            window: None,
            buckets: None,
            cpu_threshold: None,
            min_rt: None,
            flying_beta: None,
            cool_off_duration: None,
        }
    }
}

impl std::str::FromStr for ShedderFile {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

impl ShedderFile {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    pub fn enabled(&self) -> bool {
        self.shedder.enabled
    }

    /// Convert the file's settings into options. Duration strings are
    /// checked here; numeric ranges are checked by
    /// [`ShedderConfig::from_options`].
    pub fn to_options(&self) -> Result<ShedderOptions, ConfigError> {
        let s = &self.shedder;
        Ok(ShedderOptions {
            window: duration_field("window", s.window.as_deref())?,
            buckets: s.buckets,
            cpu_threshold: s.cpu_threshold,
            min_rt: duration_field("min_rt", s.min_rt.as_deref())?,
            flying_beta: s.flying_beta,
            cool_off: duration_field("cool_off_duration", s.cool_off_duration.as_deref())?,
            on_drop: None,
        })
    }
}

fn duration_field(name: &str, value: Option<&str>) -> Result<Option<Duration>, ConfigError> {
    match value {
        None => Ok(None),
        Some(raw) => parse_duration(raw)
            .map(Some)
            .ok_or_else(|| ConfigError::Invalid(format!("{name}: bad duration {raw:?}"))),
    }
}

/// Parse a duration string like "5s", "100ms", "1m". A bare number is
/// taken as milliseconds.
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    if let Some(ms) = s.strip_suffix("ms") {
        ms.trim().parse::<u64>().ok().map(Duration::from_millis)
    } else if let Some(secs) = s.strip_suffix('s') {
        secs.trim().parse::<u64>().ok().map(Duration::from_secs)
    } else if let Some(mins) = s.strip_suffix('m') {
        mins.trim().parse::<u64>().ok().map(|m| Duration::from_secs(m * 60))
    } else {
        s.parse::<u64>().ok().map(Duration::from_millis)
    }
}
