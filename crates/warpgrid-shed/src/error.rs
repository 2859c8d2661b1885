//! Error types for the load shedder.

use thiserror::Error;

/// Result type alias for admission attempts.
pub type ShedResult<T> = Result<T, ShedError>;

/// Admission failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShedError {
    #[error("service overloaded, request dropped")]
    Overloaded,
}

/// Errors raised while building or loading shedder configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid shedder config: {0}")]
    Invalid(String),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Outcome of running work through the shedder.
#[derive(Debug, Error)]
pub enum Guarded<E> {
    /// The shedder refused the work; it never ran.
    #[error(transparent)]
    Dropped(#[from] ShedError),

    /// The work ran and returned an error.
    #[error("{0}")]
    Inner(E),
}
