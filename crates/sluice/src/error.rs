//! # Pipeline Error Types
//!
//! Only configuration errors are fatal, and only at initialization.
//! Everything that can go wrong per request is counted and logged instead.

use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Queue capacity of zero.
    #[error("queue capacity must be positive")]
    ZeroCapacity,

    /// Pool size of zero.
    #[error("pool size must be positive")]
    ZeroPoolSize,

    /// Pool too small to back a full queue.
    #[error("pool size {pool_size} is smaller than queue capacity {capacity}")]
    PoolSizeMismatch {
        /// Configured pool size.
        pool_size: usize,
        /// Queue capacity after power-of-two rounding.
        capacity: usize,
    },

    /// Tick rate of zero.
    #[error("tick rate must be positive, got {0} Hz")]
    NonPositiveTickRate(u32),

    /// Entity slot count of zero.
    #[error("entity slot count must be positive")]
    ZeroEntitySlots,

    /// Registry capacity of zero.
    #[error("registry capacity must be positive")]
    ZeroRegistryCapacity,

    /// Movement parameters that are negative or not finite.
    #[error("invalid update parameters: {0}")]
    InvalidUpdate(String),

    /// Configuration file could not be read.
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration file is not valid TOML for this schema.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A drained payload whose shape cannot be applied.
///
/// This indicates a broken producer or a broken reset, never a normal race.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PayloadError {
    /// Payload fields are inconsistent with its kind.
    #[error("malformed payload in pool slot {slot}: {reason}")]
    Malformed {
        /// Pool slot of the offending payload.
        slot: usize,
        /// What was wrong with it.
        reason: &'static str,
    },
}

/// Result type for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
