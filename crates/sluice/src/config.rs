//! # Configuration
//!
//! Plain structs loaded once at startup from TOML, and optionally reloaded
//! between ticks.
//!
//! ```toml
//! entity_slots = 1000
//!
//! [pipeline]
//! capacity = 1024
//! pool_size = 1024
//! tick_hz = 30
//! exhaustion = "reject"   # or "allocate"
//!
//! [update]
//! move_speed = 3.0
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use sluice_core::ExhaustionPolicy;

use crate::error::{ConfigError, ConfigResult};

/// Default batch cadence.
pub const DEFAULT_TICK_HZ: u32 = 30;

/// Queue, pool and cadence settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Requested queue capacity. Rounded up to a power of two.
    pub capacity: usize,
    /// Number of pre-allocated payloads.
    pub pool_size: usize,
    /// Batch ticks per second.
    pub tick_hz: u32,
    /// What to do when every payload is in flight.
    pub exhaustion: ExhaustionPolicy,
    /// `true` routes requests through the queue; `false` applies them directly.
    pub queued: bool,
    /// Tag capacity reserved in every payload.
    pub max_tags: usize,
    /// Most ticks run for one long frame; the rest of the backlog is dropped.
    pub max_catch_up_ticks: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            capacity: 1024,
            pool_size: 1024,
            tick_hz: DEFAULT_TICK_HZ,
            exhaustion: ExhaustionPolicy::Reject,
            queued: true,
            max_tags: 8,
            max_catch_up_ticks: 4,
        }
    }
}

impl PipelineConfig {
    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.pool_size == 0 {
            return Err(ConfigError::ZeroPoolSize);
        }
        // Every queued request holds a payload, so the pool must cover the rounded ring
        let ring_capacity = self.ring_capacity();
        if self.pool_size < ring_capacity {
            return Err(ConfigError::PoolSizeMismatch {
                pool_size: self.pool_size,
                capacity: ring_capacity,
            });
        }
        if self.tick_hz == 0 {
            return Err(ConfigError::NonPositiveTickRate(self.tick_hz));
        }
        Ok(())
    }

    /// Queue capacity after power-of-two rounding.
    #[must_use]
    pub fn ring_capacity(&self) -> usize {
        self.capacity.next_power_of_two()
    }
}

/// Movement settings for the per-tick slot update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Units per second toward the target.
    pub move_speed: f32,
    /// Distance at which an entity stops moving.
    pub arrive_radius: f32,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            move_speed: 3.0,
            arrive_radius: 0.5,
        }
    }
}

impl UpdateConfig {
    /// Checks every field.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUpdate`] for negative or non-finite values.
    pub fn validate(&self) -> ConfigResult<()> {
        if !self.move_speed.is_finite() || self.move_speed < 0.0 {
            return Err(ConfigError::InvalidUpdate(format!(
                "move_speed {}",
                self.move_speed
            )));
        }
        if !self.arrive_radius.is_finite() || self.arrive_radius < 0.0 {
            return Err(ConfigError::InvalidUpdate(format!(
                "arrive_radius {}",
                self.arrive_radius
            )));
        }
        Ok(())
    }
}

/// Everything needed to build a [`crate::Simulation`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Queue and dispatcher settings.
    pub pipeline: PipelineConfig,
    /// Slot update settings.
    pub update: UpdateConfig,
    /// Number of entity slots, fixed for the process lifetime.
    pub entity_slots: usize,
    /// Number of registry records, fixed for the process lifetime.
    pub registry_capacity: usize,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            update: UpdateConfig::default(),
            entity_slots: 1024,
            registry_capacity: 2048,
        }
    }
}

impl SimulationConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] or any validation error.
    pub fn from_toml_str(source: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`], [`ConfigError::Parse`] or any validation error.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Checks every section.
    ///
    /// # Errors
    ///
    /// Returns the first [`ConfigError`] found.
    pub fn validate(&self) -> ConfigResult<()> {
        self.pipeline.validate()?;
        self.update.validate()?;
        if self.entity_slots == 0 {
            return Err(ConfigError::ZeroEntitySlots);
        }
        if self.registry_capacity == 0 {
            return Err(ConfigError::ZeroRegistryCapacity);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SimulationConfig::default().validate().is_ok());
        assert_eq!(PipelineConfig::default().tick_hz, 30);
    }

    #[test]
    fn test_ring_capacity_rounding() {
        let config = PipelineConfig {
            capacity: 1000,
            pool_size: 1024,
            ..PipelineConfig::default()
        };
        assert_eq!(config.ring_capacity(), 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_pool_must_cover_rounded_capacity() {
        let config = PipelineConfig {
            capacity: 1000,
            pool_size: 1000,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::PoolSizeMismatch { pool_size: 1000, capacity: 1024 })
        ));
    }

    #[test]
    fn test_rejects_bad_pipeline() {
        let zero = PipelineConfig {
            capacity: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(zero.validate(), Err(ConfigError::ZeroCapacity)));

        let no_pool = PipelineConfig {
            pool_size: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(no_pool.validate(), Err(ConfigError::ZeroPoolSize)));

        let small_pool = PipelineConfig {
            capacity: 64,
            pool_size: 32,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            small_pool.validate(),
            Err(ConfigError::PoolSizeMismatch { pool_size: 32, capacity: 64 })
        ));

        let stalled = PipelineConfig {
            tick_hz: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            stalled.validate(),
            Err(ConfigError::NonPositiveTickRate(0))
        ));
    }

    #[test]
    fn test_rejects_bad_update() {
        let config = UpdateConfig {
            move_speed: f32::NAN,
            ..UpdateConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::InvalidUpdate(_))));
    }

    #[test]
    fn test_from_toml() {
        let config = SimulationConfig::from_toml_str(
            r#"
            entity_slots = 1000

            [pipeline]
            capacity = 256
            pool_size = 512
            tick_hz = 20
            exhaustion = "allocate"

            [update]
            move_speed = 5.0
            "#,
        )
        .unwrap();

        assert_eq!(config.entity_slots, 1000);
        assert_eq!(config.pipeline.capacity, 256);
        assert_eq!(config.pipeline.exhaustion, ExhaustionPolicy::Allocate);
        assert!(config.pipeline.queued);
        assert!((config.update.move_speed - 5.0).abs() < f32::EPSILON);
        assert!((config.update.arrive_radius - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_from_toml_validates() {
        let result = SimulationConfig::from_toml_str("[pipeline]\ntick_hz = 0\n");
        assert!(matches!(result, Err(ConfigError::NonPositiveTickRate(0))));

        let result = SimulationConfig::from_toml_str("[pipeline]\ncapacity = \"big\"\n");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
