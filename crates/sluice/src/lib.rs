//! # Sluice
//!
//! Fixed-cadence, allocation-free request pipeline for real-time simulations.
//!
//! Producers submit small state mutations (damage, position sync). Each one
//! rides a pooled payload through a ring buffer; once per tick the batch
//! processor drains the queue, applies everything to the entity registry and
//! emits a single aggregated event.
//!
//! ## Design Principles
//!
//! 1. **No allocation per request** - Payloads are pooled and reset in place
//! 2. **Never block the producer** - A full queue drops its oldest request
//! 3. **One event per tick** - Subscribers pay O(1) dispatch per tick
//! 4. **Single writer** - Only the batch processor mutates entity state
//!
//! ## Thread Safety
//!
//! Everything runs on the simulation thread. Per-tick summaries can be
//! consumed elsewhere through a bounded channel.
//!
//! ## Example
//!
//! ```rust,ignore
//! use sluice::{Simulation, SimulationConfig, Vec2};
//!
//! let mut sim = Simulation::new(SimulationConfig::load("sluice.toml")?)?;
//! let (player, _) = sim.spawn_named("player", Vec2::ZERO, 100.0).unwrap();
//! let (enemy, _) = sim.spawn(Vec2::new(5.0, 0.0), 40.0).unwrap();
//!
//! sim.pipeline_mut().apply_damage(player, enemy, 12.0, &[]);
//! let frame = sim.advance(frame_dt, Vec2::ZERO);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod error;
pub mod events;
pub mod payload;
pub mod pipeline;
pub mod processor;
pub mod simulation;
pub mod tick;
pub mod update;

pub use config::{PipelineConfig, SimulationConfig, UpdateConfig, DEFAULT_TICK_HZ};
pub use error::{ConfigError, ConfigResult, PayloadError};
pub use events::{
    AppliedKind, AppliedRecord, BatchApplied, BatchListener, BatchSummary, EventHub, ListenerId,
};
pub use payload::{DamageTag, Payload, PayloadKind, RequestView};
pub use pipeline::{Admission, EventPipeline, PipelineStats};
pub use processor::{BatchProcessor, ProcessorStats};
pub use simulation::{FrameReport, Simulation, TickReport};
pub use tick::{TickClock, TickStats};
pub use update::{SlotUpdater, UpdateStats};

pub use sluice_core::{EntityId, ExhaustionPolicy, SlotIndex, Vec2};
