//! # Simulation
//!
//! Explicit top-level context owning the pipeline, the entity slots and the
//! update loop. Components receive what they need by reference; there is no
//! global state.
//!
//! ## Frame flow
//!
//! ```text
//!   advance(frame_dt)
//!     └─ for each due tick:
//!          SlotUpdater::update   (slots -> sync requests)
//!          EventPipeline::tick   (queue  -> registry -> one event)
//! ```

use std::time::Duration;

use sluice_core::{EntityId, EntityRegistry, EntitySlotPool, SlotIndex, Vec2};
use tracing::{info, warn};

use crate::config::SimulationConfig;
use crate::error::ConfigResult;
use crate::pipeline::EventPipeline;
use crate::update::{SlotUpdater, UpdateStats};

/// What one tick did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Slot update pass.
    pub update: UpdateStats,
    /// Whether an aggregated event was emitted.
    pub emitted: bool,
}

/// What one frame did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameReport {
    /// Ticks run this frame.
    pub ticks: u32,
    /// Aggregated events emitted this frame.
    pub events: u32,
    /// Sum of the update passes this frame.
    pub slots_updated: u64,
}

/// The simulation context.
pub struct Simulation {
    pipeline: EventPipeline,
    slots: EntitySlotPool,
    updater: SlotUpdater,
    entity_slots: usize,
    registry_capacity: usize,
}

impl Simulation {
    /// Allocates everything up front.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::ConfigError`] if `config` is invalid.
    pub fn new(config: SimulationConfig) -> ConfigResult<Self> {
        config.validate()?;

        let registry = EntityRegistry::new(config.registry_capacity);
        let pipeline = EventPipeline::new(config.pipeline, registry)?;

        info!(
            entity_slots = config.entity_slots,
            registry_capacity = config.registry_capacity,
            "simulation initialized"
        );

        Ok(Self {
            pipeline,
            slots: EntitySlotPool::new(config.entity_slots),
            updater: SlotUpdater::new(config.update),
            entity_slots: config.entity_slots,
            registry_capacity: config.registry_capacity,
        })
    }

    /// The request pipeline.
    #[must_use]
    pub const fn pipeline(&self) -> &EventPipeline {
        &self.pipeline
    }

    /// The request pipeline, for producers and subscribers.
    pub fn pipeline_mut(&mut self) -> &mut EventPipeline {
        &mut self.pipeline
    }

    /// The entity slots.
    #[must_use]
    pub const fn slots(&self) -> &EntitySlotPool {
        &self.slots
    }

    /// The update loop, for its totals.
    #[must_use]
    pub const fn updater(&self) -> &SlotUpdater {
        &self.updater
    }

    /// Spawns an entity in the registry and binds it to a free slot.
    ///
    /// # Returns
    ///
    /// `None` if either the registry or the slot array is full.
    pub fn spawn(&mut self, position: Vec2, max_hp: f32) -> Option<(EntityId, SlotIndex)> {
        let id = self.pipeline.registry_mut().spawn(position, max_hp);
        self.bind(id, position, max_hp)
    }

    /// Spawns an entity addressable by `name`.
    ///
    /// # Returns
    ///
    /// `None` if the name is taken or either store is full.
    pub fn spawn_named(
        &mut self,
        name: &str,
        position: Vec2,
        max_hp: f32,
    ) -> Option<(EntityId, SlotIndex)> {
        let id = self
            .pipeline
            .registry_mut()
            .spawn_named(name, position, max_hp);
        self.bind(id, position, max_hp)
    }

    fn bind(
        &mut self,
        id: EntityId,
        position: Vec2,
        max_hp: f32,
    ) -> Option<(EntityId, SlotIndex)> {
        if id.is_null() {
            return None;
        }
        match self.slots.spawn(id, position, max_hp) {
            Some(slot) => Some((id, slot)),
            None => {
                self.pipeline.registry_mut().despawn(id);
                None
            }
        }
    }

    /// Removes an entity from the registry. Its slot is freed on the next
    /// update pass.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        self.pipeline.registry_mut().despawn(id)
    }

    /// Runs one tick unconditionally: the update pass with the fixed tick
    /// duration, then the batch drain.
    pub fn step(&mut self, target: Vec2) -> TickReport {
        let dt = self.pipeline.tick_seconds();
        let update = self
            .updater
            .update(&mut self.slots, &mut self.pipeline, target, dt);
        let emitted = self.pipeline.tick().is_some();
        TickReport { update, emitted }
    }

    /// Feeds one frame's elapsed time and runs every tick now due.
    pub fn advance(&mut self, frame_dt: Duration, target: Vec2) -> FrameReport {
        let ticks = self.pipeline.ticks_due(frame_dt);
        let mut report = FrameReport {
            ticks,
            ..FrameReport::default()
        };

        for _ in 0..ticks {
            let tick = self.step(target);
            report.events += u32::from(tick.emitted);
            report.slots_updated += tick.update.live_updates;
        }

        report
    }

    /// Applies a reloaded configuration between ticks.
    ///
    /// Slot and registry sizes are fixed for the process lifetime; changes to
    /// them are ignored with a warning.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::ConfigError`] if `config` is invalid. Nothing
    /// changes in that case.
    pub fn reconfigure(&mut self, config: SimulationConfig) -> ConfigResult<()> {
        config.validate()?;

        if config.entity_slots != self.entity_slots
            || config.registry_capacity != self.registry_capacity
        {
            warn!(
                entity_slots = config.entity_slots,
                registry_capacity = config.registry_capacity,
                "slot and registry sizes cannot change at runtime, keeping current sizes"
            );
        }

        self.pipeline.reconfigure(config.pipeline)?;
        self.updater.set_config(config.update);
        Ok(())
    }
}
