//! # Slot Update Loop
//!
//! One pass over the fixed slot array per tick:
//!
//! ```text
//!   for i in 0..N:
//!       alive bit clear?      -> skip         (one bit test)
//!       registry.get(entity)  -> hp           (direct index + generation check)
//!       dead in registry?     -> reap slot
//!       move toward target    -> sync_entity  (pooled, queued)
//! ```
//!
//! No alive list is rebuilt and no slot is searched for. Positions flow to
//! the registry through the same queue as everything else.

use sluice_core::{EntitySlotPool, Vec2};

use crate::config::UpdateConfig;
use crate::pipeline::EventPipeline;

/// Work done by the update loop.
///
/// Per-tick values are returned by [`SlotUpdater::update`]; totals are kept
/// in [`SlotUpdater::totals`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct UpdateStats {
    /// Slots in the array walked by the loop.
    pub slots_scanned: u64,
    /// Per-entity updates performed (live slots visited).
    pub live_updates: u64,
    /// Registry lookups, each a direct index.
    pub registry_lookups: u64,
    /// Position syncs submitted to the pipeline.
    pub syncs_emitted: u64,
    /// Entities already within the arrive radius.
    pub arrived: u64,
    /// Slots freed because their entity died.
    pub reaped: u64,
}

impl UpdateStats {
    fn accumulate(&mut self, other: &Self) {
        self.slots_scanned += other.slots_scanned;
        self.live_updates += other.live_updates;
        self.registry_lookups += other.registry_lookups;
        self.syncs_emitted += other.syncs_emitted;
        self.arrived += other.arrived;
        self.reaped += other.reaped;
    }
}

/// Moves every live slot toward a target and mirrors registry health.
pub struct SlotUpdater {
    config: UpdateConfig,
    totals: UpdateStats,
}

impl SlotUpdater {
    /// Creates an updater.
    #[must_use]
    pub fn new(config: UpdateConfig) -> Self {
        Self {
            config,
            totals: UpdateStats::default(),
        }
    }

    /// Active movement settings.
    #[must_use]
    pub const fn config(&self) -> &UpdateConfig {
        &self.config
    }

    /// Replaces the movement settings. Takes effect on the next pass.
    pub fn set_config(&mut self, config: UpdateConfig) {
        self.config = config;
    }

    /// Totals over every pass since creation or [`Self::reset_totals`].
    #[must_use]
    pub const fn totals(&self) -> &UpdateStats {
        &self.totals
    }

    /// Zeroes the totals.
    pub fn reset_totals(&mut self) {
        self.totals = UpdateStats::default();
    }

    /// Runs one pass over `slots`, moving each live entity up to
    /// `move_speed * dt` toward `target`.
    pub fn update(
        &mut self,
        slots: &mut EntitySlotPool,
        pipeline: &mut EventPipeline,
        target: Vec2,
        dt: f32,
    ) -> UpdateStats {
        let step = self.config.move_speed * dt;
        let step_sq = step * step;
        let arrive_sq = self.config.arrive_radius * self.config.arrive_radius;

        let mut pass = UpdateStats {
            slots_scanned: slots.capacity() as u64,
            ..UpdateStats::default()
        };

        let visited = slots.retain_alive_mut(|slot| {
            pass.registry_lookups += 1;
            let Some(record) = pipeline.registry().get(slot.entity) else {
                pass.reaped += 1;
                return false;
            };
            slot.hp = record.hp;
            slot.max_hp = record.max_hp;

            let offset = target - slot.position;
            let dist_sq = offset.length_squared();
            if dist_sq <= arrive_sq {
                pass.arrived += 1;
                return true;
            }
            if step <= 0.0 {
                return true;
            }

            slot.position = if step_sq >= dist_sq {
                target
            } else {
                // The only square root: normalizing the direction
                slot.position + offset * (step / dist_sq.sqrt())
            };

            let _ = pipeline.sync_entity(slot.entity, slot.position);
            pass.syncs_emitted += 1;
            true
        });
        pass.live_updates = visited as u64;

        self.totals.accumulate(&pass);
        pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use sluice_core::EntityRegistry;

    fn world(alive: usize, slots: usize) -> (EventPipeline, EntitySlotPool) {
        let mut registry = EntityRegistry::new(slots);
        let mut pool = EntitySlotPool::new(slots);
        for i in 0..alive {
            #[allow(clippy::cast_precision_loss)]
            let position = Vec2::new(i as f32, 10.0);
            let id = registry.spawn(position, 50.0);
            pool.spawn(id, position, 50.0).unwrap();
        }
        let config = PipelineConfig {
            capacity: 1024,
            pool_size: 1024,
            ..PipelineConfig::default()
        };
        (EventPipeline::new(config, registry).unwrap(), pool)
    }

    #[test]
    fn test_visits_only_live_slots() {
        let (mut pipeline, mut slots) = world(4, 16);
        let mut updater = SlotUpdater::new(UpdateConfig::default());

        let stats = updater.update(&mut slots, &mut pipeline, Vec2::new(0.0, -100.0), 0.1);
        assert_eq!(stats.slots_scanned, 16);
        assert_eq!(stats.live_updates, 4);
        assert_eq!(stats.registry_lookups, 4);
        assert_eq!(stats.syncs_emitted, 4);
        assert_eq!(pipeline.get_stats().queued, 4);
    }

    #[test]
    fn test_step_is_exact_and_synced() {
        let (mut pipeline, mut slots) = world(1, 4);
        let mut updater = SlotUpdater::new(UpdateConfig {
            move_speed: 2.0,
            arrive_radius: 0.0,
        });

        // From (0, 10) toward (0, 0): one second at 2 u/s
        updater.update(&mut slots, &mut pipeline, Vec2::ZERO, 1.0);
        let slot = slots.iter_alive().next().unwrap();
        assert!((slot.position.y - 8.0).abs() < 1e-5);

        pipeline.tick();
        let entity = pipeline.registry().get(slot.entity).unwrap();
        assert_eq!(entity.position, slot.position);
    }

    #[test]
    fn test_snaps_when_step_overshoots() {
        let (mut pipeline, mut slots) = world(1, 4);
        let mut updater = SlotUpdater::new(UpdateConfig {
            move_speed: 100.0,
            arrive_radius: 0.0,
        });

        updater.update(&mut slots, &mut pipeline, Vec2::ZERO, 1.0);
        assert_eq!(slots.iter_alive().next().unwrap().position, Vec2::ZERO);

        let stats = updater.update(&mut slots, &mut pipeline, Vec2::ZERO, 1.0);
        assert_eq!(stats.arrived, 1);
        assert_eq!(stats.syncs_emitted, 0);
    }

    #[test]
    fn test_reaps_dead_entities() {
        let (mut pipeline, mut slots) = world(3, 8);
        let victim = slots.iter_alive().nth(1).unwrap().entity;
        pipeline.apply_damage(victim, victim, 500.0, &[]);
        pipeline.tick();

        let mut updater = SlotUpdater::new(UpdateConfig::default());
        let stats = updater.update(&mut slots, &mut pipeline, Vec2::ZERO, 0.1);
        assert_eq!(stats.reaped, 1);
        assert_eq!(slots.alive_count(), 2);
        assert_eq!(slots.alive().popcount(), 2);
        assert_eq!(updater.totals().reaped, 1);
    }

    #[test]
    fn test_mirrors_registry_health() {
        let (mut pipeline, mut slots) = world(1, 2);
        let entity = slots.iter_alive().next().unwrap().entity;
        pipeline.apply_damage(entity, entity, 20.0, &[]);
        pipeline.tick();

        let mut updater = SlotUpdater::new(UpdateConfig::default());
        updater.update(&mut slots, &mut pipeline, Vec2::ZERO, 0.0);
        assert!((slots.iter_alive().next().unwrap().hp - 30.0).abs() < f32::EPSILON);
    }
}
