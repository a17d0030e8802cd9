//! # Batch Processor
//!
//! Drains the request queue once per tick and applies every request to the
//! entity registry. It is the only code that writes entity state.
//!
//! ## Per-tick flow
//!
//! ```text
//!   ring.pop() ──> pool.get(handle) ──> view() ──> apply() ──> results
//!        │                                                        │
//!        └──────────────── pool.release(handle) <─────────────────┘
//!
//!   finish_tick(): results ──> one BatchApplied ──> EventHub
//! ```
//!
//! Every drained handle is released, whatever happened to its request.

use sluice_core::{EntityId, EntityRegistry, ObjectPool, PoolHandle, RingBuffer};
use tracing::{error, trace};

use crate::error::PayloadError;
use crate::events::{AppliedKind, AppliedRecord, BatchApplied, BatchSummary, EventHub};
use crate::payload::{Payload, RequestView};

/// Cumulative processor counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProcessorStats {
    /// Requests handled, whatever the outcome.
    pub processed: u64,
    /// Requests applied to a live entity.
    pub applied: u64,
    /// Requests skipped because the target was no longer alive.
    pub invalid_references: u64,
    /// Requests dropped as malformed.
    pub malformed: u64,
    /// Entities killed (and despawned) by damage.
    pub kills: u64,
}

/// Fixed-cadence dispatcher and sole writer of the [`EntityRegistry`].
pub struct BatchProcessor {
    registry: EntityRegistry,
    /// Records applied since the last emitted event. Reserved up front.
    results: Vec<AppliedRecord>,
    hub: EventHub,
    tick: u64,
    pending_invalid: u32,
    pending_malformed: u32,
    stats: ProcessorStats,
}

impl BatchProcessor {
    /// Creates a processor owning `registry`, with room for `batch_capacity`
    /// records per tick.
    #[must_use]
    pub fn new(registry: EntityRegistry, batch_capacity: usize) -> Self {
        Self {
            registry,
            results: Vec::with_capacity(batch_capacity),
            hub: EventHub::new(),
            tick: 0,
            pending_invalid: 0,
            pending_malformed: 0,
            stats: ProcessorStats::default(),
        }
    }

    /// Read access to entity state. May be up to one tick stale.
    #[inline]
    #[must_use]
    pub const fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    /// Write access for spawning and despawning between ticks.
    #[inline]
    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    /// The event hub, for subscribing.
    #[inline]
    pub fn hub_mut(&mut self) -> &mut EventHub {
        &mut self.hub
    }

    /// The event hub, for counters.
    #[inline]
    #[must_use]
    pub const fn hub(&self) -> &EventHub {
        &self.hub
    }

    /// Number of ticks finished.
    #[inline]
    #[must_use]
    pub const fn tick(&self) -> u64 {
        self.tick
    }

    /// Records waiting for the next event.
    #[inline]
    #[must_use]
    pub fn pending_records(&self) -> usize {
        self.results.len()
    }

    /// Cumulative counters.
    #[inline]
    #[must_use]
    pub const fn stats(&self) -> &ProcessorStats {
        &self.stats
    }

    /// Grows the result buffer so `batch_capacity` records fit without
    /// reallocating mid-tick.
    pub fn reserve(&mut self, batch_capacity: usize) {
        self.results
            .reserve(batch_capacity.saturating_sub(self.results.len()));
    }

    /// Pops every queued handle in FIFO order, applies its request and
    /// releases it back to the pool. Returns the number of handles drained.
    ///
    /// Bounded by the ring's capacity.
    pub fn drain(
        &mut self,
        ring: &mut RingBuffer<PoolHandle>,
        pool: &mut ObjectPool<Payload>,
    ) -> usize {
        let mut drained = 0;

        while let Some(handle) = ring.pop() {
            drained += 1;
            self.stats.processed += 1;

            match pool.get(handle).map(|payload| payload.view(handle)) {
                Some(Ok(request)) => self.apply(request),
                Some(Err(err)) => self.reject_malformed(&err),
                None => {
                    error!(slot = handle.index(), "queued handle is not an active payload");
                    self.pending_malformed += 1;
                    self.stats.malformed += 1;
                    continue;
                }
            }

            if let Err(err) = pool.release(handle) {
                error!(%err, "failed to release drained payload");
            }
        }

        drained
    }

    /// Applies one request immediately, bypassing the queue.
    ///
    /// Results are held until the next [`Self::finish_tick`], so subscribers
    /// see one event per tick in both modes.
    pub fn apply_direct(&mut self, request: RequestView<'_>) {
        self.stats.processed += 1;

        if let Some(reason) = request.problem() {
            error!(reason, "dropping malformed direct request");
            self.pending_malformed += 1;
            self.stats.malformed += 1;
            return;
        }

        self.apply(request);
    }

    /// Emits the tick's aggregated event, if anything happened, and starts a
    /// new batch.
    pub fn finish_tick(&mut self) -> Option<BatchSummary> {
        self.tick += 1;

        if self.results.is_empty() && self.pending_invalid == 0 && self.pending_malformed == 0 {
            return None;
        }

        let event = BatchApplied {
            tick: self.tick,
            records: &self.results,
            skipped_invalid: self.pending_invalid,
            malformed: self.pending_malformed,
        };
        let summary = event.summary();
        self.hub.emit(&event);

        self.results.clear();
        self.pending_invalid = 0;
        self.pending_malformed = 0;

        Some(summary)
    }

    /// Drops buffered results and zeroes every counter.
    ///
    /// Entity state and subscribers are kept.
    pub fn reset(&mut self) {
        self.results.clear();
        self.pending_invalid = 0;
        self.pending_malformed = 0;
        self.tick = 0;
        self.stats = ProcessorStats::default();
        self.hub.reset_counters();
    }

    fn reject_malformed(&mut self, err: &PayloadError) {
        error!(%err, "dropping malformed payload");
        self.pending_malformed += 1;
        self.stats.malformed += 1;
    }

    fn apply(&mut self, request: RequestView<'_>) {
        let target = request.target();
        let Some(entity) = self.registry.get_mut(target) else {
            // Deletion races are expected
            trace!(%target, "skipping request for dead entity");
            self.pending_invalid += 1;
            self.stats.invalid_references += 1;
            return;
        };

        let record = match request {
            RequestView::Damage {
                source,
                amount,
                tags,
                ..
            } => {
                let before = entity.hp;
                entity.hp = (entity.hp - amount).max(0.0).min(entity.max_hp);
                AppliedRecord {
                    kind: AppliedKind::Damage,
                    source,
                    target,
                    amount,
                    tag_mask: tags.iter().fold(0, |mask, tag| mask | tag.bit()),
                    position: entity.position,
                    hp_after: entity.hp,
                    killed: before > 0.0 && entity.hp <= 0.0,
                }
            }
            RequestView::Sync { position, .. } => {
                entity.position = position;
                AppliedRecord {
                    kind: AppliedKind::Sync,
                    source: EntityId::NULL,
                    target,
                    amount: 0.0,
                    tag_mask: 0,
                    position,
                    hp_after: entity.hp,
                    killed: false,
                }
            }
        };

        if record.killed {
            self.registry.despawn(target);
            self.stats.kills += 1;
        }
        self.stats.applied += 1;
        self.results.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payload::DamageTag;
    use sluice_core::{ExhaustionPolicy, Vec2};

    fn setup() -> (BatchProcessor, RingBuffer<PoolHandle>, ObjectPool<Payload>, EntityId) {
        let mut registry = EntityRegistry::new(8);
        let id = registry.spawn(Vec2::ZERO, 100.0);
        let processor = BatchProcessor::new(registry, 4);
        let ring = RingBuffer::new(4);
        let pool = ObjectPool::with_factory(4, ExhaustionPolicy::Reject, || {
            Payload::with_tag_capacity(4)
        });
        (processor, ring, pool, id)
    }

    fn enqueue_damage(
        ring: &mut RingBuffer<PoolHandle>,
        pool: &mut ObjectPool<Payload>,
        target: EntityId,
        amount: f32,
    ) {
        let handle = pool.acquire().handle().unwrap();
        pool.get_mut(handle)
            .unwrap()
            .fill_damage(EntityId::NULL, target, amount, &[DamageTag(2)]);
        assert!(ring.push(handle));
    }

    #[test]
    fn test_drain_applies_and_releases() {
        let (mut processor, mut ring, mut pool, id) = setup();
        enqueue_damage(&mut ring, &mut pool, id, 10.0);
        enqueue_damage(&mut ring, &mut pool, id, 5.0);

        assert_eq!(processor.drain(&mut ring, &mut pool), 2);
        assert_eq!(pool.active_count(), 0);
        assert!(ring.is_empty());
        assert!((processor.registry().get(id).unwrap().hp - 85.0).abs() < f32::EPSILON);

        let summary = processor.finish_tick().unwrap();
        assert_eq!(summary.applied, 2);
        assert_eq!(processor.pending_records(), 0);
    }

    #[test]
    fn test_empty_tick_emits_nothing() {
        let (mut processor, _, _, _) = setup();
        assert!(processor.finish_tick().is_none());
        assert_eq!(processor.hub().emitted(), 0);
        assert_eq!(processor.tick(), 1);
    }

    #[test]
    fn test_kill_despawns_and_later_requests_skip() {
        let (mut processor, mut ring, mut pool, id) = setup();
        enqueue_damage(&mut ring, &mut pool, id, 150.0);
        enqueue_damage(&mut ring, &mut pool, id, 1.0);

        processor.drain(&mut ring, &mut pool);
        let summary = processor.finish_tick().unwrap();

        assert_eq!(summary.kills, 1);
        assert_eq!(summary.applied, 1);
        assert_eq!(summary.skipped_invalid, 1);
        assert!(!processor.registry().is_alive(id));
        assert_eq!(processor.stats().kills, 1);
    }

    #[test]
    fn test_malformed_does_not_abort_batch() {
        let (mut processor, mut ring, mut pool, id) = setup();
        enqueue_damage(&mut ring, &mut pool, id, f32::NAN);
        enqueue_damage(&mut ring, &mut pool, id, 10.0);

        assert_eq!(processor.drain(&mut ring, &mut pool), 2);
        assert_eq!(processor.stats().malformed, 1);
        assert_eq!(processor.stats().applied, 1);
        assert_eq!(pool.active_count(), 0);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_heal_clamps_to_max() {
        let (mut processor, _, _, id) = setup();
        processor.apply_direct(RequestView::Damage {
            source: EntityId::NULL,
            target: id,
            amount: -50.0,
            tags: &[],
        });
        assert!((processor.registry().get(id).unwrap().hp - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_sync_overwrites_position() {
        let (mut processor, _, _, id) = setup();
        processor.apply_direct(RequestView::Sync {
            entity: id,
            position: Vec2::new(4.0, -2.0),
        });
        assert_eq!(processor.registry().get(id).unwrap().position, Vec2::new(4.0, -2.0));

        let summary = processor.finish_tick().unwrap();
        assert_eq!(summary.syncs, 1);
    }

    #[test]
    fn test_reset_keeps_entities() {
        let (mut processor, mut ring, mut pool, id) = setup();
        enqueue_damage(&mut ring, &mut pool, id, 10.0);
        processor.drain(&mut ring, &mut pool);

        processor.reset();
        assert_eq!(*processor.stats(), ProcessorStats::default());
        assert_eq!(processor.pending_records(), 0);
        assert!(processor.finish_tick().is_none());
        assert!(processor.registry().is_alive(id));
    }
}
