//! # Event Pipeline
//!
//! The public face of the queue: producers call [`EventPipeline::apply_damage`]
//! and [`EventPipeline::sync_entity`], the frame loop calls
//! [`EventPipeline::tick`] at the configured cadence.
//!
//! ## Admission
//!
//! ```text
//!   request ──> ring full? ──yes──> ring.pop() oldest ──> pool.release()
//!                   │ no                                        │
//!                   v                                           │
//!               pool.acquire() <────────────────────────────────┘
//!                   ├─ Pooled ───────────┐
//!                   ├─ Allocated (warn) ─┴─> fill ──> ring.push()
//!                   └─ Exhausted ──> Rejected
//! ```
//!
//! The oldest request gives up its payload before the new one asks for one.
//! Validation keeps `pool_size` at or above the rounded ring capacity, so a
//! full queue always evicts and never rejects.
//!
//! In direct mode the pool and ring are bypassed and each request is applied
//! immediately; its results still go out with the next tick's event.
//!
//! ## Invariants
//!
//! - Every active pool handle is in the ring exactly once
//! - `ring.count() == pool.active_count()` between calls
//! - Nothing on the queued path allocates unless the pool policy is `Allocate`

use std::time::Duration;

use crossbeam_channel::Receiver;
use sluice_core::{Acquired, EntityId, EntityRegistry, ObjectPool, PoolHandle, RingBuffer, Vec2};
use tracing::{debug, error, info, warn};

use crate::config::PipelineConfig;
use crate::error::ConfigResult;
use crate::events::{BatchApplied, BatchSummary, ListenerId};
use crate::payload::{DamageTag, Payload, RequestView};
use crate::processor::BatchProcessor;
use crate::tick::TickClock;

/// What happened to a submitted request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Admission {
    /// Queued for the next tick.
    Queued,
    /// Queued; the oldest pending request was dropped to make room.
    QueuedEvictedOldest,
    /// Dropped: no payload was available under the reject policy.
    Rejected,
    /// Applied immediately (direct mode).
    Applied,
}

/// Read-only pipeline counters.
///
/// Counters are cumulative since construction or the last
/// [`EventPipeline::reset`], and survive [`EventPipeline::reconfigure`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Requests admitted to the queue.
    pub enqueued: u64,
    /// Requests handled by the processor, queued or direct.
    pub processed: u64,
    /// Pending requests dropped by drop-oldest overflow.
    pub dropped_overflow: u64,
    /// Queue capacity after rounding.
    pub capacity: usize,
    /// Payloads ready to be acquired.
    pub pool_available: usize,
    /// Requests rejected because the pool was exhausted.
    pub rejected: u64,
    /// Payloads allocated past the pre-allocated pool.
    pub fallback_allocations: u64,
    /// Requests skipped because the target was no longer alive.
    pub invalid_references: u64,
    /// Requests dropped as malformed.
    pub malformed: u64,
    /// Damage tags dropped beyond `max_tags`.
    pub tags_truncated: u64,
    /// Entities killed by damage.
    pub kills: u64,
    /// Aggregated events emitted.
    pub batches_emitted: u64,
    /// Summaries dropped on full channels.
    pub summaries_dropped: u64,
    /// Ticks run.
    pub ticks: u64,
    /// Ticks discarded by the catch-up cap.
    pub ticks_dropped: u64,
    /// Frames that owed more ticks than the catch-up cap.
    pub late_frames: u64,
    /// Requests waiting for the next tick.
    pub queued: usize,
    /// `true` in queued mode, `false` in direct mode.
    pub enabled: bool,
}

#[derive(Clone, Copy, Debug, Default)]
struct Counters {
    enqueued: u64,
    dropped_overflow: u64,
    rejected: u64,
    fallback_allocations: u64,
    tags_truncated: u64,
    // Degradation since the last tick, for the per-tick warning
    tick_evicted: u32,
    tick_rejected: u32,
}

/// Ring buffer + object pool + batch processor.
///
/// # Thread Safety
///
/// NOT thread-safe. Owned by the simulation loop; summaries can be consumed
/// on other threads through [`EventPipeline::summary_channel`].
pub struct EventPipeline {
    config: PipelineConfig,
    ring: RingBuffer<PoolHandle>,
    pool: ObjectPool<Payload>,
    processor: BatchProcessor,
    clock: TickClock,
    counters: Counters,
}

impl EventPipeline {
    /// Builds the pipeline around an existing registry.
    ///
    /// All queue and pool memory is allocated here.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::ConfigError`] if `config` is invalid.
    pub fn new(config: PipelineConfig, registry: EntityRegistry) -> ConfigResult<Self> {
        config.validate()?;

        let ring = RingBuffer::new(config.capacity);
        let pool = Self::build_pool(&config);
        let processor = BatchProcessor::new(registry, Self::batch_capacity(&config));
        let clock = TickClock::new(config.tick_hz, config.max_catch_up_ticks);

        info!(
            capacity = ring.capacity(),
            pool_size = config.pool_size,
            tick_hz = config.tick_hz,
            exhaustion = ?config.exhaustion,
            queued = config.queued,
            "event pipeline initialized"
        );

        Ok(Self {
            config,
            ring,
            pool,
            processor,
            clock,
            counters: Counters::default(),
        })
    }

    fn build_pool(config: &PipelineConfig) -> ObjectPool<Payload> {
        let max_tags = config.max_tags;
        ObjectPool::with_factory(config.pool_size, config.exhaustion, move || {
            Payload::with_tag_capacity(max_tags)
        })
    }

    fn batch_capacity(config: &PipelineConfig) -> usize {
        config.ring_capacity().max(config.pool_size)
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Entity state as of the last tick.
    #[must_use]
    pub const fn registry(&self) -> &EntityRegistry {
        self.processor.registry()
    }

    /// Registry access for spawning and despawning between ticks.
    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        self.processor.registry_mut()
    }

    /// Registers an in-thread listener for aggregated events.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&BatchApplied<'_>) + 'static,
    {
        self.processor.hub_mut().subscribe(listener)
    }

    /// Removes a listener.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.processor.hub_mut().unsubscribe(id)
    }

    /// Opens a bounded channel of per-tick summaries for another thread.
    #[must_use]
    pub fn summary_channel(&mut self, capacity: usize) -> Receiver<BatchSummary> {
        self.processor.hub_mut().summary_channel(capacity)
    }

    /// Requests `amount` damage from `source` to `target`.
    ///
    /// Tags past `max_tags` are dropped.
    pub fn apply_damage(
        &mut self,
        source: EntityId,
        target: EntityId,
        amount: f32,
        tags: &[DamageTag],
    ) -> Admission {
        let kept = tags.len().min(self.config.max_tags);
        self.counters.tags_truncated += (tags.len() - kept) as u64;
        let tags = &tags[..kept];

        if !self.config.queued {
            self.processor.apply_direct(RequestView::Damage {
                source,
                target,
                amount,
                tags,
            });
            return Admission::Applied;
        }

        self.enqueue(|payload| {
            // Never drops: every payload holds at least `max_tags`
            let _ = payload.fill_damage(source, target, amount, tags);
        })
    }

    /// Requests that `entity`'s registry position become `position`.
    pub fn sync_entity(&mut self, entity: EntityId, position: Vec2) -> Admission {
        if !self.config.queued {
            self.processor
                .apply_direct(RequestView::Sync { entity, position });
            return Admission::Applied;
        }

        self.enqueue(|payload| payload.fill_sync(entity, position))
    }

    fn enqueue<F>(&mut self, fill: F) -> Admission
    where
        F: FnOnce(&mut Payload),
    {
        let admission = Self::admit(&mut self.ring, &mut self.pool, &mut self.counters, fill);
        if admission != Admission::Rejected {
            self.counters.enqueued += 1;
        }
        admission
    }

    /// Puts one filled payload at the back of `ring`, evicting the oldest
    /// pending request first if the ring is full.
    fn admit<F>(
        ring: &mut RingBuffer<PoolHandle>,
        pool: &mut ObjectPool<Payload>,
        counters: &mut Counters,
        fill: F,
    ) -> Admission
    where
        F: FnOnce(&mut Payload),
    {
        let mut evicted = false;
        if ring.is_full() {
            if let Some(oldest) = ring.pop() {
                Self::drop_overflow(pool, counters, oldest);
                evicted = true;
            }
        }

        let handle = match pool.acquire() {
            Acquired::Pooled(handle) => handle,
            Acquired::Allocated(handle) => {
                counters.fallback_allocations += 1;
                warn!(
                    total = pool.total_capacity(),
                    initial = pool.initial_capacity(),
                    "payload pool exhausted, allocated a fallback payload"
                );
                handle
            }
            Acquired::Exhausted => {
                counters.rejected += 1;
                counters.tick_rejected += 1;
                debug!("payload pool exhausted, request rejected");
                return Admission::Rejected;
            }
        };

        if let Some(payload) = pool.get_mut(handle) {
            fill(payload);
        }

        if let Some(oldest) = ring.push_evicting(handle) {
            Self::drop_overflow(pool, counters, oldest);
            evicted = true;
        }

        if evicted {
            Admission::QueuedEvictedOldest
        } else {
            Admission::Queued
        }
    }

    fn drop_overflow(pool: &mut ObjectPool<Payload>, counters: &mut Counters, handle: PoolHandle) {
        counters.dropped_overflow += 1;
        counters.tick_evicted += 1;
        if let Err(err) = pool.release(handle) {
            error!(%err, "evicted handle was not an active payload");
        }
    }

    /// Feeds a frame's elapsed time to the tick clock and returns the number
    /// of ticks now due. Does not run them.
    pub fn ticks_due(&mut self, frame_dt: Duration) -> u32 {
        let before = *self.clock.stats();
        let due = self.clock.advance(frame_dt);

        let after = self.clock.stats();
        if after.late_frames > before.late_frames {
            warn!(
                due,
                dropped = after.ticks_dropped - before.ticks_dropped,
                "frame overran the catch-up cap, ticks dropped"
            );
        }
        due
    }

    /// Fixed tick duration in seconds.
    #[must_use]
    pub fn tick_seconds(&self) -> f32 {
        self.clock.tick_seconds()
    }

    /// Advances the clock and runs every due tick. Returns the ticks run.
    pub fn update(&mut self, frame_dt: Duration) -> u32 {
        let due = self.ticks_due(frame_dt);
        for _ in 0..due {
            let _ = self.tick();
        }
        due
    }

    /// Runs one batch tick: drains the queue, applies everything, emits at
    /// most one aggregated event.
    pub fn tick(&mut self) -> Option<BatchSummary> {
        self.processor.drain(&mut self.ring, &mut self.pool);

        if self.counters.tick_evicted > 0 || self.counters.tick_rejected > 0 {
            warn!(
                tick = self.processor.tick() + 1,
                evicted = self.counters.tick_evicted,
                rejected = self.counters.tick_rejected,
                "request queue degraded"
            );
            self.counters.tick_evicted = 0;
            self.counters.tick_rejected = 0;
        }

        self.processor.finish_tick()
    }

    /// Snapshot of every counter.
    #[must_use]
    pub fn get_stats(&self) -> PipelineStats {
        let processor = self.processor.stats();
        let hub = self.processor.hub();
        let timing = self.clock.stats();
        PipelineStats {
            enqueued: self.counters.enqueued,
            processed: processor.processed,
            dropped_overflow: self.counters.dropped_overflow,
            capacity: self.ring.capacity(),
            pool_available: self.pool.available_count(),
            rejected: self.counters.rejected,
            fallback_allocations: self.counters.fallback_allocations,
            invalid_references: processor.invalid_references,
            malformed: processor.malformed,
            tags_truncated: self.counters.tags_truncated,
            kills: processor.kills,
            batches_emitted: hub.emitted(),
            summaries_dropped: hub.summaries_dropped(),
            ticks: self.processor.tick(),
            ticks_dropped: timing.ticks_dropped,
            late_frames: timing.late_frames,
            queued: self.ring.count(),
            enabled: self.config.queued,
        }
    }

    /// Drops every pending request and zeroes all counters.
    ///
    /// Entity state, subscribers and the mode are kept. Intended for tests
    /// and debug tooling.
    pub fn reset(&mut self) {
        self.ring.reset();
        self.pool.release_all();
        self.pool.reset_counters();
        self.processor.reset();
        self.clock.reset();
        self.counters = Counters::default();
        info!("event pipeline reset");
    }

    /// Switches between queued (`true`) and direct (`false`) application.
    ///
    /// Pending requests are applied before switching to direct mode; their
    /// results go out with the next tick.
    pub fn set_enabled(&mut self, enabled: bool) {
        if enabled == self.config.queued {
            return;
        }

        if !enabled {
            let drained = self.processor.drain(&mut self.ring, &mut self.pool);
            debug!(drained, "flushed queue before direct mode");
        }

        self.config.queued = enabled;
        info!(queued = enabled, "pipeline mode changed");
    }

    /// Replaces the queue and pool with ones sized for `config`.
    ///
    /// Pending requests move to the new queue in order. If it is smaller, the
    /// oldest of them are dropped as overflow. No tick runs, so the cadence is
    /// unchanged. Cumulative counters, entity state and subscribers survive.
    /// On error nothing changes.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::ConfigError`] if `config` is invalid.
    pub fn reconfigure(&mut self, config: PipelineConfig) -> ConfigResult<()> {
        config.validate()?;

        let mut ring = RingBuffer::new(config.capacity);
        let mut pool = Self::build_pool(&config);
        let mut carried = 0_usize;
        let mut tags_dropped = 0_usize;

        while let Some(handle) = self.ring.pop() {
            let Some(pending) = self.pool.get(handle) else {
                error!(index = handle.index(), "queued handle was not an active payload");
                continue;
            };
            let admission = Self::admit(&mut ring, &mut pool, &mut self.counters, |payload| {
                tags_dropped += payload.copy_from(pending);
            });
            if admission != Admission::Rejected {
                carried += 1;
            }
        }
        self.counters.tags_truncated += tags_dropped as u64;

        self.ring = ring;
        self.pool = pool;
        self.processor.reserve(Self::batch_capacity(&config));
        self.clock.retime(config.tick_hz, config.max_catch_up_ticks);

        info!(
            capacity = self.ring.capacity(),
            pool_size = config.pool_size,
            tick_hz = config.tick_hz,
            exhaustion = ?config.exhaustion,
            queued = config.queued,
            carried,
            "event pipeline reconfigured"
        );
        self.config = config;
        Ok(())
    }

    /// Checks the pool and queue bookkeeping against each other.
    #[must_use]
    pub fn check_invariants(&self) -> bool {
        self.pool.is_consistent()
            && self.ring.count() == self.pool.active_count()
            && self.ring.iter().all(|handle| self.pool.is_active(handle))
    }
}
