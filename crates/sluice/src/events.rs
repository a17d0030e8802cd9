//! # Batch Events
//!
//! One aggregated event per tick, however many requests the tick applied.
//!
//! ```text
//!   BatchProcessor ──(&BatchApplied)──> in-thread listeners (borrow the records)
//!         │
//!         └──────(BatchSummary)──────> bounded channels (other threads)
//! ```
//!
//! Listeners borrow the processor's pre-allocated result buffer, so emitting
//! allocates nothing. Summary channels never block: a full channel drops the
//! summary and counts it.

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};
use sluice_core::{EntityId, Vec2};

/// What an applied record did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppliedKind {
    /// Health was reduced.
    Damage,
    /// Position was overwritten.
    Sync,
}

/// The outcome of one applied request.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AppliedRecord {
    /// Request kind.
    pub kind: AppliedKind,
    /// Source entity (`NULL` for syncs).
    pub source: EntityId,
    /// Entity the request applied to.
    pub target: EntityId,
    /// Damage amount requested (0 for syncs).
    pub amount: f32,
    /// Union of the request's damage tag bits.
    pub tag_mask: u32,
    /// Target position after the request.
    pub position: Vec2,
    /// Target health after the request.
    pub hp_after: f32,
    /// `true` if this request brought health to zero.
    pub killed: bool,
}

/// The aggregated event for one tick.
#[derive(Clone, Copy, Debug)]
pub struct BatchApplied<'a> {
    /// Tick number.
    pub tick: u64,
    /// Every request applied this tick, in drain order.
    pub records: &'a [AppliedRecord],
    /// Requests whose target was no longer alive.
    pub skipped_invalid: u32,
    /// Requests dropped as malformed.
    pub malformed: u32,
}

impl BatchApplied<'_> {
    /// Condenses the event into an owned, `Copy` summary.
    #[must_use]
    pub fn summary(&self) -> BatchSummary {
        let mut total_damage = 0.0;
        let mut kills = 0;
        let mut syncs = 0;
        for record in self.records {
            match record.kind {
                AppliedKind::Damage => total_damage += record.amount,
                AppliedKind::Sync => syncs += 1,
            }
            kills += u32::from(record.killed);
        }

        #[allow(clippy::cast_possible_truncation)]
        let applied = self.records.len() as u32;
        BatchSummary {
            tick: self.tick,
            applied,
            syncs,
            kills,
            total_damage,
            skipped_invalid: self.skipped_invalid,
            malformed: self.malformed,
        }
    }
}

/// Owned per-tick digest, sent to summary channels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct BatchSummary {
    /// Tick number.
    pub tick: u64,
    /// Requests applied.
    pub applied: u32,
    /// Of which position syncs.
    pub syncs: u32,
    /// Entities killed.
    pub kills: u32,
    /// Sum of applied damage.
    pub total_damage: f32,
    /// Requests skipped for a dead target.
    pub skipped_invalid: u32,
    /// Requests dropped as malformed.
    pub malformed: u32,
}

/// In-thread subscriber to aggregated events.
pub type BatchListener = Box<dyn FnMut(&BatchApplied<'_>)>;

/// Identifies a listener for [`EventHub::unsubscribe`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// Fan-out point for aggregated events.
///
/// Replaces engine signal/slot dispatch with an explicit listener list.
pub struct EventHub {
    listeners: Vec<(ListenerId, BatchListener)>,
    summary_senders: Vec<Sender<BatchSummary>>,
    next_listener: u64,
    emitted: u64,
    summaries_dropped: u64,
}

impl EventHub {
    /// Creates a hub with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            summary_senders: Vec::new(),
            next_listener: 0,
            emitted: 0,
            summaries_dropped: 0,
        }
    }

    /// Registers an in-thread listener.
    pub fn subscribe<F>(&mut self, listener: F) -> ListenerId
    where
        F: FnMut(&BatchApplied<'_>) + 'static,
    {
        let id = ListenerId(self.next_listener);
        self.next_listener += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Removes a listener. Returns `false` if it was not registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() != before
    }

    /// Opens a bounded summary channel.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Summaries buffered before new ones are dropped.
    ///   Use a few seconds of ticks, e.g. 128 at 30 Hz.
    #[must_use]
    pub fn summary_channel(&mut self, capacity: usize) -> Receiver<BatchSummary> {
        let (sender, receiver) = bounded(capacity);
        self.summary_senders.push(sender);
        receiver
    }

    /// Number of listeners and channels attached.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len() + self.summary_senders.len()
    }

    /// Events emitted since the last reset.
    #[must_use]
    pub const fn emitted(&self) -> u64 {
        self.emitted
    }

    /// Summaries dropped because a channel was full.
    #[must_use]
    pub const fn summaries_dropped(&self) -> u64 {
        self.summaries_dropped
    }

    /// Delivers one event to every subscriber.
    pub fn emit(&mut self, event: &BatchApplied<'_>) {
        self.emitted += 1;

        for (_, listener) in &mut self.listeners {
            listener(event);
        }

        if self.summary_senders.is_empty() {
            return;
        }

        let summary = event.summary();
        let mut dropped = 0;
        self.summary_senders
            .retain(|sender| match sender.try_send(summary) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    // Consumer is behind - keep the tick moving
                    dropped += 1;
                    true
                }
                // Receiver dropped
                Err(TrySendError::Disconnected(_)) => false,
            });
        self.summaries_dropped += dropped;
    }

    /// Zeroes the counters. Subscribers stay attached.
    pub fn reset_counters(&mut self) {
        self.emitted = 0;
        self.summaries_dropped = 0;
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}
