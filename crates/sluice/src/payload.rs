//! # Pooled Payloads
//!
//! One fixed-layout record serves both request kinds. Fields a kind does not
//! use stay at their defaults.
//!
//! | Kind     | source | target | amount | tags | position |
//! |----------|:------:|:------:|:------:|:----:|:--------:|
//! | `Damage` |   x    |   x    |   x    |  x   |          |
//! | `Sync`   |        |   x    |        |      |    x     |
//!
//! Reset clears `tags` in place, so the capacity reserved when the pool was
//! built survives every reuse.

use sluice_core::{EntityId, PoolHandle, Reset, Vec2};

use crate::error::PayloadError;

/// Opaque damage tag (element, crit, etc.). Tags `0..32` map onto a bitmask.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DamageTag(pub u8);

impl DamageTag {
    /// Bit for this tag in an aggregated tag mask.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u32 {
        1 << (self.0 & 31)
    }
}

/// Which request a payload carries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PayloadKind {
    /// Canonical reset state. Never valid in the queue.
    #[default]
    Empty,
    /// Apply damage to `target`.
    Damage,
    /// Overwrite `target`'s position.
    Sync,
}

/// A pooled request record.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Payload {
    /// Request kind.
    pub kind: PayloadKind,
    /// Entity that caused the request.
    pub source: EntityId,
    /// Entity the request applies to.
    pub target: EntityId,
    /// Damage amount.
    pub amount: f32,
    /// Damage tags. Capacity is reserved once and never shrunk.
    pub tags: Vec<DamageTag>,
    /// Synced position.
    pub position: Vec2,
}

impl Payload {
    /// Creates an empty payload with room for `max_tags` tags.
    #[must_use]
    pub fn with_tag_capacity(max_tags: usize) -> Self {
        Self {
            tags: Vec::with_capacity(max_tags),
            ..Self::default()
        }
    }

    /// Fills a damage request.
    ///
    /// Tags beyond the reserved capacity are dropped so the write never
    /// allocates. Returns the number of tags dropped.
    pub fn fill_damage(
        &mut self,
        source: EntityId,
        target: EntityId,
        amount: f32,
        tags: &[DamageTag],
    ) -> usize {
        self.kind = PayloadKind::Damage;
        self.source = source;
        self.target = target;
        self.amount = amount;
        self.tags.clear();
        let room = self.tags.capacity();
        let kept = tags.len().min(room);
        self.tags.extend_from_slice(&tags[..kept]);
        tags.len() - kept
    }

    /// Fills a position sync.
    pub fn fill_sync(&mut self, entity: EntityId, position: Vec2) {
        self.kind = PayloadKind::Sync;
        self.target = entity;
        self.position = position;
    }

    /// Copies every field of `other`, keeping this payload's tag storage.
    ///
    /// Tags beyond the reserved capacity are dropped. Returns the number of
    /// tags dropped.
    pub fn copy_from(&mut self, other: &Self) -> usize {
        self.kind = other.kind;
        self.source = other.source;
        self.target = other.target;
        self.amount = other.amount;
        self.position = other.position;
        self.tags.clear();
        let kept = other.tags.len().min(self.tags.capacity());
        self.tags.extend_from_slice(&other.tags[..kept]);
        other.tags.len() - kept
    }

    /// Validates the payload and borrows it as a request.
    ///
    /// # Errors
    ///
    /// Returns [`PayloadError::Malformed`] if the fields do not fit the kind.
    pub fn view(&self, handle: PoolHandle) -> Result<RequestView<'_>, PayloadError> {
        let request = match self.kind {
            PayloadKind::Empty => Err("empty payload was enqueued"),
            PayloadKind::Damage => Ok(RequestView::Damage {
                source: self.source,
                target: self.target,
                amount: self.amount,
                tags: &self.tags,
            }),
            PayloadKind::Sync => Ok(RequestView::Sync {
                entity: self.target,
                position: self.position,
            }),
        };

        request
            .and_then(|request| match request.problem() {
                Some(reason) => Err(reason),
                None => Ok(request),
            })
            .map_err(|reason| PayloadError::Malformed {
                slot: handle.index(),
                reason,
            })
    }
}

impl Reset for Payload {
    fn reset(&mut self) {
        self.kind = PayloadKind::Empty;
        self.source = EntityId::NULL;
        self.target = EntityId::NULL;
        self.amount = 0.0;
        self.tags.clear();
        self.position = Vec2::ZERO;
    }
}

/// A request borrowed from a payload, or built on the stack by the direct path.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RequestView<'a> {
    /// Apply damage.
    Damage {
        /// Entity that caused the damage.
        source: EntityId,
        /// Entity taking the damage.
        target: EntityId,
        /// Damage amount.
        amount: f32,
        /// Damage tags.
        tags: &'a [DamageTag],
    },
    /// Overwrite a position.
    Sync {
        /// Entity to move.
        entity: EntityId,
        /// New position.
        position: Vec2,
    },
}

impl RequestView<'_> {
    /// Describes what is wrong with the request, if anything.
    #[must_use]
    pub fn problem(&self) -> Option<&'static str> {
        match *self {
            RequestView::Damage { target, .. } if target.is_null() => {
                Some("damage without a target")
            }
            RequestView::Damage { amount, .. } if !amount.is_finite() => {
                Some("damage amount is not finite")
            }
            RequestView::Sync { entity, .. } if entity.is_null() => Some("sync without an entity"),
            RequestView::Sync { position, .. } if !position.is_finite() => {
                Some("sync position is not finite")
            }
            _ => None,
        }
    }

    /// The entity the request applies to.
    #[must_use]
    pub const fn target(&self) -> EntityId {
        match *self {
            RequestView::Damage { target, .. } => target,
            RequestView::Sync { entity, .. } => entity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_is_canonical_and_keeps_capacity() {
        let mut payload = Payload::with_tag_capacity(4);
        payload.fill_damage(
            EntityId::new(1, 0),
            EntityId::new(2, 0),
            10.0,
            &[DamageTag(1), DamageTag(2)],
        );
        let capacity = payload.tags.capacity();

        payload.reset();
        let mut canonical = Payload::with_tag_capacity(4);
        canonical.reset();
        assert_eq!(payload, canonical);
        assert_eq!(payload.tags.capacity(), capacity);
    }

    #[test]
    fn test_excess_tags_are_dropped() {
        let mut payload = Payload::with_tag_capacity(2);
        let capacity = payload.tags.capacity();
        let dropped = payload.fill_damage(
            EntityId::NULL,
            EntityId::new(0, 0),
            1.0,
            &[DamageTag(1), DamageTag(2), DamageTag(3), DamageTag(4), DamageTag(5)],
        );
        assert_eq!(payload.tags.len(), capacity);
        assert_eq!(dropped, 5 - capacity);
        assert_eq!(payload.tags.capacity(), capacity);
    }

    #[test]
    fn test_copy_from_keeps_own_storage() {
        let mut wide = Payload::with_tag_capacity(4);
        wide.fill_damage(
            EntityId::new(1, 0),
            EntityId::new(2, 0),
            7.5,
            &[DamageTag(1), DamageTag(2), DamageTag(3)],
        );

        let mut narrow = Payload::with_tag_capacity(2);
        let capacity = narrow.tags.capacity();
        let dropped = narrow.copy_from(&wide);

        assert_eq!(dropped, 3 - capacity.min(3));
        assert_eq!(narrow.kind, PayloadKind::Damage);
        assert_eq!(narrow.target, EntityId::new(2, 0));
        assert!((narrow.amount - 7.5).abs() < f32::EPSILON);
        assert_eq!(narrow.tags[..], wide.tags[..narrow.tags.len()]);
        assert_eq!(narrow.tags.capacity(), capacity);
    }

    #[test]
    fn test_view_rejects_malformed() {
        let handle = PoolHandle::default();
        let empty = Payload::with_tag_capacity(1);
        assert!(empty.view(handle).is_err());

        let mut nan = Payload::with_tag_capacity(1);
        nan.fill_damage(EntityId::NULL, EntityId::new(0, 0), f32::NAN, &[]);
        assert!(matches!(
            nan.view(handle),
            Err(PayloadError::Malformed { reason: "damage amount is not finite", .. })
        ));

        let mut sync = Payload::with_tag_capacity(1);
        sync.fill_sync(EntityId::new(3, 1), Vec2::new(1.0, 2.0));
        assert_eq!(
            sync.view(handle).unwrap(),
            RequestView::Sync {
                entity: EntityId::new(3, 1),
                position: Vec2::new(1.0, 2.0),
            }
        );
    }

    #[test]
    fn test_tag_bits() {
        assert_eq!(DamageTag(0).bit(), 1);
        assert_eq!(DamageTag(5).bit(), 32);
        assert_eq!(DamageTag(33).bit(), 2);
    }
}
