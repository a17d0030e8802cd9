//! # Entity Slot Pool
//!
//! A fixed array of simulation slots scanned front to back once per tick.
//!
//! ```text
//!   slots:  [ 0 ][ 1 ][ 2 ][ 3 ][ 4 ][ 5 ][ 6 ][ 7 ]
//!   alive:    1    0    1    1    0    0    1    0     popcount == alive entities
//! ```
//!
//! Each slot's `index` is written once, when the array is built, and has no
//! setter. Spawning writes the other fields of a free slot and sets its bit;
//! despawning clears the bit. Slot memory is never freed or moved, so the
//! per-tick scan needs no "alive list" and no search to find a slot.

use fixedbitset::FixedBitSet;

use super::entity::EntityId;
use super::vec::Vec2;

/// Position of a slot in an [`EntitySlotPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct SlotIndex(u32);

impl SlotIndex {
    /// Returns the array index.
    #[inline]
    #[must_use]
    pub const fn get(self) -> usize {
        self.0 as usize
    }
}

/// One bit per slot; bit `i` is set iff slot `i` holds a live entity.
///
/// The population count is cached so it always equals the live entity count.
#[derive(Clone, Debug)]
pub struct AliveBitfield {
    bits: FixedBitSet,
    count: usize,
}

impl AliveBitfield {
    /// Creates a bitfield with every bit cleared.
    #[must_use]
    pub fn new(len: usize) -> Self {
        Self {
            bits: FixedBitSet::with_capacity(len),
            count: 0,
        }
    }

    /// Number of bits.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.bits.len()
    }

    /// Returns `true` if the bitfield has no bits at all.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits.len() == 0
    }

    /// Number of set bits. **O(1)**.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// Tests bit `index`. Out-of-range bits read as clear.
    #[inline]
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        self.bits.contains(index)
    }

    /// Sets bit `index`. Returns `true` if it was previously clear.
    #[inline]
    pub fn set(&mut self, index: usize) -> bool {
        let was_set = self.bits.put(index);
        if !was_set {
            self.count += 1;
        }
        !was_set
    }

    /// Clears bit `index`. Returns `true` if it was previously set.
    #[inline]
    pub fn clear(&mut self, index: usize) -> bool {
        if !self.bits.contains(index) {
            return false;
        }
        self.bits.set(index, false);
        self.count -= 1;
        true
    }

    /// Recounts the set bits. **O(N/64)**, for tests and debug tooling.
    #[must_use]
    pub fn popcount(&self) -> usize {
        self.bits.count_ones(..)
    }
}

/// One simulated entity's mutable state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntitySlot {
    /// Permanent position in the slot array.
    index: u32,
    /// Registry entity this slot mirrors.
    pub entity: EntityId,
    /// World position.
    pub position: Vec2,
    /// Current health.
    pub hp: f32,
    /// Maximum health.
    pub max_hp: f32,
}

impl EntitySlot {
    const fn empty(index: u32) -> Self {
        Self {
            index,
            entity: EntityId::NULL,
            position: Vec2::ZERO,
            hp: 0.0,
            max_hp: 0.0,
        }
    }

    /// The slot's permanent index. Assigned at pool creation, never changed.
    #[inline]
    #[must_use]
    pub const fn index(&self) -> SlotIndex {
        SlotIndex(self.index)
    }
}

/// Fixed-size array of entity slots with bitfield liveness.
///
/// # Thread Safety
///
/// NOT thread-safe. Owned by the simulation loop.
///
/// # Example
///
/// ```rust,ignore
/// let mut slots = EntitySlotPool::new(1000);
/// let slot = slots.spawn(entity_id, Vec2::ZERO, 100.0).unwrap();
/// slots.for_each_alive_mut(|slot| slot.position.x += 1.0);
/// slots.despawn(slot);
/// ```
pub struct EntitySlotPool {
    /// All slots (pre-allocated, never resized).
    slots: Box<[EntitySlot]>,
    /// Liveness, one bit per slot.
    alive: AliveBitfield,
    /// Free list of slot indices for reuse.
    free_indices: Vec<u32>,
}

impl EntitySlotPool {
    /// Creates a pool of `capacity` empty slots.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or exceeds `u32::MAX`.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            capacity <= u32::MAX as usize,
            "Capacity cannot exceed u32::MAX"
        );

        #[allow(clippy::cast_possible_truncation)]
        let slots: Box<[EntitySlot]> = (0..capacity as u32).map(EntitySlot::empty).collect();
        #[allow(clippy::cast_possible_truncation)]
        let free_indices: Vec<u32> = (0..capacity as u32).rev().collect();

        Self {
            slots,
            alive: AliveBitfield::new(capacity),
            free_indices,
        }
    }

    /// Returns the number of slots.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of live slots. **O(1)**.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive.count()
    }

    /// Returns the liveness bitfield.
    #[inline]
    #[must_use]
    pub const fn alive(&self) -> &AliveBitfield {
        &self.alive
    }

    /// Writes a new entity into a free slot and marks it alive.
    ///
    /// This is a **zero-allocation** operation.
    ///
    /// # Returns
    ///
    /// The slot used, or `None` if every slot is occupied.
    pub fn spawn(&mut self, entity: EntityId, position: Vec2, max_hp: f32) -> Option<SlotIndex> {
        let index = self.free_indices.pop()?;
        let slot = &mut self.slots[index as usize];

        // `index` is permanent
        slot.entity = entity;
        slot.position = position;
        slot.hp = max_hp;
        slot.max_hp = max_hp;
        self.alive.set(index as usize);

        Some(SlotIndex(index))
    }

    /// Clears a slot's alive bit. The slot memory is kept for reuse.
    ///
    /// # Returns
    ///
    /// `false` if the slot was not alive.
    pub fn despawn(&mut self, slot: SlotIndex) -> bool {
        if !self.alive.clear(slot.get()) {
            return false;
        }
        self.free_indices.push(slot.0);
        true
    }

    /// Returns `true` if the slot holds a live entity.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, slot: SlotIndex) -> bool {
        self.alive.contains(slot.get())
    }

    /// Gets a live slot by index.
    #[inline]
    #[must_use]
    pub fn get(&self, slot: SlotIndex) -> Option<&EntitySlot> {
        if self.is_alive(slot) {
            self.slots.get(slot.get())
        } else {
            None
        }
    }

    /// Gets a live slot mutably by index.
    #[inline]
    pub fn get_mut(&mut self, slot: SlotIndex) -> Option<&mut EntitySlot> {
        if self.is_alive(slot) {
            self.slots.get_mut(slot.get())
        } else {
            None
        }
    }

    /// Reads any slot, alive or not.
    #[inline]
    #[must_use]
    pub fn slot(&self, index: usize) -> Option<&EntitySlot> {
        self.slots.get(index)
    }

    /// Runs `f` on every live slot in index order.
    ///
    /// Scans the array once, skipping dead slots with a single bit test.
    /// Returns the number of live slots visited.
    #[inline]
    pub fn for_each_alive_mut<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&mut EntitySlot),
    {
        let mut visited = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !self.alive.contains(index) {
                continue;
            }
            f(slot);
            visited += 1;
        }
        visited
    }

    /// Runs `f` on every live slot in index order, despawning the slots for
    /// which it returns `false`.
    ///
    /// Same single pass as [`Self::for_each_alive_mut`]; despawned slots go
    /// back on the free list without any intermediate collection.
    /// Returns the number of live slots visited.
    pub fn retain_alive_mut<F>(&mut self, mut f: F) -> usize
    where
        F: FnMut(&mut EntitySlot) -> bool,
    {
        let mut visited = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if !self.alive.contains(index) {
                continue;
            }
            visited += 1;
            if !f(slot) {
                self.alive.clear(index);
                self.free_indices.push(slot.index);
            }
        }
        visited
    }

    /// Iterates over all live slots.
    pub fn iter_alive(&self) -> impl Iterator<Item = &EntitySlot> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(index, _)| self.alive.contains(*index))
            .map(|(_, slot)| slot)
    }
}
