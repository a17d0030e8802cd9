//! # Entity Registry
//!
//! The canonical entity state store. Pre-allocates all records at creation.
//!
//! Lookup by [`EntityId`] is a direct index plus a generation compare, so a
//! request aimed at an entity that has since been despawned (or whose slot
//! was reused) resolves to `None` in O(1).

use std::collections::HashMap;

use super::entity::EntityId;
use super::vec::Vec2;

/// State of one registered entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EntityRecord {
    /// The entity's current ID (generation included).
    pub id: EntityId,
    /// World position.
    pub position: Vec2,
    /// Current health, never below zero.
    pub hp: f32,
    /// Maximum health.
    pub max_hp: f32,
    /// Whether this record is occupied.
    pub alive: bool,
}

impl EntityRecord {
    /// Creates a dead/empty record.
    #[inline]
    #[must_use]
    pub const fn dead() -> Self {
        Self {
            id: EntityId::NULL,
            position: Vec2::ZERO,
            hp: 0.0,
            max_hp: 0.0,
            alive: false,
        }
    }
}

impl Default for EntityRecord {
    fn default() -> Self {
        Self::dead()
    }
}

/// Fixed-capacity registry of entity state.
///
/// # Capacity
///
/// The registry has a fixed capacity set at creation. Spawn returns
/// [`EntityId::NULL`] once it is reached.
///
/// # Example
///
/// ```rust,ignore
/// let mut registry = EntityRegistry::new(1024);
/// let e1 = registry.spawn_named("e1", Vec2::ZERO, 100.0);
/// assert_eq!(registry.id_of("e1"), Some(e1));
/// ```
pub struct EntityRegistry {
    /// All entity records (pre-allocated).
    records: Box<[EntityRecord]>,
    /// Free list of record indices for reuse.
    free_indices: Vec<u32>,
    /// Interned names, for callers that address entities by string.
    names: HashMap<String, EntityId>,
    /// Reverse of `names`, indexed like `records`.
    name_slots: Box<[Option<String>]>,
    /// Number of currently alive entities.
    alive_count: usize,
}

impl EntityRegistry {
    /// Creates a registry with the specified entity capacity.
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
        let free_indices: Vec<u32> = (0..capacity as u32).rev().collect();

        Self {
            records: vec![EntityRecord::dead(); capacity].into_boxed_slice(),
            free_indices,
            names: HashMap::with_capacity(capacity.min(4096)),
            name_slots: (0..capacity).map(|_| None).collect(),
            alive_count: 0,
        }
    }

    /// Returns the maximum capacity of this registry.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.records.len()
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Spawns an entity at full health.
    ///
    /// This is a **zero-allocation** operation - it reuses pre-allocated records.
    ///
    /// # Returns
    ///
    /// The new entity's ID, or `EntityId::NULL` if capacity is reached.
    pub fn spawn(&mut self, position: Vec2, max_hp: f32) -> EntityId {
        let Some(index) = self.free_indices.pop() else {
            return EntityId::NULL;
        };

        let record = &mut self.records[index as usize];

        // Increment generation to invalidate old references
        let generation = if record.id.is_null() {
            0
        } else {
            record.id.generation().wrapping_add(1)
        };
        let id = EntityId::new(index, generation);

        *record = EntityRecord {
            id,
            position,
            hp: max_hp,
            max_hp,
            alive: true,
        };
        self.alive_count += 1;

        id
    }

    /// Spawns an entity addressable by `name`.
    ///
    /// # Returns
    ///
    /// The new entity's ID, or `EntityId::NULL` if capacity is reached or the
    /// name already belongs to a live entity.
    pub fn spawn_named(&mut self, name: &str, position: Vec2, max_hp: f32) -> EntityId {
        if self.names.contains_key(name) {
            return EntityId::NULL;
        }
        let id = self.spawn(position, max_hp);
        if !id.is_null() {
            self.names.insert(name.to_owned(), id);
            self.name_slots[id.index() as usize] = Some(name.to_owned());
        }
        id
    }

    /// Resolves an interned name to its live entity.
    #[inline]
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<EntityId> {
        self.names.get(name).copied()
    }

    /// Despawns an entity, freeing its record for reuse.
    ///
    /// # Returns
    ///
    /// `true` if the entity was despawned, `false` if it was already dead
    /// or the ID was invalid/stale.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if !self.is_alive(id) {
            return false;
        }

        let idx = id.index() as usize;
        let record = &mut self.records[idx];
        record.alive = false;
        record.hp = 0.0;
        self.alive_count -= 1;
        self.free_indices.push(id.index());

        if let Some(name) = self.name_slots[idx].take() {
            self.names.remove(&name);
        }

        true
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        if id.is_null() {
            return false;
        }
        self.records
            .get(id.index() as usize)
            .is_some_and(|record| record.alive && record.id == id)
    }

    /// Gets an entity by ID.
    ///
    /// # Returns
    ///
    /// Reference to the record, or None if not found/dead/stale.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&EntityRecord> {
        if !self.is_alive(id) {
            return None;
        }
        Some(&self.records[id.index() as usize])
    }

    /// Gets a mutable entity record by ID.
    ///
    /// # Returns
    ///
    /// Mutable reference to the record, or None if not found/dead/stale.
    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut EntityRecord> {
        if !self.is_alive(id) {
            return None;
        }
        Some(&mut self.records[id.index() as usize])
    }

    /// Iterates over all alive entities.
    pub fn iter_alive(&self) -> impl Iterator<Item = &EntityRecord> {
        self.records.iter().filter(|record| record.alive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_creation() {
        let registry = EntityRegistry::new(1000);
        assert_eq!(registry.capacity(), 1000);
        assert_eq!(registry.alive_count(), 0);
    }

    #[test]
    fn test_spawn_despawn() {
        let mut registry = EntityRegistry::new(100);

        let id1 = registry.spawn(Vec2::ZERO, 50.0);
        assert!(!id1.is_null());
        assert!(registry.is_alive(id1));
        assert_eq!(registry.get(id1).unwrap().hp, 50.0);

        assert!(registry.despawn(id1));
        assert!(!registry.is_alive(id1));
        assert!(!registry.despawn(id1));
        assert_eq!(registry.alive_count(), 0);

        // Spawn again - should reuse the record
        let id2 = registry.spawn(Vec2::ZERO, 50.0);
        assert_eq!(id2.index(), id1.index());
        assert_ne!(id2.generation(), id1.generation());
        assert!(registry.get(id1).is_none());
    }

    #[test]
    fn test_capacity_reached() {
        let mut registry = EntityRegistry::new(1);
        assert!(!registry.spawn(Vec2::ZERO, 1.0).is_null());
        assert!(registry.spawn(Vec2::ZERO, 1.0).is_null());
    }

    #[test]
    fn test_named_entities() {
        let mut registry = EntityRegistry::new(4);

        let e1 = registry.spawn_named("e1", Vec2::new(1.0, 1.0), 100.0);
        assert_eq!(registry.id_of("e1"), Some(e1));
        assert!(registry.spawn_named("e1", Vec2::ZERO, 1.0).is_null());

        assert!(registry.despawn(e1));
        assert_eq!(registry.id_of("e1"), None);

        let again = registry.spawn_named("e1", Vec2::ZERO, 10.0);
        assert_ne!(again, e1);
        assert_eq!(registry.id_of("e1"), Some(again));
    }
}
