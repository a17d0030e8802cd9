//! # Object Pool
//!
//! Pre-allocated, reusable records with acquire/release semantics.
//!
//! Every record is either *available* (on the free stack) or *active*
//! (handed out and not yet released), never both:
//!
//! ```text
//!   available.len() + active_count == total_capacity
//! ```

use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Restores a pooled record to its canonical empty shape.
///
/// Implementations must mutate in place and keep the capacity of any
/// internal containers (`Vec::clear`, not `Vec::new`), so that reusing the
/// record never allocates.
pub trait Reset {
    /// Resets every field to its default value, preserving storage.
    fn reset(&mut self);
}

/// What `acquire` does once every pooled record is active.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExhaustionPolicy {
    /// Return [`Acquired::Exhausted`]. Strict zero allocation; the caller drops the request.
    #[default]
    Reject,
    /// Grow the pool by one record. Correct, but allocates on the hot path.
    Allocate,
}

/// Handle to a record in an [`ObjectPool`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct PoolHandle(u32);

impl PoolHandle {
    /// Null/invalid handle.
    pub const NULL: Self = Self(u32::MAX);

    /// Returns the slot index of this handle.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks if this handle is null.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == u32::MAX
    }
}

impl Default for PoolHandle {
    fn default() -> Self {
        Self::NULL
    }
}

/// Outcome of [`ObjectPool::acquire`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Acquired {
    /// A pre-allocated record was handed out.
    Pooled(PoolHandle),
    /// The pool was empty and grew by one record ([`ExhaustionPolicy::Allocate`]).
    Allocated(PoolHandle),
    /// The pool was empty and refused ([`ExhaustionPolicy::Reject`]).
    Exhausted,
}

impl Acquired {
    /// Returns the handle, if one was handed out.
    #[inline]
    #[must_use]
    pub const fn handle(self) -> Option<PoolHandle> {
        match self {
            Self::Pooled(handle) | Self::Allocated(handle) => Some(handle),
            Self::Exhausted => None,
        }
    }
}

/// Errors from misusing pool handles.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    /// The handle does not belong to this pool.
    #[error("pool handle {index} out of range (capacity {capacity})")]
    OutOfRange {
        /// Offending index.
        index: usize,
        /// Current pool capacity.
        capacity: usize,
    },
    /// The handle is already available (double release).
    #[error("pool handle {0} is not active")]
    NotActive(usize),
}

/// A pool of reusable records.
///
/// Records are created once, up front, by a factory. `acquire` pops an index
/// off the free stack; `release` resets the record in place and pushes the
/// index back. Neither touches the allocator unless the pool is configured
/// with [`ExhaustionPolicy::Allocate`] and runs dry.
///
/// # Thread Safety
///
/// This pool is NOT thread-safe. It is owned by the pipeline.
///
/// # Example
///
/// ```rust,ignore
/// let mut pool = ObjectPool::with_factory(2, ExhaustionPolicy::Reject, || Vec::<u8>::with_capacity(16));
/// let handle = pool.acquire().handle().unwrap();
/// pool.get_mut(handle).unwrap().push(7);
/// pool.release(handle)?; // cleared, capacity kept
/// ```
pub struct ObjectPool<T: Reset> {
    /// Every record ever created. Indices are stable.
    records: Vec<T>,
    /// Free stack of available indices.
    available: Vec<u32>,
    /// Bit `i` is set iff record `i` is active.
    active: FixedBitSet,
    /// Number of set bits in `active`.
    active_count: usize,
    /// Capacity requested at creation.
    initial_capacity: usize,
    /// Exhaustion behavior.
    policy: ExhaustionPolicy,
    /// Builds new records (creation and fallback growth).
    factory: Box<dyn Fn() -> T>,
    /// Records created after initialization.
    fallback_allocations: u64,
    /// Acquires refused under [`ExhaustionPolicy::Reject`].
    rejections: u64,
}

impl<T: Reset + Default + 'static> ObjectPool<T> {
    /// Creates a pool of `capacity` default-constructed records.
    #[must_use]
    pub fn new(capacity: usize, policy: ExhaustionPolicy) -> Self {
        Self::with_factory(capacity, policy, T::default)
    }
}

impl<T: Reset> ObjectPool<T> {
    /// Creates a pool of `capacity` records built by `factory`.
    ///
    /// All records are allocated here.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or exceeds `u32::MAX - 1`.
    #[must_use]
    pub fn with_factory<F>(capacity: usize, policy: ExhaustionPolicy, factory: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            capacity < u32::MAX as usize,
            "Capacity cannot exceed u32::MAX - 1"
        );

        let records: Vec<T> = (0..capacity).map(|_| factory()).collect();

        // Reverse so index 0 is handed out first
        #[allow(clippy::cast_possible_truncation)]
        let available: Vec<u32> = (0..capacity as u32).rev().collect();

        Self {
            records,
            available,
            active: FixedBitSet::with_capacity(capacity),
            active_count: 0,
            initial_capacity: capacity,
            policy,
            factory: Box::new(factory),
            fallback_allocations: 0,
            rejections: 0,
        }
    }

    /// Returns the exhaustion policy.
    #[inline]
    #[must_use]
    pub const fn policy(&self) -> ExhaustionPolicy {
        self.policy
    }

    /// Returns the total number of records (available + active).
    #[inline]
    #[must_use]
    pub fn total_capacity(&self) -> usize {
        self.records.len()
    }

    /// Returns the capacity requested at creation.
    #[inline]
    #[must_use]
    pub const fn initial_capacity(&self) -> usize {
        self.initial_capacity
    }

    /// Returns the number of records ready to be acquired.
    #[inline]
    #[must_use]
    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    /// Returns the number of records currently handed out.
    #[inline]
    #[must_use]
    pub const fn active_count(&self) -> usize {
        self.active_count
    }

    /// Records created after initialization because the pool ran dry.
    #[inline]
    #[must_use]
    pub const fn fallback_allocations(&self) -> u64 {
        self.fallback_allocations
    }

    /// Acquires refused because the pool ran dry.
    #[inline]
    #[must_use]
    pub const fn rejections(&self) -> u64 {
        self.rejections
    }

    /// Hands out a record in its canonical empty shape.
    ///
    /// This is a **O(1)** operation with **zero heap allocations**, unless the
    /// pool is empty and configured with [`ExhaustionPolicy::Allocate`].
    pub fn acquire(&mut self) -> Acquired {
        if let Some(index) = self.available.pop() {
            self.active.insert(index as usize);
            self.active_count += 1;
            return Acquired::Pooled(PoolHandle(index));
        }

        match self.policy {
            ExhaustionPolicy::Reject => {
                self.rejections += 1;
                Acquired::Exhausted
            }
            ExhaustionPolicy::Allocate => {
                let index = self.records.len();
                if index >= u32::MAX as usize {
                    self.rejections += 1;
                    return Acquired::Exhausted;
                }
                self.records.push((self.factory)());
                self.active.grow(index + 1);
                self.active.insert(index);
                self.active_count += 1;
                self.fallback_allocations += 1;
                #[allow(clippy::cast_possible_truncation)]
                let handle = PoolHandle(index as u32);
                Acquired::Allocated(handle)
            }
        }
    }

    /// Resets a record and makes it available again.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`] if the handle is foreign or already released.
    /// The pool is left untouched in that case.
    pub fn release(&mut self, handle: PoolHandle) -> Result<(), PoolError> {
        let index = self.check_active(handle)?;

        self.records[index].reset();
        self.active.set(index, false);
        self.active_count -= 1;
        self.available.push(handle.0);

        Ok(())
    }

    /// Returns `true` if the handle refers to an active record.
    #[inline]
    #[must_use]
    pub fn is_active(&self, handle: PoolHandle) -> bool {
        self.active.contains(handle.index())
    }

    /// Gets an active record.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        if self.is_active(handle) {
            self.records.get(handle.index())
        } else {
            None
        }
    }

    /// Gets an active record mutably.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        if self.is_active(handle) {
            self.records.get_mut(handle.index())
        } else {
            None
        }
    }

    /// Resets every active record and returns it to the free stack.
    ///
    /// Records created by fallback growth are kept.
    pub fn release_all(&mut self) {
        for index in self.active.ones() {
            self.records[index].reset();
        }
        self.active.clear();
        self.active_count = 0;
        self.available.clear();
        #[allow(clippy::cast_possible_truncation)]
        let total = self.records.len() as u32;
        self.available.extend((0..total).rev());
    }

    /// Zeroes the allocation and rejection counters.
    pub fn reset_counters(&mut self) {
        self.fallback_allocations = 0;
        self.rejections = 0;
    }

    /// Verifies the available/active partition. **O(N)**, for tests and debug tooling.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let partitioned = self.available.len() + self.active_count == self.records.len();
        let counted = self.active.count_ones(..) == self.active_count;
        let disjoint = self
            .available
            .iter()
            .all(|&index| !self.active.contains(index as usize));
        partitioned && counted && disjoint
    }

    fn check_active(&self, handle: PoolHandle) -> Result<usize, PoolError> {
        let index = handle.index();
        if index >= self.records.len() {
            return Err(PoolError::OutOfRange {
                index,
                capacity: self.records.len(),
            });
        }
        if !self.active.contains(index) {
            return Err(PoolError::NotActive(index));
        }
        Ok(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Scratch {
        value: u32,
        items: Vec<u8>,
    }

    impl Reset for Scratch {
        fn reset(&mut self) {
            self.value = 0;
            self.items.clear();
        }
    }

    fn scratch_pool(capacity: usize, policy: ExhaustionPolicy) -> ObjectPool<Scratch> {
        ObjectPool::with_factory(capacity, policy, || Scratch {
            value: 0,
            items: Vec::with_capacity(8),
        })
    }

    #[test]
    fn test_pool_acquire_release() {
        let mut pool = scratch_pool(4, ExhaustionPolicy::Reject);

        let handle = pool.acquire().handle().unwrap();
        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.available_count(), 3);
        assert!(pool.is_consistent());

        pool.release(handle).unwrap();
        assert_eq!(pool.active_count(), 0);
        assert_eq!(pool.available_count(), 4);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_release_restores_canonical_shape() {
        let mut pool = scratch_pool(1, ExhaustionPolicy::Reject);

        let handle = pool.acquire().handle().unwrap();
        {
            let record = pool.get_mut(handle).unwrap();
            record.value = 99;
            record.items.extend_from_slice(&[1, 2, 3]);
        }
        pool.release(handle).unwrap();

        let again = pool.acquire().handle().unwrap();
        assert_eq!(again, handle); // Same record reused
        let record = pool.get(again).unwrap();
        assert_eq!(record.value, 0);
        assert!(record.items.is_empty());
        assert!(record.items.capacity() >= 8);
        assert_eq!(pool.total_capacity(), 1);
    }

    #[test]
    fn test_reject_policy() {
        let mut pool = scratch_pool(2, ExhaustionPolicy::Reject);

        assert!(matches!(pool.acquire(), Acquired::Pooled(_)));
        assert!(matches!(pool.acquire(), Acquired::Pooled(_)));
        assert_eq!(pool.acquire(), Acquired::Exhausted);
        assert_eq!(pool.rejections(), 1);
        assert_eq!(pool.total_capacity(), 2);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_allocate_policy() {
        let mut pool = scratch_pool(2, ExhaustionPolicy::Allocate);

        let _ = pool.acquire();
        let _ = pool.acquire();
        let third = pool.acquire();
        assert!(matches!(third, Acquired::Allocated(_)));
        assert_eq!(pool.fallback_allocations(), 1);
        assert_eq!(pool.total_capacity(), 3);
        assert!(pool.is_consistent());

        pool.release(third.handle().unwrap()).unwrap();
        assert_eq!(pool.available_count(), 1);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_double_release_is_refused() {
        let mut pool = scratch_pool(2, ExhaustionPolicy::Reject);

        let handle = pool.acquire().handle().unwrap();
        pool.release(handle).unwrap();
        assert_eq!(pool.release(handle), Err(PoolError::NotActive(handle.index())));
        assert_eq!(pool.available_count(), 2);
        assert!(pool.is_consistent());
    }

    #[test]
    fn test_foreign_handle_is_refused() {
        let mut pool = scratch_pool(2, ExhaustionPolicy::Reject);
        assert!(matches!(
            pool.release(PoolHandle::NULL),
            Err(PoolError::OutOfRange { .. })
        ));
        assert!(pool.get(PoolHandle::NULL).is_none());
    }

    #[test]
    fn test_release_all() {
        let mut pool = scratch_pool(3, ExhaustionPolicy::Reject);
        let handle = pool.acquire().handle().unwrap();
        pool.get_mut(handle).unwrap().value = 5;
        let _ = pool.acquire();

        pool.release_all();
        assert_eq!(pool.available_count(), 3);
        assert_eq!(pool.active_count(), 0);
        assert!(pool.is_consistent());

        let again = pool.acquire().handle().unwrap();
        assert_eq!(pool.get(again).unwrap().value, 0);
    }
}
