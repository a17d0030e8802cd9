//! # Ring Buffer
//!
//! Fixed-capacity FIFO with bitmask wraparound and a drop-oldest overflow policy.
//!
//! ```text
//!            read                write
//!             │                    │
//!   ┌────┬────┼────┬────┬────┬────┼────┬────┐
//!   │    │    │ A  │ B  │ C  │ D  │    │    │   count = write - read
//!   └────┴────┴────┴────┴────┴────┴────┴────┘   slot  = cursor & mask
//! ```
//!
//! The cursors are free-running and only ever masked when indexing, so a full
//! buffer (`count == capacity`) is distinguishable from an empty one.

/// Largest capacity that still rounds to a representable power of two.
pub const MAX_CAPACITY: usize = 1 << (usize::BITS - 1);

/// A power-of-two ring buffer of small `Copy` items.
///
/// When full, a push overwrites the oldest unconsumed item instead of
/// blocking or failing. The producer is never stalled; stale items are
/// sacrificed in favor of fresh ones.
///
/// # Thread Safety
///
/// This buffer is NOT thread-safe. It is owned by a single tick loop.
///
/// # Example
///
/// ```rust,ignore
/// let mut ring: RingBuffer<u32> = RingBuffer::new(4);
/// for i in 1..=5 {
///     ring.push(i);
/// }
/// assert_eq!(ring.overflow_count(), 1);
/// assert_eq!(ring.pop(), Some(2));
/// ```
pub struct RingBuffer<T: Copy + Default> {
    /// Backing storage, length is always a power of two.
    storage: Box<[T]>,
    /// `capacity - 1`.
    mask: usize,
    /// Free-running read cursor.
    read: usize,
    /// Free-running write cursor.
    write: usize,
    /// Items evicted by drop-oldest.
    overflow_count: u64,
    /// Total successful or degraded pushes.
    pushed: u64,
}

impl<T: Copy + Default> RingBuffer<T> {
    /// Creates a ring buffer holding at least `capacity` items.
    ///
    /// The capacity is rounded up to the next power of two and all storage
    /// is allocated here.
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or cannot be rounded to a power of two.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            capacity <= MAX_CAPACITY,
            "Capacity cannot exceed {MAX_CAPACITY}"
        );
        let capacity = capacity.next_power_of_two();

        Self {
            storage: vec![T::default(); capacity].into_boxed_slice(),
            mask: capacity - 1,
            read: 0,
            write: 0,
            overflow_count: 0,
            pushed: 0,
        }
    }

    /// Returns the (power-of-two) capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    /// Returns the number of unconsumed items.
    #[inline]
    #[must_use]
    pub const fn count(&self) -> usize {
        self.write.wrapping_sub(self.read)
    }

    /// Returns `true` if no items are queued.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.write == self.read
    }

    /// Returns `true` if the next push will evict the oldest item.
    #[inline]
    #[must_use]
    pub fn is_full(&self) -> bool {
        self.count() == self.capacity()
    }

    /// Number of items dropped by the overflow policy since the last reset.
    #[inline]
    #[must_use]
    pub const fn overflow_count(&self) -> u64 {
        self.overflow_count
    }

    /// Number of pushes since the last reset.
    #[inline]
    #[must_use]
    pub const fn pushed_count(&self) -> u64 {
        self.pushed
    }

    /// Pushes an item, dropping the oldest one if the buffer is full.
    ///
    /// Returns `true` on a clean insert, `false` when admission was degraded
    /// (the oldest item was discarded). The item is always admitted.
    #[inline]
    pub fn push(&mut self, item: T) -> bool {
        self.push_evicting(item).is_none()
    }

    /// Pushes an item and hands back the evicted oldest item, if any.
    ///
    /// Use this when queued items own resources that must be returned
    /// elsewhere (e.g. pool handles).
    #[inline]
    pub fn push_evicting(&mut self, item: T) -> Option<T> {
        let evicted = if self.is_full() {
            let oldest = self.storage[self.read & self.mask];
            self.read = self.read.wrapping_add(1);
            self.overflow_count += 1;
            Some(oldest)
        } else {
            None
        };

        self.storage[self.write & self.mask] = item;
        self.write = self.write.wrapping_add(1);
        self.pushed += 1;

        evicted
    }

    /// Removes and returns the oldest item, or `None` if empty.
    #[inline]
    pub fn pop(&mut self) -> Option<T> {
        if self.is_empty() {
            return None;
        }
        let item = self.storage[self.read & self.mask];
        self.read = self.read.wrapping_add(1);
        Some(item)
    }

    /// Returns the oldest item without consuming it.
    #[inline]
    #[must_use]
    pub fn peek(&self) -> Option<T> {
        if self.is_empty() {
            None
        } else {
            Some(self.storage[self.read & self.mask])
        }
    }

    /// Iterates queued items oldest first without consuming them.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        (0..self.count())
            .map(move |offset| self.storage[self.read.wrapping_add(offset) & self.mask])
    }

    /// Drops every queued item and zeroes the metrics.
    ///
    /// Storage is kept; no memory is freed or allocated.
    pub fn reset(&mut self) {
        self.read = 0;
        self.write = 0;
        self.overflow_count = 0;
        self.pushed = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacity_rounds_to_power_of_two() {
        assert_eq!(RingBuffer::<u32>::new(1).capacity(), 1);
        assert_eq!(RingBuffer::<u32>::new(3).capacity(), 4);
        assert_eq!(RingBuffer::<u32>::new(1000).capacity(), 1024);
        assert_eq!(RingBuffer::<u32>::new(1024).capacity(), 1024);
    }

    #[test]
    fn test_fifo_order() {
        let mut ring: RingBuffer<u32> = RingBuffer::new(8);
        assert!(ring.push(1));
        assert!(ring.push(2));
        assert!(ring.push(3));
        assert_eq!(ring.count(), 3);
        assert_eq!(ring.pop(), Some(1));
        assert_eq!(ring.pop(), Some(2));
        assert_eq!(ring.pop(), Some(3));
        assert_eq!(ring.pop(), None);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_drop_oldest_on_overflow() {
        let mut ring: RingBuffer<u32> = RingBuffer::new(4);
        for i in 1..=4 {
            assert!(ring.push(i));
        }
        assert!(ring.is_full());

        assert!(!ring.push(5));
        assert_eq!(ring.count(), 4);
        assert_eq!(ring.overflow_count(), 1);
        assert_eq!(ring.iter().collect::<Vec<_>>(), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_overflow_property_for_power_of_two_capacities() {
        for shift in 0..8 {
            let capacity = 1usize << shift;
            let mut ring: RingBuffer<usize> = RingBuffer::new(capacity);
            for i in 1..=capacity + 1 {
                ring.push(i);
            }
            assert_eq!(ring.count(), capacity);
            assert_eq!(ring.overflow_count(), 1);
            let retained: Vec<_> = ring.iter().collect();
            let expected: Vec<_> = (2..=capacity + 1).collect();
            assert_eq!(retained, expected, "capacity {capacity}");
        }
    }

    #[test]
    fn test_push_evicting_returns_oldest() {
        let mut ring: RingBuffer<u32> = RingBuffer::new(2);
        assert_eq!(ring.push_evicting(10), None);
        assert_eq!(ring.push_evicting(20), None);
        assert_eq!(ring.push_evicting(30), Some(10));
        assert_eq!(ring.peek(), Some(20));
    }

    #[test]
    fn test_wraparound_many_cycles() {
        let mut ring: RingBuffer<u32> = RingBuffer::new(4);
        for round in 0..100u32 {
            ring.push(round);
            ring.push(round + 1000);
            assert_eq!(ring.pop(), Some(round));
            assert_eq!(ring.pop(), Some(round + 1000));
        }
        assert!(ring.is_empty());
        assert_eq!(ring.overflow_count(), 0);
    }

    #[test]
    fn test_reset_clears_queue_and_metrics() {
        let mut ring: RingBuffer<u32> = RingBuffer::new(2);
        for i in 0..5 {
            ring.push(i);
        }
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.overflow_count(), 0);
        assert_eq!(ring.pushed_count(), 0);
        assert_eq!(ring.capacity(), 2);
    }
}
