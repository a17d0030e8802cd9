//! # Sluice Core
//!
//! Allocation-free containers for the Sluice event pipeline:
//! - Power-of-two ring buffer with drop-oldest overflow
//! - Pre-allocated object pool with shape-preserving reset
//! - Canonical entity registry with O(1) lookup
//! - Fixed-size entity slot pool with an alive bitfield
//!
//! ## Architecture Rules
//!
//! 1. **No heap allocations in hot path** - All memory is pre-allocated
//! 2. **No searching** - Every lookup is a direct index
//! 3. **Single owner** - Nothing here is shared across threads
//!
//! ## Example
//!
//! ```rust,ignore
//! use sluice_core::{ObjectPool, RingBuffer, ExhaustionPolicy};
//!
//! let mut ring: RingBuffer<PoolHandle> = RingBuffer::new(1000); // rounds to 1024
//! let mut pool: ObjectPool<Payload> = ObjectPool::new(1024, ExhaustionPolicy::Reject);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod ecs;
pub mod memory;

pub use ecs::{
    AliveBitfield, EntityId, EntityRecord, EntityRegistry, EntitySlot, EntitySlotPool, SlotIndex,
    Vec2,
};
pub use memory::{
    Acquired, ExhaustionPolicy, ObjectPool, PoolError, PoolHandle, Reset, RingBuffer,
};
