//! # Memory Management
//!
//! Pre-allocated queues and pools for zero-allocation request handling.
//!
//! ## Design Philosophy
//!
//! All memory is allocated once at startup. During a tick:
//! - No heap allocations
//! - No blocking
//! - Overload degrades predictably (drop-oldest, reject)

mod pool;
mod ring;

pub use pool::{Acquired, ExhaustionPolicy, ObjectPool, PoolError, PoolHandle, Reset};
pub use ring::RingBuffer;
