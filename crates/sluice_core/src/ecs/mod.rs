//! # Entity State
//!
//! Two fixed-capacity entity stores:
//!
//! - [`EntityRegistry`]: canonical state (position, health, liveness) keyed by
//!   generational [`EntityId`]. Written only by the batch processor.
//! - [`EntitySlotPool`]: the simulation-side slot array iterated once per tick.
//!   Each slot keeps a permanent index; liveness lives in an [`AliveBitfield`].
//!
//! ## Design Philosophy
//!
//! - All storage is pre-allocated at creation
//! - Lookups are direct indexing, never searches
//! - Despawn keeps slot memory for reuse

mod entity;
mod registry;
mod slots;
mod vec;

pub use entity::EntityId;
pub use registry::{EntityRecord, EntityRegistry};
pub use slots::{AliveBitfield, EntitySlot, EntitySlotPool, SlotIndex};
pub use vec::Vec2;
