//! # Node Core
//!
//! Zero-allocation Entity Component System (ECS) designed for:
//! - 1,000,000+ entities in a single region
//! - Sub-millisecond tick times
//! - Zero garbage collection pressure
//!
//! ## Architecture Rules
//!
//! 1. **No heap allocations in the dense hot path** - component storage is
//!    pre-allocated; only the per-entity attribute map grows with content
//! 2. **Data-oriented design** - components are stored in contiguous arrays
//! 3. **Cache-friendly iteration** - hot data is packed together
//!
//! ## Example
//!
//! ```rust,ignore
//! use node_core::{EntityKind, Position, World};
//!
//! let mut world = World::new(1_000_000);
//! let player = world.spawn(EntityKind::PLAYER, Position::new(0.0, 0.0));
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod ecs;
pub mod memory;

pub use ecs::{
    AttributeMap, AttributeValue, Component, ComponentStorage, CoarsePosition, Entity, EntityId,
    EntityKind, Facing, Position, Size, Subtype, Velocity, World,
    KIND_ANIMAL, KIND_ITEM, KIND_NPC, KIND_PLAYER, KIND_PROJECTILE, KIND_VEHICLE,
};
pub use memory::{Arena, PoolAllocator, PoolHandle};
