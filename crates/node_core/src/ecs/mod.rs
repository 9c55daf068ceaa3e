//! # Entity Component System
//!
//! A zero-allocation ECS designed for maximum performance.
//!
//! ## Design Philosophy
//!
//! - Dense component storage is pre-allocated at world creation
//! - Components are stored in dense arrays for cache efficiency
//! - Entity IDs are simple indices with generation counters
//! - No dynamic dispatch in hot paths
//! - The one exception to pre-allocation is the attribute map, whose shape
//!   (health, hunger, inventory, behavior state) is open-ended per entity

mod attributes;
mod component;
mod entity;
mod storage;
mod world;

pub use attributes::{AttributeMap, AttributeValue};
pub use component::{
    Component, CoarsePosition, EntityKind, Facing, Position, Size, Subtype, Velocity,
    KIND_ANIMAL, KIND_ITEM, KIND_NPC, KIND_PLAYER, KIND_PROJECTILE, KIND_VEHICLE,
};
pub use entity::{Entity, EntityId};
pub use storage::ComponentStorage;
pub use world::World;
