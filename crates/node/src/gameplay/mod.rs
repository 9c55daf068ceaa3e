//! # Gameplay Systems
//!
//! Per-entity-kind behavior state machines run by the simulator.

pub mod npc;

pub use npc::{step_animal, step_npc, AnimalKind, BehaviorState, NpcKind};
