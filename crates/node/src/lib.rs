//! # Regional Node
//!
//! The regional node binary's shared library: the authoritative entity
//! simulation, action handler, and tick loop that runs against a
//! [`node_world::ChunkStore`] and is driven from `bin/server.rs`.
//!
//! ## Modules
//!
//! - `action`: the nine player action kinds and their bound-checked
//!   dispatch against world state
//! - `events`: the in-process event bus used for logging/metrics
//! - `game_loop`: the tick loop (behavior dispatch, movement, delta commit)
//! - `gameplay`: NPC/animal behavior state machines
//! - `physics`: axis-separated 2D movement and collision

pub mod action;
pub mod config;
pub mod events;
pub mod game_loop;
pub mod gameplay;
pub mod physics;

pub use oroboros_core as core;

pub use action::{Action, ActionHandler};
pub use config::NodeConfig;
pub use events::{EventBus, EventReceiver, EventSender, GameEvent};
pub use game_loop::{GameLoop, GameLoopConfig, TickStats, TickStatsAccumulator};
