//! # Node Validation
//!
//! Bound checks for the nine game action kinds a player can submit:
//! liveness, per-action range, self-target refusal, build-cell legality,
//! and metadata size.
//!
//! ## Scope
//!
//! This is the only anti-cheat surface a node owns. Statistical or
//! behavioral cheat detection (aimbot heuristics, speedhack detection,
//! replay-based review) is out of scope; a rejected action is reported to
//! the client as a typed [`ActionError`] with no partial world mutation.

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod action;
pub mod error;

pub use action::{
    ActionKind, ActionRequest, ActorState, BoundsChecker, BuildTarget, MAX_METADATA_BYTES,
};
pub use error::ActionError;
