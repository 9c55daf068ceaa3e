//! Typed failure reasons for a rejected game action.

use thiserror::Error;

/// Why a game action was rejected before it could mutate world state.
///
/// Bound checks are the only anti-cheat surface this crate owns: range,
/// self-target, and metadata size. Statistical/behavioral detection
/// (aimbot, speedhack, and the like) is out of scope.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ActionError {
    /// Target position is further from the actor than the action's radius allows.
    #[error("target is out of range")]
    OutOfRange,
    /// Actor's health is 0 and the action isn't `RESPAWN`.
    #[error("actor is not alive")]
    NotAlive,
    /// The action's target is invalid for reasons other than range (e.g. attacking self).
    #[error("target is invalid for this action")]
    InvalidTarget,
    /// `ATTACK`'s target lies outside the actor's facing cone.
    #[error("target is outside the attack arc")]
    OutOfCone,
    /// `BUILD_PLACE`/`BUILD_BREAK` addressed a cell or block id that isn't legal for the action.
    #[error("target block is not legal for this action")]
    IllegalBlock,
    /// The action's metadata payload exceeds the 1 KiB limit.
    #[error("metadata payload exceeds the size limit")]
    TooMuchMetadata,
}
