//! Game action taxonomy and the universal precondition checks run before
//! a handler is allowed to mutate world state.

use oroboros_core::{EntityId, Position};

use crate::error::ActionError;

/// Maximum metadata payload size, in bytes, for any action.
pub const MAX_METADATA_BYTES: usize = 1024;

/// Cosine of half the melee attack arc (60 degrees either side of facing,
/// a 120-degree total cone).
pub const ATTACK_ARC_COS: f32 = 0.5;

/// One of the nine action kinds a player can submit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActionKind {
    /// Interact with a nearby block or entity.
    Interact,
    /// Attack a target entity.
    Attack,
    /// Use a held item.
    UseItem,
    /// Pick an item up off the ground.
    Pickup,
    /// Drop a held item.
    Drop,
    /// Place a block.
    BuildPlace,
    /// Break a block.
    BuildBreak,
    /// Play an emote; no world effect.
    Emote,
    /// Respawn after death. The only action a dead player may submit.
    Respawn,
}

impl ActionKind {
    /// The maximum distance, in blocks, between the actor and the action's
    /// target for the action to be in range.
    #[must_use]
    pub const fn radius(self) -> f32 {
        match self {
            Self::BuildPlace | Self::BuildBreak => 5.0,
            Self::Interact | Self::Pickup => 3.0,
            Self::Attack => 2.0,
            Self::UseItem | Self::Drop | Self::Emote | Self::Respawn => f32::INFINITY,
        }
    }

    /// Whether this action requires the actor to be alive.
    #[must_use]
    pub const fn requires_alive(self) -> bool {
        !matches!(self, Self::Respawn)
    }
}

/// The actor's liveness and position at the time the action is evaluated.
#[derive(Clone, Copy, Debug)]
pub struct ActorState {
    /// The acting entity's id, used to reject self-targeted attacks.
    pub entity_id: EntityId,
    /// The acting entity's current position.
    pub position: Position,
    /// The acting entity's current health. `0.0` means dead.
    pub health: f32,
    /// The acting entity's facing, as a unit vector. Used for `ATTACK`'s
    /// cone check; meaningless for other action kinds.
    pub facing: (f32, f32),
}

/// The state of the block cell a `BUILD_PLACE`/`BUILD_BREAK` action addresses.
#[derive(Clone, Copy, Debug)]
pub struct BuildTarget {
    /// Whether the addressed cell currently holds air (id `0`).
    pub is_air: bool,
    /// Whether the block id involved (the id being placed, or the id
    /// occupying the cell being broken) is within the registered range.
    pub registered: bool,
    /// Whether the block id involved is marked placeable/breakable.
    pub buildable: bool,
}

/// A single action request to be checked before the handler runs.
#[derive(Clone, Copy, Debug)]
pub struct ActionRequest {
    /// Which of the nine action kinds this is.
    pub kind: ActionKind,
    /// The acting player's current state.
    pub actor: ActorState,
    /// The world position the action targets.
    pub target_position: Position,
    /// The entity targeted, if any (set for `ATTACK`, `INTERACT`, `PICKUP`).
    pub target_entity: Option<EntityId>,
    /// The build-cell state, required for `BUILD_PLACE`/`BUILD_BREAK`.
    pub build_target: Option<BuildTarget>,
    /// Size, in bytes, of the action's metadata payload.
    pub metadata_len: usize,
}

/// Runs every action through the universal preconditions before a handler
/// is allowed to mutate world state.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoundsChecker {
    max_metadata_bytes: usize,
}

impl BoundsChecker {
    /// Creates a checker using the spec's default 1 KiB metadata limit.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_metadata_bytes: MAX_METADATA_BYTES,
        }
    }

    /// Creates a checker with a custom metadata size limit, for tests or
    /// deployments with a different limits policy.
    #[must_use]
    pub const fn with_max_metadata_bytes(max_metadata_bytes: usize) -> Self {
        Self { max_metadata_bytes }
    }

    /// Checks `request` against every universal precondition, in the order
    /// the spec lists them: liveness, range, self-target, attack cone,
    /// build-cell legality, metadata size.
    ///
    /// # Errors
    ///
    /// Returns the first precondition `request` fails.
    pub fn check(&self, request: &ActionRequest) -> Result<(), ActionError> {
        if request.kind.requires_alive() && request.actor.health <= 0.0 {
            return Err(ActionError::NotAlive);
        }

        let radius = request.kind.radius();
        if radius.is_finite() {
            let distance_sq = request.actor.position.distance_squared(request.target_position);
            if distance_sq > radius * radius {
                return Err(ActionError::OutOfRange);
            }
        }

        if request.kind == ActionKind::Attack {
            if let Some(target) = request.target_entity {
                if target == request.actor.entity_id {
                    return Err(ActionError::InvalidTarget);
                }
            }

            if !Self::within_attack_cone(request.actor.position, request.actor.facing, request.target_position) {
                return Err(ActionError::OutOfCone);
            }
        }

        match request.kind {
            ActionKind::BuildPlace => match request.build_target {
                Some(target) if target.is_air && target.registered && target.buildable => {}
                _ => return Err(ActionError::IllegalBlock),
            },
            ActionKind::BuildBreak => match request.build_target {
                Some(target) if !target.is_air && target.registered && target.buildable => {}
                _ => return Err(ActionError::IllegalBlock),
            },
            _ => {}
        }

        if request.metadata_len > self.max_metadata_bytes {
            return Err(ActionError::TooMuchMetadata);
        }

        Ok(())
    }

    /// Whether `target` lies within the actor's attack cone: the dot
    /// product of the normalized facing and normalized target vector must
    /// exceed [`ATTACK_ARC_COS`]. A target on top of the actor (zero-length
    /// target vector) is treated as in range, since no direction applies.
    fn within_attack_cone(actor_position: Position, facing: (f32, f32), target_position: Position) -> bool {
        let to_target = (target_position.x - actor_position.x, target_position.y - actor_position.y);
        let length = (to_target.0 * to_target.0 + to_target.1 * to_target.1).sqrt();
        if length <= f32::EPSILON {
            return true;
        }
        let normalized = (to_target.0 / length, to_target.1 / length);
        normalized.0 * facing.0 + normalized.1 * facing.1 >= ATTACK_ARC_COS
    }
}
