//! # Game Action Handler
//!
//! Dispatches one of the nine player action kinds against world state:
//! runs the universal bound checks first, then mutates the chunk store
//! or entity attributes and returns the deltas produced. On rejection,
//! no partial effect is applied.

use node_sync::ChangeKind;
use node_validation::{
    ActionError, ActionKind as ValidatedKind, ActionRequest, ActorState, BoundsChecker,
    BuildTarget,
};
use node_world::{Block, ChunkStore, Layer};
use oroboros_core::{AttributeValue, EntityId, Facing, Position, World};

/// One of the nine action kinds a player can submit, together with its
/// action-specific payload.
#[derive(Clone, Debug)]
pub enum Action {
    /// Interact with a nearby block or entity; no world mutation of its own.
    Interact {
        /// Target position.
        target: Position,
    },
    /// Attack a target entity.
    Attack {
        /// Target entity.
        target: EntityId,
        /// Target's current position, for range checking.
        target_position: Position,
        /// Damage to apply on a successful hit.
        damage: u32,
    },
    /// Use a held item; world-effect-free from this handler's perspective.
    UseItem {
        /// Metadata payload (item id, target, etc).
        metadata: Vec<u8>,
    },
    /// Pick an item entity up off the ground.
    Pickup {
        /// Item entity being picked up.
        target: EntityId,
        /// Item entity's current position.
        target_position: Position,
    },
    /// Drop a held item; handled purely in inventory attributes upstream.
    Drop {
        /// Metadata payload (item id, quantity).
        metadata: Vec<u8>,
    },
    /// Place a block.
    BuildPlace {
        /// Addressed layer.
        layer: Layer,
        /// Block-space coordinates.
        x: i32,
        /// Block-space coordinates.
        y: i32,
        /// Block id to place.
        block_id: u32,
    },
    /// Break a block back to air.
    BuildBreak {
        /// Addressed layer.
        layer: Layer,
        /// Block-space coordinates.
        x: i32,
        /// Block-space coordinates.
        y: i32,
    },
    /// Play an emote; no world mutation.
    Emote {
        /// Metadata payload (emote id).
        metadata: Vec<u8>,
    },
    /// Respawn after death.
    Respawn,
}

impl Action {
    fn validated_kind(&self) -> ValidatedKind {
        match self {
            Self::Interact { .. } => ValidatedKind::Interact,
            Self::Attack { .. } => ValidatedKind::Attack,
            Self::UseItem { .. } => ValidatedKind::UseItem,
            Self::Pickup { .. } => ValidatedKind::Pickup,
            Self::Drop { .. } => ValidatedKind::Drop,
            Self::BuildPlace { .. } => ValidatedKind::BuildPlace,
            Self::BuildBreak { .. } => ValidatedKind::BuildBreak,
            Self::Emote { .. } => ValidatedKind::Emote,
            Self::Respawn => ValidatedKind::Respawn,
        }
    }

    fn target_position(&self, actor_position: Position) -> Position {
        match self {
            Self::Attack { target_position, .. } | Self::Pickup { target_position, .. } => {
                *target_position
            }
            Self::Interact { target } => *target,
            Self::BuildPlace { x, y, .. } | Self::BuildBreak { x, y, .. } => {
                Position::new(*x as f32, *y as f32)
            }
            Self::UseItem { .. } | Self::Drop { .. } | Self::Emote { .. } | Self::Respawn => {
                actor_position
            }
        }
    }

    fn metadata_len(&self) -> usize {
        match self {
            Self::UseItem { metadata } | Self::Drop { metadata } | Self::Emote { metadata } => {
                metadata.len()
            }
            _ => 0,
        }
    }
}

/// Dispatches actions against the node's world state, after running them
/// through [`BoundsChecker`].
pub struct ActionHandler {
    checker: BoundsChecker,
}

impl Default for ActionHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl ActionHandler {
    /// Creates a handler with the spec's default bound-check thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            checker: BoundsChecker::new(),
        }
    }

    /// Runs `action`, submitted by `actor_id`, against `world` and `store`.
    ///
    /// # Errors
    ///
    /// Returns the first bound check `action` fails, with no mutation
    /// applied.
    pub fn handle(
        &self,
        world: &mut World,
        store: &mut ChunkStore,
        actor_id: EntityId,
        now_ms: u64,
        action: Action,
    ) -> Result<Vec<ChangeKind>, ActionError> {
        let actor_index = actor_id.index() as usize;
        let actor_position = world.positions.get(actor_index).copied().unwrap_or_default();
        let actor_health = world
            .attributes(actor_id)
            .map_or(100.0, |attrs| attrs.int_or("health", 100) as f32);
        let actor_facing = world.facings.get(actor_index).copied().unwrap_or(Facing::NORTH).unit_vector();

        let build_target = match &action {
            Action::BuildPlace { layer, x, y, block_id } => {
                let current = store.get_block(*layer, *x, *y);
                Some(BuildTarget {
                    is_air: current.is_air(),
                    registered: store.is_registered(*block_id) || *block_id == 0,
                    buildable: *block_id != 0,
                })
            }
            Action::BuildBreak { layer, x, y } => {
                let current = store.get_block(*layer, *x, *y);
                Some(BuildTarget {
                    is_air: current.is_air(),
                    registered: true,
                    buildable: true,
                })
            }
            _ => None,
        };

        let target_entity = match &action {
            Action::Attack { target, .. } | Action::Pickup { target, .. } => Some(*target),
            _ => None,
        };

        let request = ActionRequest {
            kind: action.validated_kind(),
            actor: ActorState {
                entity_id: actor_id,
                position: actor_position,
                health: actor_health,
                facing: actor_facing,
            },
            target_position: action.target_position(actor_position),
            target_entity,
            build_target,
            metadata_len: action.metadata_len(),
        };

        self.checker.check(&request)?;

        Ok(self.apply(world, store, actor_id, now_ms, action))
    }

    fn apply(
        &self,
        world: &mut World,
        store: &mut ChunkStore,
        actor_id: EntityId,
        now_ms: u64,
        action: Action,
    ) -> Vec<ChangeKind> {
        match action {
            Action::BuildPlace { layer, x, y, block_id } => {
                let _ = store.set_block(layer, x, y, Block::new(block_id), now_ms);
                vec![ChangeKind::BlockSet {
                    x,
                    y,
                    layer: layer as u8,
                    block_id: block_id as u16,
                }]
            }
            Action::BuildBreak { layer, x, y } => {
                let _ = store.set_block(layer, x, y, Block::air(), now_ms);
                vec![ChangeKind::BlockDelete { x, y, layer: layer as u8 }]
            }
            Action::Attack { target, damage, .. } => {
                let attrs = world.attributes_mut(target);
                let health = (attrs.int_or("health", 100) - i64::from(damage)).max(0);
                attrs.set("health", AttributeValue::Int(health));
                vec![ChangeKind::EntityAttr {
                    entity_id: u64::from(target.index()),
                    key: "health".into(),
                    value: node_sync::AttrValue::Int(health),
                }]
            }
            Action::Respawn => {
                let attrs = world.attributes_mut(actor_id);
                attrs.set("health", AttributeValue::Int(100));
                vec![ChangeKind::EntityAttr {
                    entity_id: u64::from(actor_id.index()),
                    key: "health".into(),
                    value: node_sync::AttrValue::Int(100),
                }]
            }
            Action::Interact { target } => {
                let layer = Layer::Active;
                let x = target.x.floor() as i32;
                let y = target.y.floor() as i32;
                match store.interact(layer, x, y, u64::from(actor_id.index()), now_ms) {
                    Some(block) => vec![ChangeKind::BlockSet { x, y, layer: layer as u8, block_id: block.id as u16 }],
                    None => Vec::new(),
                }
            }
            Action::UseItem { .. } | Action::Pickup { .. } | Action::Drop { .. } | Action::Emote { .. } => {
                Vec::new()
            }
        }
    }
}
