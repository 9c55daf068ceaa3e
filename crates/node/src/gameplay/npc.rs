//! # NPC & Animal Behaviors
//!
//! Per-kind behavior state machines run by the simulator's capability
//! dispatch: NPC variants (villager, trader, guard) cycle
//! idle -> wander -> follow; animal variants (cow, sheep) cycle
//! idle -> wander, with cow additionally extending into
//! move-to-grass -> eat.
//!
//! A behavior panicking mid-tick is caught by the caller with
//! `catch_unwind` and disables that entity's AI rather than the tick.

use oroboros_core::{AttributeMap, AttributeValue, Position};

/// NPC subtype. Each drives its own idle/wander/follow thresholds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NpcKind {
    /// Stationary-leaning trader; short wander radius, no follow.
    Villager,
    /// Trader; restocks, does not wander far.
    Trader,
    /// Guard; follows a patrol point and pursues nearby threats.
    Guard,
}

impl NpcKind {
    /// Encodes this subtype into the entity's raw `Subtype` component tag.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Villager => 0,
            Self::Trader => 1,
            Self::Guard => 2,
        }
    }

    /// Decodes a raw `Subtype` component tag, defaulting unrecognized
    /// values to `Villager`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Trader,
            2 => Self::Guard,
            _ => Self::Villager,
        }
    }
}

/// Animal subtype.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimalKind {
    /// Grazes; extends into move-to-grass/eat.
    Cow,
    /// Wanders in small flocks.
    Sheep,
    /// Wanders, flees when approached.
    Chicken,
    /// Wanders, roots for food.
    Pig,
    /// Wanders; can be mounted (mounting itself is out of scope here).
    Horse,
}

impl AnimalKind {
    /// Encodes this subtype into the entity's raw `Subtype` component tag.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        match self {
            Self::Cow => 0,
            Self::Sheep => 1,
            Self::Chicken => 2,
            Self::Pig => 3,
            Self::Horse => 4,
        }
    }

    /// Decodes a raw `Subtype` component tag, defaulting unrecognized
    /// values to `Cow`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Sheep,
            2 => Self::Chicken,
            3 => Self::Pig,
            4 => Self::Horse,
            _ => Self::Cow,
        }
    }
}

/// The behavior state machine state, stored in the entity's attribute map
/// under the `"state"`/`"state_timer"`/`"target_x"`/`"target_y"` keys.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BehaviorState {
    /// Standing still for `remaining` more seconds.
    Idle {
        /// Seconds left before picking a new wander target.
        remaining: f32,
    },
    /// Walking toward `target`.
    Wander {
        /// Destination position.
        target: Position,
    },
    /// Following another entity (NPC guard only).
    Follow {
        /// Entity being followed.
        lead_index: u32,
    },
    /// Walking toward a grass cell to graze (cow only).
    MoveToGrass {
        /// Grass cell position.
        target: Position,
    },
    /// Grazing in place for `remaining` more seconds (cow only).
    Eat {
        /// Seconds left before returning to idle.
        remaining: f32,
    },
}

const STATE_IDLE: &str = "idle";
const STATE_WANDER: &str = "wander";
const STATE_FOLLOW: &str = "follow";
const STATE_MOVE_TO_GRASS: &str = "move_to_grass";
const STATE_EAT: &str = "eat";

impl BehaviorState {
    /// Reads the current state out of an entity's attribute map, defaulting
    /// to idle with no time remaining (so the first tick immediately rolls
    /// a wander target).
    #[must_use]
    pub fn read(attributes: &AttributeMap) -> Self {
        match attributes.get("state").and_then(AttributeValue::as_text) {
            Some(STATE_WANDER) => Self::Wander {
                target: Position::new(
                    attributes.int_or("target_x", 0) as f32,
                    attributes.int_or("target_y", 0) as f32,
                ),
            },
            Some(STATE_FOLLOW) => Self::Follow {
                lead_index: attributes.int_or("lead_index", 0) as u32,
            },
            Some(STATE_MOVE_TO_GRASS) => Self::MoveToGrass {
                target: Position::new(
                    attributes.int_or("target_x", 0) as f32,
                    attributes.int_or("target_y", 0) as f32,
                ),
            },
            Some(STATE_EAT) => Self::Eat {
                remaining: attributes.get("state_timer").and_then(AttributeValue::as_float).unwrap_or(0.0) as f32,
            },
            _ => Self::Idle {
                remaining: attributes.get("state_timer").and_then(AttributeValue::as_float).unwrap_or(0.0) as f32,
            },
        }
    }

    /// Writes this state back into the attribute map.
    pub fn write(self, attributes: &mut AttributeMap) {
        match self {
            Self::Idle { remaining } => {
                attributes.set("state", AttributeValue::Text(STATE_IDLE.into()));
                attributes.set("state_timer", AttributeValue::Float(f64::from(remaining)));
            }
            Self::Wander { target } => {
                attributes.set("state", AttributeValue::Text(STATE_WANDER.into()));
                attributes.set("target_x", AttributeValue::Int(target.x as i64));
                attributes.set("target_y", AttributeValue::Int(target.y as i64));
            }
            Self::Follow { lead_index } => {
                attributes.set("state", AttributeValue::Text(STATE_FOLLOW.into()));
                attributes.set("lead_index", AttributeValue::Int(i64::from(lead_index)));
            }
            Self::MoveToGrass { target } => {
                attributes.set("state", AttributeValue::Text(STATE_MOVE_TO_GRASS.into()));
                attributes.set("target_x", AttributeValue::Int(target.x as i64));
                attributes.set("target_y", AttributeValue::Int(target.y as i64));
            }
            Self::Eat { remaining } => {
                attributes.set("state", AttributeValue::Text(STATE_EAT.into()));
                attributes.set("state_timer", AttributeValue::Float(f64::from(remaining)));
            }
        }
    }
}

/// Picks a random-looking but deterministic wander target within `radius`
/// blocks of `origin`, using `seed` so repeated calls with advancing seeds
/// spread targets around the compass rather than always picking the same
/// direction.
#[must_use]
pub fn pick_wander_target(origin: Position, radius: f32, seed: u64) -> Position {
    let angle = (seed % 360) as f32 * std::f32::consts::PI / 180.0;
    let distance = radius * (0.3 + 0.7 * ((seed / 360) % 100) as f32 / 100.0);
    Position::new(origin.x + angle.cos() * distance, origin.y + angle.sin() * distance)
}

/// Advances an NPC's behavior state machine by `dt` seconds. Returns the
/// new state and, when the state calls for movement this tick, the target
/// position to move toward.
#[must_use]
pub fn step_npc(
    kind: NpcKind,
    state: BehaviorState,
    position: Position,
    nearby_player: Option<(Position, u32)>,
    dt: f32,
    seed: u64,
) -> (BehaviorState, Option<Position>) {
    let wander_radius = match kind {
        NpcKind::Villager | NpcKind::Trader => 4.0,
        NpcKind::Guard => 8.0,
    };
    let detection_range = match kind {
        NpcKind::Villager | NpcKind::Trader => 0.0,
        NpcKind::Guard => 10.0,
    };

    if kind == NpcKind::Guard {
        if let Some((player_pos, player_index)) = nearby_player {
            if position.distance_squared(player_pos) <= detection_range * detection_range {
                return (BehaviorState::Follow { lead_index: player_index }, Some(player_pos));
            }
        }
    }

    match state {
        BehaviorState::Idle { remaining } if remaining > 0.0 => {
            (BehaviorState::Idle { remaining: remaining - dt }, None)
        }
        BehaviorState::Idle { .. } => {
            let target = pick_wander_target(position, wander_radius, seed);
            (BehaviorState::Wander { target }, Some(target))
        }
        BehaviorState::Wander { target } => {
            if position.distance_squared(target) < 0.25 {
                (BehaviorState::Idle { remaining: 2.0 + (seed % 3) as f32 }, None)
            } else {
                (BehaviorState::Wander { target }, Some(target))
            }
        }
        BehaviorState::Follow { lead_index } => match nearby_player {
            Some((player_pos, index)) if index == lead_index => {
                (BehaviorState::Follow { lead_index }, Some(player_pos))
            }
            _ => (BehaviorState::Idle { remaining: 1.0 }, None),
        },
        other => (other, None),
    }
}

/// Advances an animal's behavior state machine by `dt` seconds. Cows
/// additionally cycle through grazing when a grass cell is supplied.
#[must_use]
pub fn step_animal(
    kind: AnimalKind,
    state: BehaviorState,
    position: Position,
    nearest_grass: Option<Position>,
    dt: f32,
    seed: u64,
) -> (BehaviorState, Option<Position>) {
    let wander_radius = 3.0;

    match state {
        BehaviorState::Idle { remaining } if remaining > 0.0 => {
            (BehaviorState::Idle { remaining: remaining - dt }, None)
        }
        BehaviorState::Idle { .. } => {
            if kind == AnimalKind::Cow {
                if let Some(grass) = nearest_grass {
                    return (BehaviorState::MoveToGrass { target: grass }, Some(grass));
                }
            }
            let target = pick_wander_target(position, wander_radius, seed);
            (BehaviorState::Wander { target }, Some(target))
        }
        BehaviorState::Wander { target } => {
            if position.distance_squared(target) < 0.25 {
                (BehaviorState::Idle { remaining: 1.0 + (seed % 4) as f32 }, None)
            } else {
                (BehaviorState::Wander { target }, Some(target))
            }
        }
        BehaviorState::MoveToGrass { target } => {
            if position.distance_squared(target) < 0.25 {
                (BehaviorState::Eat { remaining: 3.0 }, None)
            } else {
                (BehaviorState::MoveToGrass { target }, Some(target))
            }
        }
        BehaviorState::Eat { remaining } if remaining > 0.0 => {
            (BehaviorState::Eat { remaining: remaining - dt }, None)
        }
        BehaviorState::Eat { .. } => (BehaviorState::Idle { remaining: 2.0 }, None),
        other => (other, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn villager_idles_then_wanders() {
        let origin = Position::new(0.0, 0.0);
        let (state, target) = step_npc(NpcKind::Villager, BehaviorState::Idle { remaining: 0.0 }, origin, None, 1.0, 42);
        assert!(matches!(state, BehaviorState::Wander { .. }));
        assert!(target.is_some());
    }

    #[test]
    fn guard_follows_player_in_detection_range() {
        let origin = Position::new(0.0, 0.0);
        let player = (Position::new(1.0, 0.0), 7);
        let (state, target) = step_npc(NpcKind::Guard, BehaviorState::Idle { remaining: 5.0 }, origin, Some(player), 1.0, 1);
        assert_eq!(state, BehaviorState::Follow { lead_index: 7 });
        assert_eq!(target, Some(player.0));
    }

    #[test]
    fn cow_moves_to_grass_then_eats() {
        let origin = Position::new(0.0, 0.0);
        let grass = Position::new(0.2, 0.0);
        let (state, _) = step_animal(AnimalKind::Cow, BehaviorState::Idle { remaining: 0.0 }, origin, Some(grass), 1.0, 5);
        assert!(matches!(state, BehaviorState::MoveToGrass { .. }));

        let (state, _) = step_animal(AnimalKind::Cow, BehaviorState::MoveToGrass { target: grass }, grass, Some(grass), 1.0, 5);
        assert!(matches!(state, BehaviorState::Eat { .. }));
    }

    #[test]
    fn npc_and_animal_subtype_tags_round_trip() {
        for kind in [NpcKind::Villager, NpcKind::Trader, NpcKind::Guard] {
            assert_eq!(NpcKind::from_u8(kind.as_u8()), kind);
        }
        for kind in [AnimalKind::Cow, AnimalKind::Sheep, AnimalKind::Chicken, AnimalKind::Pig, AnimalKind::Horse] {
            assert_eq!(AnimalKind::from_u8(kind.as_u8()), kind);
        }
        assert_eq!(NpcKind::from_u8(255), NpcKind::Villager);
        assert_eq!(AnimalKind::from_u8(255), AnimalKind::Cow);
    }

    #[test]
    fn behavior_state_round_trips_through_attribute_map() {
        let mut attrs = AttributeMap::new();
        let state = BehaviorState::Wander { target: Position::new(3.0, -2.0) };
        state.write(&mut attrs);
        assert_eq!(BehaviorState::read(&attrs), state);
    }
}
