//! # Component System
//!
//! Components are pure data containers with no behavior.
//! They must be Copy and have a fixed size for zero-allocation storage.

use bytemuck::{Pod, Zeroable};

/// Marker trait for ECS components.
///
/// Components must be:
/// - `Copy`: No heap allocations, bitwise copyable
/// - `Pod`: Plain old data, safe to transmute
/// - `Zeroable`: Can be safely zeroed
/// - `Default`: Must have a default value for pre-allocation
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Default, Pod, Zeroable)]
/// #[repr(C)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Position {
///     const ID: u8 = 0;
/// }
/// ```
pub trait Component: Copy + Pod + Zeroable + Default + Send + Sync + 'static {
    /// Unique identifier for this component type (0-63).
    ///
    /// This ID is used for the component bitmask in entities.
    const ID: u8;
}

/// Precise floating-point position for an entity, in block-space coordinates.
///
/// This is the authoritative position used by movement and collision; the
/// coarse integer position ([`CoarsePosition`]) used to address chunks is
/// derived from it by truncation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Position {
    /// X coordinate in block-space.
    pub x: f32,
    /// Y coordinate in block-space.
    pub y: f32,
}

impl Component for Position {
    const ID: u8 = 0;
}

impl Position {
    /// Creates a new position.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the squared distance to another position.
    ///
    /// This avoids the sqrt call for distance comparisons.
    #[inline]
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx * dx + dy * dy
    }

    /// Truncates to the coarse integer block coordinate containing this position.
    #[inline]
    #[must_use]
    pub fn coarse(self) -> CoarsePosition {
        CoarsePosition::new(self.x.floor() as i32, self.y.floor() as i32)
    }
}

/// Coarse integer block position, used to address chunks and `BigChunk`s.
///
/// Kept alongside [`Position`] rather than recomputed on every read so that
/// chunk/`BigChunk` membership can be compared cheaply without floating point.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct CoarsePosition {
    /// X coordinate in whole blocks.
    pub x: i32,
    /// Y coordinate in whole blocks.
    pub y: i32,
}

impl Component for CoarsePosition {
    const ID: u8 = 1;
}

impl CoarsePosition {
    /// Creates a new coarse position.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Velocity component for entities, in blocks per second.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Velocity {
    /// X velocity component.
    pub x: f32,
    /// Y velocity component.
    pub y: f32,
}

impl Component for Velocity {
    const ID: u8 = 2;
}

impl Velocity {
    /// Creates a new velocity.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the speed (magnitude) of this velocity.
    #[inline]
    #[must_use]
    pub fn speed(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

/// Four-way facing direction, computed from the dominant velocity axis.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Facing {
    /// 0 = north, 1 = east, 2 = south, 3 = west.
    pub direction: u8,
    _padding: [u8; 3],
}

impl Component for Facing {
    const ID: u8 = 3;
}

impl Facing {
    /// North-facing (the default orientation).
    pub const NORTH: Self = Self { direction: 0, _padding: [0; 3] };
    /// East-facing.
    pub const EAST: Self = Self { direction: 1, _padding: [0; 3] };
    /// South-facing.
    pub const SOUTH: Self = Self { direction: 2, _padding: [0; 3] };
    /// West-facing.
    pub const WEST: Self = Self { direction: 3, _padding: [0; 3] };

    /// Derives the four-way facing from a velocity vector's dominant axis.
    ///
    /// Returns `None` for a near-zero velocity, leaving the previous facing
    /// unchanged is the caller's responsibility.
    #[must_use]
    pub fn from_velocity(vel: Velocity) -> Option<Self> {
        if vel.x == 0.0 && vel.y == 0.0 {
            return None;
        }
        Some(if vel.x.abs() >= vel.y.abs() {
            if vel.x >= 0.0 { Self::EAST } else { Self::WEST }
        } else if vel.y >= 0.0 {
            Self::SOUTH
        } else {
            Self::NORTH
        })
    }

    /// Returns the unit vector this facing points along.
    #[must_use]
    pub fn unit_vector(self) -> (f32, f32) {
        match self.direction {
            0 => (0.0, -1.0),
            1 => (1.0, 0.0),
            2 => (0.0, 1.0),
            _ => (-1.0, 0.0),
        }
    }
}

/// Axis-aligned bounding box half-extents for collision and attack-range checks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Size {
    /// Half-width along the X axis.
    pub half_width: f32,
    /// Half-height along the Y axis.
    pub half_height: f32,
}

impl Component for Size {
    const ID: u8 = 4;
}

impl Size {
    /// Creates a new size.
    #[inline]
    #[must_use]
    pub const fn new(half_width: f32, half_height: f32) -> Self {
        Self { half_width, half_height }
    }
}

/// Entity type tag distinguishing players, NPCs, animals, items, projectiles
/// and vehicles. Behavior dispatch in the simulator keys off this field.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct EntityKind {
    /// Raw tag value; see the `KIND_*` constants.
    pub tag: u8,
    _padding: [u8; 3],
}

impl Component for EntityKind {
    const ID: u8 = 5;
}

/// Player-controlled entity.
pub const KIND_PLAYER: u8 = 0;
/// Villager/trader/guard NPC.
pub const KIND_NPC: u8 = 1;
/// Cow/sheep/chicken/pig/horse animal.
pub const KIND_ANIMAL: u8 = 2;
/// A dropped or placeable item entity.
pub const KIND_ITEM: u8 = 3;
/// A projectile fired by an attack or ability.
pub const KIND_PROJECTILE: u8 = 4;
/// A rideable vehicle entity.
pub const KIND_VEHICLE: u8 = 5;

impl EntityKind {
    /// Player-controlled entity.
    pub const PLAYER: Self = Self { tag: KIND_PLAYER, _padding: [0; 3] };
    /// Villager/trader/guard NPC.
    pub const NPC: Self = Self { tag: KIND_NPC, _padding: [0; 3] };
    /// Cow/sheep/chicken/pig/horse animal.
    pub const ANIMAL: Self = Self { tag: KIND_ANIMAL, _padding: [0; 3] };
    /// A dropped or placeable item entity.
    pub const ITEM: Self = Self { tag: KIND_ITEM, _padding: [0; 3] };
    /// A projectile fired by an attack or ability.
    pub const PROJECTILE: Self = Self { tag: KIND_PROJECTILE, _padding: [0; 3] };
    /// A rideable vehicle entity.
    pub const VEHICLE: Self = Self { tag: KIND_VEHICLE, _padding: [0; 3] };
}

/// NPC/animal subtype tag. Meaningless on players, items, projectiles and
/// vehicles; interpreted against `EntityKind::tag` by the gameplay
/// behavior dispatch (`NpcKind`/`AnimalKind`), not by the ECS itself.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Subtype {
    /// Raw subtype tag.
    pub tag: u8,
    _padding: [u8; 3],
}

impl Component for Subtype {
    const ID: u8 = 6;
}

impl Subtype {
    /// Creates a subtype tag.
    #[inline]
    #[must_use]
    pub const fn new(tag: u8) -> Self {
        Self { tag, _padding: [0; 3] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_distance() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_position_coarse_truncates_toward_negative_infinity() {
        let pos = Position::new(-1.5, 3.7);
        let coarse = pos.coarse();
        assert_eq!(coarse, CoarsePosition::new(-2, 3));
    }

    #[test]
    fn test_facing_from_velocity_dominant_axis() {
        assert_eq!(Facing::from_velocity(Velocity::new(5.0, 1.0)), Some(Facing::EAST));
        assert_eq!(Facing::from_velocity(Velocity::new(-5.0, 1.0)), Some(Facing::WEST));
        assert_eq!(Facing::from_velocity(Velocity::new(0.0, 5.0)), Some(Facing::SOUTH));
        assert_eq!(Facing::from_velocity(Velocity::new(0.0, -5.0)), Some(Facing::NORTH));
        assert_eq!(Facing::from_velocity(Velocity::new(0.0, 0.0)), None);
    }

    #[test]
    fn test_component_sizes() {
        assert_eq!(std::mem::size_of::<Position>(), 8);
        assert_eq!(std::mem::size_of::<Velocity>(), 8);
        assert_eq!(std::mem::size_of::<CoarsePosition>(), 8);
    }
}
