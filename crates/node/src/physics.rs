//! # Movement & Collision
//!
//! Axis-separated 2D movement against the chunk store's block-passability
//! capability. Run once per tick, after behaviors have produced intended
//! moves and before deltas are committed.
//!
//! On collision the offending axis component of the move is zeroed; the
//! other axis may still advance ("wall slide"). Entity-entity AABB
//! intersection likewise halts motion and fires `on_collision`.

use node_world::{ChunkStore, Layer};
use oroboros_core::{Position, Size};

/// Axis-aligned bounding box in 2D block space, used for entity-entity
/// collision and attack-range cone checks.
#[derive(Clone, Copy, Debug)]
pub struct Aabb2 {
    /// Minimum corner.
    pub min: (f32, f32),
    /// Maximum corner.
    pub max: (f32, f32),
}

impl Aabb2 {
    /// Builds an AABB centered at `position` with the given `size`.
    #[must_use]
    pub fn from_center(position: Position, size: Size) -> Self {
        Self {
            min: (position.x - size.half_width, position.y - size.half_height),
            max: (position.x + size.half_width, position.y + size.half_height),
        }
    }

    /// Whether this box overlaps `other`.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.0 < other.max.0
            && self.max.0 > other.min.0
            && self.min.1 < other.max.1
            && self.max.1 > other.min.1
    }
}

/// Resolves an intended 2D move against the chunk store, one axis at a
/// time. Returns the move actually applied, which may be shorter than
/// `intended_delta` on one or both axes.
///
/// `layer` is the layer the entity occupies for block-collision purposes
/// (typically [`Layer::Active`]).
pub fn resolve_move(
    store: &mut ChunkStore,
    layer: Layer,
    position: Position,
    size: Size,
    intended_delta: (f32, f32),
) -> (f32, f32) {
    let mut applied = (0.0_f32, 0.0_f32);

    let after_x = Position::new(position.x + intended_delta.0, position.y);
    if !blocked(store, layer, after_x, size) {
        applied.0 = intended_delta.0;
    }

    let after_y = Position::new(position.x + applied.0, position.y + intended_delta.1);
    if !blocked(store, layer, after_y, size) {
        applied.1 = intended_delta.1;
    }

    applied
}

fn blocked(store: &mut ChunkStore, layer: Layer, position: Position, size: Size) -> bool {
    let aabb = Aabb2::from_center(position, size);
    let min_x = aabb.min.0.floor() as i32;
    let max_x = (aabb.max.0 - f32::EPSILON).floor() as i32;
    let min_y = aabb.min.1.floor() as i32;
    let max_y = (aabb.max.1 - f32::EPSILON).floor() as i32;

    for x in min_x..=max_x {
        for y in min_y..=max_y {
            if !store.get_block(layer, x, y).is_passable() {
                return true;
            }
        }
    }
    false
}

/// Whether `target` lies within `radius` blocks of `origin` (squared
/// comparison, matching [`oroboros_core::Position::distance_squared`]).
#[must_use]
pub fn within_radius(origin: Position, target: Position, radius: f32) -> bool {
    origin.distance_squared(target) <= radius * radius
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_world::WorldSeed;

    fn passable_store() -> ChunkStore {
        ChunkStore::new(WorldSeed::new(1))
    }

    #[test]
    fn move_through_open_air_applies_in_full() {
        let mut store = passable_store();
        let size = Size::new(0.4, 0.4);
        let applied = resolve_move(
            &mut store,
            Layer::Active,
            Position::new(0.0, 0.0),
            size,
            (1.0, 0.5),
        );
        assert_eq!(applied, (1.0, 0.5));
    }

    #[test]
    fn aabb_intersection_detects_overlap() {
        let a = Aabb2::from_center(Position::new(0.0, 0.0), Size::new(1.0, 1.0));
        let b = Aabb2::from_center(Position::new(0.5, 0.0), Size::new(1.0, 1.0));
        let c = Aabb2::from_center(Position::new(5.0, 0.0), Size::new(1.0, 1.0));
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }

    #[test]
    fn within_radius_matches_distance_squared() {
        let origin = Position::new(0.0, 0.0);
        assert!(within_radius(origin, Position::new(3.0, 0.0), 3.0));
        assert!(!within_radius(origin, Position::new(3.1, 0.0), 3.0));
    }
}
