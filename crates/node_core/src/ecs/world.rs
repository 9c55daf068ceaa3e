//! # ECS World
//!
//! The central container for all entities and components.
//! Pre-allocates all dense component storage at creation time; the
//! per-entity attribute map is the one part of an entity's state that is
//! not pre-allocated, since its size is open-ended.

use std::collections::HashMap;

use super::attributes::AttributeMap;
use super::component::{
    Component, CoarsePosition, EntityKind, Facing, Position, Size, Subtype, Velocity,
};
use super::entity::{Entity, EntityId};
use super::storage::ComponentStorage;

/// The ECS World - container for all game state.
///
/// Dense component storage is pre-allocated at creation. No allocations
/// occur during normal gameplay operations (spawn, despawn, component
/// access) beyond the attribute map, which grows with its contents.
///
/// # Capacity
///
/// The world has a fixed capacity set at creation. This cannot be changed
/// at runtime to maintain the zero-allocation guarantee on the dense
/// storages.
///
/// # Example
///
/// ```rust,ignore
/// let mut world = World::new(1_000_000);
///
/// let entity = world.spawn(EntityKind::PLAYER, Position::new(1.0, 2.0));
/// ```
pub struct World {
    /// All entity slots (pre-allocated).
    pub entities: Box<[Entity]>,
    /// Free list of entity indices for reuse.
    free_indices: Vec<u32>,
    /// Number of currently alive entities.
    alive_count: usize,
    /// Maximum capacity.
    capacity: usize,

    // =========================================================================
    // Component Storages - Add new component types here
    // =========================================================================
    /// Precise floating-point position component storage.
    pub positions: ComponentStorage<Position>,
    /// Coarse integer position component storage (chunk/`BigChunk` addressing).
    pub coarse_positions: ComponentStorage<CoarsePosition>,
    /// Velocity component storage.
    pub velocities: ComponentStorage<Velocity>,
    /// Four-way facing component storage.
    pub facings: ComponentStorage<Facing>,
    /// Axis-aligned bounding box size component storage.
    pub sizes: ComponentStorage<Size>,
    /// Entity type tag component storage.
    pub kinds: ComponentStorage<EntityKind>,
    /// NPC/animal subtype tag component storage.
    pub subtypes: ComponentStorage<Subtype>,

    /// Opaque attribute maps, keyed by entity id. Not pre-allocated per
    /// slot: most entities carry a handful of attributes, so a sparse map
    /// keeps memory proportional to what's actually stored.
    attributes: HashMap<EntityId, AttributeMap>,
}

impl World {
    /// Creates a new world with the specified entity capacity.
    ///
    /// This pre-allocates all dense component storage upfront.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Maximum number of entities (e.g., 1_000_000)
    ///
    /// # Panics
    ///
    /// Panics if capacity is zero or exceeds u32::MAX.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Capacity must be greater than zero");
        assert!(
            capacity <= u32::MAX as usize,
            "Capacity cannot exceed u32::MAX"
        );

        let entities = (0..capacity)
            .map(|_| Entity::dead())
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let free_indices: Vec<u32> = (0..capacity as u32).rev().collect();

        Self {
            entities,
            free_indices,
            alive_count: 0,
            capacity,
            positions: ComponentStorage::new(capacity),
            coarse_positions: ComponentStorage::new(capacity),
            velocities: ComponentStorage::new(capacity),
            facings: ComponentStorage::new(capacity),
            sizes: ComponentStorage::new(capacity),
            kinds: ComponentStorage::new(capacity),
            subtypes: ComponentStorage::new(capacity),
            attributes: HashMap::new(),
        }
    }

    /// Returns the maximum capacity of this world.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn alive_count(&self) -> usize {
        self.alive_count
    }

    /// Spawns a new entity of the given kind at the given position.
    ///
    /// This reuses a pre-allocated slot and only allocates if the entity's
    /// attribute map is later populated.
    ///
    /// # Returns
    ///
    /// The new entity's ID, or `EntityId::NULL` if capacity is reached.
    pub fn spawn(&mut self, kind: EntityKind, position: Position) -> EntityId {
        let Some(index) = self.free_indices.pop() else {
            return EntityId::NULL;
        };

        let idx = index as usize;
        let entity = &mut self.entities[idx];

        let generation = entity.id.generation().wrapping_add(1);
        let new_id = EntityId::new(index, generation);

        *entity = Entity::new(new_id);
        entity.add_component(Position::ID);
        entity.add_component(CoarsePosition::ID);
        entity.add_component(EntityKind::ID);

        self.positions.set(idx, position);
        self.coarse_positions.set(idx, position.coarse());
        self.kinds.set(idx, kind);
        self.velocities.set(idx, Velocity::default());
        self.facings.set(idx, Facing::NORTH);
        self.sizes.set(idx, Size::new(0.4, 0.4));
        self.subtypes.set(idx, Subtype::default());

        self.alive_count += 1;
        new_id
    }

    /// Despawns an entity, freeing its slot for reuse.
    ///
    /// # Returns
    ///
    /// `true` if the entity was despawned, `false` if it was already dead
    /// or the ID was invalid/stale.
    pub fn despawn(&mut self, id: EntityId) -> bool {
        if id.is_null() {
            return false;
        }

        let idx = id.index() as usize;
        if idx >= self.capacity {
            return false;
        }

        let entity = &mut self.entities[idx];

        if !entity.alive || entity.id.generation() != id.generation() {
            return false;
        }

        entity.alive = false;
        entity.component_mask = 0;
        self.alive_count -= 1;

        self.free_indices.push(id.index());

        self.positions.reset(idx);
        self.coarse_positions.reset(idx);
        self.velocities.reset(idx);
        self.facings.reset(idx);
        self.sizes.reset(idx);
        self.kinds.reset(idx);
        self.subtypes.reset(idx);
        self.attributes.remove(&id);

        true
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, id: EntityId) -> bool {
        if id.is_null() {
            return false;
        }

        let idx = id.index() as usize;
        if idx >= self.capacity {
            return false;
        }

        let entity = &self.entities[idx];
        entity.alive && entity.id.generation() == id.generation()
    }

    /// Gets an entity by ID.
    #[inline]
    #[must_use]
    pub fn get(&self, id: EntityId) -> Option<&Entity> {
        if !self.is_alive(id) {
            return None;
        }
        Some(&self.entities[id.index() as usize])
    }

    /// Gets a mutable entity by ID.
    #[inline]
    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        if !self.is_alive(id) {
            return None;
        }
        Some(&mut self.entities[id.index() as usize])
    }

    /// Iterates over all alive entities.
    pub fn iter_alive(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter().filter(|e| e.alive)
    }

    /// Returns this entity's attribute map, creating an empty one on first access.
    pub fn attributes_mut(&mut self, id: EntityId) -> &mut AttributeMap {
        self.attributes.entry(id).or_default()
    }

    /// Returns this entity's attribute map, if it has ever had one set.
    #[must_use]
    pub fn attributes(&self, id: EntityId) -> Option<&AttributeMap> {
        self.attributes.get(&id)
    }

    /// Updates all positions by their velocities, refreshing the coarse
    /// position and facing alongside.
    ///
    /// This is an optimized hot-path operation that:
    /// - Iterates over contiguous memory (cache-friendly)
    /// - Performs no allocations
    #[inline]
    pub fn update_positions(&mut self, delta_time: f32) {
        let positions = self.positions.as_mut_slice();
        let coarse = self.coarse_positions.as_mut_slice();
        let velocities = self.velocities.as_slice();
        let facings = self.facings.as_mut_slice();
        let entities = &self.entities;

        for (idx, entity) in entities.iter().enumerate() {
            if !entity.alive
                || !entity.has_component(Position::ID)
                || !entity.has_component(Velocity::ID)
            {
                continue;
            }

            let vel = velocities[idx];
            let pos = &mut positions[idx];
            pos.x += vel.x * delta_time;
            pos.y += vel.y * delta_time;
            coarse[idx] = pos.coarse();

            if let Some(facing) = super::component::Facing::from_velocity(vel) {
                facings[idx] = facing;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::attributes::AttributeValue;

    #[test]
    fn test_world_creation() {
        let world = World::new(1000);
        assert_eq!(world.capacity(), 1000);
        assert_eq!(world.alive_count(), 0);
    }

    #[test]
    fn test_spawn_despawn() {
        let mut world = World::new(100);

        let id1 = world.spawn(EntityKind::PLAYER, Position::new(0.0, 0.0));
        assert!(!id1.is_null());
        assert!(world.is_alive(id1));
        assert_eq!(world.alive_count(), 1);

        let id2 = world.spawn(EntityKind::NPC, Position::new(1.0, 1.0));
        assert!(!id2.is_null());
        assert_eq!(world.alive_count(), 2);

        assert!(world.despawn(id1));
        assert!(!world.is_alive(id1));
        assert_eq!(world.alive_count(), 1);

        let id3 = world.spawn(EntityKind::PLAYER, Position::new(0.0, 0.0));
        assert!(!id3.is_null());
        assert_eq!(id3.index(), id1.index());
        assert_ne!(id3.generation(), id1.generation());
    }

    #[test]
    fn test_position_update_refreshes_coarse_and_facing() {
        let mut world = World::new(10);

        let id = world.spawn(EntityKind::PLAYER, Position::new(0.0, 0.0));
        let idx = id.index() as usize;
        world.velocities.set(idx, Velocity::new(1.0, 0.0));

        world.update_positions(1.0);

        let pos = world.positions.get(idx).unwrap();
        assert!((pos.x - 1.0).abs() < f32::EPSILON);
        assert_eq!(*world.coarse_positions.get(idx).unwrap(), CoarsePosition::new(1, 0));
        assert_eq!(*world.facings.get(idx).unwrap(), Facing::EAST);
    }

    #[test]
    fn test_despawn_drops_attribute_map() {
        let mut world = World::new(10);
        let id = world.spawn(EntityKind::PLAYER, Position::new(0.0, 0.0));
        world.attributes_mut(id).set("health", AttributeValue::Int(20));

        world.despawn(id);
        assert!(world.attributes(id).is_none());
    }
}
