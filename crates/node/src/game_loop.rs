//! # Tick Loop
//!
//! One step of duration `dt`, in order (SPEC's tick order, §4.2):
//!
//! ```text
//! (a) resolve inputs into intended moves
//! (b) simulator runs behaviors, which may enqueue further moves/damage
//! (c) apply moves with collision
//! (d) commit deltas
//! ```
//!
//! A panicking behavior tick is isolated with `catch_unwind` so one
//! misbehaving NPC/animal state machine cannot bring down the tick for
//! every other entity; the offending entity is marked errored and
//! skipped on subsequent ticks until an admin action clears it.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use node_sync::{DeltaRecorder, PositionCache};
use node_world::{Biome, ChunkStore, Layer};
use oroboros_core::{EntityId, Facing, Position, Size, Velocity, World};

use crate::events::{EventBus, EventReceiver, EventSender, GameEvent};
use crate::gameplay::{step_animal, step_npc, AnimalKind, BehaviorState, NpcKind};
use crate::physics::{resolve_move, Aabb2};

/// Target tick duration, matching the transport layer's
/// [`node_transport::NODE_TICK_RATE`].
pub const TARGET_TICK_TIME: Duration = Duration::from_micros(node_transport::TICK_DURATION_MICROS);

/// Tick duration above which a tick is logged as having exceeded budget.
pub const MAX_TICK_TIME: Duration = Duration::from_micros(node_transport::TICK_DURATION_MICROS * 2);

/// Radius (blocks) a Guard NPC scans for a nearby player to follow.
/// Wider than the 10-block detection range `step_npc` itself checks, to
/// tolerate a player crossing into range between ticks.
const NEARBY_PLAYER_QUERY_RADIUS: f32 = 16.0;

/// Radius (blocks) a Cow scans for a grass cell to graze.
const GRASS_SEARCH_RADIUS: i32 = 8;

/// Floor-layer block id a grazeable grass cell carries.
const GRASS_BLOCK_ID: u32 = Biome::Plains.surface_block();

/// Radius (blocks) queried for entity-entity collision candidates around a
/// moving entity's destination. Comfortably covers two entities' combined
/// half-extents with room for larger-than-default sizes.
const ENTITY_COLLISION_QUERY_RADIUS: f32 = 2.0;

/// Configuration for the tick loop.
#[derive(Clone, Copy, Debug)]
pub struct GameLoopConfig {
    /// Maximum number of entities the world pre-allocates for.
    pub entity_capacity: usize,
    /// Event channel capacity.
    pub event_capacity: usize,
    /// Emit a warning-level log for ticks that exceed [`MAX_TICK_TIME`].
    pub enable_timing_logs: bool,
}

impl Default for GameLoopConfig {
    fn default() -> Self {
        Self {
            entity_capacity: 100_000,
            event_capacity: 4096,
            enable_timing_logs: true,
        }
    }
}

/// Timing breakdown for a single tick.
#[derive(Clone, Copy, Debug, Default)]
pub struct TickStats {
    /// Total tick time in microseconds.
    pub total_us: u64,
    /// Behavior-dispatch time in microseconds.
    pub behavior_us: u64,
    /// Collision-resolution time in microseconds.
    pub collision_us: u64,
    /// Tick number.
    pub tick: u64,
    /// Entities whose behavior panicked this tick and were disabled.
    pub entities_disabled: u32,
}

/// Owns the authoritative world state and runs the tick order.
pub struct GameLoop {
    world: World,
    store: ChunkStore,
    recorder: Arc<DeltaRecorder>,
    position_cache: Arc<dyn PositionCache>,
    events: EventBus,
    config: GameLoopConfig,
    tick_count: u64,
    last_tick_time: Instant,
    disabled_entities: HashSet<EntityId>,
    stats_accumulator: TickStatsAccumulator,
}

impl GameLoop {
    /// Creates a new tick loop over a fresh world and chunk store,
    /// tracking player/entity positions in `position_cache` (§4.8) as
    /// they move, for area-of-interest and radius-query callers.
    #[must_use]
    pub fn new(config: GameLoopConfig, store: ChunkStore, region_id: u32, position_cache: Arc<dyn PositionCache>) -> Self {
        Self {
            world: World::new(config.entity_capacity),
            store,
            recorder: Arc::new(DeltaRecorder::new(region_id)),
            position_cache,
            events: EventBus::new(config.event_capacity),
            config,
            tick_count: 0,
            last_tick_time: Instant::now(),
            disabled_entities: HashSet::new(),
            stats_accumulator: TickStatsAccumulator::new(),
        }
    }

    /// Runs one tick: resolves `player_moves` (step a) and behavior
    /// dispatch (step b) into intended moves, applies them with
    /// collision (step c), and commits deltas (step d). `now_ms` stamps
    /// the deltas this tick produces.
    pub fn tick(&mut self, now_ms: u64, player_moves: &[(EntityId, (f32, f32))]) -> TickStats {
        let tick_start = Instant::now();
        let now = Instant::now();
        let dt = now.duration_since(self.last_tick_time).as_secs_f32().min(0.25);
        self.last_tick_time = now;

        let mut intended_moves: Vec<(EntityId, (f32, f32))> = player_moves.to_vec();

        let behavior_start = Instant::now();
        let mut disabled_this_tick = 0;
        let entity_ids: Vec<EntityId> = self
            .world
            .iter_alive()
            .map(|entity| entity.id)
            .filter(|id| !self.disabled_entities.contains(id))
            .collect();

        for entity_id in entity_ids {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                self.run_behavior(entity_id, dt)
            }));
            match outcome {
                Ok(Some(delta)) => intended_moves.push((entity_id, delta)),
                Ok(None) => {}
                Err(_) => {
                    self.disabled_entities.insert(entity_id);
                    disabled_this_tick += 1;
                    self.events.sender().send(GameEvent::ActionRejected {
                        entity_id,
                        reason: "behavior panicked; entity AI disabled".to_string(),
                    });
                }
            }
        }
        let behavior_us = behavior_start.elapsed().as_micros() as u64;

        let collision_start = Instant::now();
        for (entity_id, intended_delta) in intended_moves {
            self.apply_move(entity_id, intended_delta, now_ms);
        }
        let collision_us = collision_start.elapsed().as_micros() as u64;

        let stats = TickStats {
            total_us: tick_start.elapsed().as_micros() as u64,
            behavior_us,
            collision_us,
            tick: self.tick_count,
            entities_disabled: disabled_this_tick,
        };

        self.tick_count += 1;
        self.stats_accumulator.record(stats);

        if self.config.enable_timing_logs && stats.total_us > MAX_TICK_TIME.as_micros() as u64 {
            tracing::warn!(
                tick = stats.tick,
                total_us = stats.total_us,
                "tick exceeded budget"
            );
        }

        stats
    }

    fn run_behavior(&mut self, entity_id: EntityId, dt: f32) -> Option<(f32, f32)> {
        let index = entity_id.index() as usize;
        let position = *self.world.positions.get(index)?;
        let kind = *self.world.kinds.get(index)?;
        let subtype_tag = self.world.subtypes.get(index).copied().unwrap_or_default().tag;
        let attrs = self.world.attributes_mut(entity_id);
        let state = BehaviorState::read(attrs);
        let seed = u64::from(entity_id.index()) ^ u64::from(self.tick_count);

        let (next_state, target) = match kind.tag {
            oroboros_core::KIND_NPC => {
                let npc_kind = NpcKind::from_u8(subtype_tag);
                let nearby_player = (npc_kind == NpcKind::Guard)
                    .then(|| self.nearest_player(position, NEARBY_PLAYER_QUERY_RADIUS))
                    .flatten();
                step_npc(npc_kind, state, position, nearby_player, dt, seed)
            }
            oroboros_core::KIND_ANIMAL => {
                let animal_kind = AnimalKind::from_u8(subtype_tag);
                let nearest_grass = (animal_kind == AnimalKind::Cow)
                    .then(|| self.nearest_grass(position))
                    .flatten();
                step_animal(animal_kind, state, position, nearest_grass, dt, seed)
            }
            _ => return None,
        };
        next_state.write(self.world.attributes_mut(entity_id));

        target.map(|t| (t.x - position.x, t.y - position.y))
    }

    /// Nearest player within `radius` of `origin`, for Guard NPC detection.
    /// Returns the player's position and entity index, the shape
    /// `step_npc`'s `Follow` state expects.
    fn nearest_player(&self, origin: Position, radius: f32) -> Option<(Position, u32)> {
        self.store
            .entities_in_radius((origin.x, origin.y), radius)
            .into_iter()
            .filter_map(|raw_id| {
                let index = raw_id as usize;
                let kind = self.world.kinds.get(index)?;
                if kind.tag != oroboros_core::KIND_PLAYER {
                    return None;
                }
                let position = *self.world.positions.get(index)?;
                Some((position, index as u32, position.distance_squared(origin)))
            })
            .min_by(|a, b| a.2.total_cmp(&b.2))
            .map(|(position, index, _)| (position, index))
    }

    /// Nearest grass cell on the floor layer near `origin`, for Cow grazing.
    fn nearest_grass(&mut self, origin: Position) -> Option<Position> {
        let (x, y) = self.store.find_nearest_block(
            Layer::Floor,
            origin.x.floor() as i32,
            origin.y.floor() as i32,
            GRASS_SEARCH_RADIUS,
            |block| block.id == GRASS_BLOCK_ID,
        )?;
        Some(Position::new(x as f32 + 0.5, y as f32 + 0.5))
    }

    /// Spawns an NPC of `kind` at `position`, tagging its `Subtype`
    /// component so `run_behavior` dispatches the right idle/wander/follow
    /// thresholds instead of the default (`Villager`).
    pub fn spawn_npc(&mut self, kind: NpcKind, position: Position) -> EntityId {
        let id = self.world.spawn(oroboros_core::EntityKind::NPC, position);
        self.world.subtypes.set(id.index() as usize, oroboros_core::Subtype::new(kind.as_u8()));
        id
    }

    /// Spawns an animal of `kind` at `position`, tagging its `Subtype`
    /// component so `run_behavior` dispatches the right idle/wander
    /// thresholds (and, for `Cow`, the graze extension) instead of the
    /// default (`Cow`).
    pub fn spawn_animal(&mut self, kind: AnimalKind, position: Position) -> EntityId {
        let id = self.world.spawn(oroboros_core::EntityKind::ANIMAL, position);
        self.world.subtypes.set(id.index() as usize, oroboros_core::Subtype::new(kind.as_u8()));
        id
    }

    fn apply_move(&mut self, entity_id: EntityId, intended_delta: (f32, f32), now_ms: u64) {
        let index = entity_id.index() as usize;
        let (Some(position), Some(size)) = (
            self.world.positions.get(index).copied(),
            self.world.sizes.get(index).copied(),
        ) else {
            return;
        };

        let applied = resolve_move(&mut self.store, Layer::Active, position, size, intended_delta);
        if applied == (0.0, 0.0) {
            return;
        }

        let new_position = Position::new(position.x + applied.0, position.y + applied.1);

        if let Some(other_id) = self.colliding_entity(entity_id, new_position, size) {
            self.events.sender().send(GameEvent::Collision { entity_id, other_id });
            return;
        }

        if let Some(slot) = self.world.positions.get_mut(index) {
            *slot = new_position;
        }
        if let Some(facing) = Facing::from_velocity(Velocity::new(applied.0, applied.1)) {
            if let Some(slot) = self.world.facings.get_mut(index) {
                *slot = facing;
            }
        }

        self.store.upsert_entity_position(u64::from(entity_id.index()), new_position.x, new_position.y);
        self.position_cache.upsert(u64::from(entity_id.index()), (new_position.x, new_position.y));
        self.recorder.record(
            node_sync::ChangeKind::EntityMove {
                entity_id: u64::from(entity_id.index()),
                x: new_position.x,
                y: new_position.y,
            },
            now_ms,
        );
    }

    /// Returns the id of another live entity whose AABB overlaps a would-be
    /// `position`/`size`, if any. Queried through the chunk store's spatial
    /// index rather than a full world scan, so cost stays bounded by local
    /// entity density.
    fn colliding_entity(&self, moving_id: EntityId, position: Position, size: Size) -> Option<EntityId> {
        let moving_box = Aabb2::from_center(position, size);
        self.store
            .entities_in_radius((position.x, position.y), ENTITY_COLLISION_QUERY_RADIUS)
            .into_iter()
            .find_map(|raw_id| {
                let index = raw_id as usize;
                if index == moving_id.index() as usize {
                    return None;
                }
                let other = self.world.entities.get(index).filter(|e| e.alive)?;
                let other_position = *self.world.positions.get(index)?;
                let other_size = *self.world.sizes.get(index)?;
                Aabb2::from_center(other_position, other_size)
                    .intersects(&moving_box)
                    .then_some(other.id)
            })
    }

    /// Returns the world, for the action handler and snapshot building.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    /// Returns the chunk store, for the action handler and snapshot building.
    pub fn store_mut(&mut self) -> &mut ChunkStore {
        &mut self.store
    }

    /// Returns disjoint mutable borrows of the world and the chunk store,
    /// for callers (like the action handler) that need both at once.
    pub fn world_and_store_mut(&mut self) -> (&mut World, &mut ChunkStore) {
        (&mut self.world, &mut self.store)
    }

    /// Returns a shared handle to the delta recorder, for the sync
    /// pipeline's batch producer.
    #[must_use]
    pub fn recorder(&self) -> Arc<DeltaRecorder> {
        Arc::clone(&self.recorder)
    }

    /// Returns a shared handle to the position cache, for area-of-interest
    /// filtering and radius queries over current player positions.
    #[must_use]
    pub fn position_cache(&self) -> Arc<dyn PositionCache> {
        Arc::clone(&self.position_cache)
    }

    /// Returns an event sender for components that need to report
    /// notable mutations (the action handler's rejections, for example).
    #[must_use]
    pub fn event_sender(&self) -> EventSender {
        self.events.sender()
    }

    /// Returns an event receiver for logging/metrics consumers.
    #[must_use]
    pub fn event_receiver(&self) -> EventReceiver {
        self.events.receiver()
    }

    /// Returns the current tick count.
    #[must_use]
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Returns the accumulated tick statistics.
    #[must_use]
    pub fn stats(&self) -> &TickStatsAccumulator {
        &self.stats_accumulator
    }
}

/// Running aggregate of [`TickStats`] for logging and `/metrics`-style reporting.
#[derive(Clone, Debug)]
pub struct TickStatsAccumulator {
    /// Total ticks recorded.
    pub ticks_recorded: u64,
    /// Sum of total tick times.
    pub total_us_sum: u64,
    /// Minimum tick time.
    pub min_tick_us: u64,
    /// Maximum tick time.
    pub max_tick_us: u64,
    /// Ticks that exceeded [`MAX_TICK_TIME`].
    pub ticks_over_budget: u64,
}

impl TickStatsAccumulator {
    /// Creates an empty accumulator.
    #[must_use]
    pub fn new() -> Self {
        Self {
            ticks_recorded: 0,
            total_us_sum: 0,
            min_tick_us: u64::MAX,
            max_tick_us: 0,
            ticks_over_budget: 0,
        }
    }

    /// Folds one tick's stats into the running aggregate.
    pub fn record(&mut self, stats: TickStats) {
        self.ticks_recorded += 1;
        self.total_us_sum += stats.total_us;
        self.min_tick_us = self.min_tick_us.min(stats.total_us);
        self.max_tick_us = self.max_tick_us.max(stats.total_us);
        if stats.total_us > TARGET_TICK_TIME.as_micros() as u64 {
            self.ticks_over_budget += 1;
        }
    }

    /// Average tick time in milliseconds.
    #[must_use]
    pub fn avg_tick_ms(&self) -> f64 {
        if self.ticks_recorded == 0 {
            return 0.0;
        }
        (self.total_us_sum as f64 / self.ticks_recorded as f64) / 1000.0
    }
}

impl Default for TickStatsAccumulator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use node_world::WorldSeed;

    #[test]
    fn fresh_loop_starts_at_tick_zero() {
        let store = ChunkStore::new(WorldSeed::new(1));
        let game_loop = GameLoop::new(GameLoopConfig::default(), store, 0, Arc::new(node_sync::InMemoryPositionCache::new()));
        assert_eq!(game_loop.tick_count(), 0);
    }

    #[test]
    fn ticking_advances_the_counter_and_records_stats() {
        let store = ChunkStore::new(WorldSeed::new(1));
        let mut game_loop = GameLoop::new(GameLoopConfig::default(), store, 0, Arc::new(node_sync::InMemoryPositionCache::new()));

        game_loop.tick(0, &[]);
        game_loop.tick(50, &[]);

        assert_eq!(game_loop.tick_count(), 2);
        assert_eq!(game_loop.stats().ticks_recorded, 2);
    }

    #[test]
    fn npc_behavior_produces_a_delta_once_it_starts_wandering() {
        let store = ChunkStore::new(WorldSeed::new(1));
        let mut game_loop = GameLoop::new(GameLoopConfig::default(), store, 0, Arc::new(node_sync::InMemoryPositionCache::new()));
        let npc = game_loop
            .world_mut()
            .spawn(oroboros_core::EntityKind::NPC, oroboros_core::Position::new(0.0, 0.0));
        game_loop.world_mut().sizes.get_mut(npc.index() as usize).map(|s| *s = oroboros_core::Size::new(0.4, 0.4));

        // First tick: idle timer starts at 0, so behavior immediately rolls a
        // wander target and nothing has recorded yet.
        game_loop.tick(0, &[]);
        // Second tick: walks toward the target, which upserts a position and
        // records an EntityMove delta.
        game_loop.tick(50, &[]);

        assert!(game_loop.recorder().pending_count() <= 2);
    }

    #[test]
    fn guard_npc_follows_a_nearby_player_through_the_tick_loop() {
        let store = ChunkStore::new(WorldSeed::new(1));
        let mut game_loop = GameLoop::new(GameLoopConfig::default(), store, 0, Arc::new(node_sync::InMemoryPositionCache::new()));

        let guard = game_loop.spawn_npc(NpcKind::Guard, Position::new(0.0, 0.0));
        let player = game_loop.world_mut().spawn(oroboros_core::EntityKind::PLAYER, Position::new(5.0, 0.0));
        game_loop.store_mut().upsert_entity_position(u64::from(player.index()), 5.0, 0.0);

        game_loop.tick(0, &[]);

        let attrs = game_loop.world_mut().attributes(guard).expect("guard has behavior state");
        assert_eq!(attrs.get("state").and_then(oroboros_core::AttributeValue::as_text), Some("follow"));
    }

    #[test]
    fn villager_ignores_a_distant_player_and_keeps_wandering() {
        let store = ChunkStore::new(WorldSeed::new(1));
        let mut game_loop = GameLoop::new(GameLoopConfig::default(), store, 0, Arc::new(node_sync::InMemoryPositionCache::new()));

        let villager = game_loop.spawn_npc(NpcKind::Villager, Position::new(0.0, 0.0));
        let player = game_loop.world_mut().spawn(oroboros_core::EntityKind::PLAYER, Position::new(5.0, 0.0));
        game_loop.store_mut().upsert_entity_position(u64::from(player.index()), 5.0, 0.0);

        game_loop.tick(0, &[]);

        let attrs = game_loop.world_mut().attributes(villager).expect("villager has behavior state");
        assert_ne!(attrs.get("state").and_then(oroboros_core::AttributeValue::as_text), Some("follow"));
    }

    #[test]
    fn cow_moves_toward_grass_through_the_tick_loop() {
        let mut store = ChunkStore::new(WorldSeed::new(1));
        store.register_block_id(GRASS_BLOCK_ID);
        store.set_block(Layer::Floor, 2, 0, node_world::Block::new(GRASS_BLOCK_ID), 0).unwrap();
        let mut game_loop = GameLoop::new(GameLoopConfig::default(), store, 0, Arc::new(node_sync::InMemoryPositionCache::new()));

        let cow = game_loop.spawn_animal(AnimalKind::Cow, Position::new(0.0, 0.0));

        game_loop.tick(0, &[]);

        let attrs = game_loop.world_mut().attributes(cow).expect("cow has behavior state");
        assert_eq!(attrs.get("state").and_then(oroboros_core::AttributeValue::as_text), Some("move_to_grass"));
    }

    #[test]
    fn overlapping_entities_halt_the_move_and_fire_a_collision_event() {
        let store = ChunkStore::new(WorldSeed::new(1));
        let mut game_loop = GameLoop::new(GameLoopConfig::default(), store, 0, Arc::new(node_sync::InMemoryPositionCache::new()));

        let mover = game_loop.world_mut().spawn(oroboros_core::EntityKind::PLAYER, Position::new(0.0, 0.0));
        let blocker = game_loop.world_mut().spawn(oroboros_core::EntityKind::PLAYER, Position::new(0.6, 0.0));
        game_loop.store_mut().upsert_entity_position(u64::from(mover.index()), 0.0, 0.0);
        game_loop.store_mut().upsert_entity_position(u64::from(blocker.index()), 0.6, 0.0);

        let receiver = game_loop.event_receiver();
        game_loop.tick(0, &[(mover, (0.5, 0.0))]);

        let position = *game_loop.world_mut().positions.get(mover.index() as usize).unwrap();
        assert_eq!(position, Position::new(0.0, 0.0));
        assert!(receiver.drain().iter().any(|event| matches!(
            event,
            GameEvent::Collision { entity_id, .. } if *entity_id == mover
        )));
    }

    #[test]
    fn unobstructed_move_updates_facing_to_match_the_dominant_axis() {
        let store = ChunkStore::new(WorldSeed::new(1));
        let mut game_loop = GameLoop::new(GameLoopConfig::default(), store, 0, Arc::new(node_sync::InMemoryPositionCache::new()));

        let player = game_loop.world_mut().spawn(oroboros_core::EntityKind::PLAYER, Position::new(0.0, 0.0));
        game_loop.tick(0, &[(player, (0.0, 1.0))]);

        let facing = *game_loop.world_mut().facings.get(player.index() as usize).unwrap();
        assert_eq!(facing, oroboros_core::Facing::SOUTH);
    }
}
