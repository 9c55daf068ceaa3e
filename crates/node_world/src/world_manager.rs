//! # Chunk Store & Spatial Index
//!
//! The single source of truth for block and entity spatial state on one
//! regional node. Chunks are grouped into `BigChunk`s, the unit of bulk
//! persistence and locking; an entity's current position determines
//! which `BigChunk` owns it, and ownership transfers when the entity
//! crosses a `BigChunk` boundary.
//!
//! Writers take a per-`BigChunk` exclusive lock (`parking_lot::RwLock`);
//! readers take a shared lock, so concurrent area-of-interest snapshot
//! reads never block each other.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use crate::chunk::{Block, Chunk, ChunkCoord, ChunkGenerator, Layer, CHUNK_SIZE};
use crate::noise::WorldSeed;

/// Number of chunks per `BigChunk` edge.
pub const BIGCHUNK_CHUNKS: i32 = 4;

/// Errors raised by the chunk store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChunkStoreError {
    /// The addressed block id is outside the registered range.
    #[error("block id {0} is not registered")]
    UnregisteredBlockId(u32),
    /// The cell's metadata exceeds the per-cell byte bound.
    #[error("cell metadata exceeds the {0}-byte bound")]
    MetadataTooLarge(usize),
}

/// Coordinate of a `BigChunk` in the world grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct BigChunkCoord {
    /// X coordinate, in `BigChunk` units.
    pub x: i32,
    /// Y coordinate, in `BigChunk` units.
    pub y: i32,
}

impl BigChunkCoord {
    #[must_use]
    fn from_chunk(coord: ChunkCoord) -> Self {
        Self { x: coord.x.div_euclid(BIGCHUNK_CHUNKS), y: coord.y.div_euclid(BIGCHUNK_CHUNKS) }
    }

    #[must_use]
    fn from_block(block_x: i32, block_y: i32) -> Self {
        Self::from_chunk(ChunkCoord::from_block_pos(block_x, block_y))
    }
}

/// A grouping of adjacent chunks: the unit of bulk persistence and
/// locking. Owns the entity ids whose current position falls inside it.
#[derive(Default)]
struct BigChunkData {
    chunks: HashMap<ChunkCoord, Chunk>,
    entities: HashSet<u64>,
}

/// An entity's tracked position, used for the radius query and for
/// detecting `BigChunk` boundary crossings.
#[derive(Clone, Copy, Debug, Default)]
struct EntityPosition {
    x: f32,
    y: f32,
    big_chunk: BigChunkCoord,
}

/// A block-id-level interaction handler: given the block currently
/// occupying the cell and the acting entity's id, returns the block's
/// state after the interaction (e.g. a door toggling open/closed).
pub type InteractHandler = Arc<dyn Fn(&Block, u64) -> Block + Send + Sync>;

/// The chunk store: authoritative block and entity spatial state.
pub struct ChunkStore {
    generator: ChunkGenerator,
    registered_block_ids: HashSet<u32>,
    big_chunks: HashMap<BigChunkCoord, Arc<RwLock<BigChunkData>>>,
    entity_positions: HashMap<u64, EntityPosition>,
    interactables: HashMap<u32, InteractHandler>,
}

impl ChunkStore {
    /// Creates a new store seeded for deterministic procedural
    /// generation; air (`0`) is always implicitly registered.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            generator: ChunkGenerator::new(seed),
            registered_block_ids: HashSet::new(),
            big_chunks: HashMap::new(),
            entity_positions: HashMap::new(),
            interactables: HashMap::new(),
        }
    }

    /// Registers the `on_interact` handler invoked for cells whose block
    /// id is `block_id`. Replaces any handler previously registered for
    /// that id.
    pub fn register_interactable(&mut self, block_id: u32, handler: InteractHandler) {
        self.interactables.insert(block_id, handler);
    }

    /// Runs the registered interact handler for the cell at
    /// `(layer, x, y)` against its current block, committing the
    /// handler's result back to the store. Returns `None` when the
    /// cell's block id carries no registered handler (a no-op).
    pub fn interact(&mut self, layer: Layer, x: i32, y: i32, actor_id: u64, now_ms: u64) -> Option<Block> {
        let (block, _) = self.get_block_with_timestamp(layer, x, y);
        let handler = self.interactables.get(&block.id)?.clone();
        let updated = handler(&block, actor_id);
        let _ = self.set_block(layer, x, y, updated.clone(), now_ms);
        Some(updated)
    }

    /// Registers a block id as placeable/settable via `set_block`.
    pub fn register_block_id(&mut self, id: u32) {
        self.registered_block_ids.insert(id);
    }

    /// Whether `id` has been registered as placeable/settable. Air (`0`)
    /// is always implicitly legal but never appears in the registered set.
    #[must_use]
    pub fn is_registered(&self, id: u32) -> bool {
        self.registered_block_ids.contains(&id)
    }

    fn big_chunk(&mut self, coord: BigChunkCoord) -> Arc<RwLock<BigChunkData>> {
        self.big_chunks.entry(coord).or_default().clone()
    }

    fn chunk_coord_for(big: BigChunkCoord, block_x: i32, block_y: i32) -> ChunkCoord {
        debug_assert_eq!(BigChunkCoord::from_block(block_x, block_y), big);
        ChunkCoord::from_block_pos(block_x, block_y)
    }

    /// Reads a block, generating its chunk lazily on first access.
    /// Unset cells read as air.
    pub fn get_block(&mut self, layer: Layer, x: i32, y: i32) -> Block {
        let big_coord = BigChunkCoord::from_block(x, y);
        let big = self.big_chunk(big_coord);
        let chunk_coord = Self::chunk_coord_for(big_coord, x, y);
        let (local_x, local_y) = local_offset(x, y);

        let generator = &self.generator;
        let mut guard = big.write();
        let chunk = guard.chunks.entry(chunk_coord).or_insert_with(|| generator.generate(chunk_coord));
        chunk.get_block(layer, local_x, local_y)
    }

    /// Reads a block together with the timestamp of its chunk's most
    /// recent mutation, for conflict resolution against an incoming
    /// remote change record.
    pub fn get_block_with_timestamp(&mut self, layer: Layer, x: i32, y: i32) -> (Block, u64) {
        let big_coord = BigChunkCoord::from_block(x, y);
        let big = self.big_chunk(big_coord);
        let chunk_coord = Self::chunk_coord_for(big_coord, x, y);
        let (local_x, local_y) = local_offset(x, y);

        let generator = &self.generator;
        let mut guard = big.write();
        let chunk = guard.chunks.entry(chunk_coord).or_insert_with(|| generator.generate(chunk_coord));
        (chunk.get_block(layer, local_x, local_y), chunk.last_modified_ms)
    }

    /// Finds the nearest cell matching `predicate` within `radius` blocks
    /// of `(origin_x, origin_y)` on `layer`, scanning outward ring by ring
    /// (Chebyshev distance) so a close match is found without
    /// materializing the whole search area.
    pub fn find_nearest_block(
        &mut self,
        layer: Layer,
        origin_x: i32,
        origin_y: i32,
        radius: i32,
        predicate: impl Fn(&Block) -> bool,
    ) -> Option<(i32, i32)> {
        if predicate(&self.get_block(layer, origin_x, origin_y)) {
            return Some((origin_x, origin_y));
        }
        for ring in 1..=radius {
            for dx in -ring..=ring {
                for dy in -ring..=ring {
                    if dx.abs() != ring && dy.abs() != ring {
                        continue;
                    }
                    let (x, y) = (origin_x + dx, origin_y + dy);
                    if predicate(&self.get_block(layer, x, y)) {
                        return Some((x, y));
                    }
                }
            }
        }
        None
    }

    /// Writes a block atomically, validating id and metadata size first.
    /// Emits no change record itself; callers (the delta recorder) learn
    /// of the mutation by diffing the returned previous value, or by
    /// observing the chunk's version increment.
    pub fn set_block(
        &mut self,
        layer: Layer,
        x: i32,
        y: i32,
        block: Block,
        now_ms: u64,
    ) -> Result<(), ChunkStoreError> {
        if block.id != 0 && !self.registered_block_ids.contains(&block.id) {
            return Err(ChunkStoreError::UnregisteredBlockId(block.id));
        }
        let size = block.metadata_size();
        if size > crate::chunk::MAX_CELL_METADATA_BYTES {
            return Err(ChunkStoreError::MetadataTooLarge(size));
        }

        let big_coord = BigChunkCoord::from_block(x, y);
        let big = self.big_chunk(big_coord);
        let chunk_coord = Self::chunk_coord_for(big_coord, x, y);
        let (local_x, local_y) = local_offset(x, y);

        let generator = &self.generator;
        let mut guard = big.write();
        let chunk = guard.chunks.entry(chunk_coord).or_insert_with(|| generator.generate(chunk_coord));
        chunk.set_block(layer, local_x, local_y, block, now_ms);
        Ok(())
    }

    /// Registers (or moves) an entity's position, transferring
    /// `BigChunk` ownership if the new position crosses a boundary.
    pub fn upsert_entity_position(&mut self, entity_id: u64, x: f32, y: f32) {
        let new_big = BigChunkCoord::from_block(x.floor() as i32, y.floor() as i32);

        if let Some(prev) = self.entity_positions.get(&entity_id).copied() {
            if prev.big_chunk != new_big {
                if let Some(old_big) = self.big_chunks.get(&prev.big_chunk) {
                    old_big.write().entities.remove(&entity_id);
                }
            }
        }

        self.big_chunk(new_big).write().entities.insert(entity_id);
        self.entity_positions.insert(entity_id, EntityPosition { x, y, big_chunk: new_big });
    }

    /// Removes an entity from spatial tracking on despawn.
    pub fn remove_entity(&mut self, entity_id: u64) {
        if let Some(prev) = self.entity_positions.remove(&entity_id) {
            if let Some(big) = self.big_chunks.get(&prev.big_chunk) {
                big.write().entities.remove(&entity_id);
            }
        }
    }

    /// Returns entity ids within `radius` of `center`, scanning only the
    /// `BigChunk`s that could intersect the query circle so result cost
    /// is bounded by local density, not world size.
    #[must_use]
    pub fn entities_in_radius(&self, center: (f32, f32), radius: f32) -> Vec<u64> {
        let radius_sq = radius * radius;
        let span = (radius / (BIGCHUNK_CHUNKS as f32 * CHUNK_SIZE as f32)).ceil() as i32 + 1;
        let center_big = BigChunkCoord::from_block(center.0.floor() as i32, center.1.floor() as i32);

        let mut found = Vec::new();
        for dx in -span..=span {
            for dy in -span..=span {
                let coord = BigChunkCoord { x: center_big.x + dx, y: center_big.y + dy };
                let Some(big) = self.big_chunks.get(&coord) else { continue };
                let guard = big.read();
                for &id in &guard.entities {
                    if let Some(pos) = self.entity_positions.get(&id) {
                        let ddx = pos.x - center.0;
                        let ddy = pos.y - center.1;
                        if ddx * ddx + ddy * ddy <= radius_sq {
                            found.push(id);
                        }
                    }
                }
            }
        }
        found
    }

    /// Number of resident `BigChunk`s (loaded chunk groups).
    #[must_use]
    pub fn resident_big_chunk_count(&self) -> usize {
        self.big_chunks.len()
    }

    /// Total number of materialized chunks across all `BigChunk`s.
    #[must_use]
    pub fn loaded_chunk_count(&self) -> usize {
        self.big_chunks.values().map(|b| b.read().chunks.len()).sum()
    }

    /// Flushes every modified chunk to `dir`, one compressed file per
    /// chunk named by its `(cx, cy)`. Returns the number of chunks
    /// written; clears each chunk's `modified` flag on success.
    ///
    /// # Errors
    ///
    /// Returns an error if a chunk file cannot be written.
    pub fn flush_dirty(&mut self, dir: &std::path::Path) -> std::io::Result<usize> {
        std::fs::create_dir_all(dir)?;
        let mut written = 0;
        for big in self.big_chunks.values() {
            let mut guard = big.write();
            for chunk in guard.chunks.values_mut() {
                if !chunk.modified {
                    continue;
                }
                let path = dir.join(format!("{}.chunk", chunk.coord.file_stem()));
                chunk.save_compressed(&path)?;
                chunk.modified = false;
                written += 1;
            }
        }
        Ok(written)
    }

    /// Loads a chunk from `dir` into its owning `BigChunk` if a file for
    /// it exists, overwriting any lazily generated placeholder. No-op if
    /// no file exists for this coordinate.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load_from_disk(&mut self, dir: &std::path::Path, coord: ChunkCoord) -> std::io::Result<bool> {
        let path = dir.join(format!("{}.chunk", coord.file_stem()));
        if !path.exists() {
            return Ok(false);
        }
        let chunk = Chunk::load_compressed(&path, coord)?;
        let big_coord = BigChunkCoord::from_chunk(coord);
        self.big_chunk(big_coord).write().chunks.insert(coord, chunk);
        Ok(true)
    }
}

#[must_use]
fn local_offset(x: i32, y: i32) -> (usize, usize) {
    (x.rem_euclid(CHUNK_SIZE as i32) as usize, y.rem_euclid(CHUNK_SIZE as i32) as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ChunkStore {
        let mut store = ChunkStore::new(WorldSeed::new(7));
        store.register_block_id(1);
        store.register_block_id(42);
        store
    }

    #[test]
    fn test_get_unset_block_is_air() {
        let mut store = store();
        assert!(store.get_block(Layer::Active, 100, -200).is_air());
    }

    #[test]
    fn test_set_then_get_roundtrip() {
        let mut store = store();
        store.set_block(Layer::Active, 5, 5, Block::new(42), 1).unwrap();
        assert_eq!(store.get_block(Layer::Active, 5, 5).id, 42);
    }

    #[test]
    fn test_unregistered_block_id_rejected() {
        let mut store = store();
        let err = store.set_block(Layer::Active, 0, 0, Block::new(999), 1).unwrap_err();
        assert_eq!(err, ChunkStoreError::UnregisteredBlockId(999));
    }

    #[test]
    fn test_find_nearest_block_locates_closest_match() {
        let mut store = store();
        store.set_block(Layer::Floor, 3, 0, Block::new(1), 1).unwrap();
        store.set_block(Layer::Floor, -1, 0, Block::new(1), 1).unwrap();

        let found = store.find_nearest_block(Layer::Floor, 0, 0, 5, |block| block.id == 1);
        assert_eq!(found, Some((-1, 0)));
    }

    #[test]
    fn test_find_nearest_block_returns_none_outside_radius() {
        let mut store = store();
        store.set_block(Layer::Floor, 10, 0, Block::new(1), 1).unwrap();

        let found = store.find_nearest_block(Layer::Floor, 0, 0, 3, |block| block.id == 1);
        assert_eq!(found, None);
    }

    #[test]
    fn test_entity_ownership_transfers_across_bigchunk_boundary() {
        let mut store = store();
        let edge = (BIGCHUNK_CHUNKS * CHUNK_SIZE as i32) as f32;

        store.upsert_entity_position(1, 0.0, 0.0);
        let first = store.entities_in_radius((0.0, 0.0), 5.0);
        assert_eq!(first, vec![1]);

        store.upsert_entity_position(1, edge + 1.0, 0.0);
        assert!(store.entities_in_radius((0.0, 0.0), 5.0).is_empty());
        assert_eq!(store.entities_in_radius((edge + 1.0, 0.0), 5.0), vec![1]);
    }

    #[test]
    fn test_entities_in_radius_excludes_far_entities() {
        let mut store = store();
        store.upsert_entity_position(1, 0.0, 0.0);
        store.upsert_entity_position(2, 1000.0, 1000.0);
        assert_eq!(store.entities_in_radius((0.0, 0.0), 10.0), vec![1]);
    }

    #[test]
    fn test_remove_entity_drops_from_index() {
        let mut store = store();
        store.upsert_entity_position(9, 1.0, 1.0);
        store.remove_entity(9);
        assert!(store.entities_in_radius((0.0, 0.0), 50.0).is_empty());
    }
}
