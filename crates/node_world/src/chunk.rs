//! # Chunk System
//!
//! World data is organized into fixed-size chunks for:
//! - Memory efficiency (only load nearby chunks)
//! - Fast streaming (generate/discard on demand)
//! - Compressed storage
//!
//! ## Chunk Format
//!
//! Chunks are 16x16 block cells per vertical layer. There are three
//! discrete layers: `FLOOR`, `ACTIVE`, `CEILING`. A block address is
//! `(layer, x, y)`; there is no continuous vertical axis.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;

use bytemuck::{Pod, Zeroable};
use lz4_flex::{compress_prepend_size, decompress_size_prepended};

use crate::biome::{Biome, BiomeClassifier};
use crate::noise::{SimplexNoise, WorldSeed};

/// Chunk width/depth in block cells.
pub const CHUNK_SIZE: usize = 16;

/// Number of discrete vertical layers.
pub const LAYER_COUNT: usize = 3;

/// Block cells per chunk (all layers).
pub const BLOCKS_PER_CHUNK: usize = CHUNK_SIZE * CHUNK_SIZE * LAYER_COUNT;

/// Maximum serialized metadata size for a single cell, per the wire and
/// storage invariant: a cell's metadata may not exceed 1 KiB.
pub const MAX_CELL_METADATA_BYTES: usize = 1024;

/// One of the three discrete vertical layers every block address names.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Layer {
    /// Below the walkable surface; typically solid terrain.
    Floor = 0,
    /// The walkable surface layer entities occupy and interact with.
    #[default]
    Active = 1,
    /// Above the walkable surface; roofs, canopies, overhangs.
    Ceiling = 2,
}

impl Layer {
    /// All layers, floor-to-ceiling.
    pub const ALL: [Self; LAYER_COUNT] = [Self::Floor, Self::Active, Self::Ceiling];

    /// Recovers a `Layer` from its wire/storage discriminant, for
    /// decoding block addresses carried as a bare `u8`.
    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Floor),
            1 => Some(Self::Active),
            2 => Some(Self::Ceiling),
            _ => None,
        }
    }

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

/// Chunk coordinate (identifies a chunk in the world grid).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct ChunkCoord {
    /// X coordinate (in chunks, not blocks).
    pub x: i32,
    /// Y coordinate (in chunks, not blocks).
    pub y: i32,
}

impl ChunkCoord {
    /// Creates a new chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Converts world block coordinates to a chunk coordinate.
    #[inline]
    #[must_use]
    pub const fn from_block_pos(block_x: i32, block_y: i32) -> Self {
        Self {
            x: block_x.div_euclid(CHUNK_SIZE as i32),
            y: block_y.div_euclid(CHUNK_SIZE as i32),
        }
    }

    /// Returns the world X coordinate of the chunk's origin (corner).
    #[inline]
    #[must_use]
    pub const fn world_x(self) -> i32 {
        self.x * CHUNK_SIZE as i32
    }

    /// Returns the world Y coordinate of the chunk's origin.
    #[inline]
    #[must_use]
    pub const fn world_y(self) -> i32 {
        self.y * CHUNK_SIZE as i32
    }

    /// File-name stem this chunk persists under, encoding `(cx, cy)`.
    #[must_use]
    pub fn file_stem(self) -> String {
        format!("{}_{}", self.x, self.y)
    }
}

/// A single block cell: an id plus a bounded key/value metadata map.
///
/// Id `0` means empty/air. Setting a cell's id to `0` also clears its
/// metadata, so a cleared cell always round-trips to `Block::AIR`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Block {
    /// Block type id. `0` is air.
    pub id: u32,
    /// Arbitrary key/value metadata, bounded to `MAX_CELL_METADATA_BYTES`
    /// when serialized.
    pub metadata: HashMap<String, String>,
}

impl Block {
    /// Air block (empty, no metadata).
    #[must_use]
    pub fn air() -> Self {
        Self::default()
    }

    /// Creates a block with the given id and no metadata.
    #[must_use]
    pub fn new(id: u32) -> Self {
        Self { id, metadata: HashMap::new() }
    }

    /// Returns true if this is an air block.
    #[inline]
    #[must_use]
    pub fn is_air(&self) -> bool {
        self.id == 0
    }

    /// Returns whether this block's id is registered as passable for
    /// entity movement. Default capability: only air is passable.
    #[inline]
    #[must_use]
    pub fn is_passable(&self) -> bool {
        self.is_air()
    }

    /// Estimated wire/storage size of this cell's metadata, in bytes.
    #[must_use]
    pub fn metadata_size(&self) -> usize {
        self.metadata.iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

/// A Pod record used only for the on-disk block-id layer (metadata is
/// stored separately, sparse, since most cells carry none).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
struct StoredCell {
    id: u32,
}

/// A chunk of world data: a 16x16 grid of block cells per layer, plus a
/// monotonically increasing version and a last-modified timestamp.
#[derive(Clone)]
pub struct Chunk {
    /// Chunk position in the world.
    pub coord: ChunkCoord,
    /// Block ids, indexed `[layer][y][x]`.
    ids: Box<[[[u32; CHUNK_SIZE]; CHUNK_SIZE]; LAYER_COUNT]>,
    /// Sparse metadata for cells that carry any, keyed by `(layer, x, y)`.
    metadata: HashMap<(u8, u8, u8), HashMap<String, String>>,
    /// Biome data for each column (indexed `[y][x]`).
    biomes: [[Biome; CHUNK_SIZE]; CHUNK_SIZE],
    /// Strictly increases on every mutation.
    pub version: u64,
    /// Unix millis of the last mutation.
    pub last_modified_ms: u64,
    /// Whether this chunk has unsaved mutations.
    pub modified: bool,
}

impl Chunk {
    /// Creates a new empty chunk at the given coordinates.
    #[must_use]
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            ids: Box::new([[[0u32; CHUNK_SIZE]; CHUNK_SIZE]; LAYER_COUNT]),
            metadata: HashMap::new(),
            biomes: [[Biome::Plains; CHUNK_SIZE]; CHUNK_SIZE],
            version: 0,
            last_modified_ms: 0,
            modified: false,
        }
    }

    /// Gets a block at local coordinates (0..16, 0..16).
    #[must_use]
    pub fn get_block(&self, layer: Layer, x: usize, y: usize) -> Block {
        if x >= CHUNK_SIZE || y >= CHUNK_SIZE {
            return Block::air();
        }
        let id = self.ids[layer.index()][y][x];
        let metadata = self
            .metadata
            .get(&(layer.index() as u8, x as u8, y as u8))
            .cloned()
            .unwrap_or_default();
        Block { id, metadata }
    }

    /// Sets a block at local coordinates. Returns `false` (no-op) when
    /// the coordinates are out of range or the metadata exceeds the
    /// per-cell bound; callers are expected to have already validated
    /// the block id against the registered range.
    pub fn set_block(&mut self, layer: Layer, x: usize, y: usize, block: Block, now_ms: u64) -> bool {
        if x >= CHUNK_SIZE || y >= CHUNK_SIZE {
            return false;
        }
        let size: usize = block.metadata.iter().map(|(k, v)| k.len() + v.len()).sum();
        if size > MAX_CELL_METADATA_BYTES {
            return false;
        }

        let key = (layer.index() as u8, x as u8, y as u8);
        self.ids[layer.index()][y][x] = block.id;
        if block.id == 0 || block.metadata.is_empty() {
            self.metadata.remove(&key);
        } else {
            self.metadata.insert(key, block.metadata);
        }

        self.version += 1;
        self.last_modified_ms = now_ms;
        self.modified = true;
        true
    }

    /// Gets the biome at a local column.
    #[must_use]
    pub fn get_biome(&self, x: usize, y: usize) -> Biome {
        if x < CHUNK_SIZE && y < CHUNK_SIZE {
            self.biomes[y][x]
        } else {
            Biome::Plains
        }
    }

    /// Sets the biome at a local column.
    pub fn set_biome(&mut self, x: usize, y: usize, biome: Biome) {
        if x < CHUNK_SIZE && y < CHUNK_SIZE {
            self.biomes[y][x] = biome;
        }
    }

    /// Saves the chunk to a compressed binary file. Block ids are
    /// bulk-compressed; sparse metadata and the version/timestamp
    /// header ride alongside as a small uncompressed prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if file operations fail.
    pub fn save_compressed(&self, path: &Path) -> std::io::Result<()> {
        let cells: Vec<StoredCell> = self
            .ids
            .iter()
            .flat_map(|layer| layer.iter())
            .flat_map(|row| row.iter())
            .map(|&id| StoredCell { id })
            .collect();
        let block_bytes = bytemuck::cast_slice::<StoredCell, u8>(&cells);
        let compressed = compress_prepend_size(block_bytes);

        let mut file = std::fs::File::create(path)?;
        file.write_all(&self.version.to_le_bytes())?;
        file.write_all(&self.last_modified_ms.to_le_bytes())?;
        file.write_all(&compressed)?;
        Ok(())
    }

    /// Loads a chunk from a compressed binary file.
    ///
    /// # Errors
    ///
    /// Returns an error if file operations or decompression fail, or the
    /// decoded payload does not match the expected cell count.
    pub fn load_compressed(path: &Path, coord: ChunkCoord) -> std::io::Result<Self> {
        let mut file = std::fs::File::open(path)?;
        let mut version_bytes = [0u8; 8];
        let mut modified_bytes = [0u8; 8];
        file.read_exact(&mut version_bytes)?;
        file.read_exact(&mut modified_bytes)?;

        let mut compressed = Vec::new();
        file.read_to_end(&mut compressed)?;
        let decompressed = decompress_size_prepended(&compressed)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;

        let expected_size = BLOCKS_PER_CHUNK * std::mem::size_of::<StoredCell>();
        if decompressed.len() != expected_size {
            return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "invalid chunk payload size"));
        }

        let mut chunk = Self::new(coord);
        chunk.version = u64::from_le_bytes(version_bytes);
        chunk.last_modified_ms = u64::from_le_bytes(modified_bytes);

        let cells = bytemuck::cast_slice::<u8, StoredCell>(&decompressed);
        let mut idx = 0;
        for layer in 0..LAYER_COUNT {
            for y in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    chunk.ids[layer][y][x] = cells[idx].id;
                    idx += 1;
                }
            }
        }

        Ok(chunk)
    }

    /// Raw block-id data size in bytes (uncompressed, excluding metadata).
    #[must_use]
    pub const fn data_size() -> usize {
        BLOCKS_PER_CHUNK * std::mem::size_of::<StoredCell>()
    }
}

/// Chunk generator using seeded procedural noise.
pub struct ChunkGenerator {
    classifier: BiomeClassifier,
    detail_noise: SimplexNoise,
    seed: WorldSeed,
}

impl ChunkGenerator {
    /// Creates a new chunk generator for the given world seed.
    #[must_use]
    pub fn new(seed: WorldSeed) -> Self {
        Self {
            classifier: BiomeClassifier::new(seed),
            detail_noise: SimplexNoise::new(seed.derive(100)),
            seed,
        }
    }

    /// Generates a chunk at the given coordinates.
    ///
    /// `FLOOR` carries solid terrain keyed off the biome's surface
    /// block; `ACTIVE` is air except for scattered biome decoration
    /// (one feature block per column, deterministic in the seed);
    /// `CEILING` is air except in forest-like biomes, which get sparse
    /// canopy cover.
    #[must_use]
    pub fn generate(&self, coord: ChunkCoord) -> Chunk {
        let mut chunk = Chunk::new(coord);
        let world_x = coord.world_x();
        let world_y = coord.world_y();

        for local_y in 0..CHUNK_SIZE {
            for local_x in 0..CHUNK_SIZE {
                let block_x = world_x + local_x as i32;
                let block_y = world_y + local_y as i32;
                let biome = self.classifier.classify(block_x as f64, block_y as f64);
                chunk.set_biome(local_x, local_y, biome);

                let floor_id = biome.surface_block();
                chunk.ids[Layer::Floor.index()][local_y][local_x] = floor_id;

                let decoration = self.detail_noise.sample(block_x as f64 * 0.15, block_y as f64 * 0.15);
                if decoration > 0.75 {
                    chunk.ids[Layer::Active.index()][local_y][local_x] = biome.decoration_block();
                }
                if biome.has_canopy() && decoration > 0.55 {
                    chunk.ids[Layer::Ceiling.index()][local_y][local_x] = biome.canopy_block();
                }
            }
        }

        chunk
    }

    /// Returns the world seed this generator was built from.
    #[inline]
    #[must_use]
    pub const fn seed(&self) -> WorldSeed {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_set_get_roundtrip() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        assert!(chunk.get_block(Layer::Active, 3, 4).is_air());

        let block = Block::new(42);
        assert!(chunk.set_block(Layer::Active, 3, 4, block.clone(), 1_000));
        assert_eq!(chunk.get_block(Layer::Active, 3, 4), block);
        assert_eq!(chunk.version, 1);
        assert_eq!(chunk.last_modified_ms, 1_000);
    }

    #[test]
    fn test_clearing_to_air_drops_metadata() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        let mut block = Block::new(7);
        block.metadata.insert("type".into(), "stone".into());
        chunk.set_block(Layer::Floor, 1, 1, block, 10);

        chunk.set_block(Layer::Floor, 1, 1, Block::air(), 20);
        let read_back = chunk.get_block(Layer::Floor, 1, 1);
        assert!(read_back.is_air());
        assert!(read_back.metadata.is_empty());
    }

    #[test]
    fn test_oversize_metadata_rejected() {
        let mut chunk = Chunk::new(ChunkCoord::new(0, 0));
        let mut block = Block::new(1);
        block.metadata.insert("blob".into(), "x".repeat(MAX_CELL_METADATA_BYTES + 1));
        assert!(!chunk.set_block(Layer::Active, 0, 0, block, 1));
        assert!(chunk.get_block(Layer::Active, 0, 0).is_air());
    }

    #[test]
    fn test_version_strictly_increases() {
        let mut chunk = Chunk::new(ChunkCoord::new(2, -3));
        for i in 0..5u64 {
            chunk.set_block(Layer::Active, 0, 0, Block::new(i as u32 + 1), i);
            assert_eq!(chunk.version, i + 1);
        }
    }

    #[test]
    fn test_chunk_compression_roundtrip() {
        let gen = ChunkGenerator::new(WorldSeed::new(42));
        let mut chunk = gen.generate(ChunkCoord::new(0, 0));
        chunk.set_block(Layer::Active, 5, 5, Block::new(99), 500);

        let temp_path = std::env::temp_dir().join("node_world_test_chunk.bin");
        chunk.save_compressed(&temp_path).unwrap();
        let loaded = Chunk::load_compressed(&temp_path, ChunkCoord::new(0, 0)).unwrap();

        for layer in Layer::ALL {
            for y in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    assert_eq!(chunk.ids[layer.index()][y][x], loaded.ids[layer.index()][y][x]);
                }
            }
        }
        assert_eq!(loaded.version, chunk.version);
        assert_eq!(loaded.last_modified_ms, chunk.last_modified_ms);

        std::fs::remove_file(&temp_path).ok();
    }

    #[test]
    fn test_generator_is_deterministic() {
        let a = ChunkGenerator::new(WorldSeed::new(7)).generate(ChunkCoord::new(4, -2));
        let b = ChunkGenerator::new(WorldSeed::new(7)).generate(ChunkCoord::new(4, -2));
        for layer in Layer::ALL {
            for y in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    assert_eq!(a.ids[layer.index()][y][x], b.ids[layer.index()][y][x]);
                }
            }
        }
    }
}
