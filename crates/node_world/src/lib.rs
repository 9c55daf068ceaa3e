//! # Spatial Index & Chunk Store
//!
//! Layered block storage in fixed-size chunks, `BigChunk` grouping for
//! bulk persistence and locking, and a spatial index over entity
//! positions sized for proximity queries at regional-node scale.
//!
//! ## Core Components
//!
//! - `SimplexNoise` / `WorldSeed`: deterministic 2D noise
//! - `BiomeClassifier`: terrain classification from noise channels
//! - `Chunk` / `ChunkGenerator`: the 16x16x3-layer block grid and its
//!   seeded procedural generator
//! - `ChunkStore`: the authoritative `BigChunk`-grouped store, with the
//!   entity spatial index and radius queries
//!
//! ## Example
//!
//! ```rust,ignore
//! use node_world::{ChunkStore, WorldSeed, Layer, Block};
//!
//! let mut store = ChunkStore::new(WorldSeed::new(12345));
//! store.register_block_id(1);
//! store.set_block(Layer::Active, 100, 200, Block::new(1), 0).unwrap();
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod biome;
pub mod chunk;
pub mod chunk_persistence;
pub mod noise;
pub mod world_manager;

pub use biome::{Biome, BiomeClassifier};
pub use chunk::{Block, Chunk, ChunkCoord, ChunkGenerator, Layer, CHUNK_SIZE, MAX_CELL_METADATA_BYTES};
pub use chunk_persistence::{BlockModifyPayload, ChunkOpType};
pub use noise::{SimplexNoise, WorldSeed};
pub use world_manager::{BigChunkCoord, ChunkStore, ChunkStoreError, BIGCHUNK_CHUNKS};
