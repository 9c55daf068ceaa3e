//! Integration tests for `ChunkStore` lazily materializing chunks
//! across an arbitrarily large play area, and for `BigChunk`-scoped
//! entity ownership under continuous movement.

use node_world::{Block, ChunkStore, Layer, WorldSeed};

#[test]
fn test_walk_10_000_blocks_never_panics_and_stays_readable() {
    let mut store = ChunkStore::new(WorldSeed::new(42));

    let mut x = 0i32;
    for step in 0..10_000 {
        x += 1;
        if step % 100 == 0 {
            let _ = store.get_block(Layer::Floor, x, 0);
        }
    }

    assert!(store.loaded_chunk_count() > 0);
}

#[test]
fn test_teleport_across_map_generates_on_demand() {
    let mut store = ChunkStore::new(WorldSeed::new(99_999));

    let teleport_points = [(0, 0), (1000, 0), (-1000, 500), (500, -1000), (2000, 2000), (-2000, -2000)];

    for (x, y) in teleport_points {
        let block = store.get_block(Layer::Floor, x, y);
        assert!(block.id != 0, "expected generated terrain at ({x}, {y})");
    }
}

#[test]
fn test_entity_tracked_through_continuous_movement_stays_findable() {
    let mut store = ChunkStore::new(WorldSeed::new(1));

    for step in 0..2_000 {
        store.upsert_entity_position(7, step as f32, 0.0);
        if step % 250 == 0 {
            let nearby = store.entities_in_radius((step as f32, 0.0), 3.0);
            assert_eq!(nearby, vec![7]);
        }
    }
}

#[test]
fn test_flush_and_reload_roundtrip() {
    let mut store = ChunkStore::new(WorldSeed::new(7));
    store.register_block_id(55);
    store.set_block(Layer::Active, 10, 10, Block::new(55), 1).unwrap();

    let dir = std::env::temp_dir().join("node_world_flush_test");
    let written = store.flush_dirty(&dir).unwrap();
    assert!(written >= 1);

    let mut reloaded = ChunkStore::new(WorldSeed::new(7));
    let coord = node_world::ChunkCoord::from_block_pos(10, 10);
    assert!(reloaded.load_from_disk(&dir, coord).unwrap());
    assert_eq!(reloaded.get_block(Layer::Active, 10, 10).id, 55);

    std::fs::remove_dir_all(&dir).ok();
}
