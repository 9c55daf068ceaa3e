//! # Realistic ECS Benchmark
//!
//! Real-world access patterns, not just linear iteration:
//! 1. Random access
//! 2. Fragmentation (entities despawned)
//! 3. Cache-hostile strided access
//! 4. Mixed spawn/despawn/update workloads

#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use node_core::{EntityId, EntityKind, Position, World};

const ENTITY_COUNT: usize = 1_000_000;

fn generate_random_indices(count: usize, max: usize, seed: u64) -> Vec<usize> {
    let mut indices = Vec::with_capacity(count);
    let mut state = seed;

    for _ in 0..count {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        indices.push((state as usize) % max);
    }

    indices
}

fn generate_cache_hostile_indices(count: usize, max: usize) -> Vec<usize> {
    let mut indices = Vec::with_capacity(count);
    let stride = 4096;

    for i in 0..count {
        indices.push((i * stride) % max);
    }

    indices
}

fn bench_linear_vs_random_access(c: &mut Criterion) {
    let mut group = c.benchmark_group("access_patterns");

    let mut world = World::new(ENTITY_COUNT);
    for i in 0..ENTITY_COUNT {
        world.spawn(EntityKind::NPC, Position::new(i as f32, i as f32));
    }

    let random_indices = generate_random_indices(ENTITY_COUNT, ENTITY_COUNT, 0xDEAD_BEEF);
    let cache_hostile_indices = generate_cache_hostile_indices(ENTITY_COUNT, ENTITY_COUNT);

    group.bench_function("linear_access_1M", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for i in 0..ENTITY_COUNT {
                if let Some(pos) = world.positions.get(i) {
                    sum += pos.x;
                }
            }
            black_box(sum)
        });
    });

    group.bench_function("random_access_1M", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for &idx in &random_indices {
                if let Some(pos) = world.positions.get(idx) {
                    sum += pos.x;
                }
            }
            black_box(sum)
        });
    });

    group.bench_function("cache_hostile_access_1M", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for &idx in &cache_hostile_indices {
                if let Some(pos) = world.positions.get(idx) {
                    sum += pos.x;
                }
            }
            black_box(sum)
        });
    });

    group.finish();
}

fn bench_fragmented_world(c: &mut Criterion) {
    let mut group = c.benchmark_group("fragmentation");

    for frag_percent in [0, 25, 50, 75] {
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{frag_percent}%_fragmented")),
            &frag_percent,
            |b, &frag_percent| {
                let mut world = World::new(ENTITY_COUNT);
                let mut entity_ids: Vec<EntityId> = Vec::with_capacity(ENTITY_COUNT);

                for i in 0..ENTITY_COUNT {
                    let id = world.spawn(EntityKind::ITEM, Position::new(i as f32, 0.0));
                    entity_ids.push(id);
                }

                let despawn_count = (ENTITY_COUNT * frag_percent) / 100;
                let random_indices = generate_random_indices(despawn_count, ENTITY_COUNT, 0x1234_5678);

                for &idx in &random_indices {
                    world.despawn(entity_ids[idx]);
                }

                b.iter(|| {
                    let mut sum = 0.0f32;
                    let mut count = 0usize;

                    for (idx, entity) in world.entities.iter().enumerate() {
                        if entity.alive {
                            if let Some(pos) = world.positions.get(idx) {
                                sum += pos.x;
                                count += 1;
                            }
                        }
                    }

                    black_box((sum, count))
                });
            },
        );
    }

    group.finish();
}

fn bench_hot_entity_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("hot_entity_set");

    let hot_set_size = 1000;

    let mut world = World::new(ENTITY_COUNT);
    for i in 0..ENTITY_COUNT {
        world.spawn(EntityKind::PLAYER, Position::new(i as f32, 0.0));
    }

    let hot_indices: Vec<usize> = (0..hot_set_size).collect();
    let scattered_hot_indices = generate_random_indices(hot_set_size, ENTITY_COUNT, 0xCAFE_BABE);

    group.bench_function("contiguous_hot_set_1K", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for &idx in &hot_indices {
                if let Some(pos) = world.positions.get(idx) {
                    sum += pos.x;
                }
            }
            black_box(sum)
        });
    });

    group.bench_function("scattered_hot_set_1K", |b| {
        b.iter(|| {
            let mut sum = 0.0f32;
            for &idx in &scattered_hot_indices {
                if let Some(pos) = world.positions.get(idx) {
                    sum += pos.x;
                }
            }
            black_box(sum)
        });
    });

    group.finish();
}

fn bench_mixed_workload(c: &mut Criterion) {
    let mut group = c.benchmark_group("mixed_workload");

    let spawn_per_tick = 100;
    let despawn_per_tick = 100;
    let update_per_tick = 10_000;

    group.bench_function("tick_with_churn", |b| {
        let mut world = World::new(ENTITY_COUNT);
        let mut entity_ids: Vec<EntityId> = Vec::with_capacity(ENTITY_COUNT / 2);

        for _ in 0..(ENTITY_COUNT / 2) {
            let id = world.spawn(EntityKind::NPC, Position::new(0.0, 0.0));
            entity_ids.push(id);
        }

        let mut tick_counter = 0u64;

        b.iter(|| {
            for i in 0..despawn_per_tick {
                let idx = ((tick_counter as usize * 7 + i) % entity_ids.len()).max(1) - 1;
                if idx < entity_ids.len() {
                    world.despawn(entity_ids[idx]);
                }
            }

            for _ in 0..spawn_per_tick {
                let id = world.spawn(EntityKind::NPC, Position::new(tick_counter as f32, 0.0));
                if !id.is_null() && entity_ids.len() < ENTITY_COUNT {
                    entity_ids.push(id);
                }
            }

            let update_indices =
                generate_random_indices(update_per_tick, entity_ids.len().max(1), tick_counter);

            for &idx in &update_indices {
                if idx < entity_ids.len() && world.is_alive(entity_ids[idx]) {
                    let pos_idx = entity_ids[idx].index() as usize;
                    if let Some(pos) = world.positions.get_mut(pos_idx) {
                        pos.x += 0.1;
                        pos.y += 0.1;
                    }
                }
            }

            tick_counter += 1;
            black_box(world.alive_count())
        });
    });

    group.finish();
}

fn bench_entity_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("entity_lookup");

    let mut world = World::new(ENTITY_COUNT);
    let mut entity_ids: Vec<EntityId> = Vec::with_capacity(ENTITY_COUNT);

    for i in 0..ENTITY_COUNT {
        entity_ids.push(world.spawn(EntityKind::VEHICLE, Position::new(i as f32, 0.0)));
    }

    let random_order = generate_random_indices(10_000, ENTITY_COUNT, 0xBEEF_CAFE);

    group.bench_function("lookup_10K_random_entities", |b| {
        b.iter(|| {
            let mut found = 0usize;
            for &idx in &random_order {
                let id = entity_ids[idx];
                if world.is_alive(id) {
                    found += 1;
                }
            }
            black_box(found)
        });
    });

    group.bench_function("get_10K_random_entities", |b| {
        b.iter(|| {
            let mut found = 0usize;
            for &idx in &random_order {
                let id = entity_ids[idx];
                if world.get(id).is_some() {
                    found += 1;
                }
            }
            black_box(found)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_linear_vs_random_access,
    bench_fragmented_world,
    bench_hot_entity_set,
    bench_mixed_workload,
    bench_entity_lookup,
);

criterion_main!(benches);
