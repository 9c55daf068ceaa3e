//! # ECS Performance Benchmark
//!
//! TARGET:
//! - 1,000,000 entities
//! - < 1ms per tick
//! - 0 allocations during tick
//!
//! Run with: `cargo bench --package node_core`

#![allow(missing_docs)]
#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion, BenchmarkId};
use node_core::{EntityKind, Position, Velocity, World};

const ENTITY_COUNT: usize = 1_000_000;

fn bench_world_creation(c: &mut Criterion) {
    c.bench_function("world_creation_1M", |b| {
        b.iter(|| black_box(World::new(ENTITY_COUNT)));
    });
}

fn bench_spawn_entities(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_entities");

    for count in [10_000, 100_000, ENTITY_COUNT] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let mut world = World::new(count);
                for i in 0..count {
                    black_box(world.spawn(EntityKind::PLAYER, Position::new(i as f32, 0.0)));
                }
                world.alive_count()
            });
        });
    }

    group.finish();
}

/// THE CRITICAL BENCHMARK: Update 1M entity positions in < 1ms.
fn bench_position_update(c: &mut Criterion) {
    let mut world = World::new(ENTITY_COUNT);
    for i in 0..ENTITY_COUNT {
        let id = world.spawn(EntityKind::NPC, Position::new(i as f32, 0.0));
        let idx = id.index() as usize;
        world.velocities.set(idx, Velocity::new(0.1, 0.2));
    }

    c.bench_function("CRITICAL_tick_1M_positions", |b| {
        b.iter(|| {
            world.update_positions(0.016);
            black_box(world.alive_count())
        });
    });
}

fn bench_raw_slice_update(c: &mut Criterion) {
    let mut positions: Vec<[f32; 2]> = vec![[0.0; 2]; ENTITY_COUNT];
    let velocities: Vec<[f32; 2]> = vec![[0.1, 0.2]; ENTITY_COUNT];

    c.bench_function("raw_slice_1M_update", |b| {
        b.iter(|| {
            for (pos, vel) in positions.iter_mut().zip(velocities.iter()) {
                pos[0] += vel[0] * 0.016;
                pos[1] += vel[1] * 0.016;
            }
            black_box(positions.len())
        });
    });
}

fn bench_component_access(c: &mut Criterion) {
    let mut world = World::new(ENTITY_COUNT);
    for i in 0..ENTITY_COUNT {
        world.spawn(EntityKind::ITEM, Position::new(i as f32, 0.0));
    }

    let mut group = c.benchmark_group("component_access");

    group.bench_function("sequential_read_1M", |b| {
        b.iter(|| {
            let mut sum = 0.0_f32;
            for pos in world.positions.as_slice().iter() {
                sum += pos.x;
            }
            black_box(sum)
        });
    });

    group.bench_function("sequential_write_1M", |b| {
        b.iter(|| {
            for pos in world.positions.as_mut_slice().iter_mut() {
                pos.x += 0.001;
            }
            black_box(world.alive_count())
        });
    });

    let indices: Vec<usize> = {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        (0..10000)
            .map(|i| {
                let mut hasher = DefaultHasher::new();
                i.hash(&mut hasher);
                (hasher.finish() as usize) % ENTITY_COUNT
            })
            .collect()
    };

    group.bench_function("random_access_10K", |b| {
        b.iter(|| {
            let mut sum = 0.0_f32;
            for &idx in &indices {
                if let Some(pos) = world.positions.get(idx) {
                    sum += pos.x;
                }
            }
            black_box(sum)
        });
    });

    group.finish();
}

fn bench_spawn_despawn_cycle(c: &mut Criterion) {
    let mut world = World::new(ENTITY_COUNT);

    let mut ids = Vec::with_capacity(ENTITY_COUNT / 2);
    for i in 0..(ENTITY_COUNT / 2) {
        ids.push(world.spawn(EntityKind::ANIMAL, Position::new(i as f32, 0.0)));
    }

    c.bench_function("spawn_despawn_cycle_100K", |b| {
        b.iter(|| {
            for id in ids.iter().take(100_000) {
                world.despawn(*id);
            }
            for id in ids.iter_mut().take(100_000) {
                *id = world.spawn(EntityKind::ANIMAL, Position::new(0.0, 0.0));
            }
            black_box(world.alive_count())
        });
    });
}

criterion_group!(
    benches,
    bench_world_creation,
    bench_spawn_entities,
    bench_position_update,
    bench_raw_slice_update,
    bench_component_access,
    bench_spawn_despawn_cycle,
);

criterion_main!(benches);
