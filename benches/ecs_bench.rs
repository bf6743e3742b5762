#![allow(dead_code)]
//! Benchmarks for the core command-drain / archetype-move / query path.
//!
//! Run with: cargo bench
//!
//! Measures entity spawning, deletion, structural moves (archetype
//! fragmentation), the `DontFragment` collapse, and query iteration --
//! the operations on the hot mutate/sync/query path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use shard_ecs::{ComponentFlags, Selector, World};

fn bench_spawn(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn");

    group.bench_function("spawn_1k_single_component", |b| {
        b.iter(|| {
            let mut world = World::new();
            let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
            for i in 0..1_000 {
                let e = world.new_entity().unwrap();
                world.set(e, position, Some(serde_json::json!({"x": i, "y": 0}))).unwrap();
            }
            world.sync().unwrap();
            black_box(&world);
        });
    });

    group.bench_function("spawn_1k_two_components", |b| {
        b.iter(|| {
            let mut world = World::new();
            let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
            let velocity = world.component(ComponentFlags::default(), Some("Velocity")).unwrap();
            for i in 0..1_000 {
                let e = world.new_entity().unwrap();
                world.set(e, position, Some(serde_json::json!({"x": i, "y": 0}))).unwrap();
                world.set(e, velocity, Some(serde_json::json!({"x": 1, "y": 0}))).unwrap();
            }
            world.sync().unwrap();
            black_box(&world);
        });
    });

    group.finish();
}

fn bench_delete(c: &mut Criterion) {
    c.bench_function("delete_1k_entities", |b| {
        b.iter_with_setup(
            || {
                let mut world = World::new();
                let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
                let mut entities = Vec::with_capacity(1_000);
                for i in 0..1_000 {
                    let e = world.new_entity().unwrap();
                    world.set(e, position, Some(serde_json::json!(i))).unwrap();
                    entities.push(e);
                }
                world.sync().unwrap();
                (world, entities)
            },
            |(mut world, entities)| {
                for e in entities {
                    world.delete(e).unwrap();
                }
                world.sync().unwrap();
                black_box(&world);
            },
        );
    });
}

fn bench_structural_moves(c: &mut Criterion) {
    c.bench_function("1k_entities_gain_then_lose_a_component", |b| {
        b.iter_with_setup(
            || {
                let mut world = World::new();
                let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
                let velocity = world.component(ComponentFlags::default(), Some("Velocity")).unwrap();
                let mut entities = Vec::with_capacity(1_000);
                for _ in 0..1_000 {
                    let e = world.new_entity().unwrap();
                    world.set(e, position, Some(serde_json::json!(1))).unwrap();
                    entities.push(e);
                }
                world.sync().unwrap();
                (world, entities, velocity)
            },
            |(mut world, entities, velocity)| {
                for &e in &entities {
                    world.set(e, velocity, Some(serde_json::json!(2))).unwrap();
                }
                world.sync().unwrap();
                for &e in &entities {
                    world.remove(e, velocity).unwrap();
                }
                world.sync().unwrap();
                black_box(&world);
            },
        );
    });
}

fn bench_dont_fragment(c: &mut Criterion) {
    let mut group = c.benchmark_group("dont_fragment");
    for &n in &[100usize, 1_000] {
        group.bench_with_input(BenchmarkId::new("relation_fanout", n), &n, |b, &n| {
            b.iter(|| {
                let mut world = World::new();
                let follows = world
                    .component(ComponentFlags { dont_fragment: true, ..Default::default() }, Some("Follows"))
                    .unwrap();
                let parent = world.new_entity().unwrap();
                world.sync().unwrap();
                for i in 0..n {
                    let child = world.new_entity().unwrap();
                    let rel = world.relation(follows, Some(parent)).unwrap();
                    world.set(child, rel, Some(serde_json::json!(i))).unwrap();
                }
                world.sync().unwrap();
                black_box(world.archetype_count());
            });
        });
    }
    group.finish();
}

fn bench_query_iteration(c: &mut Criterion) {
    c.bench_function("query_1k_two_component_rows", |b| {
        b.iter_with_setup(
            || {
                let mut world = World::new();
                let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
                let velocity = world.component(ComponentFlags::default(), Some("Velocity")).unwrap();
                for i in 0..1_000 {
                    let e = world.new_entity().unwrap();
                    world.set(e, position, Some(serde_json::json!(i))).unwrap();
                    world.set(e, velocity, Some(serde_json::json!(i))).unwrap();
                }
                world.sync().unwrap();
                let query = world.create_query(vec![Selector::required(position), Selector::required(velocity)]);
                (world, query)
            },
            |(world, query)| {
                let mut total = 0i64;
                world.query_for_each(query, |_entity, values| {
                    if let shard_ecs::QueryValue::Value(v) = &values[0] {
                        total += v.as_i64().unwrap_or(0);
                    }
                });
                black_box(total);
            },
        );
    });
}

criterion_group!(
    benches,
    bench_spawn,
    bench_delete,
    bench_structural_moves,
    bench_dont_fragment,
    bench_query_iteration
);
criterion_main!(benches);
