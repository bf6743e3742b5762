#![allow(dead_code)]

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shard_ecs::{ComponentFlags, World};

fn spawn_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("spawn_bench");

    group.bench_function("spawn_2_components", |b| {
        let mut world = World::new();
        let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
        let velocity = world.component(ComponentFlags::default(), Some("Velocity")).unwrap();
        b.iter(|| {
            for _ in 0..1000 {
                let e = world.new_entity().unwrap();
                world.set(e, position, Some(serde_json::json!([1.0, 2.0, 3.0]))).unwrap();
                world.set(e, velocity, Some(serde_json::json!([1.0, 0.0, 0.0]))).unwrap();
            }
            world.sync().unwrap();
            black_box(&world);
        });
    });

    group.bench_function("spawn_3_components", |b| {
        let mut world = World::new();
        let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
        let velocity = world.component(ComponentFlags::default(), Some("Velocity")).unwrap();
        let health = world.component(ComponentFlags::default(), Some("Health")).unwrap();
        b.iter(|| {
            for _ in 0..1000 {
                let e = world.new_entity().unwrap();
                world.set(e, position, Some(serde_json::json!([1.0, 2.0, 3.0]))).unwrap();
                world.set(e, velocity, Some(serde_json::json!([1.0, 0.0, 0.0]))).unwrap();
                world.set(e, health, Some(serde_json::json!(100))).unwrap();
            }
            world.sync().unwrap();
            black_box(&world);
        });
    });

    group.bench_function("spawn_mixed", |b| {
        let mut world = World::new();
        let position = world.component(ComponentFlags::default(), Some("Position")).unwrap();
        let velocity = world.component(ComponentFlags::default(), Some("Velocity")).unwrap();
        let health = world.component(ComponentFlags::default(), Some("Health")).unwrap();
        b.iter(|| {
            for i in 0..1000 {
                let e = world.new_entity().unwrap();
                if i % 2 == 0 {
                    world.set(e, position, Some(serde_json::json!([1.0, 2.0, 3.0]))).unwrap();
                    world.set(e, velocity, Some(serde_json::json!([1.0, 0.0, 0.0]))).unwrap();
                } else {
                    world.set(e, position, Some(serde_json::json!([1.0, 2.0, 3.0]))).unwrap();
                    world.set(e, health, Some(serde_json::json!(100))).unwrap();
                }
            }
            world.sync().unwrap();
            black_box(&world);
        });
    });

    group.finish();
}

criterion_group!(benches, spawn_benchmark);
criterion_main!(benches);
