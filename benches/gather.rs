//! Gather benchmarks: instant sweeps and travelling shots against a crowded
//! arena with pose history.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use arena_gem::core::entity::{HostFrameId, NetEntityId};
use arena_gem::core::math::{Quat, Transform, Vec3};
use arena_gem::weapons::gather::{
    gather_entities, gather_entities_multisegment, GatherContext, NetEntityIdSet, NetworkTime,
    ShotResult,
};
use arena_gem::weapons::types::{ActivateEvent, ActiveShot, GatherParams, GatherShape};
use arena_gem::weapons::world::SimpleWorld;

const SHOOTER: NetEntityId = NetEntityId::new(0);

fn arena(bodies: u64, frames: u32) -> SimpleWorld {
    let mut rng = StdRng::seed_from_u64(42);
    let mut world = SimpleWorld::new();
    for id in 1..=bodies {
        let position = Vec3::new(rng.gen_range(-20.0..20.0), rng.gen_range(5.0..40.0), 0.0);
        world.add_dynamic_sphere(NetEntityId::new(id), position, 0.5);
    }
    for frame in 0..frames {
        for id in 1..=bodies {
            let position = Vec3::new(rng.gen_range(-20.0..20.0), rng.gen_range(5.0..40.0), 0.0);
            world.set_position(NetEntityId::new(id), position);
        }
        world.record_frame(HostFrameId(frame));
    }
    world
}

fn excluded() -> NetEntityIdSet {
    [SHOOTER].into_iter().collect()
}

fn bench_instant(c: &mut Criterion) {
    let mut group = c.benchmark_group("gather_instant");
    let params = GatherParams {
        shape: GatherShape::Sphere,
        cast_distance: 50.0,
        cast_radius: 0.25,
        multi_hit: true,
        ..GatherParams::default()
    };
    let target = Vec3::new(0.0, 45.0, 0.0);
    let event = ActivateEvent {
        initial_transform: Transform::new(Quat::from_look_direction(target), Vec3::ZERO),
        target_position: target,
        shooter_id: SHOOTER,
        projectile_id: NetEntityId::INVALID,
    };
    let filtered = excluded();

    for bodies in [8u64, 32, 128] {
        let world = arena(bodies, 16);
        group.bench_with_input(BenchmarkId::new("live", bodies), &world, |b, world| {
            let ctx = GatherContext::new(world, NetworkTime::live(HostFrameId(15)), 3);
            b.iter(|| gather_entities(black_box(&ctx), &params, &event, &filtered))
        });
        group.bench_with_input(BenchmarkId::new("rewound", bodies), &world, |b, world| {
            let ctx = GatherContext::new(world, NetworkTime::rewound_to(HostFrameId(4)), 3);
            b.iter(|| gather_entities(black_box(&ctx), &params, &event, &filtered))
        });
    }
    group.finish();
}

fn bench_travelling(c: &mut Criterion) {
    let mut group = c.benchmark_group("gather_multisegment");
    let params = GatherParams {
        cast_distance: 60.0,
        travel_speed: 30.0,
        bullet_drop: true,
        ..GatherParams::default()
    };
    let target = Vec3::new(0.0, 60.0, 0.0);
    let filtered = excluded();
    let world = arena(64, 16);

    for segments in [1u32, 3, 8] {
        group.bench_function(BenchmarkId::new("segments", segments), |b| {
            let ctx = GatherContext::new(&world, NetworkTime::live(HostFrameId(15)), segments);
            b.iter(|| {
                let mut shot = ActiveShot::new(Transform::new(Quat::from_look_direction(target), Vec3::ZERO), target);
                let mut ticks = 0;
                while gather_entities_multisegment(&ctx, &params, &filtered, 1.0 / 60.0, &mut shot) == ShotResult::DoNotTerminate {
                    ticks += 1;
                }
                black_box(ticks)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_instant, bench_travelling);
criterion_main!(benches);
