//! Benchmark for penetration resolution
//!
//! Measures heightmap shape construction and the per-frame cost of resolving a
//! walking skeletal entity against room geometry.

use catacomb_physics::catacomb_world::{
    BaseMesh, BodyParts, BoneTag, Room, RoomId, RoomSet, Sector, Skeleton,
};
use catacomb_physics::{
    build_rigid_bodies, check_next_penetration, fix_penetrations, from_heightmap,
    CollisionShapeKind, HeightInfo, PhysicsConfig, PhysicsEntity, PhysicsWorld,
};
use criterion::{criterion_group, criterion_main, Criterion};
use glam::{Mat4, Vec3};
use std::hint::black_box;
use std::sync::Arc;

const SECTOR: f32 = 1024.0;

/// Benchmark configuration
struct BenchConfig {
    /// Sectors per room side
    room_sectors: usize,
    /// Bones per entity (a chain above the root)
    bone_count: usize,
    /// Horizontal move per frame
    step: f32,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            room_sectors: 16,
            bone_count: 8,
            step: 64.0,
        }
    }
}

/// Flat room with every other sector raised by a quarter step
fn create_room(sectors: usize) -> Room {
    let mut cells = Vec::with_capacity(sectors * sectors);
    for y in 0..sectors {
        for x in 0..sectors {
            let floor = if (x + y) % 2 == 0 { 0.0 } else { 256.0 };
            let origin = Vec3::new(x as f32 * SECTOR, y as f32 * SECTOR, 0.0);
            cells.push(Sector::flat(origin, SECTOR, floor, 4096.0));
        }
    }

    let size = sectors as f32 * SECTOR;
    Room::new(Vec3::new(0.0, 0.0, -1024.0), Vec3::new(size, size, 4096.0))
        .with_sectors(cells, Vec::new())
}

fn create_skeleton(bones: usize) -> Skeleton {
    let mesh = Arc::new(BaseMesh::from_box(Vec3::splat(-48.0), Vec3::splat(48.0)));
    let mut tags = vec![BoneTag::new(None, BodyParts::BODY_LOW, Some(mesh.clone()))];
    for i in 1..bones {
        tags.push(
            BoneTag::new(Some(i as u16 - 1), BodyParts::BODY_UPPER, Some(mesh.clone()))
                .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 100.0 * i as f32))),
        );
    }
    Skeleton::new(tags).unwrap_or_else(|e| panic!("invalid bench skeleton: {e}"))
}

fn setup(config: &BenchConfig) -> (PhysicsWorld, PhysicsEntity) {
    let rooms = RoomSet::new(vec![create_room(config.room_sectors)]);
    let mut world = PhysicsWorld::new(PhysicsConfig::default(), rooms);
    world
        .add_room_heightmap(RoomId(0))
        .unwrap_or_else(|e| panic!("heightmap failed: {e}"));

    let mut entity = PhysicsEntity::new(
        &mut world,
        1,
        Some(RoomId(0)),
        Mat4::from_translation(Vec3::new(512.0, 512.0, 40.0)),
        create_skeleton(config.bone_count),
        CollisionShapeKind::Box,
    );
    build_rigid_bodies(&mut world, &mut entity);
    (world, entity)
}

fn bench_heightmap_shape(c: &mut Criterion) {
    let room = create_room(BenchConfig::default().room_sectors);

    c.bench_function("heightmap_shape", |b| {
        b.iter(|| black_box(from_heightmap(&room.sectors, &room.tweens, true)));
    });
}

fn bench_fix_penetrations_frame(c: &mut Criterion) {
    let config = BenchConfig::default();
    let (mut world, mut entity) = setup(&config);
    let step = Vec3::new(config.step, 0.0, 0.0);
    let limit = (config.room_sectors as f32 - 1.0) * SECTOR;

    c.bench_function("fix_penetrations_frame", |b| {
        b.iter(|| {
            if entity.position().x > limit {
                entity.set_position(Vec3::new(512.0, 512.0, 40.0));
                entity.sync_bodies(&mut world);
                entity.update_ghosts(&world);
            }
            entity.translate(step);
            black_box(fix_penetrations(
                &mut world,
                &mut entity,
                Some(step),
                HeightInfo::default(),
            ))
        });
    });
}

fn bench_check_next_penetration(c: &mut Criterion) {
    let config = BenchConfig::default();
    let (mut world, mut entity) = setup(&config);
    let step = Vec3::new(config.step, 0.0, -config.step);

    c.bench_function("check_next_penetration", |b| {
        b.iter(|| black_box(check_next_penetration(&mut world, &mut entity, step)));
    });
}

criterion_group!(
    benches,
    bench_heightmap_shape,
    bench_fix_penetrations_frame,
    bench_check_next_penetration,
);
criterion_main!(benches);
