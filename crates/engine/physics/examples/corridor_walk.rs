use catacomb_physics::catacomb_world::{
    BaseMesh, BodyParts, BoneTag, Room, RoomId, RoomSet, Sector, Skeleton,
};
use catacomb_physics::{
    build_rigid_bodies, check_next_penetration, dispatch_collision_callbacks, fix_penetrations,
    glam::{Mat4, Vec3},
    rapier3d::prelude::SharedShape,
    CollisionEvent, CollisionShapeKind, HeightInfo, PhysicsConfig, PhysicsEntity, PhysicsWorld,
};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const SECTOR: f32 = 1024.0;

/// Room of `length` sectors along X starting at sector `start`
fn corridor_room(start: usize, length: usize) -> Room {
    let sectors = (start..start + length)
        .map(|x| Sector::flat(Vec3::new(x as f32 * SECTOR, 0.0, 0.0), SECTOR, 0.0, 2048.0))
        .collect();
    Room::new(
        Vec3::new(start as f32 * SECTOR, 0.0, -512.0),
        Vec3::new((start + length) as f32 * SECTOR, SECTOR, 2048.0),
    )
    .with_sectors(sectors, Vec::new())
}

fn humanoid() -> Skeleton {
    let body = Arc::new(BaseMesh::from_box(Vec3::splat(-40.0), Vec3::splat(40.0)));
    let head = Arc::new(BaseMesh::from_box(Vec3::splat(-20.0), Vec3::splat(20.0)));
    let bones = vec![
        BoneTag::new(None, BodyParts::BODY_LOW, Some(body.clone())),
        BoneTag::new(Some(0), BodyParts::BODY_UPPER, Some(body))
            .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 90.0))),
        BoneTag::new(Some(1), BodyParts::HEAD, Some(head))
            .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 160.0))),
    ];
    match Skeleton::new(bones) {
        Ok(skeleton) => skeleton,
        Err(e) => panic!("invalid skeleton: {e}"),
    }
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("=== Corridor Walk ===\n");

    // Two rooms along X, adjacent to each other
    let rooms = RoomSet::new(vec![
        corridor_room(0, 3).with_near_rooms([RoomId(1)]),
        corridor_room(3, 3),
    ]);
    let mut world = PhysicsWorld::new(PhysicsConfig::default(), rooms);
    for room in [RoomId(0), RoomId(1)] {
        match world.add_room_heightmap(room) {
            Ok(Some(_)) => println!("Registered heightmap of room {}", room.0),
            Ok(None) => println!("Room {} has no floor geometry", room.0),
            Err(e) => println!("Skipping room {}: {e}", room.0),
        }
    }

    // A crate dropped in the first room
    let (crate_container, crate_body) = world.add_misc_dynamic(
        SharedShape::cuboid(32.0, 32.0, 32.0),
        Vec3::new(2900.0, 200.0, 600.0),
        None,
        10.0,
    );

    // The hero starts in room 0, standing on the floor
    let start = Vec3::new(512.0, 512.0, 41.0);
    let mut hero = PhysicsEntity::new(
        &mut world,
        1,
        Some(RoomId(0)),
        Mat4::from_translation(start),
        humanoid(),
        CollisionShapeKind::Box,
    );
    let bodies = build_rigid_bodies(&mut world, &mut hero);
    println!("Hero built with {bodies} bone bodies");

    // A guard standing in the second room
    let mut guard = PhysicsEntity::new(
        &mut world,
        2,
        Some(RoomId(1)),
        Mat4::from_translation(Vec3::new(4200.0, 512.0, 41.0)),
        humanoid(),
        CollisionShapeKind::Box,
    );
    build_rigid_bodies(&mut world, &mut guard);

    let dt = 1.0 / 30.0;
    let step = Vec3::new(48.0, 0.0, 0.0);
    let mut on_collision = |event: &CollisionEvent| {
        println!(
            "  collision: entity {} ({:?}) touched entity {} bone {}",
            event.entity, event.body_parts, event.activator, event.activator_bone
        );
    };

    for frame in 0..150 {
        let ahead = check_next_penetration(&mut world, &mut hero, step);

        hero.translate(step);
        dispatch_collision_callbacks(&mut world, &mut hero, &mut on_collision);
        let response = fix_penetrations(&mut world, &mut hero, Some(step), HeightInfo::default());
        let room = hero.update_room(&mut world);
        world.step(dt);

        if frame % 10 == 0 || response.horizontal_collide {
            let pos = hero.position();
            println!(
                "Frame {frame:3} | Position: ({:7.1}, {:6.1}, {:6.1}) | Room: {:?} | Reaction: {:?}{}",
                pos.x,
                pos.y,
                pos.z,
                room.map(|r| r.0),
                response.reaction,
                if response.horizontal_collide { " | wall" } else { "" }
            );
        }

        if ahead.horizontal_collide && response.horizontal_collide {
            println!("Frame {frame:3}: blocked, stopping");
            break;
        }
    }

    let crate_room = world.container(crate_container).and_then(|c| c.room);
    let crate_z = world
        .get_rigid_body(crate_body)
        .map_or(f32::NAN, |body| body.translation().z);
    println!("\nCrate rests at z = {crate_z:.1} in room {:?}", crate_room.map(|r| r.0));

    let pos = hero.position();
    println!("Final hero position: ({:.1}, {:.1}, {:.1})", pos.x, pos.y, pos.z);

    guard.destroy(&mut world);
    hero.destroy(&mut world);
}
