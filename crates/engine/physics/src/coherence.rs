//! Room coherence for free-floating dynamic objects

use crate::container::{ColliderTag, ContainerSet, ObjectKind};
use crate::convert::from_vector;
use catacomb_world::RoomSet;
use rapier3d::prelude::*;
use tracing::trace;

/// Re-resolve the room of every moving misc object after a step
///
/// Only non-fixed bodies tagged with a [`ObjectKind::MiscDynamic`] container
/// are tracked; entity body parts follow their entity instead. The search
/// starts from the last known room and its neighbours.
///
/// # Returns
/// Number of containers whose room changed
pub fn update_rooms(
    bodies: &RigidBodySet,
    containers: &mut ContainerSet,
    rooms: &RoomSet,
) -> usize {
    let mut changed = 0;

    for (handle, body) in bodies.iter() {
        if body.is_fixed() {
            continue;
        }
        let Some(container_handle) = ColliderTag::from_user_data(body.user_data).container else {
            continue;
        };
        let Some(container) = containers.get_mut(container_handle) else {
            continue;
        };
        if container.kind != ObjectKind::MiscDynamic {
            continue;
        }

        let pos = from_vector(body.translation());
        let room = rooms.find_pos_coherent(pos, container.room);
        if room != container.room {
            trace!(
                body = ?handle,
                from = ?container.room,
                to = ?room,
                "misc object changed room"
            );
            container.room = room;
            changed += 1;
        }
    }

    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::{Container, ObjectRef};
    use catacomb_world::{Room, RoomId};
    use glam::Vec3;

    fn rooms() -> RoomSet {
        RoomSet::new(vec![
            Room::new(Vec3::ZERO, Vec3::splat(1024.0)).with_near_rooms([RoomId(1)]),
            Room::new(Vec3::new(1024.0, 0.0, 0.0), Vec3::new(2048.0, 1024.0, 1024.0)),
        ])
    }

    fn tagged_body(bodies: &mut RigidBodySet, builder: RigidBodyBuilder, tag: ColliderTag) {
        bodies.insert(builder.user_data(tag.to_user_data()).build());
    }

    #[test]
    fn test_misc_object_changes_room() {
        let rooms = rooms();
        let mut containers = ContainerSet::new();
        let misc = containers.insert(Container::new(
            ObjectKind::MiscDynamic,
            Some(ObjectRef::Item(1)),
            Some(RoomId(0)),
        ));

        let mut bodies = RigidBodySet::new();
        tagged_body(
            &mut bodies,
            RigidBodyBuilder::dynamic().translation(vector![1500.0, 512.0, 512.0]),
            ColliderTag::new(misc, 0),
        );

        assert_eq!(update_rooms(&bodies, &mut containers, &rooms), 1);
        assert_eq!(containers.get(misc).unwrap().room, Some(RoomId(1)));

        // Already coherent: nothing changes
        assert_eq!(update_rooms(&bodies, &mut containers, &rooms), 0);
    }

    #[test]
    fn test_other_kinds_are_ignored() {
        let rooms = rooms();
        let mut containers = ContainerSet::new();
        let part = containers.insert(Container::new(
            ObjectKind::EntityBodyPart,
            Some(ObjectRef::Entity(1)),
            Some(RoomId(0)),
        ));
        let fixed_misc = containers.insert(Container::new(
            ObjectKind::MiscDynamic,
            None,
            Some(RoomId(0)),
        ));

        let mut bodies = RigidBodySet::new();
        let far = vector![1500.0, 512.0, 512.0];
        tagged_body(
            &mut bodies,
            RigidBodyBuilder::kinematic_position_based().translation(far),
            ColliderTag::new(part, 0),
        );
        tagged_body(
            &mut bodies,
            RigidBodyBuilder::fixed().translation(far),
            ColliderTag::new(fixed_misc, 0),
        );
        bodies.insert(RigidBodyBuilder::dynamic().translation(far).build());

        assert_eq!(update_rooms(&bodies, &mut containers, &rooms), 0);
        assert_eq!(containers.get(part).unwrap().room, Some(RoomId(0)));
        assert_eq!(containers.get(fixed_misc).unwrap().room, Some(RoomId(0)));
    }
}
