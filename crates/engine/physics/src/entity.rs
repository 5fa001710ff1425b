//! Per-entity physics state

use crate::container::{Container, ContainerHandle, ObjectKind, ObjectRef};
use crate::convert::{from_rotation, isometry_from_mat4, mat4_from_isometry, rotation_of, translation_of};
use crate::events::CollisionNode;
use crate::ghost::{ContactScratch, GhostProbe};
use crate::world::{PhysicsError, PhysicsWorld};
use catacomb_world::{BodyParts, RoomId, Skeleton};
use glam::{Mat4, Vec3};
use rapier3d::prelude::*;

/// Which shape the bone bodies of an entity are built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum CollisionShapeKind {
    /// Convex box of the bone mesh bounds
    Box,
    /// Convex hull of the bone mesh
    TrimeshConvex,
    /// Exact triangle mesh
    #[default]
    Trimesh,
}

/// Which bones are exempt from penetration correction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FixupMask {
    /// Skip correction entirely; ghosts are still refreshed
    pub no_fix_all: bool,
    /// Bones of these parts are neither corrected nor tracked for events
    pub no_fix_body_parts: BodyParts,
}

/// Physics side of a skeletal entity
///
/// Holds the bone bodies, one ghost probe per bone and one collision node per
/// bone. Bodies and ghosts are sparse: bones without a mesh have neither.
/// An entity without ghosts (bodies not built yet) turns every correction and
/// query into a no-op.
pub struct PhysicsEntity {
    pub id: u32,
    pub transform: Mat4,
    pub skeleton: Skeleton,
    pub shape_kind: CollisionShapeKind,
    pub fixup: FixupMask,
    /// Driven by the solver (ragdoll); ghosts follow the skeleton, no correction
    pub is_dynamic: bool,
    pub(crate) container: ContainerHandle,
    pub(crate) bodies: Vec<Option<RigidBodyHandle>>,
    pub(crate) ghosts: Vec<Option<GhostProbe>>,
    pub(crate) collisions: Vec<CollisionNode>,
    pub(crate) scratch: ContactScratch,
}

impl PhysicsEntity {
    /// Create the physics side of an entity and register its container
    ///
    /// Bodies and ghosts are built separately by
    /// [`build_rigid_bodies`](crate::build_rigid_bodies).
    pub fn new(
        world: &mut PhysicsWorld,
        id: u32,
        room: Option<RoomId>,
        transform: Mat4,
        skeleton: Skeleton,
        shape_kind: CollisionShapeKind,
    ) -> Self {
        let container = world.create_container(Container::new(
            ObjectKind::EntityBodyPart,
            Some(ObjectRef::Entity(id)),
            room,
        ));

        Self {
            id,
            transform,
            skeleton,
            shape_kind,
            fixup: FixupMask::default(),
            is_dynamic: false,
            container,
            bodies: Vec::new(),
            ghosts: Vec::new(),
            collisions: Vec::new(),
            scratch: ContactScratch::new(),
        }
    }

    pub fn container(&self) -> ContainerHandle {
        self.container
    }

    pub fn position(&self) -> Vec3 {
        translation_of(&self.transform)
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.transform.w_axis = position.extend(1.0);
    }

    pub fn translate(&mut self, delta: Vec3) {
        self.transform.w_axis += delta.extend(0.0);
    }

    /// Whether ghost probes exist (bodies were built)
    pub fn has_ghosts(&self) -> bool {
        !self.ghosts.is_empty()
    }

    pub fn ghost(&self, bone: usize) -> Option<&GhostProbe> {
        self.ghosts.get(bone).and_then(Option::as_ref)
    }

    pub fn body(&self, bone: usize) -> Option<RigidBodyHandle> {
        self.bodies.get(bone).copied().flatten()
    }

    pub fn collision_node(&self, bone: usize) -> Option<&CollisionNode> {
        self.collisions.get(bone)
    }

    /// Entity-to-world transform of one bone
    pub fn bone_world_transform(&self, bone: usize) -> Option<Mat4> {
        self.skeleton
            .bone(bone)
            .map(|b| self.transform * b.full_transform)
    }

    /// Set the animated pose of one bone
    pub fn set_bone_transform(&mut self, bone: usize, full_transform: Mat4) -> Result<(), PhysicsError> {
        if bone >= self.skeleton.bone_count() {
            return Err(PhysicsError::UnknownBone(bone));
        }
        self.skeleton.set_bone_transform(bone, full_transform);
        Ok(())
    }

    /// Move the ghost probes to the current pose
    ///
    /// Dynamic entities place each ghost from entity × bone transform at the
    /// mesh centre. Kinematic entities take the pose of their bone bodies; a
    /// bone without a body falls back to the skeleton pose.
    pub fn update_ghosts(&mut self, world: &PhysicsWorld) {
        let is_dynamic = self.is_dynamic;
        for (i, bone) in self.skeleton.bones().iter().enumerate() {
            let Some(Some(ghost)) = self.ghosts.get_mut(i) else {
                continue;
            };
            let Some(mesh) = bone.mesh.as_deref() else {
                continue;
            };

            let body = self
                .bodies
                .get(i)
                .copied()
                .flatten()
                .filter(|_| !is_dynamic)
                .and_then(|h| world.get_rigid_body(h));

            match body {
                Some(body) => {
                    let pose = mat4_from_isometry(body.position());
                    ghost.set_pose(
                        from_rotation(&body.position().rotation),
                        pose.transform_point3(mesh.centre),
                    );
                }
                None => {
                    let tr = self.transform * bone.full_transform;
                    ghost.set_pose(rotation_of(&tr), tr.transform_point3(mesh.centre));
                }
            }
        }
    }

    /// Push the current entity × bone transforms to the kinematic bone bodies
    ///
    /// Their colliders move along at once, so other entities' probes see the
    /// new pose before the next step.
    pub fn sync_bodies(&self, world: &mut PhysicsWorld) {
        for (i, bone) in self.skeleton.bones().iter().enumerate() {
            let Some(handle) = self.body(i) else {
                continue;
            };
            let position = isometry_from_mat4(&(self.transform * bone.full_transform));
            world.set_kinematic_position(handle, position);
        }
    }

    /// Refresh the room of the entity container from its position
    pub fn update_room(&self, world: &mut PhysicsWorld) -> Option<RoomId> {
        let last = world.container(self.container).and_then(|c| c.room);
        let room = world.find_room(self.position(), last);
        if let Some(container) = world.container_mut(self.container) {
            container.room = room;
        }
        room
    }

    /// Remove the bone bodies, ghosts and container from the world
    pub fn destroy(mut self, world: &mut PhysicsWorld) {
        self.remove_bodies(world);
        // The container may already be gone if the world dropped it first
        let _ = world.remove_container(self.container);
    }

    pub(crate) fn remove_bodies(&mut self, world: &mut PhysicsWorld) {
        for handle in self.bodies.drain(..).flatten() {
            world.remove_rigid_body(handle);
        }
        self.ghosts.clear();
        self.collisions.clear();
    }
}

impl std::fmt::Debug for PhysicsEntity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicsEntity")
            .field("id", &self.id)
            .field("container", &self.container)
            .field("bones", &self.skeleton.bone_count())
            .field("is_dynamic", &self.is_dynamic)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PhysicsConfig;
    use crate::factory::build_rigid_bodies;
    use catacomb_world::{BaseMesh, BoneTag, Room, RoomSet};
    use std::sync::Arc;

    fn world() -> PhysicsWorld {
        let rooms = RoomSet::new(vec![
            Room::new(Vec3::ZERO, Vec3::splat(1024.0)).with_near_rooms([RoomId(1)]),
            Room::new(Vec3::new(1024.0, 0.0, 0.0), Vec3::new(2048.0, 1024.0, 1024.0)),
        ]);
        PhysicsWorld::new(PhysicsConfig::default(), rooms)
    }

    fn two_bone_skeleton() -> Skeleton {
        let mesh = Arc::new(BaseMesh::from_box(Vec3::splat(-10.0), Vec3::splat(10.0)));
        Skeleton::new(vec![
            BoneTag::new(None, BodyParts::BODY_LOW, Some(mesh.clone())),
            BoneTag::new(Some(0), BodyParts::HEAD, Some(mesh))
                .with_transform(Mat4::from_translation(Vec3::new(0.0, 0.0, 30.0))),
        ])
        .unwrap()
    }

    #[test]
    fn test_ghosts_follow_skeleton() {
        let mut world = world();
        let transform = Mat4::from_translation(Vec3::new(100.0, 100.0, 100.0));
        let mut entity = PhysicsEntity::new(
            &mut world,
            7,
            Some(RoomId(0)),
            transform,
            two_bone_skeleton(),
            CollisionShapeKind::Box,
        );
        build_rigid_bodies(&mut world, &mut entity);

        let head = entity.ghost(1).unwrap().translation();
        assert!((head - Vec3::new(100.0, 100.0, 130.0)).length() < 1.0e-3);

        // Kinematic ghosts follow the bodies, which only move on sync
        entity.translate(Vec3::new(10.0, 0.0, 0.0));
        entity.update_ghosts(&world);
        assert!((entity.ghost(0).unwrap().translation().x - 100.0).abs() < 1.0e-3);

        entity.sync_bodies(&mut world);
        entity.update_ghosts(&world);
        assert!((entity.ghost(0).unwrap().translation().x - 110.0).abs() < 1.0e-3);

        // Dynamic ghosts follow the skeleton directly
        entity.is_dynamic = true;
        entity.translate(Vec3::new(10.0, 0.0, 0.0));
        entity.update_ghosts(&world);
        assert!((entity.ghost(0).unwrap().translation().x - 120.0).abs() < 1.0e-3);
    }

    #[test]
    fn test_update_room() {
        let mut world = world();
        let mut entity = PhysicsEntity::new(
            &mut world,
            1,
            Some(RoomId(0)),
            Mat4::from_translation(Vec3::splat(500.0)),
            two_bone_skeleton(),
            CollisionShapeKind::default(),
        );

        entity.set_position(Vec3::new(1500.0, 500.0, 500.0));
        assert_eq!(entity.update_room(&mut world), Some(RoomId(1)));
        assert_eq!(world.container(entity.container()).unwrap().room, Some(RoomId(1)));
    }

    #[test]
    fn test_set_bone_transform() {
        let mut world = world();
        let mut entity = PhysicsEntity::new(
            &mut world,
            1,
            None,
            Mat4::IDENTITY,
            two_bone_skeleton(),
            CollisionShapeKind::default(),
        );

        let pose = Mat4::from_translation(Vec3::X);
        entity.set_bone_transform(1, pose).unwrap();
        assert_eq!(entity.skeleton.bone(1).unwrap().full_transform, pose);
        assert_eq!(
            entity.set_bone_transform(5, pose),
            Err(PhysicsError::UnknownBone(5))
        );
    }

    #[test]
    fn test_destroy_removes_everything() {
        let mut world = world();
        let mut entity = PhysicsEntity::new(
            &mut world,
            1,
            Some(RoomId(0)),
            Mat4::IDENTITY,
            two_bone_skeleton(),
            CollisionShapeKind::Box,
        );
        build_rigid_bodies(&mut world, &mut entity);
        let body = entity.body(0).unwrap();
        let container = entity.container();

        entity.destroy(&mut world);
        assert!(world.get_rigid_body(body).is_none());
        assert!(world.container(container).is_none());
    }
}
