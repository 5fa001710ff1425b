use crate::coherence;
use crate::config::PhysicsConfig;
use crate::container::{ColliderTag, Container, ContainerHandle, ContainerSet, ObjectKind, ObjectRef};
use crate::convert::to_vector;
use crate::filter::RoomCoherenceFilter;
use crate::shape;
use catacomb_world::{RoomId, RoomSet};
use glam::Vec3;
use rapier3d::prelude::*;
use thiserror::Error;
use tracing::{debug, trace};

/// Kinematic entity body parts
pub const GROUP_KINEMATIC: Group = Group::GROUP_1;
/// Static room geometry
pub const GROUP_WORLD_STATIC: Group = Group::GROUP_2;
/// Free-floating dynamic objects
pub const GROUP_DYNAMIC_MISC: Group = Group::GROUP_3;
/// Ghost probes (never in the collider set, used for query filtering)
pub const GROUP_GHOST: Group = Group::GROUP_4;

/// Errors returned by physics world operations
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PhysicsError {
    #[error("unknown container {0:?}")]
    UnknownContainer(ContainerHandle),

    #[error("unknown bone {0}")]
    UnknownBone(usize),

    #[error("unknown room {0:?}")]
    UnknownRoom(RoomId),
}

/// Physics simulation world
///
/// Manages all rigid bodies, colliders, and physics simulation state, plus the
/// containers and rooms used to filter collision pairs. This is a wrapper
/// around Rapier's physics pipeline.
///
/// Constructed explicitly and torn down by drop; every component that needs the
/// world receives it by reference.
pub struct PhysicsWorld {
    pub(crate) rigid_body_set: RigidBodySet,
    pub(crate) collider_set: ColliderSet,
    pub(crate) impulse_joint_set: ImpulseJointSet,
    pub(crate) multibody_joint_set: MultibodyJointSet,
    pub(crate) integration_parameters: IntegrationParameters,
    pub(crate) physics_pipeline: PhysicsPipeline,
    pub(crate) island_manager: IslandManager,
    pub(crate) broad_phase: DefaultBroadPhase,
    pub(crate) narrow_phase: NarrowPhase,
    pub(crate) ccd_solver: CCDSolver,
    pub(crate) query_pipeline: QueryPipeline,
    pub(crate) containers: ContainerSet,
    pub(crate) rooms: RoomSet,
    pub(crate) config: PhysicsConfig,
    gravity: Vector<Real>,
    /// Colliders were added, removed or moved since the query pipeline was built
    queries_dirty: bool,
}

impl PhysicsWorld {
    /// Create a new physics world
    ///
    /// # Arguments
    /// * `config` - Tuning values (gravity, resolver thresholds)
    /// * `rooms` - Level rooms and their adjacency
    pub fn new(config: PhysicsConfig, rooms: RoomSet) -> Self {
        Self {
            rigid_body_set: RigidBodySet::new(),
            collider_set: ColliderSet::new(),
            impulse_joint_set: ImpulseJointSet::new(),
            multibody_joint_set: MultibodyJointSet::new(),
            integration_parameters: IntegrationParameters::default(),
            physics_pipeline: PhysicsPipeline::new(),
            island_manager: IslandManager::new(),
            broad_phase: DefaultBroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            ccd_solver: CCDSolver::new(),
            query_pipeline: QueryPipeline::new(),
            containers: ContainerSet::new(),
            rooms,
            gravity: to_vector(config.gravity),
            config,
            queries_dirty: false,
        }
    }

    /// Step the physics simulation forward by dt seconds
    ///
    /// Candidate pairs are gated by the room filter. After integration the
    /// rooms of free-floating objects are brought up to date.
    ///
    /// # Arguments
    /// * `dt` - Time step in seconds (typically 1/60 = 0.016666...)
    pub fn step(&mut self, dt: f32) {
        self.integration_parameters.dt = dt;

        let hooks = RoomCoherenceFilter::new(&self.containers, &self.rooms);
        self.physics_pipeline.step(
            &self.gravity,
            &self.integration_parameters,
            &mut self.island_manager,
            &mut self.broad_phase,
            &mut self.narrow_phase,
            &mut self.rigid_body_set,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            &mut self.ccd_solver,
            Some(&mut self.query_pipeline),
            &hooks,
            &(),
        );
        self.queries_dirty = false;

        let changed =
            coherence::update_rooms(&self.rigid_body_set, &mut self.containers, &self.rooms);
        if changed > 0 {
            trace!(changed, "room coherence updated");
        }
    }

    /// Rebuild the query acceleration structure
    pub fn refresh_queries(&mut self) {
        self.query_pipeline.update(&self.collider_set);
        self.queries_dirty = false;
    }

    /// Rebuild the query acceleration structure if colliders changed since
    /// the last rebuild
    ///
    /// Every entry point running ghost probe queries calls this first, so
    /// geometry registered or moved outside of a step is always visible.
    pub fn prepare_queries(&mut self) {
        if self.queries_dirty {
            self.refresh_queries();
        }
    }

    /// Whether the next probe query has to rebuild the query structure
    pub fn queries_stale(&self) -> bool {
        self.queries_dirty
    }

    /// Add a rigid body to the world
    ///
    /// # Arguments
    /// * `body` - The rigid body to add
    ///
    /// # Returns
    /// Handle to the added rigid body
    pub fn add_rigid_body(&mut self, body: RigidBody) -> RigidBodyHandle {
        self.rigid_body_set.insert(body)
    }

    /// Remove a rigid body from the world
    ///
    /// Also removes all associated colliders automatically.
    ///
    /// # Arguments
    /// * `handle` - Handle to the rigid body to remove
    pub fn remove_rigid_body(&mut self, handle: RigidBodyHandle) {
        self.queries_dirty = true;
        self.rigid_body_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.collider_set,
            &mut self.impulse_joint_set,
            &mut self.multibody_joint_set,
            true,
        );
    }

    /// Add a collider to the world, attached to a rigid body
    ///
    /// # Arguments
    /// * `collider` - The collider to add
    /// * `parent` - Handle to the parent rigid body
    ///
    /// # Returns
    /// Handle to the added collider
    pub fn add_collider(&mut self, collider: Collider, parent: RigidBodyHandle) -> ColliderHandle {
        self.queries_dirty = true;
        self.collider_set
            .insert_with_parent(collider, parent, &mut self.rigid_body_set)
    }

    /// Add a collider tagged with its container
    ///
    /// Sets the user data and collision groups, and enables the room filter
    /// hooks for the collider. The parent body gets the same tag.
    ///
    /// # Arguments
    /// * `collider` - The collider to add
    /// * `parent` - Handle to the parent rigid body
    /// * `tag` - Container and index (bone index for entity parts)
    /// * `groups` - Membership and filter groups
    pub fn add_tagged_collider(
        &mut self,
        mut collider: Collider,
        parent: RigidBodyHandle,
        tag: ColliderTag,
        groups: InteractionGroups,
    ) -> ColliderHandle {
        collider.user_data = tag.to_user_data();
        collider.set_collision_groups(groups);
        collider.set_active_hooks(
            ActiveHooks::FILTER_CONTACT_PAIRS | ActiveHooks::FILTER_INTERSECTION_PAIR,
        );
        if let Some(body) = self.rigid_body_set.get_mut(parent) {
            body.user_data = tag.to_user_data();
        }
        self.add_collider(collider, parent)
    }

    /// Remove a collider (its parent body stays)
    pub fn remove_collider(&mut self, handle: ColliderHandle) {
        self.queries_dirty = true;
        self.collider_set.remove(
            handle,
            &mut self.island_manager,
            &mut self.rigid_body_set,
            true,
        );
    }

    /// Register static geometry of a room
    ///
    /// Creates a `WorldGeometry` container owned by the room and a fixed body
    /// carrying the shape.
    ///
    /// # Returns
    /// The new container and collider
    pub fn add_static_geometry(
        &mut self,
        room: RoomId,
        shape: SharedShape,
        position: Vec3,
    ) -> (ContainerHandle, ColliderHandle) {
        let container = self.containers.insert(Container::new(
            ObjectKind::WorldGeometry,
            Some(ObjectRef::Room(room)),
            Some(room),
        ));
        let body = self.add_rigid_body(
            RigidBodyBuilder::fixed()
                .translation(to_vector(position))
                .build(),
        );
        let collider = self.add_tagged_collider(
            ColliderBuilder::new(shape).build(),
            body,
            ColliderTag::new(container, 0),
            InteractionGroups::new(GROUP_WORLD_STATIC, Group::ALL),
        );
        (container, collider)
    }

    /// Build and register the floor/ceiling heightmap of a room
    ///
    /// # Returns
    /// `Ok(None)` when the room emits no triangle
    pub fn add_room_heightmap(
        &mut self,
        room: RoomId,
    ) -> Result<Option<(ContainerHandle, ColliderHandle)>, PhysicsError> {
        let data = self.rooms.get(room).ok_or(PhysicsError::UnknownRoom(room))?;
        let Some(shape) = shape::from_heightmap(&data.sectors, &data.tweens, true) else {
            debug!(room = room.0, "room has no heightmap geometry");
            return Ok(None);
        };
        Ok(Some(self.add_static_geometry(room, shape, Vec3::ZERO)))
    }

    /// Register a free-floating dynamic object
    ///
    /// The room is looked up from the position when not given. Its room is
    /// then tracked every step.
    ///
    /// # Returns
    /// The new container and rigid body
    pub fn add_misc_dynamic(
        &mut self,
        shape: SharedShape,
        position: Vec3,
        room: Option<RoomId>,
        mass: f32,
    ) -> (ContainerHandle, RigidBodyHandle) {
        let room = room.or_else(|| self.rooms.find_pos(position));
        let container =
            self.containers
                .insert(Container::new(ObjectKind::MiscDynamic, None, room));
        let body = self.add_rigid_body(
            RigidBodyBuilder::dynamic()
                .translation(to_vector(position))
                .build(),
        );
        self.add_tagged_collider(
            ColliderBuilder::new(shape).mass(mass).build(),
            body,
            ColliderTag::new(container, 0),
            InteractionGroups::new(GROUP_DYNAMIC_MISC, Group::ALL),
        );
        (container, body)
    }

    /// Get a reference to a rigid body
    pub fn get_rigid_body(&self, handle: RigidBodyHandle) -> Option<&RigidBody> {
        self.rigid_body_set.get(handle)
    }

    /// Get a mutable reference to a rigid body
    ///
    /// Attached colliders only follow a direct pose edit on the next step; use
    /// [`set_kinematic_position`](Self::set_kinematic_position) to move them
    /// right away.
    pub fn get_rigid_body_mut(&mut self, handle: RigidBodyHandle) -> Option<&mut RigidBody> {
        self.rigid_body_set.get_mut(handle)
    }

    /// Teleport a body together with its colliders
    ///
    /// The colliders are placed at once, so probe queries issued before the
    /// next step already see the new pose.
    ///
    /// # Returns
    /// `false` if the body does not exist
    pub fn set_kinematic_position(&mut self, handle: RigidBodyHandle, position: Isometry<Real>) -> bool {
        let Some(body) = self.rigid_body_set.get_mut(handle) else {
            return false;
        };
        body.set_position(position, true);

        for &collider_handle in body.colliders() {
            if let Some(collider) = self.collider_set.get_mut(collider_handle) {
                let local = collider
                    .position_wrt_parent()
                    .copied()
                    .unwrap_or_else(Isometry::identity);
                collider.set_position(position * local);
            }
        }
        self.queries_dirty = true;
        true
    }

    pub fn get_collider(&self, handle: ColliderHandle) -> Option<&Collider> {
        self.collider_set.get(handle)
    }

    /// Container of a collider, if it is tagged
    pub fn collider_container(&self, handle: ColliderHandle) -> Option<(ContainerHandle, &Container)> {
        let collider = self.collider_set.get(handle)?;
        self.containers.from_user_data(collider.user_data)
    }

    /// Get the current gravity vector
    pub fn gravity(&self) -> Vec3 {
        Vec3::new(self.gravity.x, self.gravity.y, self.gravity.z)
    }

    /// Set the gravity vector
    pub fn set_gravity(&mut self, gravity: Vec3) {
        self.gravity = to_vector(gravity);
    }

    pub fn config(&self) -> &PhysicsConfig {
        &self.config
    }

    pub fn rooms(&self) -> &RoomSet {
        &self.rooms
    }

    /// Find the room containing `pos`, starting from the last known room
    pub fn find_room(&self, pos: Vec3, last: Option<RoomId>) -> Option<RoomId> {
        self.rooms.find_pos_coherent(pos, last)
    }

    /// Whether two rooms are identical or mutually near
    pub fn rooms_are_near(&self, a: RoomId, b: RoomId) -> bool {
        self.rooms.are_near(a, b)
    }

    pub fn create_container(&mut self, container: Container) -> ContainerHandle {
        self.containers.insert(container)
    }

    pub fn container(&self, handle: ContainerHandle) -> Option<&Container> {
        self.containers.get(handle)
    }

    pub fn container_mut(&mut self, handle: ContainerHandle) -> Option<&mut Container> {
        self.containers.get_mut(handle)
    }

    /// Drop a container
    ///
    /// Colliders still tagged with it resolve to no container afterwards.
    pub fn remove_container(&mut self, handle: ContainerHandle) -> Result<Container, PhysicsError> {
        self.containers
            .remove(handle)
            .ok_or(PhysicsError::UnknownContainer(handle))
    }

    /// Null every reference to a destroyed game object
    pub fn forget_object(&mut self, object: ObjectRef) {
        self.containers.forget_object(object);
    }

    /// Null every container room reference to an unloaded room
    pub fn forget_room(&mut self, room: RoomId) {
        self.containers.forget_room(room);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catacomb_world::{Room, Sector};

    fn level() -> RoomSet {
        // 0 and 1 adjacent, 2 isolated; all rooms stacked along X
        let room = |x: f32| {
            Room::new(Vec3::new(x, 0.0, -1024.0), Vec3::new(x + 1024.0, 1024.0, 2048.0))
        };
        RoomSet::new(vec![
            room(0.0).with_near_rooms([RoomId(1)]),
            room(1024.0),
            room(2048.0),
        ])
    }

    #[test]
    fn test_world_creation() {
        let world = PhysicsWorld::new(PhysicsConfig::default(), RoomSet::default());
        assert_eq!(world.gravity(), Vec3::new(0.0, 0.0, -4500.0));
        assert!(world.containers.is_empty());
    }

    #[test]
    fn test_add_rigid_body() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default(), RoomSet::default());

        let body = RigidBodyBuilder::dynamic()
            .translation(vector![0.0, 0.0, 10.0])
            .build();

        let handle = world.add_rigid_body(body);

        let body_ref = world.get_rigid_body(handle).unwrap();
        assert_eq!(body_ref.translation().z, 10.0);
    }

    #[test]
    fn test_tagged_collider() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default(), level());
        let (container, collider) =
            world.add_static_geometry(RoomId(1), SharedShape::cuboid(10.0, 10.0, 1.0), Vec3::ZERO);

        let (found, data) = world.collider_container(collider).unwrap();
        assert_eq!(found, container);
        assert_eq!(data.kind, ObjectKind::WorldGeometry);
        assert_eq!(data.room, Some(RoomId(1)));

        world.remove_container(container).unwrap();
        assert!(world.collider_container(collider).is_none());
        assert_eq!(
            world.remove_container(container),
            Err(PhysicsError::UnknownContainer(container))
        );
    }

    #[test]
    fn test_room_heightmap_registration() {
        let rooms = RoomSet::new(vec![Room::new(Vec3::ZERO, Vec3::splat(1024.0))
            .with_sectors(vec![Sector::flat(Vec3::ZERO, 1024.0, 0.0, 1024.0)], Vec::new())]);
        let mut world = PhysicsWorld::new(PhysicsConfig::default(), rooms);

        assert!(world.add_room_heightmap(RoomId(0)).unwrap().is_some());
        assert_eq!(
            world.add_room_heightmap(RoomId(5)),
            Err(PhysicsError::UnknownRoom(RoomId(5)))
        );
    }

    #[test]
    fn test_registration_marks_queries_stale() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default(), level());
        assert!(!world.queries_stale());

        let (_, collider) =
            world.add_static_geometry(RoomId(0), SharedShape::cuboid(10.0, 10.0, 1.0), Vec3::ZERO);
        assert!(world.queries_stale());
        world.prepare_queries();
        assert!(!world.queries_stale());

        world.remove_collider(collider);
        assert!(world.queries_stale());
        world.step(1.0 / 60.0);
        assert!(!world.queries_stale());
    }

    #[test]
    fn test_kinematic_teleport_moves_colliders() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default(), level());
        let body = world.add_rigid_body(RigidBodyBuilder::kinematic_position_based().build());
        let collider = world.add_collider(ColliderBuilder::ball(5.0).build(), body);

        let target = Isometry::translation(100.0, 0.0, 0.0);
        assert!(world.set_kinematic_position(body, target));
        let moved = world.get_collider(collider).unwrap().position().translation.vector;
        assert_eq!(moved, vector![100.0, 0.0, 0.0]);
        assert!(!world.set_kinematic_position(RigidBodyHandle::invalid(), target));
    }

    #[test]
    fn test_forget_room() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default(), level());
        let (container, _) =
            world.add_static_geometry(RoomId(2), SharedShape::cuboid(10.0, 10.0, 1.0), Vec3::ZERO);

        world.forget_room(RoomId(2));
        assert_eq!(world.container(container).unwrap().room, None);
    }

    #[test]
    fn test_room_filter_gates_contacts() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default(), level());

        // Room 2 floor right under a ball in room 0: not near, so it falls through
        world.add_static_geometry(
            RoomId(2),
            SharedShape::cuboid(200.0, 200.0, 10.0),
            Vec3::new(300.0, 300.0, 0.0),
        );
        // Room 1 floor under a ball in room 1's neighbour 0: near, so it lands
        world.add_static_geometry(
            RoomId(1),
            SharedShape::cuboid(200.0, 200.0, 10.0),
            Vec3::new(700.0, 300.0, 0.0),
        );

        let (_, falling) = world.add_misc_dynamic(
            SharedShape::ball(20.0),
            Vec3::new(300.0, 300.0, 100.0),
            Some(RoomId(0)),
            1.0,
        );
        let (_, landing) = world.add_misc_dynamic(
            SharedShape::ball(20.0),
            Vec3::new(700.0, 300.0, 100.0),
            Some(RoomId(0)),
            1.0,
        );

        for _ in 0..120 {
            world.step(1.0 / 60.0);
        }

        let falling_z = world.get_rigid_body(falling).unwrap().translation().z;
        let landing_z = world.get_rigid_body(landing).unwrap().translation().z;
        assert!(falling_z < -10.0, "ball fell through: {falling_z}");
        assert!(landing_z > 20.0, "ball rests on the floor: {landing_z}");
    }

    #[test]
    fn test_step_tracks_misc_rooms() {
        let mut world = PhysicsWorld::new(PhysicsConfig::default(), level());
        world.set_gravity(Vec3::ZERO);

        let (container, body) = world.add_misc_dynamic(
            SharedShape::ball(5.0),
            Vec3::new(1000.0, 500.0, 500.0),
            None,
            1.0,
        );
        assert_eq!(world.container(container).unwrap().room, Some(RoomId(0)));

        world
            .get_rigid_body_mut(body)
            .unwrap()
            .set_linvel(vector![600.0, 0.0, 0.0], true);
        for _ in 0..10 {
            world.step(1.0 / 60.0);
        }

        assert_eq!(world.container(container).unwrap().room, Some(RoomId(1)));
    }
}
