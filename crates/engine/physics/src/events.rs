//! Per-bone collision recording and callback dispatch
//!
//! Every bone owns a small [`CollisionNode`] listing the colliders its ghost
//! probe currently penetrates. Nodes have a fixed capacity: once full, further
//! overlaps are dropped for that frame without notice. The recorded colliders
//! are drained one by one into a [`CollisionListener`] (the script side).

use crate::container::{ColliderTag, ObjectKind, ObjectRef};
use crate::convert::rotation_of;
use crate::entity::PhysicsEntity;
use crate::world::PhysicsWorld;
use catacomb_world::BodyParts;
use rapier3d::prelude::*;
use tracing::debug;

/// Bounded list of colliders touched by one bone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollisionNode {
    objects: Vec<ColliderHandle>,
    capacity: usize,
}

impl CollisionNode {
    pub fn new(capacity: usize) -> Self {
        Self {
            objects: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Record a collider
    ///
    /// # Returns
    /// `false` if the node was already full
    pub fn push(&mut self, collider: ColliderHandle) -> bool {
        if self.is_full() {
            return false;
        }
        self.objects.push(collider);
        true
    }

    /// Remove and return the most recently recorded collider
    pub fn pop(&mut self) -> Option<ColliderHandle> {
        self.objects.pop()
    }

    pub fn clear(&mut self) {
        self.objects.clear();
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.objects.len() >= self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn objects(&self) -> &[ColliderHandle] {
        &self.objects
    }
}

/// One entity bone touching another entity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollisionEvent {
    /// Entity whose bone made contact
    pub entity: u32,
    /// Body part of that bone
    pub body_parts: BodyParts,
    /// Entity owning the touched collider
    pub activator: u32,
    /// Bone index of the touched collider
    pub activator_bone: u32,
}

/// Receiver of collision callbacks
pub trait CollisionListener {
    fn on_collision(&mut self, event: &CollisionEvent);
}

impl<F: FnMut(&CollisionEvent)> CollisionListener for F {
    fn on_collision(&mut self, event: &CollisionEvent) {
        self(event)
    }
}

/// Record what every bone currently touches
///
/// Each ghost is moved to the current entity × bone pose for the query and put
/// back afterwards. Bones in the exclusion mask are not tracked. A collider is
/// recorded at most once per bone.
pub fn update_current_collisions(world: &mut PhysicsWorld, entity: &mut PhysicsEntity) {
    world.prepare_queries();
    let world = &*world;
    let transform = entity.transform;
    let excluded = entity.fixup.no_fix_body_parts;

    for (i, bone) in entity.skeleton.bones().iter().enumerate() {
        let (Some(Some(ghost)), Some(node)) = (entity.ghosts.get_mut(i), entity.collisions.get_mut(i))
        else {
            continue;
        };
        node.clear();
        if bone.body_part.intersects(excluded) || node.is_full() {
            continue;
        }
        let Some(mesh) = bone.mesh.as_deref() else {
            continue;
        };

        let saved = ghost.position;
        let tr = transform * bone.full_transform;
        ghost.set_pose(rotation_of(&tr), tr.transform_point3(mesh.centre));

        world.ghost_overlaps(ghost, &mut entity.scratch, |collider| {
            node.push(collider);
            !node.is_full()
        });

        ghost.position = saved;
    }
}

/// Run the collision queries and hand every entity contact to the listener
///
/// All recorded collisions are drained, including those against non-entity
/// objects, so nothing fires twice.
///
/// # Returns
/// Number of events delivered
pub fn dispatch_collision_callbacks(
    world: &mut PhysicsWorld,
    entity: &mut PhysicsEntity,
    listener: &mut impl CollisionListener,
) -> usize {
    if !entity.has_ghosts() {
        return 0;
    }
    update_current_collisions(world, entity);
    let world = &*world;

    let mut fired = 0;
    while let Some((collider, body_parts)) = entity.pop_collision_body_parts(BodyParts::ALL) {
        let Some((_, container)) = world.collider_container(collider) else {
            continue;
        };
        if container.kind != ObjectKind::EntityBodyPart {
            continue;
        }
        let Some(ObjectRef::Entity(activator)) = container.object else {
            continue;
        };
        let activator_bone = world
            .get_collider(collider)
            .map_or(0, |c| ColliderTag::from_user_data(c.user_data).index);

        listener.on_collision(&CollisionEvent {
            entity: entity.id,
            body_parts,
            activator,
            activator_bone,
        });
        fired += 1;
    }

    if fired > 0 {
        debug!(entity = entity.id, fired, "dispatched collision callbacks");
    }
    fired
}

impl PhysicsEntity {
    /// Forget every recorded collision
    pub fn clear_collisions(&mut self) {
        for node in &mut self.collisions {
            node.clear();
        }
    }

    /// Forget the collisions of bones in `parts`
    pub fn clear_collision_body_parts(&mut self, parts: BodyParts) {
        for (node, bone) in self.collisions.iter_mut().zip(self.skeleton.bones()) {
            if bone.body_part.intersects(parts) {
                node.clear();
            }
        }
    }

    /// Remove one recorded collision of a bone in `parts`
    ///
    /// # Returns
    /// The collider and the body part of the bone that touched it
    pub fn pop_collision_body_parts(&mut self, parts: BodyParts) -> Option<(ColliderHandle, BodyParts)> {
        self.collisions
            .iter_mut()
            .zip(self.skeleton.bones())
            .filter(|(_, bone)| bone.body_part.intersects(parts))
            .find_map(|(node, bone)| node.pop().map(|c| (c, bone.body_part)))
    }

    /// Whether any bone in `parts` has a recorded collision
    pub fn was_collision_body_parts(&self, parts: BodyParts) -> bool {
        self.collisions
            .iter()
            .zip(self.skeleton.bones())
            .any(|(node, bone)| bone.body_part.intersects(parts) && !node.is_empty())
    }
}
