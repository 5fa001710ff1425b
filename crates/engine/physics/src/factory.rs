use crate::container::ColliderTag;
use crate::convert::isometry_from_mat4;
use crate::entity::{CollisionShapeKind, PhysicsEntity};
use crate::events::CollisionNode;
use crate::ghost::GhostProbe;
use crate::shape::{self, ShapeOptions};
use crate::world::{PhysicsWorld, GROUP_KINEMATIC};
use catacomb_world::BaseMesh;
use rapier3d::prelude::*;
use tracing::{debug, warn};

/// Select and build the shape of one bone
fn bone_shape(mesh: &BaseMesh, kind: CollisionShapeKind) -> Option<SharedShape> {
    match kind {
        CollisionShapeKind::Box => shape::from_bounding_box(mesh.bb_min, mesh.bb_max),
        CollisionShapeKind::TrimeshConvex => shape::from_mesh(mesh, ShapeOptions::CONVEX),
        CollisionShapeKind::Trimesh => shape::from_mesh(mesh, ShapeOptions::STATIC),
    }
}

/// Build the bone bodies, ghost probes and collision nodes of an entity
///
/// Every bone with a usable mesh gets a kinematic, position-based body with a
/// massless collider, tagged with the entity container and the bone index.
/// Bones without a mesh or without a usable shape get an empty slot. Previous
/// bodies of the entity are removed first.
///
/// # Returns
/// Number of bodies created
pub fn build_rigid_bodies(world: &mut PhysicsWorld, entity: &mut PhysicsEntity) -> usize {
    entity.remove_bodies(world);

    let bone_count = entity.skeleton.bone_count();
    let capacity = world.config().collision_node_capacity;
    let mut bodies = Vec::with_capacity(bone_count);
    let mut ghosts = Vec::with_capacity(bone_count);

    for (i, bone) in entity.skeleton.bones().iter().enumerate() {
        let Some(mesh) = bone.mesh.as_deref() else {
            bodies.push(None);
            ghosts.push(None);
            continue;
        };
        let Some(shape) = bone_shape(mesh, entity.shape_kind) else {
            warn!(entity = entity.id, bone = i, "bone mesh yields no collision shape");
            bodies.push(None);
            ghosts.push(None);
            continue;
        };

        let body = world.add_rigid_body(
            RigidBodyBuilder::kinematic_position_based()
                .position(isometry_from_mat4(&(entity.transform * bone.full_transform)))
                .build(),
        );
        let collider = ColliderBuilder::new(shape).density(0.0).build();
        world.add_tagged_collider(
            collider,
            body,
            ColliderTag::new(entity.container, i as u32),
            InteractionGroups::new(GROUP_KINEMATIC, Group::ALL),
        );

        bodies.push(Some(body));
        ghosts.push(GhostProbe::from_mesh(mesh, entity.container, i as u16));
    }

    let built = bodies.iter().flatten().count();
    entity.bodies = bodies;
    entity.ghosts = ghosts;
    entity.collisions = vec![CollisionNode::new(capacity); bone_count];
    entity.update_ghosts(world);

    debug!(
        entity = entity.id,
        bones = bone_count,
        bodies = built,
        shape = ?entity.shape_kind,
        "built entity rigid bodies"
    );
    built
}
