//! Iterative penetration resolution for skeletal entities
//!
//! Each bone sweeps its ghost probe from where it was (or from its parent)
//! to where the current pose puts it, in sub-steps no longer than half the bone
//! radius. Every sub-step that overlaps geometry pushes the whole entity out
//! and continues from the corrected position. The total push is the reaction;
//! callers decide whether to commit it.
//!
//! ```text
//!   from ──●──●──●──● to        ● = probe query
//!              │
//!              └─ overlap: entity += correction, cursor += correction
//! ```

use crate::config::PhysicsConfig;
use crate::convert::{rotation_of, translation_of};
use crate::entity::PhysicsEntity;
use crate::world::PhysicsWorld;
use catacomb_world::BodyParts;
use glam::Vec3;
use tracing::debug;

/// Result of a resolution pass
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Resolution {
    /// Total translation that moves the entity out of penetration
    pub reaction: Vec3,
    /// Number of sub-steps that produced a correction
    pub iterations: usize,
}

/// Floor/ceiling hits reported by the character height probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeightInfo {
    pub floor_hit: bool,
    pub ceiling_hit: bool,
}

/// Reaction plus collision classification
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CollisionResponse {
    pub reaction: Vec3,
    pub iterations: usize,
    /// Mostly horizontal move stopped by a wall
    pub horizontal_collide: bool,
    /// Moving down, pushed back up (landed on something)
    pub collide_from_above: bool,
    /// Moving up, pushed back down (hit something overhead)
    pub collide_from_below: bool,
}

impl CollisionResponse {
    fn new(resolution: Resolution) -> Self {
        Self {
            reaction: resolution.reaction,
            iterations: resolution.iterations,
            ..Self::default()
        }
    }

    pub fn has_vertical_collide(&self) -> bool {
        self.collide_from_above || self.collide_from_below
    }
}

/// Number of probe sub-steps for a sweep of length `move_len`
///
/// `floor(scale * move_len / radius) + 1`; never below one, one for a
/// non-positive radius or a non-finite length.
pub fn substep_count(move_len: f32, radius: f32, scale: f32) -> usize {
    if radius <= 0.0 || !radius.is_finite() || !move_len.is_finite() {
        return 1;
    }
    (scale * move_len / radius).max(0.0).floor() as usize + 1
}

/// Compute the translation that pushes the entity out of penetration
///
/// Bones are visited in collision-map order. The entity transform is moved
/// while resolving and restored afterwards, so only the returned reaction
/// reflects the correction. Ghost probes are left at their last sweep
/// position.
///
/// A root sweep longer than `max_root_move` aborts the pass, keeping whatever
/// reaction was gathered before.
pub fn penetration_fix_vector(
    world: &mut PhysicsWorld,
    entity: &mut PhysicsEntity,
    proposed: Option<Vec3>,
) -> Resolution {
    let mut resolution = Resolution::default();
    if !entity.has_ghosts() || entity.fixup.no_fix_all {
        return resolution;
    }

    world.prepare_queries();
    let world = &*world;
    let config = world.config();
    let origin = translation_of(&entity.transform);
    let excluded = entity.fixup.no_fix_body_parts;

    for (i, &m) in entity.skeleton.collision_map().iter().enumerate() {
        let m = m as usize;
        let Some(bone) = entity.skeleton.bone(m) else {
            continue;
        };
        if bone.body_part.intersects(excluded) {
            continue;
        }
        let (Some(mesh), Some(Some(ghost))) = (bone.mesh.as_deref(), entity.ghosts.get_mut(m))
        else {
            continue;
        };

        let sweeps_from_ghost = bone.parent.is_none()
            || (proposed.is_some() && bone.body_part.intersects(BodyParts::TORSO));
        let from = if sweeps_from_ghost {
            ghost.translation() + (translation_of(&entity.transform) - origin)
        } else {
            let parent_origin = entity.skeleton.parent(m).map_or(Vec3::ZERO, |parent| {
                let centre = parent.mesh.as_ref().map_or(Vec3::ZERO, |mesh| mesh.centre);
                parent.full_transform.transform_point3(centre)
            });
            entity.transform.transform_point3(parent_origin)
        };

        let tr = entity.transform * bone.full_transform;
        let to = tr.transform_point3(mesh.centre);
        let sweep = to - from;
        let sweep_len = sweep.length();
        if i == 0 && sweep_len > config.max_root_move {
            debug!(
                entity = entity.id,
                distance = sweep_len,
                limit = config.max_root_move,
                "root move too large, resolution aborted"
            );
            break;
        }

        let steps = substep_count(sweep_len, mesh.radius, config.substep_scale);
        let delta = sweep / steps as f32;
        let rotation = rotation_of(&tr);
        let mut cursor = from;

        for _ in 0..=steps {
            ghost.set_pose(rotation, cursor);
            let contact = world.ghost_penetration(ghost, &mut entity.scratch);
            if contact.contacts > 0 && contact.correction != Vec3::ZERO {
                entity.transform.w_axis += contact.correction.extend(0.0);
                cursor += contact.correction;
                resolution.iterations += 1;
            }
            cursor += delta;
        }
    }

    resolution.reaction = translation_of(&entity.transform) - origin;
    entity.transform.w_axis = origin.extend(1.0);
    resolution
}

/// Whether a mostly horizontal move met a mostly horizontal opposing reaction
fn hits_wall(reaction: Vec3, proposed: Vec3, critical: f32) -> Option<bool> {
    let reaction_h = reaction.x * reaction.x + reaction.y * reaction.y;
    let move_h = proposed.x * proposed.x + proposed.y * proposed.y;
    if reaction.z * reaction.z < reaction_h && proposed.z * proposed.z < move_h {
        let cos = (reaction.x * proposed.x + reaction.y * proposed.y) / (reaction_h * move_h).sqrt();
        Some(cos < critical)
    } else {
        None
    }
}

/// Classify a reaction against the proposed move and the height probe
///
/// The move rules apply only when a move was proposed and at least one
/// correction happened. The height probe rules apply regardless.
pub fn classify(
    reaction: Vec3,
    proposed: Option<Vec3>,
    iterations: usize,
    heights: HeightInfo,
    config: &PhysicsConfig,
) -> CollisionResponse {
    let mut response = CollisionResponse::new(Resolution {
        reaction,
        iterations,
    });

    if let Some(proposed) = proposed.filter(|_| iterations > 0) {
        match hits_wall(reaction, proposed, config.critical_wall_component) {
            Some(hit) => response.horizontal_collide = hit,
            None => {
                let reaction_h = reaction.x * reaction.x + reaction.y * reaction.y;
                let move_h = proposed.x * proposed.x + proposed.y * proposed.y;
                if reaction.z * reaction.z > reaction_h && proposed.z * proposed.z > move_h {
                    if reaction.z > 0.0 && proposed.z < 0.0 {
                        response.collide_from_above = true;
                    } else if reaction.z < 0.0 && proposed.z > 0.0 {
                        response.collide_from_below = true;
                    }
                }
            }
        }
    }

    if heights.ceiling_hit && reaction.z < -config.vertical_hit_epsilon {
        response.collide_from_above = true;
    }
    if heights.floor_hit && reaction.z > config.vertical_hit_epsilon {
        response.collide_from_below = true;
    }

    response
}

/// Resolve penetration and commit the reaction to the entity
///
/// No-op for an entity without ghosts and for dynamic (ragdoll) entities. With
/// `no_fix_all` set only the ghosts are refreshed. Otherwise the reaction is
/// applied, the bone bodies follow, and the ghosts are refreshed from them.
pub fn fix_penetrations(
    world: &mut PhysicsWorld,
    entity: &mut PhysicsEntity,
    proposed: Option<Vec3>,
    heights: HeightInfo,
) -> CollisionResponse {
    if !entity.has_ghosts() || entity.is_dynamic {
        return CollisionResponse::default();
    }
    if entity.fixup.no_fix_all {
        entity.update_ghosts(world);
        return CollisionResponse::default();
    }

    let resolution = penetration_fix_vector(world, entity, proposed);
    entity.translate(resolution.reaction);

    let response = classify(
        resolution.reaction,
        proposed,
        resolution.iterations,
        heights,
        world.config(),
    );

    entity.sync_bodies(world);
    entity.update_ghosts(world);
    response
}

/// Test a move without committing it
///
/// The entity is shifted by `proposed`, resolved and put back exactly where it
/// was. Only the horizontal (wall) classification is reported. Recorded
/// collisions are cleared.
pub fn check_next_penetration(
    world: &mut PhysicsWorld,
    entity: &mut PhysicsEntity,
    proposed: Vec3,
) -> CollisionResponse {
    if !entity.has_ghosts() {
        return CollisionResponse::default();
    }

    entity.update_ghosts(world);
    let saved = entity.transform;
    entity.translate(proposed);

    let resolution = penetration_fix_vector(world, entity, Some(proposed));
    let mut response = CollisionResponse::new(resolution);
    if resolution.iterations > 0 {
        response.horizontal_collide = hits_wall(
            resolution.reaction,
            proposed,
            world.config().critical_wall_component,
        )
        .unwrap_or(false);
    }

    entity.transform = saved;
    entity.update_ghosts(world);
    entity.clear_collisions();
    response
}
