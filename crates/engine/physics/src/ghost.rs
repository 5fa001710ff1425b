//! Ghost probes: non-physical volumes used for overlap queries
//!
//! A probe is never inserted into the collider set, so it is neither moved by
//! nor pushes on the simulation. Queries collect candidates from the query
//! pipeline by bounding box, run the same room filter as the simulation step,
//! and compute contacts on the spot with parry's default dispatcher. Contact
//! manifolds live in a caller-owned [`ContactScratch`] and are never kept
//! past the call.
//!
//! Since probes are never in the collider set, a probe is never a candidate of
//! another probe. The only exclusion needed is the probe's own container.
//!
//! The queries read the query pipeline as it is; the entity-level entry points
//! run [`PhysicsWorld::prepare_queries`] before them.

use crate::container::{ColliderTag, ContainerHandle};
use crate::convert::{from_vector, to_isometry, to_vector};
use crate::filter::{accepts, PairEnd};
use crate::world::{PhysicsWorld, GROUP_GHOST};
use catacomb_world::BaseMesh;
use glam::{Quat, Vec3};
use rapier3d::parry::query::{
    ContactManifold, DefaultQueryDispatcher, PersistentQueryDispatcher,
};
use rapier3d::prelude::*;

type ProbeManifold = ContactManifold<(), ()>;

/// Overlap probe of one bone
#[derive(Clone)]
pub struct GhostProbe {
    pub shape: SharedShape,
    pub position: Isometry<Real>,
    /// Container of the owning entity; its colliders are never reported
    pub container: ContainerHandle,
    pub bone: u16,
    pub groups: InteractionGroups,
}

impl GhostProbe {
    /// Box probe matching the bounds of a bone mesh
    ///
    /// The probe origin sits at the mesh centre. Returns `None` for a mesh
    /// without volume.
    pub fn from_mesh(mesh: &BaseMesh, container: ContainerHandle, bone: u16) -> Option<Self> {
        let half = mesh.half_extents();
        if !half.is_finite() || half.max_element() <= 0.0 {
            return None;
        }
        Some(Self {
            shape: SharedShape::cuboid(
                half.x.max(f32::EPSILON),
                half.y.max(f32::EPSILON),
                half.z.max(f32::EPSILON),
            ),
            position: Isometry::identity(),
            container,
            bone,
            groups: InteractionGroups::new(GROUP_GHOST, Group::ALL),
        })
    }

    pub fn translation(&self) -> Vec3 {
        from_vector(&self.position.translation.vector)
    }

    pub fn set_translation(&mut self, translation: Vec3) {
        self.position.translation.vector = to_vector(translation);
    }

    pub fn set_pose(&mut self, rotation: Quat, translation: Vec3) {
        self.position = to_isometry(rotation, translation);
    }

    /// World-space bounds at the current position
    pub fn aabb(&self) -> Aabb {
        self.shape.compute_aabb(&self.position)
    }
}

impl std::fmt::Debug for GhostProbe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GhostProbe")
            .field("position", &self.position)
            .field("container", &self.container)
            .field("bone", &self.bone)
            .finish_non_exhaustive()
    }
}

/// Reusable buffers for probe queries
///
/// Cleared before every use; nothing survives from one query to the next.
#[derive(Default)]
pub struct ContactScratch {
    candidates: Vec<ColliderHandle>,
    manifolds: Vec<ProbeManifold>,
}

impl ContactScratch {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Result of a penetration query
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GhostContact {
    /// Translation moving the probe out of everything it overlaps
    pub correction: Vec3,
    /// Number of penetrating contact points summed into `correction`
    pub contacts: usize,
}

impl PhysicsWorld {
    /// Collect the colliders a probe may interact with
    fn gather_probe_candidates(&self, probe: &GhostProbe, scratch: &mut ContactScratch) {
        scratch.candidates.clear();

        let aabb = probe.aabb().loosened(self.config.contact_prediction.max(0.0));
        let probe_end = PairEnd {
            container: Some(probe.container),
            room: self.containers.get(probe.container).and_then(|c| c.room),
            is_fixed: true,
        };
        let containers = &self.containers;
        let colliders = &self.collider_set;
        let bodies = &self.rigid_body_set;
        let rooms = &self.rooms;
        let candidates = &mut scratch.candidates;

        self.query_pipeline
            .colliders_with_aabb_intersecting_aabb(&aabb, |&handle| {
                let Some(collider) = colliders.get(handle) else {
                    return true;
                };
                if !probe.groups.test(collider.collision_groups()) {
                    return true;
                }
                if ColliderTag::from_user_data(collider.user_data).container == Some(probe.container) {
                    return true;
                }
                let other = PairEnd::of_collider(containers, colliders, bodies, handle);
                if accepts(probe_end, other, rooms) {
                    candidates.push(handle);
                }
                true
            });
    }

    /// Compute the manifolds between the probe and one collider into the scratch
    fn probe_manifolds(
        &self,
        probe: &GhostProbe,
        handle: ColliderHandle,
        manifolds: &mut Vec<ProbeManifold>,
    ) -> bool {
        manifolds.clear();
        let Some(collider) = self.collider_set.get(handle) else {
            return false;
        };

        let pos12 = probe.position.inv_mul(collider.position());
        DefaultQueryDispatcher
            .contact_manifolds(
                &pos12,
                &*probe.shape,
                collider.shape(),
                self.config.contact_prediction,
                manifolds,
                &mut None,
            )
            .is_ok()
    }

    /// Sum the penetration correction of a probe at its current position
    ///
    /// Every contact with negative depth contributes `normal * depth`, where the
    /// normal points from the probe towards the other shape. The sum pushes the
    /// probe out of everything it overlaps.
    pub fn ghost_penetration(&self, probe: &GhostProbe, scratch: &mut ContactScratch) -> GhostContact {
        self.gather_probe_candidates(probe, scratch);

        let mut result = GhostContact::default();
        let ContactScratch {
            candidates,
            manifolds,
        } = scratch;

        for &handle in candidates.iter() {
            if !self.probe_manifolds(probe, handle, manifolds) {
                continue;
            }
            for manifold in manifolds.iter() {
                let normal = probe.position.rotation * manifold.local_n1;
                for point in manifold.points.iter().filter(|p| p.dist < 0.0) {
                    let push = from_vector(&(normal * point.dist));
                    if push.is_finite() {
                        result.correction += push;
                        result.contacts += 1;
                    }
                }
            }
        }

        result
    }

    /// Visit every collider the probe actually penetrates, once each
    ///
    /// The visitor returns `false` to stop early.
    pub fn ghost_overlaps(
        &self,
        probe: &GhostProbe,
        scratch: &mut ContactScratch,
        mut visit: impl FnMut(ColliderHandle) -> bool,
    ) {
        self.gather_probe_candidates(probe, scratch);

        let ContactScratch {
            candidates,
            manifolds,
        } = scratch;

        for &handle in candidates.iter() {
            if !self.probe_manifolds(probe, handle, manifolds) {
                continue;
            }
            let penetrating = manifolds
                .iter()
                .any(|m| m.points.iter().any(|p| p.dist < 0.0));
            if penetrating && !visit(handle) {
                return;
            }
        }
    }
}
