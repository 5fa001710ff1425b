//! Room-aware pair filtering
//!
//! World geometry is partitioned per room. Objects in rooms that are not
//! adjacent never reach the narrow phase, and the bodies of one container never
//! collide with each other unless both are dynamic (ragdoll parts).

use crate::container::{ColliderTag, ContainerHandle, ContainerSet};
use catacomb_world::{RoomId, RoomSet};
use rapier3d::prelude::*;

/// One side of a candidate pair, as seen by the filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PairEnd {
    pub container: Option<ContainerHandle>,
    pub room: Option<RoomId>,
    /// Static or kinematic (not moved by the solver)
    pub is_fixed: bool,
}

impl PairEnd {
    /// Describe a collider from its tag and parent body
    pub fn of_collider(
        containers: &ContainerSet,
        colliders: &ColliderSet,
        bodies: &RigidBodySet,
        handle: ColliderHandle,
    ) -> Self {
        let Some(collider) = colliders.get(handle) else {
            return Self::default();
        };

        let container = ColliderTag::from_user_data(collider.user_data).container;
        let room = container
            .and_then(|c| containers.get(c))
            .and_then(|c| c.room);
        let is_fixed = collider
            .parent()
            .and_then(|parent| bodies.get(parent))
            .map_or(true, |body| !body.is_dynamic());

        Self {
            container,
            room,
            is_fixed,
        }
    }
}

/// Decide whether a broad-phase pair goes on to the narrow phase
///
/// The decision is symmetric in its two arguments.
pub fn accepts(a: PairEnd, b: PairEnd, rooms: &RoomSet) -> bool {
    if a.container.is_some() && a.container == b.container {
        return !a.is_fixed && !b.is_fixed;
    }

    match (a.room, b.room) {
        (None, None) => true,
        (Some(ra), Some(rb)) => rooms.are_near(ra, rb),
        // one side has a room, the other does not
        _ => false,
    }
}

/// Pair filter installed as physics hooks for one step
///
/// Built from borrowed views of the world's containers and rooms; it only reads
/// and never touches the narrow phase's pair cache.
pub struct RoomCoherenceFilter<'a> {
    containers: &'a ContainerSet,
    rooms: &'a RoomSet,
}

impl<'a> RoomCoherenceFilter<'a> {
    pub fn new(containers: &'a ContainerSet, rooms: &'a RoomSet) -> Self {
        Self { containers, rooms }
    }

    fn accepts_context(&self, context: &PairFilterContext) -> bool {
        let a = PairEnd::of_collider(
            self.containers,
            context.colliders,
            context.bodies,
            context.collider1,
        );
        let b = PairEnd::of_collider(
            self.containers,
            context.colliders,
            context.bodies,
            context.collider2,
        );
        accepts(a, b, self.rooms)
    }
}

impl PhysicsHooks for RoomCoherenceFilter<'_> {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        if self.accepts_context(context) {
            Some(SolverFlags::COMPUTE_IMPULSES)
        } else {
            None
        }
    }

    fn filter_intersection_pair(&self, context: &PairFilterContext) -> bool {
        self.accepts_context(context)
    }
}
