//! Collision layer of the catacomb engine
//!
//! Sits between rapier and skeletal entities:
//!
//! - room-aware pair filtering and room coherence for moving objects
//! - collision shapes built from level meshes, boxes and heightmap sectors
//! - iterative per-bone penetration resolution with swept ghost probes
//! - per-bone collision recording feeding script callbacks
//!
//! Z is up. All world-facing types use glam; rapier/nalgebra types only show up
//! where rapier handles are exchanged.

mod coherence;
mod config;
mod container;
mod convert;
mod entity;
mod events;
mod factory;
mod filter;
mod ghost;
mod resolver;
mod shape;
mod world;

pub use coherence::update_rooms;
pub use config::PhysicsConfig;
pub use container::{ColliderTag, Container, ContainerHandle, ContainerSet, ObjectKind, ObjectRef};
pub use entity::{CollisionShapeKind, FixupMask, PhysicsEntity};
pub use events::{
    dispatch_collision_callbacks, update_current_collisions, CollisionEvent, CollisionListener,
    CollisionNode,
};
pub use factory::build_rigid_bodies;
pub use filter::{accepts, PairEnd, RoomCoherenceFilter};
pub use ghost::{ContactScratch, GhostContact, GhostProbe};
pub use resolver::{
    check_next_penetration, classify, fix_penetrations, penetration_fix_vector, substep_count,
    CollisionResponse, HeightInfo, Resolution,
};
pub use shape::{
    bbox_triangles, from_bounding_box, from_heightmap, from_mesh, heightmap_triangles,
    mesh_triangles, ShapeOptions, TriangleSoup,
};
pub use world::{
    PhysicsError, PhysicsWorld, GROUP_DYNAMIC_MISC, GROUP_GHOST, GROUP_KINEMATIC,
    GROUP_WORLD_STATIC,
};

// Re-export for convenience
pub use catacomb_world;
pub use glam;
pub use rapier3d;
