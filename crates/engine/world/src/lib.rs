//! World data consumed by the collision layer
//!
//! Rooms, their floor/ceiling sectors and seam tweens, shared meshes and
//! skeletons. Everything here is plain in-memory data produced by the level
//! loader; the physics crate only reads it (apart from bone poses, which the
//! animation layer writes every frame).

mod mesh;
mod room;
mod sector;
mod skeleton;

pub use mesh::{box_polygons, BaseMesh, Polygon};
pub use room::{Room, RoomId, RoomSet};
pub use sector::{DiagonalType, PenetrationConfig, Sector, SectorTween, TweenType};
pub use skeleton::{BodyParts, BoneTag, Skeleton, SkeletonError};

// Re-export for convenience
pub use glam;
