//! Room floor/ceiling sectors and the tweens stitching them together

use glam::Vec3;

/// How a sector surface interacts with collision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PenetrationConfig {
    /// Regular solid surface
    #[default]
    Solid,
    /// The whole sector is a wall column; no floor/ceiling is emitted
    Wall,
    /// Passable surface (e.g. water or an opening)
    Ghost,
    /// One-way door: the first triangle of the cell is open
    DoorVerticalA,
    /// One-way door: the second triangle of the cell is open
    DoorVerticalB,
}

impl PenetrationConfig {
    /// Whether any triangle of this surface becomes collision geometry
    pub fn is_collidable(self) -> bool {
        !matches!(self, Self::Ghost | Self::Wall)
    }
}

/// Diagonal split of a quad sector cell
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DiagonalType {
    #[default]
    None,
    NorthEast,
    NorthWest,
}

/// One cell of room floor and ceiling
///
/// Corners are world-space points; corner `i` of the floor sits below corner
/// `i` of the ceiling.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sector {
    pub floor_corners: [Vec3; 4],
    pub floor_penetration: PenetrationConfig,
    pub floor_diagonal: DiagonalType,
    pub ceiling_corners: [Vec3; 4],
    pub ceiling_penetration: PenetrationConfig,
    pub ceiling_diagonal: DiagonalType,
}

impl Sector {
    /// Flat solid cell spanning `[origin, origin + size]` in XY at the given heights
    pub fn flat(origin: Vec3, size: f32, floor: f32, ceiling: f32) -> Self {
        let corners = |z: f32| {
            [
                Vec3::new(origin.x, origin.y, z),
                Vec3::new(origin.x + size, origin.y, z),
                Vec3::new(origin.x + size, origin.y + size, z),
                Vec3::new(origin.x, origin.y + size, z),
            ]
        };

        Self {
            floor_corners: corners(floor),
            floor_penetration: PenetrationConfig::Solid,
            floor_diagonal: DiagonalType::None,
            ceiling_corners: corners(ceiling),
            ceiling_penetration: PenetrationConfig::Solid,
            ceiling_diagonal: DiagonalType::None,
        }
    }
}

/// Stitch shape of a tween
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TweenType {
    #[default]
    None,
    /// Two triangles meeting at an interpolated vertex (crossing heights)
    TwoTriangles,
    TriangleLeft,
    TriangleRight,
    Quad,
}

/// Vertical seam between two neighbouring sectors whose heights differ
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SectorTween {
    pub floor_corners: [Vec3; 4],
    pub floor_type: TweenType,
    pub ceiling_corners: [Vec3; 4],
    pub ceiling_type: TweenType,
}
