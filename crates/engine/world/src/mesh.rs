//! Shared polygon meshes
//!
//! A [`BaseMesh`] is the static geometry of one model part (or of a room
//! static). Several bones and entities may share the same mesh through an
//! `Arc`, so the derived bounds are computed once at construction.

use glam::Vec3;

/// Squared normal length below which a polygon is treated as zero-area.
const DEGENERATE_AREA_EPSILON: f32 = 1.0e-12;

/// A planar polygon, vertices in fan order
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Polygon {
    pub vertices: Vec<Vec3>,
}

impl Polygon {
    pub fn new(vertices: Vec<Vec3>) -> Self {
        Self { vertices }
    }

    /// Unnormalized area normal (Newell's method)
    pub fn area_normal(&self) -> Vec3 {
        let n = self.vertices.len();
        let mut normal = Vec3::ZERO;
        for i in 0..n {
            let cur = self.vertices[i];
            let next = self.vertices[(i + 1) % n];
            normal.x += (cur.y - next.y) * (cur.z + next.z);
            normal.y += (cur.z - next.z) * (cur.x + next.x);
            normal.z += (cur.x - next.x) * (cur.y + next.y);
        }
        normal
    }

    /// Check whether the polygon is unusable as collision geometry
    ///
    /// A polygon is broken when it has fewer than three vertices, carries a
    /// non-finite coordinate, or encloses (almost) no area.
    pub fn is_broken(&self) -> bool {
        if self.vertices.len() < 3 {
            return true;
        }
        if self.vertices.iter().any(|v| !v.is_finite()) {
            return true;
        }
        self.area_normal().length_squared() <= DEGENERATE_AREA_EPSILON
    }
}

/// Mesh shared between model parts
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BaseMesh {
    pub polygons: Vec<Polygon>,
    pub bb_min: Vec3,
    pub bb_max: Vec3,
    /// Centre of the bounding box; ghost probes are anchored here
    pub centre: Vec3,
    /// Largest distance from `centre` to any vertex
    pub radius: f32,
}

impl BaseMesh {
    /// Create a mesh and compute its bounds, centre and radius
    ///
    /// An empty polygon list yields a mesh with zero bounds and zero radius.
    pub fn new(polygons: Vec<Polygon>) -> Self {
        let Some((bb_min, bb_max)) = bounds_of(&polygons) else {
            return Self {
                polygons,
                bb_min: Vec3::ZERO,
                bb_max: Vec3::ZERO,
                centre: Vec3::ZERO,
                radius: 0.0,
            };
        };

        let centre = (bb_min + bb_max) * 0.5;
        let radius = polygons
            .iter()
            .flat_map(|p| p.vertices.iter())
            .map(|v| v.distance(centre))
            .fold(0.0_f32, f32::max);

        Self {
            polygons,
            bb_min,
            bb_max,
            centre,
            radius,
        }
    }

    /// Build a closed box mesh from an axis-aligned bounding box
    pub fn from_box(min: Vec3, max: Vec3) -> Self {
        Self::new(box_polygons(min, max).into())
    }

    /// Half extents of the bounding box
    pub fn half_extents(&self) -> Vec3 {
        (self.bb_max - self.bb_min) * 0.5
    }
}

fn bounds_of(polygons: &[Polygon]) -> Option<(Vec3, Vec3)> {
    let mut vertices = polygons.iter().flat_map(|p| p.vertices.iter().copied());
    let first = vertices.next()?;
    Some(vertices.fold((first, first), |(lo, hi), v| (lo.min(v), hi.max(v))))
}

/// The six faces of the box spanned by `min` and `max`
///
/// Faces are wound counter-clockwise when seen from outside, in the order
/// -X, +X, -Y, +Y, -Z, +Z. A flat box (`min == max` on one axis) produces four
/// zero-area faces that [`Polygon::is_broken`] rejects.
pub fn box_polygons(min: Vec3, max: Vec3) -> [Polygon; 6] {
    let c = |x: bool, y: bool, z: bool| {
        Vec3::new(
            if x { max.x } else { min.x },
            if y { max.y } else { min.y },
            if z { max.z } else { min.z },
        )
    };

    [
        Polygon::new(vec![
            c(false, false, false),
            c(false, false, true),
            c(false, true, true),
            c(false, true, false),
        ]),
        Polygon::new(vec![
            c(true, false, false),
            c(true, true, false),
            c(true, true, true),
            c(true, false, true),
        ]),
        Polygon::new(vec![
            c(false, false, false),
            c(true, false, false),
            c(true, false, true),
            c(false, false, true),
        ]),
        Polygon::new(vec![
            c(false, true, false),
            c(false, true, true),
            c(true, true, true),
            c(true, true, false),
        ]),
        Polygon::new(vec![
            c(false, false, false),
            c(false, true, false),
            c(true, true, false),
            c(true, false, false),
        ]),
        Polygon::new(vec![
            c(false, false, true),
            c(true, false, true),
            c(true, true, true),
            c(false, true, true),
        ]),
    ]
}
