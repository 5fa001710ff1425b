//! Collision shape generation from static geometry
//!
//! This module converts level geometry into rapier shapes. Three sources are
//! supported:
//!
//! - **Bounding boxes**: the six faces of the box spanned by an AABB, wrapped
//!   in a convex hull.
//! - **Meshes**: fan-triangulated polygons, wrapped either in a BVH-backed
//!   triangle mesh (static geometry) or in a convex hull (moving parts).
//! - **Heightmaps**: room floor/ceiling sectors plus the tweens stitching
//!   neighbouring sectors together. Always a static triangle mesh.
//!
//! Every builder returns `None` when the source yields no usable triangle.
//! An empty shape is never handed to the physics engine; callers simply skip
//! the body.

use crate::convert::to_point;
use catacomb_world::{
    box_polygons, BaseMesh, DiagonalType, PenetrationConfig, Polygon, Sector, SectorTween,
    TweenType,
};
use glam::Vec3;
use rapier3d::prelude::*;
use tracing::warn;

/// Twice the area below which a triangle is dropped from a soup.
const DEGENERATE_TRIANGLE_EPSILON: f32 = 1.0e-9;

/// How a triangle soup is wrapped into a shape
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShapeOptions {
    /// Static geometry gets a BVH-backed triangle mesh, moving geometry a convex hull
    pub is_static: bool,
    /// Merge duplicate vertices when building a triangle mesh
    pub compress: bool,
}

impl ShapeOptions {
    pub const STATIC: Self = Self {
        is_static: true,
        compress: true,
    };

    pub const CONVEX: Self = Self {
        is_static: false,
        compress: false,
    };
}

impl Default for ShapeOptions {
    fn default() -> Self {
        Self::STATIC
    }
}

/// Shared triangle storage fed to shape construction
#[derive(Debug, Clone, Default)]
pub struct TriangleSoup {
    vertices: Vec<Point<Real>>,
    indices: Vec<[u32; 3]>,
}

impl TriangleSoup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one triangle
    ///
    /// Triangles with non-finite corners or (almost) zero area are rejected.
    ///
    /// # Returns
    /// `true` if the triangle was added
    pub fn add_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3) -> bool {
        if !(a.is_finite() && b.is_finite() && c.is_finite()) {
            return false;
        }
        if (b - a).cross(c - a).length_squared() <= DEGENERATE_TRIANGLE_EPSILON {
            return false;
        }

        let base = self.vertices.len() as u32;
        self.vertices.extend([to_point(a), to_point(b), to_point(c)]);
        self.indices.push([base, base + 1, base + 2]);
        true
    }

    /// Fan-triangulate a polygon from its first vertex
    ///
    /// # Returns
    /// Number of triangles added
    pub fn add_polygon_fan(&mut self, polygon: &Polygon) -> usize {
        let v = &polygon.vertices;
        let mut added = 0;
        for j in 1..v.len().saturating_sub(1) {
            if self.add_triangle(v[j + 1], v[j], v[0]) {
                added += 1;
            }
        }
        added
    }

    /// Number of triangles
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Iterate over the triangles' corners
    pub fn triangles(&self) -> impl Iterator<Item = [Vec3; 3]> + '_ {
        self.indices.iter().map(move |tri| {
            tri.map(|i| {
                let p = self.vertices[i as usize];
                Vec3::new(p.x, p.y, p.z)
            })
        })
    }

    /// Wrap the soup into a BVH-backed static triangle mesh
    fn into_trimesh(self, compress: bool) -> Option<SharedShape> {
        if self.is_empty() {
            return None;
        }
        let flags = if compress {
            TriMeshFlags::MERGE_DUPLICATE_VERTICES
        } else {
            TriMeshFlags::empty()
        };
        match SharedShape::trimesh_with_flags(self.vertices, self.indices, flags) {
            Ok(shape) => Some(shape),
            Err(e) => {
                warn!("triangle mesh rejected: {e:?}");
                None
            }
        }
    }

    /// Wrap the soup into a convex hull
    ///
    /// A flat soup has no volume to hull; it is kept as a triangle mesh.
    fn into_convex(self) -> Option<SharedShape> {
        if self.is_empty() {
            return None;
        }
        SharedShape::convex_hull(&self.vertices).or_else(|| self.into_trimesh(false))
    }

    fn into_shape(self, options: ShapeOptions) -> Option<SharedShape> {
        if options.is_static {
            self.into_trimesh(options.compress)
        } else {
            self.into_convex()
        }
    }
}

/// Triangulate the faces of the box spanned by an AABB
///
/// # Returns
/// The triangles and the number of faces that were usable
pub fn bbox_triangles(min: Vec3, max: Vec3) -> (TriangleSoup, usize) {
    let mut soup = TriangleSoup::new();
    let mut faces = 0;
    for face in box_polygons(min, max) {
        if face.is_broken() {
            continue;
        }
        if soup.add_polygon_fan(&face) > 0 {
            faces += 1;
        }
    }
    (soup, faces)
}

/// Triangulate every non-degenerate polygon of a mesh
pub fn mesh_triangles(mesh: &BaseMesh) -> TriangleSoup {
    let mut soup = TriangleSoup::new();
    for polygon in mesh.polygons.iter().filter(|p| !p.is_broken()) {
        soup.add_polygon_fan(polygon);
    }
    soup
}

/// Triangulate room sectors and seam tweens
///
/// Floor and ceiling are skipped for ghost-passable and wall sectors. A
/// one-way door suppresses one of the two triangles of the cell. The diagonal
/// type picks which diagonal splits the quad.
pub fn heightmap_triangles(sectors: &[Sector], tweens: &[SectorTween]) -> TriangleSoup {
    let mut soup = TriangleSoup::new();

    for sector in sectors {
        if sector.floor_penetration.is_collidable() {
            let c = &sector.floor_corners;
            let [first, second] = match sector.floor_diagonal {
                DiagonalType::None | DiagonalType::NorthWest => {
                    [[c[3], c[2], c[0]], [c[2], c[1], c[0]]]
                }
                DiagonalType::NorthEast => [[c[3], c[2], c[1]], [c[3], c[1], c[0]]],
            };
            add_cell(&mut soup, sector.floor_penetration, first, second);
        }

        if sector.ceiling_penetration.is_collidable() {
            let c = &sector.ceiling_corners;
            let [first, second] = match sector.ceiling_diagonal {
                DiagonalType::None | DiagonalType::NorthWest => {
                    [[c[0], c[2], c[3]], [c[0], c[1], c[2]]]
                }
                DiagonalType::NorthEast => [[c[0], c[1], c[3]], [c[1], c[2], c[3]]],
            };
            add_cell(&mut soup, sector.ceiling_penetration, first, second);
        }
    }

    for tween in tweens {
        add_tween(&mut soup, tween.ceiling_type, &tween.ceiling_corners);
        add_tween(&mut soup, tween.floor_type, &tween.floor_corners);
    }

    soup
}

fn add_cell(
    soup: &mut TriangleSoup,
    penetration: PenetrationConfig,
    first: [Vec3; 3],
    second: [Vec3; 3],
) {
    if penetration != PenetrationConfig::DoorVerticalA {
        soup.add_triangle(first[0], first[1], first[2]);
    }
    if penetration != PenetrationConfig::DoorVerticalB {
        soup.add_triangle(second[0], second[1], second[2]);
    }
}

fn add_tween(soup: &mut TriangleSoup, kind: TweenType, c: &[Vec3; 4]) {
    match kind {
        TweenType::None => {}
        TweenType::TwoTriangles => {
            let o = c[0].lerp(c[2], two_triangle_split(c));
            soup.add_triangle(c[0], c[1], o);
            soup.add_triangle(c[3], c[2], o);
        }
        TweenType::TriangleLeft => {
            soup.add_triangle(c[0], c[1], c[3]);
        }
        TweenType::TriangleRight => {
            soup.add_triangle(c[2], c[1], c[3]);
        }
        TweenType::Quad => {
            soup.add_triangle(c[0], c[1], c[3]);
            soup.add_triangle(c[2], c[1], c[3]);
        }
    }
}

/// Interpolation parameter of the shared vertex of a crossing tween
///
/// The two edges (c0,c1) and (c3,c2) cross in height; the shared vertex sits
/// where their height differences balance. A zero denominator is the limit of
/// an infinite ratio and puts the vertex on `c0`.
pub(crate) fn two_triangle_split(c: &[Vec3; 4]) -> f32 {
    let denominator = c[0].z - c[1].z;
    if denominator.abs() <= f32::EPSILON {
        return 0.0;
    }
    let ratio = ((c[2].z - c[3].z) / denominator).abs();
    1.0 / (1.0 + ratio)
}

/// Build a convex shape from the box spanned by an AABB
///
/// Broken faces (zero area) are skipped. A box that is flat on one axis keeps
/// its two valid faces.
///
/// # Arguments
/// * `min` - Minimum corner
/// * `max` - Maximum corner
///
/// # Returns
/// `None` if no face is usable
pub fn from_bounding_box(min: Vec3, max: Vec3) -> Option<SharedShape> {
    let (soup, faces) = bbox_triangles(min, max);
    if faces == 0 {
        return None;
    }
    soup.into_convex()
}

/// Build a shape from a polygon mesh
///
/// # Arguments
/// * `mesh` - Source mesh
/// * `options` - Static triangle mesh or convex hull
///
/// # Returns
/// `None` for a mesh without any usable polygon
pub fn from_mesh(mesh: &BaseMesh, options: ShapeOptions) -> Option<SharedShape> {
    mesh_triangles(mesh).into_shape(options)
}

/// Build the static floor/ceiling shape of a room
///
/// # Arguments
/// * `sectors` - Room sectors
/// * `tweens` - Seam tweens between sectors
/// * `compress` - Merge duplicate vertices
///
/// # Returns
/// `None` if no triangle was emitted
///
/// Sectors whose floor and ceiling are separated by far more than a cell are
/// not special-cased and may yield sliver triangles.
pub fn from_heightmap(
    sectors: &[Sector],
    tweens: &[SectorTween],
    compress: bool,
) -> Option<SharedShape> {
    heightmap_triangles(sectors, tweens).into_trimesh(compress)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell() -> Sector {
        Sector::flat(Vec3::ZERO, 1024.0, 0.0, 2048.0)
    }

    #[test]
    fn test_box_shape() {
        let shape = from_bounding_box(Vec3::splat(-1.0), Vec3::splat(1.0)).unwrap();
        let aabb = shape.compute_local_aabb();
        assert!((aabb.maxs.x - 1.0).abs() < 1.0e-4);
        assert!((aabb.mins.z + 1.0).abs() < 1.0e-4);

        let (soup, faces) = bbox_triangles(Vec3::splat(-1.0), Vec3::splat(1.0));
        assert_eq!(faces, 6);
        assert_eq!(soup.len(), 12);
    }

    #[test]
    fn test_flat_box_uses_valid_faces() {
        let min = Vec3::new(0.0, 0.0, 5.0);
        let max = Vec3::new(10.0, 10.0, 5.0);

        let (soup, faces) = bbox_triangles(min, max);
        assert_eq!(faces, 2);
        assert_eq!(soup.len(), 4);
        assert!(soup.triangles().flatten().all(|v| v.z == 5.0));

        assert!(from_bounding_box(min, max).is_some());
    }

    #[test]
    fn test_degenerate_box_has_no_shape() {
        let p = Vec3::new(3.0, 3.0, 3.0);
        assert_eq!(bbox_triangles(p, p).1, 0);
        assert!(from_bounding_box(p, p).is_none());
    }

    #[test]
    fn test_mesh_fan_triangulation() {
        let quad = Polygon::new(vec![
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
        ]);
        let line = Polygon::new(vec![Vec3::ZERO, Vec3::X]);
        let mesh = BaseMesh::new(vec![quad, line]);

        let soup = mesh_triangles(&mesh);
        assert_eq!(soup.len(), 2);
        let first = soup.triangles().next().unwrap();
        assert_eq!(first, [Vec3::new(1.0, 1.0, 0.0), Vec3::X, Vec3::ZERO]);

        assert!(from_mesh(&mesh, ShapeOptions::STATIC).is_some());
    }

    #[test]
    fn test_all_degenerate_mesh_has_no_shape() {
        let mesh = BaseMesh::new(vec![
            Polygon::new(vec![Vec3::ZERO, Vec3::X]),
            Polygon::new(vec![Vec3::ZERO, Vec3::X, Vec3::X * 3.0]),
        ]);
        assert!(from_mesh(&mesh, ShapeOptions::STATIC).is_none());
        assert!(from_mesh(&mesh, ShapeOptions::CONVEX).is_none());
    }

    #[test]
    fn test_convex_mesh() {
        let mesh = BaseMesh::from_box(Vec3::splat(-2.0), Vec3::splat(2.0));
        let shape = from_mesh(&mesh, ShapeOptions::CONVEX).unwrap();
        assert!(shape.as_convex_polyhedron().is_some());
    }

    #[test]
    fn test_solid_sector_emits_floor_and_ceiling() {
        let soup = heightmap_triangles(&[cell()], &[]);
        assert_eq!(soup.len(), 4);
    }

    #[test]
    fn test_ghost_floor_solid_ceiling() {
        let mut sector = cell();
        sector.floor_penetration = PenetrationConfig::Ghost;

        let soup = heightmap_triangles(&[sector], &[]);
        assert_eq!(soup.len(), 2);
        assert!(soup.triangles().flatten().all(|v| v.z == 2048.0));
    }

    #[test]
    fn test_wall_sector_emits_nothing() {
        let mut sector = cell();
        sector.floor_penetration = PenetrationConfig::Wall;
        sector.ceiling_penetration = PenetrationConfig::Wall;

        assert!(heightmap_triangles(&[sector], &[]).is_empty());
        assert!(from_heightmap(&[sector], &[], true).is_none());
    }

    #[test]
    fn test_door_suppresses_one_triangle() {
        let mut sector = cell();
        sector.floor_penetration = PenetrationConfig::DoorVerticalA;
        sector.ceiling_penetration = PenetrationConfig::Ghost;

        let soup = heightmap_triangles(&[sector], &[]);
        assert_eq!(soup.len(), 1);
        let c = sector.floor_corners;
        assert_eq!(soup.triangles().next().unwrap(), [c[2], c[1], c[0]]);
    }

    #[test]
    fn test_diagonal_selects_pattern() {
        let mut sector = cell();
        sector.ceiling_penetration = PenetrationConfig::Ghost;
        sector.floor_diagonal = DiagonalType::NorthEast;

        let soup = heightmap_triangles(&[sector], &[]);
        let c = sector.floor_corners;
        let tris: Vec<_> = soup.triangles().collect();
        assert_eq!(tris, vec![[c[3], c[2], c[1]], [c[3], c[1], c[0]]]);
    }

    #[test]
    fn test_tween_shapes() {
        let floor = [
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(1024.0, 0.0, 0.0),
            Vec3::new(1024.0, 0.0, 256.0),
            Vec3::new(0.0, 0.0, 256.0),
        ];
        let tween = |floor_type| SectorTween {
            floor_corners: floor,
            floor_type,
            ceiling_corners: floor,
            ceiling_type: TweenType::None,
        };

        assert_eq!(heightmap_triangles(&[], &[tween(TweenType::Quad)]).len(), 2);
        assert_eq!(heightmap_triangles(&[], &[tween(TweenType::TriangleLeft)]).len(), 1);
        assert_eq!(heightmap_triangles(&[], &[tween(TweenType::TriangleRight)]).len(), 1);
        assert!(heightmap_triangles(&[], &[tween(TweenType::None)]).is_empty());
    }

    #[test]
    fn test_two_triangle_tween_split() {
        // Edge heights cross: c0->c1 goes down by 100, c3->c2 goes up by 300.
        let c = [
            Vec3::new(0.0, 0.0, 100.0),
            Vec3::new(1024.0, 0.0, 0.0),
            Vec3::new(1024.0, 0.0, 300.0),
            Vec3::new(0.0, 0.0, 0.0),
        ];
        let t = two_triangle_split(&c);
        assert!((t - 0.25).abs() < 1.0e-6);

        let tween = SectorTween {
            floor_corners: c,
            floor_type: TweenType::TwoTriangles,
            ceiling_corners: c,
            ceiling_type: TweenType::None,
        };
        let soup = heightmap_triangles(&[], &[tween]);
        assert_eq!(soup.len(), 2);
        let shared = c[0].lerp(c[2], 0.25);
        assert!(soup.triangles().all(|tri| tri[2] == shared));
    }

    #[test]
    fn test_two_triangle_split_zero_denominator() {
        let c = [
            Vec3::new(0.0, 0.0, 50.0),
            Vec3::new(1024.0, 0.0, 50.0),
            Vec3::new(1024.0, 0.0, 300.0),
            Vec3::new(0.0, 0.0, 0.0),
        ];
        assert_eq!(two_triangle_split(&c), 0.0);
    }

    #[test]
    fn test_heightmap_shape_is_static_trimesh() {
        let shape = from_heightmap(&[cell()], &[], true).unwrap();
        assert!(shape.as_trimesh().is_some());
    }
}
