use crate::geometry::frustum::BoundingSphere;
use crate::scene::geometry::{Geometry, Vertex};
use crate::scene::material::Material;
use crate::scene::object::Object;
use nalgebra::{Matrix4, Point3, Vector2, Vector3};
use std::f32::consts::PI;
use std::sync::Arc;

/// The unit of draw: one geometry shaded with one material.
#[derive(Debug, Clone)]
pub struct SubMesh {
    pub geometry: Arc<Geometry>,
    pub material: Arc<Material>,
}

impl SubMesh {
    pub fn new(geometry: Arc<Geometry>, material: Arc<Material>) -> Self {
        Self { geometry, material }
    }

    /// World-space bounds under `world`.
    pub fn world_sphere(&self, world: &Matrix4<f32>) -> BoundingSphere {
        self.geometry.bounding_sphere().transformed(world)
    }
}

/// A group of submeshes sharing one transform.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub name: String,
    pub object: Object,
    pub submeshes: Vec<SubMesh>,
}

impl Mesh {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            object: Object::new(),
            submeshes: Vec::new(),
        }
    }

    /// A mesh with a single submesh.
    pub fn single(name: impl Into<String>, geometry: Geometry, material: Material) -> Self {
        let mut mesh = Self::new(name);
        mesh.push(SubMesh::new(Arc::new(geometry), Arc::new(material)));
        mesh
    }

    pub fn push(&mut self, submesh: SubMesh) {
        self.submeshes.push(submesh);
    }

    pub fn world_matrix(&self) -> Matrix4<f32> {
        self.object.world_matrix()
    }

    pub fn epoch(&self) -> u64 {
        self.object.epoch()
    }

    pub fn index_count(&self) -> usize {
        self.submeshes.iter().map(|s| s.geometry.faces().len()).sum()
    }
}

//=================================
// Primitive builders
//=================================

fn finish(mut geometry: Geometry) -> Geometry {
    geometry.calculate_tangents();
    geometry
}

/// Unit cube centred at the origin, one flat-shaded quad per side.
pub fn cube() -> Geometry {
    // (normal, u axis, v axis) with u x v = normal, so every face winds CCW
    // seen from outside.
    #[rustfmt::skip]
    let sides = [
        (Vector3::x(),  -Vector3::z(), Vector3::y()),
        (-Vector3::x(),  Vector3::z(), Vector3::y()),
        (Vector3::y(),   Vector3::x(), -Vector3::z()),
        (-Vector3::y(),  Vector3::x(), Vector3::z()),
        (Vector3::z(),   Vector3::x(), Vector3::y()),
        (-Vector3::z(), -Vector3::x(), Vector3::y()),
    ];

    let mut geometry = Geometry::new();
    for (n, u, v) in sides {
        let corner = |i: f32, j: f32| {
            let p = n * 0.5 + u * (i - 0.5) + v * (j - 0.5);
            Vertex::new(Point3::from(p), Vector2::new(i, j), n)
        };
        let (c00, c10, c11, c01) = (corner(0., 0.), corner(1., 0.), corner(1., 1.), corner(0., 1.));
        geometry.append_triangle(c00, c10, c11);
        geometry.append_triangle(c00, c11, c01);
    }
    finish(geometry)
}

/// A `width` x `depth` rectangle in the XZ plane facing +Y.
pub fn plane(width: f32, depth: f32) -> Geometry {
    let n = Vector3::y();
    let corner = |i: f32, j: f32| {
        let p = Point3::new((i - 0.5) * width, 0.0, (0.5 - j) * depth);
        Vertex::new(p, Vector2::new(i, j), n)
    };
    let mut geometry = Geometry::new();
    let (c00, c10, c11, c01) = (corner(0., 0.), corner(1., 0.), corner(1., 1.), corner(0., 1.));
    geometry.append_triangle(c00, c10, c11);
    geometry.append_triangle(c00, c11, c01);
    finish(geometry)
}

/// UV sphere with shared vertices; `rings` >= 2, `segments` >= 3.
pub fn sphere(radius: f32, segments: usize, rings: usize) -> Geometry {
    let segments = segments.max(3);
    let rings = rings.max(2);
    let mut geometry = Geometry::new();

    for i in 0..=rings {
        let theta = PI * i as f32 / rings as f32;
        for j in 0..=segments {
            let phi = 2.0 * PI * j as f32 / segments as f32;
            let n = Vector3::new(theta.sin() * phi.sin(), theta.cos(), theta.sin() * phi.cos());
            let uv = Vector2::new(j as f32 / segments as f32, 1.0 - i as f32 / rings as f32);
            geometry.push_vertex(Vertex::new(Point3::from(n * radius), uv, n));
        }
    }

    let row = (segments + 1) as u32;
    for i in 0..rings as u32 {
        for j in 0..segments as u32 {
            let a = i * row + j;
            let b = (i + 1) * row + j;
            let c = b + 1;
            let d = a + 1;
            // The pole rows collapse one triangle of each quad.
            if i + 1 != rings as u32 {
                geometry.push_face(a, b, c);
            }
            if i != 0 {
                geometry.push_face(a, c, d);
            }
        }
    }
    finish(geometry)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face_normal(g: &Geometry, t: usize) -> Vector3<f32> {
        let f = g.faces();
        let p = |k: usize| g.verts()[f[3 * t + k] as usize].position();
        (p(1) - p(0)).cross(&(p(2) - p(0)))
    }

    #[test]
    fn cube_faces_wind_outwards() {
        let g = cube();
        assert_eq!(g.verts().len(), 36);
        assert_eq!(g.faces().len(), 36);
        for t in 0..g.triangle_count() {
            let centroid: Vector3<f32> = (0..3)
                .map(|k| g.verts()[g.faces()[3 * t + k] as usize].position().coords)
                .sum::<Vector3<f32>>()
                / 3.0;
            assert!(face_normal(&g, t).dot(&centroid) > 0.0);
        }
    }

    #[test]
    fn plane_faces_up() {
        let g = plane(20.0, 20.0);
        for t in 0..g.triangle_count() {
            assert!(face_normal(&g, t).normalize().y > 0.999);
        }
        assert!((g.bounding_sphere().radius - 200f32.sqrt()).abs() < 1e-4);
    }

    #[test]
    fn sphere_is_closed_and_outward() {
        let g = sphere(1.5, 16, 8);
        assert!(g.validate().is_ok());
        // Two triangles per quad minus one per quad on each pole row.
        assert_eq!(g.triangle_count(), 16 * 8 * 2 - 2 * 16);
        for t in 0..g.triangle_count() {
            let a = g.verts()[g.faces()[3 * t] as usize].position().coords;
            assert!(face_normal(&g, t).dot(&a) > 0.0);
        }
        for v in g.verts() {
            assert!((v.position().coords.norm() - 1.5).abs() < 1e-5);
            assert!(v.normal().dot(&v.tangent()).abs() < 1e-3);
        }
    }

    #[test]
    fn single_submesh_mesh() {
        let mesh = Mesh::single("box", cube(), Material::default());
        assert_eq!(mesh.submeshes.len(), 1);
        assert_eq!(mesh.index_count(), 36);
    }
}
