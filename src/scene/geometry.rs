use crate::geometry::frustum::BoundingSphere;
use crate::scene::id::GeometryId;
use bytemuck::{Pod, Zeroable};
use nalgebra::{Point3, Vector2, Vector3};
use std::mem::offset_of;
use std::sync::OnceLock;

/// Vertex layout shared with the GPU. Offsets and stride are consumed by the
/// attribute bindings of the mesh programs.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub texcoord: [f32; 2],
    pub normal: [f32; 3],
    pub tangent: [f32; 3],
}

impl Vertex {
    pub const STRIDE: usize = std::mem::size_of::<Vertex>();
    pub const POSITION_OFFSET: usize = offset_of!(Vertex, position);
    pub const TEXCOORD_OFFSET: usize = offset_of!(Vertex, texcoord);
    pub const NORMAL_OFFSET: usize = offset_of!(Vertex, normal);
    pub const TANGENT_OFFSET: usize = offset_of!(Vertex, tangent);

    pub fn new(position: Point3<f32>, texcoord: Vector2<f32>, normal: Vector3<f32>) -> Self {
        Self {
            position: position.coords.into(),
            texcoord: texcoord.into(),
            normal: normal.into(),
            tangent: [0.0; 3],
        }
    }

    pub fn position(&self) -> Point3<f32> {
        Point3::from(self.position)
    }

    pub fn texcoord(&self) -> Vector2<f32> {
        Vector2::from(self.texcoord)
    }

    pub fn normal(&self) -> Vector3<f32> {
        Vector3::from(self.normal)
    }

    pub fn tangent(&self) -> Vector3<f32> {
        Vector3::from(self.tangent)
    }

    /// normal x tangent
    pub fn bitangent(&self) -> Vector3<f32> {
        self.normal().cross(&self.tangent())
    }
}

/// An indexed triangle list.
#[derive(Debug)]
pub struct Geometry {
    id: GeometryId,
    verts: Vec<Vertex>,
    faces: Vec<u32>,
    bounds: OnceLock<BoundingSphere>,
}

impl Default for Geometry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Geometry {
    /// A clone is a new geometry with its own identity.
    fn clone(&self) -> Self {
        Self::from_parts(self.verts.clone(), self.faces.clone())
    }
}

impl Geometry {
    pub fn new() -> Self {
        Self::from_parts(Vec::new(), Vec::new())
    }

    pub fn from_parts(verts: Vec<Vertex>, faces: Vec<u32>) -> Self {
        Self {
            id: GeometryId::new(),
            verts,
            faces,
            bounds: OnceLock::new(),
        }
    }

    pub fn id(&self) -> GeometryId {
        self.id
    }

    pub fn verts(&self) -> &[Vertex] {
        &self.verts
    }

    pub fn faces(&self) -> &[u32] {
        &self.faces
    }

    pub fn triangle_count(&self) -> usize {
        self.faces.len() / 3
    }

    /// Appends three vertices and one face pointing at them.
    pub fn append_triangle(&mut self, a: Vertex, b: Vertex, c: Vertex) {
        let base = self.verts.len() as u32;
        self.verts.extend_from_slice(&[a, b, c]);
        self.faces.extend_from_slice(&[base, base + 1, base + 2]);
        self.bounds = OnceLock::new();
    }

    pub fn push_vertex(&mut self, v: Vertex) -> u32 {
        self.verts.push(v);
        self.bounds = OnceLock::new();
        (self.verts.len() - 1) as u32
    }

    pub fn push_face(&mut self, a: u32, b: u32, c: u32) {
        self.faces.extend_from_slice(&[a, b, c]);
    }

    /// Checks the submesh invariant: whole triangles, indices in range.
    pub fn validate(&self) -> Result<(), String> {
        if self.faces.len() % 3 != 0 {
            return Err(format!("{} face indices is not a multiple of 3", self.faces.len()));
        }
        if let Some(bad) = self.faces.iter().find(|&&i| i as usize >= self.verts.len()) {
            return Err(format!(
                "face index {} out of range for {} vertices",
                bad,
                self.verts.len()
            ));
        }
        Ok(())
    }

    fn triangle(&self, t: usize) -> [usize; 3] {
        [
            self.faces[3 * t] as usize,
            self.faces[3 * t + 1] as usize,
            self.faces[3 * t + 2] as usize,
        ]
    }

    /// Smoothed normals: each vertex gets the area-weighted average of the
    /// faces that reference it. Vertices are never merged, so vertices split
    /// per face keep their face normal.
    pub fn calculate_normals(&mut self) {
        let mut sums = vec![Vector3::<f32>::zeros(); self.verts.len()];
        for t in 0..self.triangle_count() {
            let [a, b, c] = self.triangle(t);
            let pa = self.verts[a].position();
            let pb = self.verts[b].position();
            let pc = self.verts[c].position();
            // Cross product length is twice the area.
            let n = (pb - pa).cross(&(pc - pa));
            sums[a] += n;
            sums[b] += n;
            sums[c] += n;
        }
        for (v, n) in self.verts.iter_mut().zip(sums) {
            if n.norm_squared() > 1e-20 {
                v.normal = n.normalize().into();
            }
        }
    }

    /// Per-vertex tangents from the texture-space derivatives of each face,
    /// made orthogonal to the normal with Gram-Schmidt.
    pub fn calculate_tangents(&mut self) {
        let mut sums = vec![Vector3::<f32>::zeros(); self.verts.len()];
        for t in 0..self.triangle_count() {
            let [a, b, c] = self.triangle(t);
            let (va, vb, vc) = (&self.verts[a], &self.verts[b], &self.verts[c]);
            let e1 = vb.position() - va.position();
            let e2 = vc.position() - va.position();
            let d1 = vb.texcoord() - va.texcoord();
            let d2 = vc.texcoord() - va.texcoord();

            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() < 1e-12 {
                continue;
            }
            let tangent = (e1 * d2.y - e2 * d1.y) / det;
            sums[a] += tangent;
            sums[b] += tangent;
            sums[c] += tangent;
        }

        for (v, t) in self.verts.iter_mut().zip(sums) {
            let n = v.normal();
            let n = if n.norm_squared() > 1e-20 { n.normalize() } else { Vector3::z() };
            let mut t = t - n * n.dot(&t);
            if t.norm_squared() < 1e-12 {
                // No usable uv gradient; any perpendicular keeps the frame valid.
                let helper = if n.x.abs() < 0.9 { Vector3::x() } else { Vector3::y() };
                t = helper - n * n.dot(&helper);
            }
            v.tangent = t.normalize().into();
        }
    }

    /// Object-space bounding sphere, cached until the next mutation.
    pub fn bounding_sphere(&self) -> BoundingSphere {
        *self.bounds.get_or_init(|| {
            let points: Vec<Point3<f32>> = self.verts.iter().map(Vertex::position).collect();
            BoundingSphere::from_points(points.iter())
        })
    }
}
