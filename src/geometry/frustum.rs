//! View frustum planes and bounding spheres for visibility culling.

use nalgebra::{Matrix4, Point3, RowVector4, Vector3};

/// A sphere enclosing a piece of geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingSphere {
    pub center: Point3<f32>,
    pub radius: f32,
}

impl BoundingSphere {
    pub fn new(center: Point3<f32>, radius: f32) -> Self {
        Self { center, radius }
    }

    /// Smallest axis-aligned-box-centred sphere around `points`.
    /// Every point lies within `radius` of `center`.
    pub fn from_points<'a, I>(points: I) -> Self
    where
        I: IntoIterator<Item = &'a Point3<f32>> + Clone,
    {
        let mut min = Point3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Point3::new(f32::MIN, f32::MIN, f32::MIN);
        let mut any = false;
        for p in points.clone() {
            min = min.inf(p);
            max = max.sup(p);
            any = true;
        }
        if !any {
            return Self::new(Point3::origin(), 0.0);
        }

        let center = nalgebra::center(&min, &max);
        let radius = points
            .into_iter()
            .map(|p| (p - center).norm_squared())
            .fold(0.0f32, f32::max)
            .sqrt();
        Self { center, radius }
    }

    /// Transforms the sphere by an affine world matrix. The radius grows with the
    /// largest axis scale so the result still encloses the transformed geometry.
    pub fn transformed(&self, world: &Matrix4<f32>) -> Self {
        let center = world.transform_point(&self.center);
        let max_scale = (0..3)
            .map(|c| world.fixed_view::<3, 1>(0, c).norm())
            .fold(0.0f32, f32::max);
        Self {
            center,
            radius: self.radius * max_scale,
        }
    }

    pub fn contains(&self, p: &Point3<f32>, eps: f32) -> bool {
        (p - self.center).norm() <= self.radius + eps
    }
}

/// Plane in Hessian normal form; `normal` points into the frustum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vector3<f32>,
    pub constant: f32,
}

impl Plane {
    fn from_row(row: RowVector4<f32>) -> Self {
        let normal = Vector3::new(row[0], row[1], row[2]);
        let len = normal.norm();
        if len > 1e-12 {
            Self {
                normal: normal / len,
                constant: row[3] / len,
            }
        } else {
            Self {
                normal,
                constant: row[3],
            }
        }
    }

    #[inline]
    pub fn distance_to_point(&self, p: &Point3<f32>) -> f32 {
        self.normal.dot(&p.coords) + self.constant
    }
}

/// The six planes of a view volume. Order: left, right, bottom, top, near, far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Extracts the planes from a projection * view matrix (Gribb-Hartmann).
    pub fn from_matrix(view_projection: &Matrix4<f32>) -> Self {
        let m = view_projection;
        let r0 = m.row(0).into_owned();
        let r1 = m.row(1).into_owned();
        let r2 = m.row(2).into_owned();
        let r3 = m.row(3).into_owned();

        Self {
            planes: [
                Plane::from_row(r3 + r0),
                Plane::from_row(r3 - r0),
                Plane::from_row(r3 + r1),
                Plane::from_row(r3 - r1),
                Plane::from_row(r3 + r2),
                Plane::from_row(r3 - r2),
            ],
        }
    }

    /// True when the sphere lies entirely outside at least one plane.
    pub fn excludes_sphere(&self, sphere: &BoundingSphere) -> bool {
        self.planes
            .iter()
            .any(|plane| plane.distance_to_point(&sphere.center) < -sphere.radius)
    }

    /// Signed containment: the smallest plane distance of `p`.
    /// Positive inside, negative outside, zero on the boundary.
    pub fn min_distance(&self, p: &Point3<f32>) -> f32 {
        self.planes
            .iter()
            .map(|plane| plane.distance_to_point(p))
            .fold(f32::MAX, f32::min)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::transform::TransformFactory;

    fn camera_frustum() -> Frustum {
        let view = TransformFactory::view(
            &Point3::new(0.0, 0.0, 3.0),
            &Point3::origin(),
            &Vector3::y(),
        );
        let proj = TransformFactory::perspective(1.0, 60f32.to_radians(), 0.1, 50.0);
        Frustum::from_matrix(&(proj * view))
    }

    #[test]
    fn sphere_in_front_is_kept() {
        let f = camera_frustum();
        assert!(!f.excludes_sphere(&BoundingSphere::new(Point3::origin(), 0.9)));
    }

    #[test]
    fn sphere_behind_camera_is_excluded() {
        let f = camera_frustum();
        assert!(f.excludes_sphere(&BoundingSphere::new(Point3::new(0.0, 0.0, 6.0), 1.0)));
    }

    #[test]
    fn sphere_straddling_plane_is_kept() {
        let f = camera_frustum();
        // Centre behind the near plane, radius reaches into the volume.
        assert!(!f.excludes_sphere(&BoundingSphere::new(Point3::new(0.0, 0.0, 3.5), 1.0)));
    }

    #[test]
    fn from_points_contains_all_points() {
        let pts = [
            Point3::new(-1.0, 0.0, 0.0),
            Point3::new(3.0, 1.0, 0.5),
            Point3::new(0.0, -2.0, 4.0),
        ];
        let s = BoundingSphere::from_points(pts.iter());
        assert!(pts.iter().all(|p| s.contains(p, 1e-5)));
    }

    #[test]
    fn transformed_sphere_scales_radius() {
        let s = BoundingSphere::new(Point3::origin(), 1.0);
        let world = TransformFactory::translation(&Vector3::new(1.0, 0.0, 0.0))
            * TransformFactory::scaling_nonuniform(&Vector3::new(1.0, 3.0, 2.0));
        let t = s.transformed(&world);
        assert!((t.radius - 3.0).abs() < 1e-5);
        assert!((t.center - Point3::new(1.0, 0.0, 0.0)).norm() < 1e-6);
    }
}
