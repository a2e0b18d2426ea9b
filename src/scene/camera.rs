use crate::geometry::frustum::{BoundingSphere, Frustum};
use crate::geometry::transform::TransformFactory;
use crate::scene::object::Object;
use nalgebra::{Matrix4, Point3, Vector3};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Projection {
    Perspective {
        fov_y_rad: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    },
    Orthographic {
        height: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    },
}

impl Projection {
    pub fn matrix(&self) -> Matrix4<f32> {
        match *self {
            Projection::Perspective {
                fov_y_rad,
                aspect_ratio,
                near,
                far,
            } => TransformFactory::perspective(aspect_ratio, fov_y_rad, near, far),

            Projection::Orthographic {
                height,
                aspect_ratio,
                near,
                far,
            } => {
                let (hw, hh) = (0.5 * height * aspect_ratio, 0.5 * height);
                TransformFactory::orthographic(-hw, hw, -hh, hh, near, far)
            }
        }
    }

    pub fn near(&self) -> f32 {
        match *self {
            Projection::Perspective { near, .. } | Projection::Orthographic { near, .. } => near,
        }
    }

    pub fn far(&self) -> f32 {
        match *self {
            Projection::Perspective { far, .. } | Projection::Orthographic { far, .. } => far,
        }
    }

    pub fn set_aspect_ratio(&mut self, aspect: f32) {
        match self {
            Projection::Perspective { aspect_ratio, .. }
            | Projection::Orthographic { aspect_ratio, .. } => *aspect_ratio = aspect,
        }
    }
}

/// The capability set shared by cameras and light views.
pub trait Viewpoint {
    fn view_matrix(&self) -> Matrix4<f32>;
    fn projection_matrix(&self) -> Matrix4<f32>;

    fn view_projection(&self) -> Matrix4<f32> {
        self.projection_matrix() * self.view_matrix()
    }

    fn frustum(&self) -> Frustum {
        Frustum::from_matrix(&self.view_projection())
    }

    /// True when `sphere` (world space) is entirely outside the view volume.
    fn cull(&self, sphere: &BoundingSphere) -> bool {
        self.frustum().excludes_sphere(sphere)
    }
}

/// A viewpoint placed by an `Object` frame.
#[derive(Debug, Clone)]
pub struct Camera {
    pub object: Object,
    pub projection: Projection,
}

impl Camera {
    pub fn new(position: Point3<f32>, projection: Projection) -> Self {
        Self {
            object: Object::at(position),
            projection,
        }
    }

    pub fn new_perspective(
        position: Point3<f32>,
        target: Point3<f32>,
        up: Vector3<f32>,
        fov_y_rad: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let mut cam = Self::new(
            position,
            Projection::Perspective {
                fov_y_rad,
                aspect_ratio,
                near,
                far,
            },
        );
        cam.look_at(&target, &up);
        cam
    }

    pub fn new_orthographic(
        position: Point3<f32>,
        target: Point3<f32>,
        up: Vector3<f32>,
        height: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    ) -> Self {
        let mut cam = Self::new(
            position,
            Projection::Orthographic {
                height,
                aspect_ratio,
                near,
                far,
            },
        );
        cam.look_at(&target, &up);
        cam
    }

    pub fn position(&self) -> Point3<f32> {
        self.object.position()
    }

    pub fn set_position(&mut self, position: Point3<f32>) {
        self.object.set_position(position);
    }

    pub fn forward(&self) -> Vector3<f32> {
        self.object.forward()
    }

    pub fn look_at(&mut self, target: &Point3<f32>, up: &Vector3<f32>) {
        self.object.look_at(target, up);
    }

    pub fn set_forward_up(&mut self, forward: &Vector3<f32>, up: &Vector3<f32>) {
        self.object.set_forward_up(forward, up);
    }

    pub fn rotate(&mut self, axis: &Vector3<f32>, angle_rad: f32) {
        self.object.rotate(axis, angle_rad);
    }

    pub fn near(&self) -> f32 {
        self.projection.near()
    }

    pub fn far(&self) -> f32 {
        self.projection.far()
    }

    pub fn epoch(&self) -> u64 {
        self.object.epoch()
    }
}

impl Viewpoint for Camera {
    fn view_matrix(&self) -> Matrix4<f32> {
        self.object.view_matrix()
    }

    fn projection_matrix(&self) -> Matrix4<f32> {
        self.projection.matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> Camera {
        Camera::new_perspective(
            Point3::new(0.0, 0.0, 3.0),
            Point3::origin(),
            Vector3::y(),
            60f32.to_radians(),
            1.0,
            0.1,
            50.0,
        )
    }

    #[test]
    fn looks_down_negative_z() {
        let cam = camera();
        assert!((cam.forward() - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-6);
        let p = cam.view_matrix().transform_point(&Point3::origin());
        assert!((p - Point3::new(0.0, 0.0, -3.0)).norm() < 1e-5);
    }

    #[test]
    fn culls_sphere_behind() {
        let cam = camera();
        assert!(cam.cull(&BoundingSphere::new(Point3::new(0.0, 0.0, 10.0), 1.0)));
        assert!(!cam.cull(&BoundingSphere::new(Point3::origin(), 1.0)));
    }

    #[test]
    fn orthographic_maps_height_to_ndc() {
        let cam = Camera::new_orthographic(
            Point3::new(0.0, 0.0, 5.0),
            Point3::origin(),
            Vector3::y(),
            4.0,
            1.0,
            0.1,
            20.0,
        );
        let clip = cam.view_projection() * nalgebra::Vector4::new(0.0, 2.0, 0.0, 1.0);
        assert!((clip.y / clip.w - 1.0).abs() < 1e-5);
    }
}
