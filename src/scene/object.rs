use crate::geometry::transform::{TransformFactory, rotate_vector};
use crate::scene::id::next_epoch;
use nalgebra::{Matrix4, Point3, Vector3};
use std::cell::Cell;

/// A transformable record: position, orthonormal basis and per-axis scale.
///
/// The world matrix is rebuilt lazily; every mutation stamps a new epoch and
/// the cached matrix is only reused while its epoch matches.
#[derive(Debug, Clone)]
pub struct Object {
    position: Point3<f32>,
    ux: Vector3<f32>,
    uy: Vector3<f32>,
    uz: Vector3<f32>,
    scale: Vector3<f32>,
    epoch: u64,
    world: Cell<Option<(u64, Matrix4<f32>)>>,
}

impl Default for Object {
    fn default() -> Self {
        Self::new()
    }
}

impl Object {
    pub fn new() -> Self {
        Self {
            position: Point3::origin(),
            ux: Vector3::x(),
            uy: Vector3::y(),
            uz: Vector3::z(),
            scale: Vector3::repeat(1.0),
            epoch: next_epoch(),
            world: Cell::new(None),
        }
    }

    pub fn at(position: Point3<f32>) -> Self {
        let mut object = Self::new();
        object.position = position;
        object
    }

    fn touch(&mut self) {
        self.epoch = next_epoch();
    }

    /// Epoch of the last mutation.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn position(&self) -> Point3<f32> {
        self.position
    }

    pub fn set_position(&mut self, position: Point3<f32>) {
        self.position = position;
        self.touch();
    }

    pub fn translate(&mut self, delta: &Vector3<f32>) {
        self.position += delta;
        self.touch();
    }

    pub fn ux(&self) -> Vector3<f32> {
        self.ux
    }

    pub fn uy(&self) -> Vector3<f32> {
        self.uy
    }

    pub fn uz(&self) -> Vector3<f32> {
        self.uz
    }

    /// The viewing direction of a camera placed with this transform.
    pub fn forward(&self) -> Vector3<f32> {
        -self.uz
    }

    pub fn scale(&self) -> Vector3<f32> {
        self.scale
    }

    pub fn set_scale(&mut self, scale: Vector3<f32>) {
        self.scale = scale;
        self.touch();
    }

    /// Rotates the basis about `axis` by `angle_rad` (Rodrigues), then
    /// re-orthonormalises so the basis does not drift.
    pub fn rotate(&mut self, axis: &Vector3<f32>, angle_rad: f32) {
        if axis.norm_squared() < 1e-12 {
            return;
        }
        let ux = rotate_vector(&self.ux, axis, angle_rad).normalize();
        let uy = rotate_vector(&self.uy, axis, angle_rad);
        let uy = (uy - ux * ux.dot(&uy)).normalize();

        self.ux = ux;
        self.uy = uy;
        self.uz = ux.cross(&uy);
        self.touch();
    }

    /// Orients the object so it faces `forward` with `up` as the approximate
    /// up direction: right = forward x up, Uy = right x forward, Uz = -forward.
    pub fn set_forward_up(&mut self, forward: &Vector3<f32>, up: &Vector3<f32>) {
        let f = forward.normalize();
        let mut right = f.cross(up);
        if right.norm_squared() < 1e-12 {
            // `up` parallel to `forward`; any perpendicular will do.
            let fallback = if f.x.abs() < 0.9 { Vector3::x() } else { Vector3::z() };
            right = f.cross(&fallback);
        }
        let right = right.normalize();

        self.ux = right;
        self.uy = right.cross(&f).normalize();
        self.uz = -f;
        self.touch();
    }

    pub fn look_at(&mut self, target: &Point3<f32>, up: &Vector3<f32>) {
        let forward = target - self.position;
        if forward.norm_squared() > 1e-12 {
            self.set_forward_up(&forward, up);
        }
    }

    /// World matrix = translation * basis * scale.
    pub fn world_matrix(&self) -> Matrix4<f32> {
        if let Some((epoch, m)) = self.world.get() {
            if epoch == self.epoch {
                return m;
            }
        }
        let m = TransformFactory::world(&self.position, &self.ux, &self.uy, &self.uz, &self.scale);
        self.world.set(Some((self.epoch, m)));
        m
    }

    /// Look-at from the position along -Uz with Uy up.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        TransformFactory::view(&self.position, &(self.position - self.uz), &self.uy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn world_determinant_is_scale_product() {
        let mut o = Object::at(Point3::new(1.0, -2.0, 3.0));
        o.rotate(&Vector3::new(1.0, 1.0, 0.0), 0.8);
        o.set_scale(Vector3::new(2.0, 3.0, 0.5));
        assert!((o.world_matrix().determinant() - 3.0).abs() < 1e-4);
    }

    #[test]
    fn view_is_inverse_of_rigid_world() {
        let mut o = Object::at(Point3::new(0.5, 2.0, -1.0));
        o.rotate(&Vector3::new(0.2, 1.0, -0.3), 1.3);
        let product = o.view_matrix() * o.world_matrix();
        assert!((product - Matrix4::identity()).abs().max() < 1e-4);
    }

    #[test]
    fn world_matrix_follows_mutation() {
        let mut o = Object::new();
        let before = o.world_matrix();
        o.translate(&Vector3::new(0.0, 1.0, 0.0));
        let after = o.world_matrix();
        assert_ne!(before, after);
        assert_eq!(after[(1, 3)], 1.0);
    }

    #[test]
    fn forward_up_builds_right_handed_basis() {
        let mut o = Object::new();
        o.set_forward_up(&Vector3::new(1.0, 0.0, 0.0), &Vector3::new(0.0, -1.0, 0.0));
        assert!((o.forward() - Vector3::x()).norm() < 1e-6);
        assert!((o.uy() - Vector3::new(0.0, -1.0, 0.0)).norm() < 1e-6);
        assert!((o.ux().cross(&o.uy()) - o.uz()).norm() < 1e-6);
    }
}
