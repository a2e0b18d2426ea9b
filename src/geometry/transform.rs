use nalgebra::{Matrix4, Point3, Unit, Vector3, Vector4};

/// The matrices used by objects, cameras and lights. Right-handed, OpenGL
/// clip conventions.
pub struct TransformFactory;

#[rustfmt::skip]
impl TransformFactory {
    /// Rotation by `angle_rad` about `axis` (need not be unit).
    pub fn rotation(axis: &Vector3<f32>, angle_rad: f32) -> Matrix4<f32> {
        Matrix4::from_axis_angle(&Unit::new_normalize(*axis), angle_rad)
    }

    pub fn translation(translation: &Vector3<f32>) -> Matrix4<f32> {
        Matrix4::new_translation(translation)
    }

    pub fn scaling_nonuniform(scale: &Vector3<f32>) -> Matrix4<f32> {
        Matrix4::new_nonuniform_scaling(scale)
    }

    /// World matrix of a transform: translation * basis * scale.
    /// The basis vectors become the columns of the rotation block.
    pub fn world(
        position: &Point3<f32>,
        ux: &Vector3<f32>,
        uy: &Vector3<f32>,
        uz: &Vector3<f32>,
        scale: &Vector3<f32>,
    ) -> Matrix4<f32> {
        Matrix4::new(
            ux.x * scale.x, uy.x * scale.y, uz.x * scale.z, position.x,
            ux.y * scale.x, uy.y * scale.y, uz.y * scale.z, position.y,
            ux.z * scale.x, uy.z * scale.y, uz.z * scale.z, position.z,
            0.0,            0.0,            0.0,            1.0,
        )
    }

    /// Look-at view matrix; the camera looks down -Z of its own space.
    pub fn view(eye: &Point3<f32>, target: &Point3<f32>, up: &Vector3<f32>) -> Matrix4<f32> {
        let back = (eye - target).normalize();
        let right = up.cross(&back).normalize();
        let up = back.cross(&right);

        // Inverse of a rigid transform: transposed basis, rotated translation.
        Matrix4::new(
            right.x, right.y, right.z, -right.dot(&eye.coords),
            up.x,    up.y,    up.z,    -up.dot(&eye.coords),
            back.x,  back.y,  back.z,  -back.dot(&eye.coords),
            0.0,     0.0,     0.0,     1.0,
        )
    }

    /// Symmetric perspective frustum, depth mapped to [-1, 1].
    pub fn perspective(aspect_ratio: f32, fov_y_rad: f32, near: f32, far: f32) -> Matrix4<f32> {
        let focal = 1.0 / (0.5 * fov_y_rad).tan();
        let depth = near - far;

        Matrix4::new(
            focal / aspect_ratio, 0.0,   0.0,                 0.0,
            0.0,                  focal, 0.0,                 0.0,
            0.0,                  0.0,   (far + near) / depth, 2.0 * far * near / depth,
            0.0,                  0.0,   -1.0,                0.0,
        )
    }

    /// Box from (left, bottom, -near) to (right, top, -far) onto the NDC cube.
    pub fn orthographic(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        near: f32,
        far: f32,
    ) -> Matrix4<f32> {
        let (w, h, d) = (right - left, top - bottom, near - far);

        Matrix4::new(
            2.0 / w, 0.0,     0.0,     -(right + left) / w,
            0.0,     2.0 / h, 0.0,     -(top + bottom) / h,
            0.0,     0.0,     2.0 / d, (far + near) / d,
            0.0,     0.0,     0.0,     1.0,
        )
    }
}

/// Rotates a vector around `axis` (need not be unit) by `angle_rad` with Rodrigues' formula:
/// v' = v cos + (k x v) sin + k (k . v)(1 - cos).
pub fn rotate_vector(v: &Vector3<f32>, axis: &Vector3<f32>, angle_rad: f32) -> Vector3<f32> {
    let k = axis.normalize();
    let (s, c) = angle_rad.sin_cos();
    v * c + k.cross(v) * s + k * (k.dot(v) * (1.0 - c))
}

/// Normal matrix: transpose of the inverse of a model-view matrix.
/// Falls back to the matrix itself when it is singular (zero scale).
pub fn normal_matrix(model_view: &Matrix4<f32>) -> Matrix4<f32> {
    model_view
        .try_inverse()
        .unwrap_or(*model_view)
        .transpose()
}

/// Clip space to NDC. A vanishing `w` maps to the origin.
#[inline]
pub fn apply_perspective_division(clip: &Vector4<f32>) -> Point3<f32> {
    if clip.w.abs() > 1e-6 {
        Point3::from(clip.xyz() / clip.w)
    } else {
        Point3::origin()
    }
}

/// NDC to window coordinates, origin in the bottom-left corner.
#[inline]
pub fn ndc_to_window(ndc_x: f32, ndc_y: f32, width: f32, height: f32) -> (f32, f32) {
    ((ndc_x + 1.0) * 0.5 * width, (ndc_y + 1.0) * 0.5 * height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_matrix_moves_eye_to_origin() {
        let eye = Point3::new(1.0, 2.0, 3.0);
        let view = TransformFactory::view(&eye, &Point3::origin(), &Vector3::y());
        let p = view.transform_point(&eye);
        assert!(p.coords.norm() < 1e-5);
    }

    #[test]
    fn perspective_maps_near_and_far_to_unit_depth() {
        let proj = TransformFactory::perspective(1.0, 60f32.to_radians(), 0.1, 50.0);
        let near = proj * Vector4::new(0.0, 0.0, -0.1, 1.0);
        let far = proj * Vector4::new(0.0, 0.0, -50.0, 1.0);
        assert!((near.z / near.w + 1.0).abs() < 1e-4);
        assert!((far.z / far.w - 1.0).abs() < 1e-4);
    }

    #[test]
    fn rodrigues_matches_rotation_matrix() {
        let axis = Vector3::new(0.3, -1.0, 0.5);
        let v = Vector3::new(1.0, 2.0, -0.5);
        let m = TransformFactory::rotation(&axis, 0.7);
        let expected = m.transform_vector(&v);
        let got = rotate_vector(&v, &axis, 0.7);
        assert!((expected - got).norm() < 1e-5);
    }

    #[test]
    fn window_origin_is_bottom_left() {
        let (x, y) = ndc_to_window(-1.0, -1.0, 100.0, 50.0);
        assert_eq!((x, y), (0.0, 0.0));
        let (x, y) = ndc_to_window(1.0, 1.0, 100.0, 50.0);
        assert_eq!((x, y), (100.0, 50.0));
    }
}
