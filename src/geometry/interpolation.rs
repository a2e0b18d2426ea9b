use nalgebra::{Point2, Vector3};

const EPSILON: f32 = 1e-5;

/// Signed doubled area of (a, b, p). Positive when `p` lies left of a -> b
/// in a y-up window.
#[inline(always)]
pub fn edge_function(a: &Point2<f32>, b: &Point2<f32>, p: &Point2<f32>) -> f32 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Top-left fill rule for an edge of a counter-clockwise triangle with a y-up
/// window: left edges run downwards, top edges run right to left.
#[inline(always)]
pub fn is_top_left(a: &Point2<f32>, b: &Point2<f32>) -> bool {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    dy < 0.0 || (dy == 0.0 && dx < 0.0)
}

/// Pixel ownership for one edge value: strictly inside, or on an owning edge.
#[inline(always)]
pub fn covers(edge: f32, top_left: bool) -> bool {
    edge > 0.0 || (edge == 0.0 && top_left)
}

/// Compute perspective-correct barycentric coordinates.
///
///   wa = alpha / w1, wb = beta / w2, wc = gamma / w3
///   alpha' = wa / (wa + wb + wc), ...
///
/// Returns `None` when the weight sum is near zero.
pub fn perspective_correct_barycentric(
    bary: Vector3<f32>,
    w1: f32,
    w2: f32,
    w3: f32,
) -> Option<Vector3<f32>> {
    let inv_w1 = if w1.abs() > EPSILON { 1.0 / w1 } else { 1.0 };
    let inv_w2 = if w2.abs() > EPSILON { 1.0 / w2 } else { 1.0 };
    let inv_w3 = if w3.abs() > EPSILON { 1.0 / w3 } else { 1.0 };

    let wa = bary.x * inv_w1;
    let wb = bary.y * inv_w2;
    let wc = bary.z * inv_w3;

    let sum = wa + wb + wc;
    if sum.abs() < EPSILON {
        return None;
    }
    let inv_sum = 1.0 / sum;
    Some(Vector3::new(wa * inv_sum, wb * inv_sum, wc * inv_sum))
}

/// Perspective-correct parameter along a segment whose ends have clip w `w0`, `w1`.
#[inline]
pub fn perspective_correct_lerp(t: f32, w0: f32, w1: f32) -> f32 {
    if w0.abs() < EPSILON || w1.abs() < EPSILON {
        return t;
    }
    let a = (1.0 - t) / w0;
    let b = t / w1;
    let sum = a + b;
    if sum.abs() < EPSILON { t } else { b / sum }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ccw_triangle_has_positive_area() {
        let a = Point2::new(0.0, 0.0);
        let b = Point2::new(4.0, 0.0);
        let c = Point2::new(0.0, 4.0);
        assert!(edge_function(&a, &b, &c) > 0.0);
        assert!(edge_function(&a, &c, &b) < 0.0);
    }

    #[test]
    fn shared_edge_has_one_owner() {
        // Two CCW triangles sharing the vertical edge x = 1.
        let (p, q) = (Point2::new(1.0, 0.0), Point2::new(1.0, 2.0));
        // Left triangle walks q -> p, right triangle walks p -> q.
        assert!(is_top_left(&q, &p) != is_top_left(&p, &q));
    }

    #[test]
    fn equal_w_keeps_weights() {
        let bary = Vector3::new(0.2, 0.3, 0.5);
        let corrected = perspective_correct_barycentric(bary, 2.0, 2.0, 2.0).unwrap();
        assert!((corrected - bary).norm() < 1e-6);
    }

    #[test]
    fn lerp_is_pulled_towards_near_end() {
        let t = perspective_correct_lerp(0.5, 1.0, 3.0);
        assert!(t < 0.5);
        assert_eq!(perspective_correct_lerp(0.5, 2.0, 2.0), 0.5);
    }
}
