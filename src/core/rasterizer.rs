use crate::core::device::{BlendMode, CullMode, DepthTest, RasterMode};
use crate::core::program::{FragCoord, ShaderContext, ShaderKernel, Varyings};
use crate::core::sampler::{pack, unpack};
use crate::geometry::interpolation::{
    covers, edge_function, is_top_left, perspective_correct_barycentric, perspective_correct_lerp,
};
use crate::geometry::transform::{apply_perspective_division, ndc_to_window};
use nalgebra::{Point2, Vector3, Vector4};
use rayon::prelude::*;

/// A shaded vertex: clip-space position plus its varyings.
pub type ClipVertex = (Vector4<f32>, Varyings);

/// The attachments a draw writes to. Rows are stored bottom row first.
pub struct RenderTarget<'a> {
    pub width: usize,
    pub height: usize,
    pub color: Option<&'a mut [[u8; 4]]>,
    pub depth: Option<&'a mut [f32]>,
}

/// A vertex after perspective division and viewport transform.
#[derive(Clone, Copy)]
struct WindowVertex {
    pos: Point2<f32>,
    depth: f32,
    w: f32,
    varyings: Varyings,
}

/// Rasterizes points of a single draw with one fixed pipeline state.
pub struct Rasterizer<'a> {
    pub cull_mode: CullMode,
    pub raster_mode: RasterMode,
    pub depth_test: DepthTest,
    pub blend: BlendMode,
    pub viewport: (usize, usize),
    pub kernel: &'a dyn ShaderKernel,
    pub ctx: &'a ShaderContext<'a>,
    pub writes_depth: bool,
}

/// Clip planes as (axis, sign): sign * p[axis] <= p.w
const CLIP_PLANES: [(usize, f32); 6] = [
    (0, 1.0),  // Right
    (0, -1.0), // Left
    (1, 1.0),  // Top
    (1, -1.0), // Bottom
    (2, 1.0),  // Far
    (2, -1.0), // Near
];

impl<'a> Rasterizer<'a> {
    /// Rasterize a single triangle given clip-space vertices.
    ///
    /// This function performs **Sutherland–Hodgman clipping** against the canonical
    /// view frustum (W-normalization planes) in Homogeneous Clip Space, then culls
    /// by the winding of the clipped polygon (counter-clockwise is front-facing).
    pub fn draw_triangle(&self, target: &mut RenderTarget, tri: [&ClipVertex; 3]) {
        // Double-buffered vertex lists; a triangle clipped by a cube has at most 9 vertices.
        let mut current_poly: Vec<ClipVertex> = Vec::with_capacity(16);
        let mut clip_buffer: Vec<ClipVertex> = Vec::with_capacity(16);
        current_poly.extend(tri.iter().map(|v| **v));

        for &(axis, sign) in &CLIP_PLANES {
            if current_poly.is_empty() {
                return;
            }
            clip_polygon_against_plane(&current_poly, &mut clip_buffer, axis, sign);
            std::mem::swap(&mut current_poly, &mut clip_buffer);
        }

        if current_poly.len() < 3 {
            return;
        }

        let mut window = Vec::with_capacity(current_poly.len());
        for (clip, varyings) in &current_poly {
            match self.to_window(clip, varyings) {
                Some(v) => window.push(v),
                None => return,
            }
        }

        // Shoelace area of the clipped polygon decides the facing.
        let area: f32 = (0..window.len())
            .map(|i| {
                let a = window[i].pos;
                let b = window[(i + 1) % window.len()].pos;
                a.x * b.y - b.x * a.y
            })
            .sum();
        if area == 0.0 {
            return;
        }
        let front = area > 0.0;

        match self.cull_mode {
            CullMode::Back if !front => return,
            CullMode::Front if front => return,
            _ => {}
        }

        match self.raster_mode {
            RasterMode::Fill => {
                let v0 = window[0];
                for i in 1..(window.len() - 1) {
                    self.fill_triangle(target, [v0, window[i], window[i + 1]], front);
                }
            }
            RasterMode::Line => {
                for i in 0..3 {
                    self.draw_line(target, tri[i], tri[(i + 1) % 3]);
                }
            }
        }
    }

    /// Draws a segment with a DDA walk. The segment is clipped in homogeneous space first.
    pub fn draw_line(&self, target: &mut RenderTarget, a: &ClipVertex, b: &ClipVertex) {
        let Some((a, b)) = clip_segment(a, b) else {
            return;
        };
        let (Some(p0), Some(p1)) = (self.to_window(&a.0, &a.1), self.to_window(&b.0, &b.1)) else {
            return;
        };

        let (max_x, max_y) = self.bounds(target);
        let delta = p1.pos - p0.pos;
        let steps = delta.x.abs().max(delta.y.abs()).ceil().max(1.0) as usize;
        let mut last: Option<(usize, usize)> = None;

        for i in 0..=steps {
            let t = i as f32 / steps as f32;
            let p = p0.pos + delta * t;
            if p.x < 0.0 || p.y < 0.0 {
                continue;
            }
            let (x, y) = (p.x.floor() as usize, p.y.floor() as usize);
            if x >= max_x || y >= max_y || last == Some((x, y)) {
                continue;
            }
            last = Some((x, y));

            let depth = p0.depth + (p1.depth - p0.depth) * t;
            let tc = perspective_correct_lerp(t, p0.w, p1.w);
            let varyings = p0.varyings * (1.0 - tc) + p1.varyings * tc;
            let frag = FragCoord {
                x: x as f32 + 0.5,
                y: y as f32 + 0.5,
                z: depth,
                front_facing: true,
            };

            let RenderTarget {
                width,
                color,
                depth: depth_buf,
                ..
            } = &mut *target;
            let idx = y * *width + x;
            let c = color.as_deref_mut().map(|c| &mut c[idx]);
            let d = depth_buf.as_deref_mut().map(|d| &mut d[idx]);
            self.shade(c, d, frag, &varyings);
        }
    }

    /// Pixel bounds: the viewport clipped to the attachment size.
    fn bounds(&self, target: &RenderTarget) -> (usize, usize) {
        (
            self.viewport.0.min(target.width),
            self.viewport.1.min(target.height),
        )
    }

    fn to_window(&self, clip: &Vector4<f32>, varyings: &Varyings) -> Option<WindowVertex> {
        if clip.w.abs() < 1e-6 {
            return None;
        }
        let ndc = apply_perspective_division(clip);
        let (x, y) = ndc_to_window(
            ndc.x,
            ndc.y,
            self.viewport.0 as f32,
            self.viewport.1 as f32,
        );
        Some(WindowVertex {
            pos: Point2::new(x, y),
            depth: ndc.z * 0.5 + 0.5,
            w: clip.w,
            varyings: *varyings,
        })
    }

    /// Scan-converts one window-space triangle, rows in parallel.
    fn fill_triangle(&self, target: &mut RenderTarget, verts: [WindowVertex; 3], front: bool) {
        // Edge tests below expect counter-clockwise order.
        let [a, mut b, mut c] = verts;
        let mut area = edge_function(&a.pos, &b.pos, &c.pos);
        if area < 0.0 {
            std::mem::swap(&mut b, &mut c);
            area = -area;
        }
        if area <= f32::EPSILON {
            return;
        }

        let (max_x, max_y) = self.bounds(target);
        if max_x == 0 || max_y == 0 {
            return;
        }
        let min_px = a.pos.x.min(b.pos.x).min(c.pos.x).floor();
        let min_py = a.pos.y.min(b.pos.y).min(c.pos.y).floor();
        let max_px = a.pos.x.max(b.pos.x).max(c.pos.x).ceil();
        let max_py = a.pos.y.max(b.pos.y).max(c.pos.y).ceil();

        // Scissor Test
        if max_px < 0.0 || max_py < 0.0 || min_px >= max_x as f32 || min_py >= max_y as f32 {
            return;
        }
        let start_x = min_px.max(0.0) as usize;
        let end_x = (max_px as usize).min(max_x - 1);
        let start_y = min_py.max(0.0) as usize;
        let end_y = (max_py as usize).min(max_y - 1);

        let tl_bc = is_top_left(&b.pos, &c.pos);
        let tl_ca = is_top_left(&c.pos, &a.pos);
        let tl_ab = is_top_left(&a.pos, &b.pos);
        let inv_area = 1.0 / area;

        let width = target.width;
        let rows = end_y - start_y + 1;
        let color_rows: Vec<Option<&mut [[u8; 4]]>> = match target.color.as_deref_mut() {
            Some(buf) => buf[start_y * width..(end_y + 1) * width]
                .chunks_mut(width)
                .map(Some)
                .collect(),
            None => (0..rows).map(|_| None).collect(),
        };
        let depth_rows: Vec<Option<&mut [f32]>> = match target.depth.as_deref_mut() {
            Some(buf) => buf[start_y * width..(end_y + 1) * width]
                .chunks_mut(width)
                .map(Some)
                .collect(),
            None => (0..rows).map(|_| None).collect(),
        };

        // Rayon parallel iterator: work-stealing is effective here as row workloads vary.
        color_rows
            .into_par_iter()
            .zip(depth_rows)
            .enumerate()
            .for_each(|(row, (mut color_row, mut depth_row))| {
                let y = start_y + row;
                let py = y as f32 + 0.5;
                for x in start_x..=end_x {
                    let p = Point2::new(x as f32 + 0.5, py);
                    let w0 = edge_function(&b.pos, &c.pos, &p);
                    let w1 = edge_function(&c.pos, &a.pos, &p);
                    let w2 = edge_function(&a.pos, &b.pos, &p);
                    if !(covers(w0, tl_bc) && covers(w1, tl_ca) && covers(w2, tl_ab)) {
                        continue;
                    }

                    let bary = Vector3::new(w0, w1, w2) * inv_area;
                    // Window depth is affine in screen space.
                    let depth = bary.x * a.depth + bary.y * b.depth + bary.z * c.depth;
                    let Some(corrected) = perspective_correct_barycentric(bary, a.w, b.w, c.w)
                    else {
                        continue;
                    };
                    let varyings = a.varyings * corrected.x
                        + b.varyings * corrected.y
                        + c.varyings * corrected.z;

                    let frag = FragCoord {
                        x: p.x,
                        y: p.y,
                        z: depth,
                        front_facing: front,
                    };
                    let cpx = color_row.as_deref_mut().map(|r| &mut r[x]);
                    let dpx = depth_row.as_deref_mut().map(|r| &mut r[x]);
                    self.shade(cpx, dpx, frag, &varyings);
                }
            });
    }

    /// Per-fragment operations: depth test, fragment stage, depth write, blend.
    #[inline]
    fn shade(
        &self,
        color: Option<&mut [u8; 4]>,
        depth: Option<&mut f32>,
        frag: FragCoord,
        varyings: &Varyings,
    ) {
        let testing = self.depth_test != DepthTest::Off;

        // Early depth test unless the kernel replaces the depth.
        if testing && !self.writes_depth {
            if let Some(stored) = depth.as_deref() {
                if !self.depth_test.passes(frag.z, *stored) {
                    return;
                }
            }
        }

        let Some(out) = self.kernel.fragment(self.ctx, varyings, &frag) else {
            return;
        };
        let z = out.depth.unwrap_or(frag.z);

        if testing {
            if let Some(stored) = depth {
                if self.writes_depth && !self.depth_test.passes(z, *stored) {
                    return;
                }
                *stored = z;
            }
        }

        if let Some(dst) = color {
            *dst = blend(self.blend, out.color, *dst);
        }
    }
}

/// Combines a fragment colour with the stored texel.
pub fn blend(mode: BlendMode, src: Vector4<f32>, dst: [u8; 4]) -> [u8; 4] {
    let src = src.map(|c| c.clamp(0.0, 1.0));
    let dst = unpack(dst);
    let out = match mode {
        BlendMode::Off => src,
        BlendMode::Additive => src + dst,
        BlendMode::AlphaOver => {
            let a = src.w;
            let rgb = src.xyz() * a + dst.xyz() * (1.0 - a);
            Vector4::new(rgb.x, rgb.y, rgb.z, a + dst.w * (1.0 - a))
        }
        BlendMode::Subtract => dst - src,
    };
    pack(out)
}

/// Clips a polygon against a specific plane.
///
/// - `input`: Source vertices.
/// - `output`: Destination buffer (will be cleared before writing).
/// - `axis`: 0 (X), 1 (Y), or 2 (Z).
/// - `sign`: +1.0 or -1.0.
fn clip_polygon_against_plane(
    input: &[ClipVertex],
    output: &mut Vec<ClipVertex>,
    axis: usize,
    sign: f32,
) {
    output.clear();

    let Some(&last) = input.last() else {
        return;
    };

    let mut prev = last;
    let is_inside = |p: &Vector4<f32>| sign * p[axis] <= p.w + 1e-6;
    let mut prev_inside = is_inside(&prev.0);

    for curr in input {
        let curr_inside = is_inside(&curr.0);

        if curr_inside {
            if !prev_inside {
                // OUT -> IN: Intersection point + Current point
                if let Some(inter) = intersect_edge_plane(&prev, curr, axis, sign) {
                    output.push(inter);
                }
            }
            output.push(*curr);
        } else if prev_inside {
            // IN -> OUT: Intersection point only
            if let Some(inter) = intersect_edge_plane(&prev, curr, axis, sign) {
                output.push(inter);
            }
        }

        prev = *curr;
        prev_inside = curr_inside;
    }
}

/// Signed distance of the segment ends to a clip plane, positive inside.
#[inline(always)]
fn plane_distance(p: &Vector4<f32>, axis: usize, sign: f32) -> f32 {
    p.w - sign * p[axis]
}

/// Computes the intersection of a line segment and a clip plane.
/// Linearly interpolates both Position and Varying attributes.
#[inline(always)]
fn intersect_edge_plane(
    a: &ClipVertex,
    b: &ClipVertex,
    axis: usize,
    sign: f32,
) -> Option<ClipVertex> {
    let da = plane_distance(&a.0, axis, sign);
    let db = plane_distance(&b.0, axis, sign);
    let denom = da - db;
    if denom.abs() < 1e-9 {
        return None;
    }
    let t = da / denom;
    if !t.is_finite() {
        return None;
    }
    Some(lerp_vertex(a, b, t))
}

#[inline(always)]
fn lerp_vertex(a: &ClipVertex, b: &ClipVertex, t: f32) -> ClipVertex {
    (a.0 + (b.0 - a.0) * t, a.1 * (1.0 - t) + b.1 * t)
}

/// Parametric clip of a segment against all six planes.
fn clip_segment(a: &ClipVertex, b: &ClipVertex) -> Option<(ClipVertex, ClipVertex)> {
    let mut t0 = 0.0f32;
    let mut t1 = 1.0f32;
    for &(axis, sign) in &CLIP_PLANES {
        let da = plane_distance(&a.0, axis, sign);
        let db = plane_distance(&b.0, axis, sign);
        if da < 0.0 && db < 0.0 {
            return None;
        }
        if da < 0.0 {
            t0 = t0.max(da / (da - db));
        } else if db < 0.0 {
            t1 = t1.min(da / (da - db));
        }
    }
    if t0 > t1 {
        return None;
    }
    Some((lerp_vertex(a, b, t0), lerp_vertex(a, b, t1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::program::{
        Defines, FragmentOutput, ShaderInterface, TextureSampler, UniformValue,
    };
    use crate::core::device::TextureId;
    use nalgebra::Vector2;

    struct Flat;

    impl ShaderKernel for Flat {
        fn interface(&self) -> ShaderInterface {
            ShaderInterface {
                inputs: &["position"],
                uniforms: &[],
                outputs: &["color"],
                defines: &[],
                writes_depth: false,
                geometry_stage: false,
            }
        }

        fn vertex(&self, _: &ShaderContext, inputs: &[Vector4<f32>]) -> (Vector4<f32>, Varyings) {
            (inputs[0], Varyings::default())
        }

        fn fragment(&self, _: &ShaderContext, _: &Varyings, _: &FragCoord) -> Option<FragmentOutput> {
            Some(FragmentOutput::color(Vector4::new(0.25, 0.25, 0.25, 1.0)))
        }
    }

    struct NoTextures;

    impl TextureSampler for NoTextures {
        fn sample_2d(&self, _: TextureId, _: Vector2<f32>) -> Vector4<f32> {
            Vector4::zeros()
        }
        fn sample_cube(&self, _: TextureId, _: Vector3<f32>) -> Vector4<f32> {
            Vector4::zeros()
        }
    }

    fn vertex(x: f32, y: f32) -> ClipVertex {
        (Vector4::new(x, y, 0.0, 1.0), Varyings::default())
    }

    fn run(blend: BlendMode, cull: CullMode, tris: &[[ClipVertex; 3]]) -> Vec<[u8; 4]> {
        let uniforms: Vec<Option<UniformValue>> = Vec::new();
        let defines = Defines::default();
        let ctx = ShaderContext::new(&uniforms, &NoTextures, &defines);
        let raster = Rasterizer {
            cull_mode: cull,
            raster_mode: RasterMode::Fill,
            depth_test: DepthTest::Off,
            blend,
            viewport: (8, 8),
            kernel: &Flat,
            ctx: &ctx,
            writes_depth: false,
        };
        let mut color = vec![[0u8; 4]; 64];
        let mut target = RenderTarget {
            width: 8,
            height: 8,
            color: Some(color.as_mut_slice()),
            depth: None,
        };
        for tri in tris {
            raster.draw_triangle(&mut target, [&tri[0], &tri[1], &tri[2]]);
        }
        color
    }

    #[test]
    fn quad_covers_every_pixel_exactly_once() {
        let quad = [
            [vertex(-1.0, -1.0), vertex(1.0, -1.0), vertex(1.0, 1.0)],
            [vertex(-1.0, -1.0), vertex(1.0, 1.0), vertex(-1.0, 1.0)],
        ];
        let color = run(BlendMode::Additive, CullMode::Back, &quad);
        assert!(color.iter().all(|t| t[0] == 64));
    }

    #[test]
    fn clockwise_triangle_is_back_facing() {
        let tri = [[vertex(-1.0, -1.0), vertex(1.0, 1.0), vertex(1.0, -1.0)]];
        let culled = run(BlendMode::Off, CullMode::Back, &tri);
        assert!(culled.iter().all(|t| t[0] == 0));
        let kept = run(BlendMode::Off, CullMode::Front, &tri);
        assert!(kept.iter().any(|t| t[0] == 64));
    }

    #[test]
    fn triangle_behind_near_plane_is_clipped_away() {
        let behind = |x: f32, y: f32| (Vector4::new(x, y, -2.0, 1.0), Varyings::default());
        let tri = [[behind(0.0, 0.0), behind(1.0, 0.0), behind(0.0, 1.0)]];
        let color = run(BlendMode::Off, CullMode::Off, &tri);
        assert!(color.iter().all(|t| t[0] == 0));
    }

    #[test]
    fn blend_modes() {
        let src = Vector4::new(0.5, 0.5, 0.5, 0.5);
        assert_eq!(blend(BlendMode::Additive, src, [128, 0, 255, 0])[..3], [255, 128, 255]);
        assert_eq!(blend(BlendMode::AlphaOver, src, [0, 0, 0, 255])[0], 64);
        assert_eq!(blend(BlendMode::Subtract, src, [255, 0, 0, 255])[..2], [128, 0]);
    }
}
