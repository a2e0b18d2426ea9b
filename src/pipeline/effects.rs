//! Post-processing passes over the scene colour buffer.

use crate::core::buffer::Buffer;
use crate::core::device::{BlendMode, FramebufferId};
use crate::core::framebuffer::Framebuffer;
use crate::core::gpu::Gpu;
use crate::core::program::{Input, Program, ProgramDesc, Uniform};
use crate::core::texture::Texture2D;
use crate::pipeline::quad::{SCREEN_QUAD, screen_quad_buffer, screen_state};
use crate::pipeline::shaders::effects::{BlurKernel, FogKernel, MAX_BLUR_RADIUS, gaussian_weights};
use crate::scene::camera::{Camera, Viewpoint};
use log::trace;
use nalgebra::{Matrix4, Vector3, Vector4};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FogSettings {
    pub color: [f32; 3],
    pub density: f32,
}

impl Default for FogSettings {
    fn default() -> Self {
        Self {
            color: [0.6, 0.65, 0.7],
            density: 1.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlurSettings {
    /// Taps on each side of the centre, at most [`MAX_BLUR_RADIUS`].
    pub radius: usize,
    pub sigma: f32,
}

impl Default for BlurSettings {
    fn default() -> Self {
        Self {
            radius: 3,
            sigma: 1.5,
        }
    }
}

/// Blends a fog colour over the scene by reconstructed view depth.
pub struct FogEffect {
    program: Program,
    depth: Uniform,
    inverse_projection: Uniform,
    far: Uniform,
    fog_color: Uniform,
    density: Uniform,
    position: Input,
    vertices: Buffer,
}

impl FogEffect {
    pub fn new(gpu: &mut Gpu) -> Result<Self, String> {
        let program = Program::new(gpu, ProgramDesc::new("fog", Arc::new(FogKernel)))?;
        Ok(Self {
            depth: program.uniform("depth"),
            inverse_projection: program.uniform("inverse_projection"),
            far: program.uniform("far"),
            fog_color: program.uniform("fog_color"),
            density: program.uniform("density"),
            position: program.input("position"),
            vertices: screen_quad_buffer(gpu),
            program,
        })
    }

    /// Draws fog into `target`, reading `depth` rendered through `camera`.
    pub fn apply(
        &mut self,
        gpu: &mut Gpu,
        depth: &Texture2D,
        camera: &Camera,
        target: FramebufferId,
        settings: &FogSettings,
    ) {
        let inverse = camera
            .projection_matrix()
            .try_inverse()
            .unwrap_or_else(Matrix4::identity);
        self.program.set_uniform(gpu, self.depth, depth);
        self.program.set_uniform(gpu, self.inverse_projection, inverse);
        self.program.set_uniform(gpu, self.far, camera.far());
        self.program
            .set_uniform(gpu, self.fog_color, Vector3::from(settings.color));
        self.program.set_uniform(gpu, self.density, settings.density);
        self.program
            .bind_input(gpu, self.position, &self.vertices, 2, 8, 0);
        self.program.bind_indices(gpu, None);
        screen_state(target, BlendMode::AlphaOver).render(gpu, &self.program, SCREEN_QUAD.len());
    }
}

/// Separable Gaussian blur that ping-pongs through a swap framebuffer.
pub struct BlurEffect {
    program: Program,
    image: Uniform,
    step: Uniform,
    radius: Uniform,
    weights_lo: Uniform,
    weights_hi: Uniform,
    position: Input,
    vertices: Buffer,
}

impl BlurEffect {
    pub fn new(gpu: &mut Gpu) -> Result<Self, String> {
        let program = Program::new(gpu, ProgramDesc::new("blur", Arc::new(BlurKernel)))?;
        Ok(Self {
            image: program.uniform("image"),
            step: program.uniform("step"),
            radius: program.uniform("radius"),
            weights_lo: program.uniform("weights_lo"),
            weights_hi: program.uniform("weights_hi"),
            position: program.input("position"),
            vertices: screen_quad_buffer(gpu),
            program,
        })
    }

    /// Blurs `color` in place: horizontally into `swap_texture` (the colour
    /// attachment of `swap`), then vertically back into `target`.
    pub fn apply(
        &mut self,
        gpu: &mut Gpu,
        color: &Texture2D,
        swap: &Framebuffer,
        swap_texture: &Texture2D,
        target: FramebufferId,
        settings: &BlurSettings,
    ) {
        let radius = settings.radius.min(MAX_BLUR_RADIUS);
        let w = gaussian_weights(radius, settings.sigma);
        self.program.set_uniform(gpu, self.radius, radius as i32);
        self.program
            .set_uniform(gpu, self.weights_lo, Vector4::new(w[0], w[1], w[2], w[3]));
        self.program
            .set_uniform(gpu, self.weights_hi, Vector4::new(w[4], w[5], w[6], w[7]));
        self.program
            .bind_input(gpu, self.position, &self.vertices, 2, 8, 0);
        self.program.bind_indices(gpu, None);

        let horizontal = Vector3::new(1.0 / color.width as f32, 0.0, 0.0);
        self.pass(gpu, color, horizontal, swap.id);
        let vertical = Vector3::new(0.0, 1.0 / swap_texture.height as f32, 0.0);
        self.pass(gpu, swap_texture, vertical, target);
        trace!("Blurred {}x{} with radius {}", color.width, color.height, radius);
    }

    fn pass(&mut self, gpu: &mut Gpu, source: &Texture2D, step: Vector3<f32>, target: FramebufferId) {
        self.program.set_uniform(gpu, self.image, source);
        self.program.set_uniform(gpu, self.step, step);
        screen_state(target, BlendMode::Off).render(gpu, &self.program, SCREEN_QUAD.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::{Filter, TextureFormat, Wrap};
    use crate::pipeline::quad::QuadRenderer;
    use crate::scene::image::Image;
    use nalgebra::Point3;

    fn target(gpu: &mut Gpu, w: usize, h: usize) -> (Framebuffer, Texture2D) {
        let texture = Texture2D::new(gpu, TextureFormat::Rgba8, Filter::Nearest, Wrap::EdgeClamp, w, h);
        let mut fb = Framebuffer::new(gpu);
        fb.attach_color(gpu, texture.attachment());
        (fb, texture)
    }

    #[test]
    fn blur_spreads_a_single_bright_texel() {
        let mut gpu = Gpu::software(8, 8);
        let (scene, color) = target(&mut gpu, 8, 8);
        let (swap, swap_texture) = target(&mut gpu, 8, 8);

        let mut pixels = vec![0u8; 8 * 8 * 4];
        for px in pixels.chunks_exact_mut(4) {
            px[3] = 255;
        }
        let centre = (4 * 8 + 4) * 4;
        pixels[centre..centre + 3].copy_from_slice(&[255, 255, 255]);
        let dot = Image::from_rgba(8, 8, pixels).unwrap();
        let source = Texture2D::load(&mut gpu, TextureFormat::Rgba8, Filter::Nearest, Wrap::EdgeClamp, &dot);
        QuadRenderer::new(&mut gpu)
            .unwrap()
            .blit(&mut gpu, &source, scene.id, BlendMode::Off);

        let settings = BlurSettings { radius: 2, sigma: 1.0 };
        BlurEffect::new(&mut gpu)
            .unwrap()
            .apply(&mut gpu, &color, &swap, &swap_texture, scene.id, &settings);

        let out = scene.read_image(&gpu).unwrap();
        let middle = out.get_pixel(4, 4).0[0];
        let beside = out.get_pixel(5, 4).0[0];
        let diagonal = out.get_pixel(5, 5).0[0];
        assert!(middle < 255 && middle > beside);
        assert!(beside > diagonal && diagonal > 0);
        assert_eq!(out.get_pixel(0, 0).0[0], 0);
        assert_eq!(gpu.stats.draw_calls, 3);
    }

    #[test]
    fn fog_thickens_with_distance() {
        let mut gpu = Gpu::software(4, 4);
        let (scene, _) = target(&mut gpu, 4, 4);
        let depth = Texture2D::new(&mut gpu, TextureFormat::Depth16, Filter::Nearest, Wrap::EdgeClamp, 4, 4);
        let mut depth_fb = Framebuffer::new(&mut gpu);
        depth_fb.attach_depth(&mut gpu, depth.attachment());
        scene.clear_color(&mut gpu, [0.0, 0.0, 0.0, 1.0]);

        let camera = Camera::new_perspective(
            Point3::origin(),
            Point3::new(0.0, 0.0, -1.0),
            Vector3::y(),
            1.0,
            1.0,
            0.1,
            10.0,
        );
        let settings = FogSettings {
            color: [1.0, 1.0, 1.0],
            density: 2.0,
        };
        let mut fog = FogEffect::new(&mut gpu).unwrap();

        depth_fb.clear_depth(&mut gpu, 1.0);
        fog.apply(&mut gpu, &depth, &camera, scene.id, &settings);
        let far = scene.read_image(&gpu).unwrap().get_pixel(1, 1).0[0];

        scene.clear_color(&mut gpu, [0.0, 0.0, 0.0, 1.0]);
        depth_fb.clear_depth(&mut gpu, 0.0);
        fog.apply(&mut gpu, &depth, &camera, scene.id, &settings);
        let near = scene.read_image(&gpu).unwrap().get_pixel(1, 1).0[0];

        // Depth 1 lies on the far plane: 1 - exp(-2).
        let expected = ((1.0 - (-2.0f32).exp()) * 255.0).round() as u8;
        assert!(far.abs_diff(expected) <= 1);
        assert!(near < 10);
    }
}
