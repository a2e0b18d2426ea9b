use crate::core::buffer::Buffer;
use crate::core::device::{BlendMode, CullMode, DepthTest, FramebufferId};
use crate::core::gpu::Gpu;
use crate::core::program::{Input, Program, ProgramDesc, Uniform};
use crate::core::state::RenderState;
use crate::core::texture::Texture2D;
use crate::pipeline::shaders::quad::QuadKernel;
use std::sync::Arc;

/// Two triangles covering NDC (-1, -1) to (1, 1), counter-clockwise.
#[rustfmt::skip]
pub const SCREEN_QUAD: [[f32; 2]; 6] = [
    [-1.0, -1.0], [1.0, -1.0], [1.0, 1.0],
    [-1.0, -1.0], [1.0, 1.0], [-1.0, 1.0],
];

/// Uploads [`SCREEN_QUAD`] into a new buffer.
pub fn screen_quad_buffer(gpu: &mut Gpu) -> Buffer {
    let mut buffer = Buffer::new(gpu);
    buffer.set_data(gpu, &SCREEN_QUAD);
    buffer
}

/// State for full-screen passes: no depth, no culling.
pub fn screen_state(target: FramebufferId, blend: BlendMode) -> RenderState {
    RenderState {
        framebuffer: target,
        depth: DepthTest::Off,
        blend,
        cull: CullMode::Off,
        ..RenderState::new()
    }
}

/// Copies a texture onto a framebuffer.
pub struct QuadRenderer {
    program: Program,
    image: Uniform,
    position: Input,
    vertices: Buffer,
}

impl QuadRenderer {
    pub fn new(gpu: &mut Gpu) -> Result<Self, String> {
        let program = Program::new(gpu, ProgramDesc::new("quad", Arc::new(QuadKernel)))?;
        Ok(Self {
            image: program.uniform("image"),
            position: program.input("position"),
            vertices: screen_quad_buffer(gpu),
            program,
        })
    }

    pub fn blit(&mut self, gpu: &mut Gpu, texture: &Texture2D, target: FramebufferId, blend: BlendMode) {
        self.program.set_uniform(gpu, self.image, texture);
        self.program
            .bind_input(gpu, self.position, &self.vertices, 2, 8, 0);
        self.program.bind_indices(gpu, None);
        screen_state(target, blend).render(gpu, &self.program, SCREEN_QUAD.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::device::{Filter, TextureFormat, Wrap};
    use crate::core::framebuffer::Framebuffer;
    use crate::scene::image::Image;

    #[test]
    fn blit_copies_texels() {
        let mut gpu = Gpu::software(2, 2);
        // Top row red, bottom row blue.
        let image = Image::from_rgba(
            2,
            2,
            vec![
                255, 0, 0, 255, 255, 0, 0, 255, //
                0, 0, 255, 255, 0, 0, 255, 255,
            ],
        )
        .unwrap();
        let texture = Texture2D::load(&mut gpu, TextureFormat::Rgba8, Filter::Nearest, Wrap::EdgeClamp, &image);
        let mut quad = QuadRenderer::new(&mut gpu).unwrap();
        quad.blit(&mut gpu, &texture, FramebufferId::DEFAULT, BlendMode::Off);

        let out = Framebuffer::default_framebuffer().read_image(&gpu).unwrap();
        assert_eq!(out.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(out.get_pixel(1, 1).0, [0, 0, 255, 255]);
        assert_eq!(gpu.stats.draw_calls, 1);
        assert_eq!(gpu.stats.vertices, 6);
    }
}
