use crate::core::buffer::Buffer;
use crate::core::device::{BlendMode, Filter, FramebufferId, TextureFormat, Wrap};
use crate::core::gpu::Gpu;
use crate::core::program::{Input, Program, ProgramDesc, Uniform};
use crate::core::texture::Texture2D;
use crate::pipeline::font::{self, CELL_HEIGHT, CELL_WIDTH};
use crate::pipeline::quad::screen_state;
use crate::pipeline::shaders::text::TextKernel;
use log::trace;
use nalgebra::{Vector3, Vector4};
use std::sync::Arc;

/// Tab stops are this many cells apart.
const TAB_CELLS: f32 = 4.0;

/// A string waiting to be drawn. Positions are pixels from the top-left.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub scale: f32,
    pub color: Vector4<f32>,
}

/// Glyph vertex: pixel position, atlas uv, rgba.
pub type TextVertex = [f32; 8];

const STRIDE: usize = std::mem::size_of::<TextVertex>();

/// Appends two triangles per glyph of `label`. `\n` starts a new line at the
/// label's x, `\t` advances four cells.
pub fn layout(label: &TextLabel, out: &mut Vec<TextVertex>) {
    let TextLabel { x, y, scale, color, .. } = *label;
    let (atlas_w, atlas_h) = font::atlas_size();
    let (cw, ch) = (CELL_WIDTH as f32 * scale, CELL_HEIGHT as f32 * scale);
    let (mut pen_x, mut pen_y) = (x, y);

    for c in label.text.chars() {
        match c {
            '\n' => {
                pen_x = x;
                pen_y += ch;
            }
            '\t' => pen_x += TAB_CELLS * cw,
            _ => {
                let (col, row) = font::atlas_cell(font::glyph_index(c));
                let u0 = (col * CELL_WIDTH) as f32 / atlas_w as f32;
                let u1 = ((col + 1) * CELL_WIDTH) as f32 / atlas_w as f32;
                // The atlas is stored bottom-up.
                let v0 = 1.0 - (row * CELL_HEIGHT) as f32 / atlas_h as f32;
                let v1 = 1.0 - ((row + 1) * CELL_HEIGHT) as f32 / atlas_h as f32;
                let (x0, y0, x1, y1) = (pen_x, pen_y, pen_x + cw, pen_y + ch);

                let vertex = |px: f32, py: f32, u: f32, v: f32| {
                    [px, py, u, v, color.x, color.y, color.z, color.w]
                };
                // Counter-clockwise once y is flipped to point up.
                out.extend_from_slice(&[
                    vertex(x0, y1, u0, v1),
                    vertex(x1, y1, u1, v1),
                    vertex(x1, y0, u1, v0),
                    vertex(x0, y1, u0, v1),
                    vertex(x1, y0, u1, v0),
                    vertex(x0, y0, u0, v0),
                ]);
                pen_x += cw;
            }
        }
    }
}

/// Screen-space text through the built-in font atlas.
pub struct TextRenderer {
    program: Program,
    resolution: Uniform,
    font: Uniform,
    position: Input,
    texcoord: Input,
    color: Input,
    atlas: Texture2D,
    vertices: Buffer,
    scratch: Vec<TextVertex>,
    queue: Vec<TextLabel>,
}

impl TextRenderer {
    pub fn new(gpu: &mut Gpu) -> Result<Self, String> {
        let program = Program::new(gpu, ProgramDesc::new("text", Arc::new(TextKernel)))?;
        let atlas = Texture2D::load(
            gpu,
            TextureFormat::Rgba8,
            Filter::Nearest,
            Wrap::EdgeClamp,
            &font::atlas_image(),
        );
        Ok(Self {
            resolution: program.uniform("resolution"),
            font: program.uniform("font"),
            position: program.input("position"),
            texcoord: program.input("texcoord"),
            color: program.input("color"),
            program,
            atlas,
            vertices: Buffer::new(gpu),
            scratch: Vec::new(),
            queue: Vec::new(),
        })
    }

    pub fn queue(&mut self, text: impl Into<String>, x: f32, y: f32, scale: f32, color: Vector4<f32>) {
        self.queue.push(TextLabel {
            text: text.into(),
            x,
            y,
            scale,
            color,
        });
    }

    pub fn queued(&self) -> &[TextLabel] {
        &self.queue
    }

    /// Draws every queued label into `target` (`width` x `height` pixels)
    /// in a single draw and empties the queue.
    pub fn render(&mut self, gpu: &mut Gpu, target: FramebufferId, width: usize, height: usize) {
        self.scratch.clear();
        for label in self.queue.drain(..) {
            layout(&label, &mut self.scratch);
        }
        if self.scratch.is_empty() {
            return;
        }

        let resolution = Vector3::new(width as f32, height as f32, 0.0);
        self.vertices.set_data(gpu, &self.scratch);
        self.program.set_uniform(gpu, self.resolution, resolution);
        self.program.set_uniform(gpu, self.font, &self.atlas);
        self.program
            .bind_input(gpu, self.position, &self.vertices, 2, STRIDE, 0);
        self.program
            .bind_input(gpu, self.texcoord, &self.vertices, 2, STRIDE, 8);
        self.program
            .bind_input(gpu, self.color, &self.vertices, 4, STRIDE, 16);
        self.program.bind_indices(gpu, None);
        screen_state(target, BlendMode::AlphaOver).render(gpu, &self.program, self.scratch.len());
        trace!("Drew {} glyph vertices", self.scratch.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::framebuffer::Framebuffer;

    #[test]
    fn layout_handles_newline_and_tab() {
        let label = TextLabel {
            text: "ab\n\tc".into(),
            x: 10.0,
            y: 20.0,
            scale: 1.0,
            color: Vector4::new(1.0, 0.0, 0.0, 1.0),
        };
        let mut out = Vec::new();
        layout(&label, &mut out);
        assert_eq!(out.len(), 18);
        // Top-left corner of each glyph is its sixth vertex.
        assert_eq!(&out[5][..2], &[10.0, 20.0]);
        assert_eq!(&out[11][..2], &[17.0, 20.0]);
        assert_eq!(&out[17][..2], &[10.0 + 4.0 * 7.0, 33.0]);
        assert_eq!(&out[0][4..], &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn labels_share_one_draw() {
        let mut gpu = Gpu::software(32, 16);
        let fb = Framebuffer::default_framebuffer();
        fb.clear_color(&mut gpu, [0.0, 0.0, 0.0, 0.0]);
        let mut text = TextRenderer::new(&mut gpu).unwrap();
        text.queue("|", 0.0, 0.0, 1.0, Vector4::new(1.0, 1.0, 1.0, 1.0));
        text.queue("|", 14.0, 0.0, 1.0, Vector4::new(1.0, 0.0, 0.0, 1.0));
        text.render(&mut gpu, FramebufferId::DEFAULT, 32, 16);

        assert!(text.queued().is_empty());
        assert_eq!(gpu.stats.draw_calls, 1);
        let out = fb.read_image(&gpu).unwrap();
        // '|' is a vertical bar in column 3 of its cell, rows 3..10.
        assert_eq!(out.get_pixel(3, 5).0, [255, 255, 255, 255]);
        assert_eq!(out.get_pixel(0, 5).0[3], 0);
        assert_eq!(out.get_pixel(17, 5).0, [255, 0, 0, 255]);
    }
}
