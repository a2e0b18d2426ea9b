use crate::core::device::{
    BlendMode, CullMode, DepthTest, DrawCommand, FramebufferId, Primitive, RasterMode,
};
use crate::core::gpu::Gpu;
use crate::core::program::Program;

/// Pipeline state object: everything bound for a draw besides the program's
/// own uniforms and vertex inputs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderState {
    pub framebuffer: FramebufferId,
    pub depth: DepthTest,
    pub blend: BlendMode,
    pub cull: CullMode,
    pub raster: RasterMode,
    pub viewport: Option<(usize, usize)>,
    pub primitive: Primitive,
}

impl Default for RenderState {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderState {
    pub fn new() -> Self {
        Self {
            framebuffer: FramebufferId::DEFAULT,
            depth: DepthTest::Less,
            blend: BlendMode::Off,
            cull: CullMode::Back,
            raster: RasterMode::Fill,
            viewport: None,
            primitive: Primitive::Triangles,
        }
    }

    /// Applies the state and draws `count` vertices with `program`: indexed when
    /// the program has an index buffer bound, otherwise as an array.
    pub fn render(&self, gpu: &mut Gpu, program: &Program, count: usize) {
        let command = DrawCommand {
            program: program.id(),
            framebuffer: self.framebuffer,
            depth: self.depth,
            blend: self.blend,
            cull: self.cull,
            raster: self.raster,
            viewport: self.viewport,
            primitive: self.primitive,
            count,
            indexed: program.has_index_buffer(),
        };
        gpu.device_mut().draw(&command);
        gpu.stats.record_draw(count);
    }
}
