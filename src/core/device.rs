//! The abstract GPU interface the renderers are written against.
//!
//! Everything the scene renderer needs from a graphics driver goes through
//! [`Device`]: byte buffers, immutable-storage textures (2D and cube),
//! framebuffers with one colour and one depth attachment, shader programs and a
//! single draw entry point that receives the full pipeline state.

use crate::core::program::{AttributeBinding, ProgramDesc, UniformValue};

/// Handle of a byte buffer (vertex or index data).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Handle of a 2D texture or cube map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Handle of a framebuffer. Handle 0 is the default framebuffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub u32);

impl FramebufferId {
    pub const DEFAULT: FramebufferId = FramebufferId(0);
}

/// Handle of a linked shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    /// 8-bit RGBA colour.
    Rgba8,
    /// Normalised depth in [0, 1].
    Depth16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wrap {
    Repeat,
    EdgeClamp,
    BorderClamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    Flat,
    /// Six layers ordered +X, -X, +Y, -Y, +Z, -Z.
    Cube,
}

impl TextureKind {
    pub fn layers(self) -> usize {
        match self {
            TextureKind::Flat => 1,
            TextureKind::Cube => 6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDesc {
    pub kind: TextureKind,
    pub format: TextureFormat,
    pub filter: Filter,
    pub wrap: Wrap,
    pub width: usize,
    pub height: usize,
}

/// A framebuffer attachment point: a whole 2D texture or one cube face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attachment {
    Texture(TextureId),
    CubeFace(TextureId, usize),
}

impl Attachment {
    pub fn texture(self) -> TextureId {
        match self {
            Attachment::Texture(id) | Attachment::CubeFace(id, _) => id,
        }
    }

    pub fn layer(self) -> usize {
        match self {
            Attachment::Texture(_) => 0,
            Attachment::CubeFace(_, face) => face,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DepthTest {
    Off,
    Less,
    LessEqual,
    Equal,
}

impl DepthTest {
    #[inline]
    pub fn passes(self, incoming: f32, stored: f32) -> bool {
        match self {
            DepthTest::Off => true,
            DepthTest::Less => incoming < stored,
            DepthTest::LessEqual => incoming <= stored,
            DepthTest::Equal => incoming == stored,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BlendMode {
    Off,
    /// src + dst
    Additive,
    /// src * src.a + dst * (1 - src.a)
    AlphaOver,
    /// dst - src
    Subtract,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CullMode {
    Off,
    Back,
    Front,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RasterMode {
    Fill,
    Line,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    Lines,
    TriangleFan,
}

/// Everything a single draw needs, bound in one go.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrawCommand {
    pub program: ProgramId,
    pub framebuffer: FramebufferId,
    pub depth: DepthTest,
    pub blend: BlendMode,
    pub cull: CullMode,
    pub raster: RasterMode,
    /// `None` covers the whole attachment.
    pub viewport: Option<(usize, usize)>,
    pub primitive: Primitive,
    pub count: usize,
    /// Fetch vertex indices from the program's index buffer.
    pub indexed: bool,
}

/// The driver contract. Handles are created on demand and never destroyed.
pub trait Device {
    fn name(&self) -> &str;

    fn create_buffer(&mut self) -> BufferId;
    /// (Re)allocates storage of `size` bytes; previous contents are discarded.
    fn allocate_buffer(&mut self, buffer: BufferId, size: usize);
    fn write_buffer(&mut self, buffer: BufferId, offset: usize, bytes: &[u8]);
    fn read_buffer(&self, buffer: BufferId) -> Vec<u8>;

    fn create_texture(&mut self, desc: TextureDesc) -> TextureId;
    fn set_border_color(&mut self, texture: TextureId, rgba: [f32; 4]);
    /// Uploads one full layer of RGBA8 rows, bottom row first.
    fn upload_texture(&mut self, texture: TextureId, layer: usize, rgba: &[u8]);
    fn texture_desc(&self, texture: TextureId) -> Option<TextureDesc>;

    fn create_framebuffer(&mut self) -> FramebufferId;
    fn attach_color(&mut self, framebuffer: FramebufferId, attachment: Option<Attachment>);
    fn attach_depth(&mut self, framebuffer: FramebufferId, attachment: Option<Attachment>);
    fn framebuffer_complete(&self, framebuffer: FramebufferId) -> bool;
    fn clear_color(&mut self, framebuffer: FramebufferId, rgba: [f32; 4]);
    fn clear_depth(&mut self, framebuffer: FramebufferId, depth: f32);
    /// Colour attachment as RGBA8 rows, bottom row first.
    fn read_pixels(&self, framebuffer: FramebufferId) -> Option<(usize, usize, Vec<u8>)>;
    /// Depth attachment values, bottom row first.
    fn read_depth(&self, framebuffer: FramebufferId) -> Option<(usize, usize, Vec<f32>)>;

    /// Compiles and links a program. `Err` carries the driver log.
    fn create_program(&mut self, desc: &ProgramDesc) -> Result<ProgramId, String>;
    fn set_uniform(&mut self, program: ProgramId, location: usize, value: UniformValue);
    fn bind_attribute(&mut self, program: ProgramId, location: usize, binding: AttributeBinding);
    fn bind_index_buffer(&mut self, program: ProgramId, buffer: Option<BufferId>);

    fn draw(&mut self, command: &DrawCommand);
}
