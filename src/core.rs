pub mod buffer;
pub mod device;
pub mod framebuffer;
pub mod gpu;
pub mod program;
pub mod rasterizer;
pub mod sampler;
pub mod software;
pub mod state;
pub mod stats;
pub mod texture;
pub mod tracing;
