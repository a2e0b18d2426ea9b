pub mod arrow;
pub mod cache;
pub mod effects;
pub mod font;
pub mod mesh_renderer;
pub mod quad;
pub mod renderer;
pub mod shaders;
pub mod shadow_renderer;
pub mod skybox;
pub mod text;
