//! The program catalogue: one native kernel per pass.

pub mod arrow;
pub mod effects;
pub mod mesh;
pub mod quad;
pub mod shadow;
pub mod skybox;
pub mod text;
