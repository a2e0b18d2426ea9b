use crate::core::buffer::Buffer;
use crate::core::device::{BlendMode, CullMode, DepthTest, FramebufferId};
use crate::core::gpu::Gpu;
use crate::core::program::{Input, Program, ProgramDesc, Uniform};
use crate::core::state::RenderState;
use crate::pipeline::cache::ResourceCache;
use crate::pipeline::shaders::skybox::SkyboxKernel;
use crate::scene::Skybox;
use crate::scene::camera::Viewpoint;
use nalgebra::{Matrix4, Vector3};
use std::sync::Arc;

#[rustfmt::skip]
const CORNERS: [[f32; 3]; 8] = [
    [-1.0, -1.0, -1.0], [ 1.0, -1.0, -1.0], [ 1.0,  1.0, -1.0], [-1.0,  1.0, -1.0],
    [-1.0, -1.0,  1.0], [ 1.0, -1.0,  1.0], [ 1.0,  1.0,  1.0], [-1.0,  1.0,  1.0],
];

/// 36 indices; the cube is drawn without culling.
#[rustfmt::skip]
const INDICES: [u32; 36] = [
    0, 2, 1,  0, 3, 2, // -Z
    4, 5, 6,  4, 6, 7, // +Z
    0, 4, 7,  0, 7, 3, // -X
    1, 2, 6,  1, 6, 5, // +X
    0, 1, 5,  0, 5, 4, // -Y
    3, 7, 6,  3, 6, 2, // +Y
];

/// Draws the environment cube around the camera.
pub struct SkyboxRenderer {
    program: Program,
    view: Uniform,
    projection: Uniform,
    skybox: Uniform,
    position: Input,
    vertices: Buffer,
    indices: Buffer,
}

impl SkyboxRenderer {
    pub fn new(gpu: &mut Gpu) -> Result<Self, String> {
        let program = Program::new(gpu, ProgramDesc::new("skybox", Arc::new(SkyboxKernel)))?;
        let mut vertices = Buffer::new(gpu);
        vertices.set_data(gpu, &CORNERS);
        let mut indices = Buffer::new(gpu);
        indices.set_data(gpu, &INDICES);
        Ok(Self {
            view: program.uniform("view"),
            projection: program.uniform("projection"),
            skybox: program.uniform("skybox"),
            position: program.input("position"),
            program,
            vertices,
            indices,
        })
    }

    pub fn render(
        &mut self,
        gpu: &mut Gpu,
        cache: &mut ResourceCache,
        skybox: &Skybox,
        camera: &dyn Viewpoint,
        target: FramebufferId,
    ) -> Result<(), String> {
        let cube = cache.skybox(gpu, skybox)?;
        self.program.set_uniform(gpu, self.view, rotation_only(&camera.view_matrix()));
        self.program
            .set_uniform(gpu, self.projection, camera.projection_matrix());
        self.program.set_uniform(gpu, self.skybox, &cube);
        self.program
            .bind_input(gpu, self.position, &self.vertices, 3, 12, 0);
        self.program.bind_indices(gpu, Some(&self.indices));

        let state = RenderState {
            framebuffer: target,
            depth: DepthTest::Off,
            blend: BlendMode::Off,
            cull: CullMode::Off,
            ..RenderState::new()
        };
        state.render(gpu, &self.program, INDICES.len());
        Ok(())
    }
}

/// `view` with its translation removed, so the sky follows the camera.
pub fn rotation_only(view: &Matrix4<f32>) -> Matrix4<f32> {
    let mut m = *view;
    m.fixed_view_mut::<3, 1>(0, 3).copy_from(&Vector3::zeros());
    m
}
