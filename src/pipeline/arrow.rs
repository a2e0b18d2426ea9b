use crate::core::buffer::Buffer;
use crate::core::device::{BlendMode, CullMode, DepthTest, FramebufferId, Primitive};
use crate::core::gpu::Gpu;
use crate::core::program::{Input, Program, ProgramDesc, Uniform};
use crate::core::state::RenderState;
use crate::pipeline::mesh_renderer::MeshRenderer;
use crate::pipeline::shaders::arrow::ArrowKernel;
use crate::scene::Scene;
use crate::scene::camera::Viewpoint;
use crate::scene::geometry::Vertex;
use log::trace;
use nalgebra::{Matrix3, Vector3};
use std::sync::Arc;

/// Which vertex frame axis a batch of arrows shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrowKind {
    Tangent,
    Bitangent,
    Normal,
}

impl ArrowKind {
    pub const ALL: [ArrowKind; 3] = [ArrowKind::Tangent, ArrowKind::Bitangent, ArrowKind::Normal];

    pub fn color(self) -> Vector3<f32> {
        match self {
            ArrowKind::Tangent => Vector3::new(1.0, 0.0, 0.0),
            ArrowKind::Bitangent => Vector3::new(0.0, 1.0, 0.0),
            ArrowKind::Normal => Vector3::new(0.0, 0.0, 1.0),
        }
    }

    fn axis(self, v: &Vertex) -> Vector3<f32> {
        match self {
            ArrowKind::Tangent => v.tangent(),
            ArrowKind::Bitangent => v.bitangent(),
            ArrowKind::Normal => v.normal(),
        }
    }
}

/// Draws the tangent frame of every visible vertex as short line segments.
pub struct ArrowRenderer {
    program: Program,
    view_projection: Uniform,
    color: Uniform,
    position: Input,
    vertices: Buffer,
    scratch: Vec<[f32; 3]>,
    /// World-space length of each arrow.
    pub length: f32,
}

impl ArrowRenderer {
    pub fn new(gpu: &mut Gpu) -> Result<Self, String> {
        let program = Program::new(gpu, ProgramDesc::new("arrow", Arc::new(ArrowKernel)))?;
        Ok(Self {
            view_projection: program.uniform("view_projection"),
            color: program.uniform("color"),
            position: program.input("position"),
            program,
            vertices: Buffer::new(gpu),
            scratch: Vec::new(),
            length: 0.1,
        })
    }

    /// One line draw per arrow kind over the items `meshes` prepared this frame.
    pub fn render(
        &mut self,
        gpu: &mut Gpu,
        scene: &Scene,
        meshes: &MeshRenderer,
        camera: &dyn Viewpoint,
        target: FramebufferId,
    ) {
        let state = RenderState {
            framebuffer: target,
            depth: DepthTest::Off,
            blend: BlendMode::Off,
            cull: CullMode::Off,
            primitive: Primitive::Lines,
            ..RenderState::new()
        };
        let vp = camera.projection_matrix() * camera.view_matrix();
        self.program.set_uniform(gpu, self.view_projection, vp);
        self.program.bind_indices(gpu, None);

        for kind in ArrowKind::ALL {
            self.scratch.clear();
            for item in meshes.items() {
                let world = meshes.transform(item).world;
                let linear = world.fixed_view::<3, 3>(0, 0).into_owned();
                let normal = linear
                    .try_inverse()
                    .map(|m| m.transpose())
                    .unwrap_or_else(Matrix3::identity);
                let basis = if kind == ArrowKind::Normal { normal } else { linear };

                let geometry = &scene.meshes()[item.mesh].submeshes[item.submesh].geometry;
                for v in geometry.verts() {
                    let from = world.transform_point(&v.position());
                    let dir = basis * kind.axis(v);
                    let Some(dir) = dir.try_normalize(f32::EPSILON) else {
                        continue;
                    };
                    let to = from + dir * self.length;
                    self.scratch.push([from.x, from.y, from.z]);
                    self.scratch.push([to.x, to.y, to.z]);
                }
            }
            if self.scratch.is_empty() {
                continue;
            }

            self.vertices.set_data(gpu, &self.scratch);
            self.program.set_uniform(gpu, self.color, kind.color());
            self.program
                .bind_input(gpu, self.position, &self.vertices, 3, 12, 0);
            state.render(gpu, &self.program, self.scratch.len());
            trace!("{:?} arrows: {}", kind, self.scratch.len() / 2);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::framebuffer::Framebuffer;
    use crate::pipeline::shadow_renderer::ShadowSettings;
    use crate::scene::camera::Camera;
    use crate::scene::material::Material;
    use crate::scene::mesh::{Mesh, plane};
    use nalgebra::Point3;

    #[test]
    fn one_line_draw_per_kind() {
        let mut gpu = Gpu::software(32, 32);
        let mut scene = Scene::new();
        scene.add_mesh(Mesh::single("floor", plane(2.0, 2.0), Material::new("floor")));
        let camera = Camera::new_perspective(
            Point3::new(0.0, 1.0, 3.0),
            Point3::origin(),
            Vector3::y(),
            std::f32::consts::FRAC_PI_2,
            1.0,
            0.1,
            10.0,
        );
        let mut meshes = MeshRenderer::new(&mut gpu, ShadowSettings::default()).unwrap();
        meshes.prepare(&scene, &camera);
        let verts = scene.meshes()[0].submeshes[0].geometry.verts().len() as u64;

        let fb = Framebuffer::default_framebuffer();
        fb.clear_color(&mut gpu, [0.0, 0.0, 0.0, 1.0]);
        let mut arrows = ArrowRenderer::new(&mut gpu).unwrap();
        arrows.length = 0.5;
        arrows.render(&mut gpu, &scene, &meshes, &camera, FramebufferId::DEFAULT);

        assert_eq!(gpu.stats.draw_calls, 3);
        assert_eq!(gpu.stats.vertices, 3 * 2 * verts);
        let out = fb.read_image(&gpu).unwrap();
        assert!(out.pixels().any(|p| p.0 == [0, 0, 255, 255]));
    }
}
