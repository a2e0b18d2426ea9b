use crate::core::device::{BlendMode, CullMode, DepthTest, FramebufferId, RasterMode};
use crate::core::gpu::Gpu;
use crate::core::program::{Input, Program, ProgramDesc, ShaderKernel, Uniform, UniformValue};
use crate::core::state::RenderState;
use crate::geometry::frustum::BoundingSphere;
use crate::geometry::transform::normal_matrix;
use crate::pipeline::cache::ResourceCache;
use crate::pipeline::shaders::mesh::{
    MeshAmbientKernel, MeshDirectionalLightKernel, MeshPointLightKernel, MeshSpotLightKernel,
    SHADOWS,
};
use crate::pipeline::shadow_renderer::{ShadowRenderer, ShadowSettings};
use crate::scene::Scene;
use crate::scene::camera::{Projection, Viewpoint};
use crate::scene::geometry::Vertex;
use crate::scene::image::Image;
use crate::scene::light::{DirectionalLight, Light, PointLight, SpotLight};
use crate::scene::mesh::SubMesh;
use log::{debug, trace};
use nalgebra::{Matrix4, Vector3};
use std::sync::Arc;

//=================================
// Mesh programs
//=================================

/// Every uniform any mesh-drawing kernel may declare, resolved once at link
/// time. Names a kernel lacks resolve to `Uniform(None)` and are skipped, so
/// the same binding code drives the shading and the shadow programs.
#[derive(Debug, Clone, Copy)]
struct MeshUniforms {
    world: Uniform,
    view: Uniform,
    projection: Uniform,
    normal_matrix: Uniform,
    ka: Uniform,
    kd: Uniform,
    ks: Uniform,
    ns: Uniform,
    opacity: Uniform,
    map_ka: Uniform,
    map_kd: Uniform,
    map_ks: Uniform,
    map_d: Uniform,
    map_bump: Uniform,
    ambient_light: Uniform,
    light_position: Uniform,
    light_direction: Uniform,
    light_diffuse: Uniform,
    light_specular: Uniform,
    attenuation: Uniform,
    shadow_far: Uniform,
    shadow_map: Uniform,
    shadow_bias: Uniform,
    shadow_view_projection: Uniform,
    cone_outer: Uniform,
    cone_inner: Uniform,
}

impl MeshUniforms {
    fn resolve(p: &Program) -> Self {
        Self {
            world: p.uniform("world"),
            view: p.uniform("view"),
            projection: p.uniform("projection"),
            normal_matrix: p.uniform("normal_matrix"),
            ka: p.uniform("Ka"),
            kd: p.uniform("Kd"),
            ks: p.uniform("Ks"),
            ns: p.uniform("Ns"),
            opacity: p.uniform("d"),
            map_ka: p.uniform("map_Ka"),
            map_kd: p.uniform("map_Kd"),
            map_ks: p.uniform("map_Ks"),
            map_d: p.uniform("map_d"),
            map_bump: p.uniform("map_bump"),
            ambient_light: p.uniform("ambient_light"),
            light_position: p.uniform("light_position"),
            light_direction: p.uniform("light_direction"),
            light_diffuse: p.uniform("light_diffuse"),
            light_specular: p.uniform("light_specular"),
            attenuation: p.uniform("attenuation"),
            shadow_far: p.uniform("shadow_far"),
            shadow_map: p.uniform("shadow_map"),
            shadow_bias: p.uniform("shadow_bias"),
            shadow_view_projection: p.uniform("shadow_view_projection"),
            cone_outer: p.uniform("cone_outer"),
            cone_inner: p.uniform("cone_inner"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct MeshInputs {
    position: Input,
    texcoord: Input,
    normal: Input,
    tangent: Input,
}

/// A program that draws submeshes, with its names resolved.
pub struct MeshProgram {
    program: Program,
    u: MeshUniforms,
    inputs: MeshInputs,
}

impl MeshProgram {
    pub fn new(gpu: &mut Gpu, desc: ProgramDesc) -> Result<Self, String> {
        let program = Program::new(gpu, desc)?;
        let u = MeshUniforms::resolve(&program);
        let inputs = MeshInputs {
            position: program.input("position"),
            texcoord: program.input("texcoord"),
            normal: program.input("normal"),
            tangent: program.input("tangent"),
        };
        Ok(Self { program, u, inputs })
    }

    pub fn name(&self) -> &str {
        self.program.name()
    }

    pub fn set_camera(&mut self, gpu: &mut Gpu, view: &Matrix4<f32>, projection: &Matrix4<f32>) {
        self.program.set_uniform(gpu, self.u.view, *view);
        self.program.set_uniform(gpu, self.u.projection, *projection);
    }

    pub fn set_ambient(&mut self, gpu: &mut Gpu, color: Vector3<f32>) {
        self.program.set_uniform(gpu, self.u.ambient_light, color);
    }

    pub fn set_point_light(&mut self, gpu: &mut Gpu, light: &PointLight, bias: f32) {
        let p = &mut self.program;
        p.set_uniform(gpu, self.u.light_position, light.position().coords);
        p.set_uniform(gpu, self.u.light_diffuse, light.diffuse);
        p.set_uniform(gpu, self.u.light_specular, light.specular);
        p.set_uniform(gpu, self.u.attenuation, light.attenuation);
        p.set_uniform(gpu, self.u.shadow_far, light.shadow_far);
        p.set_uniform(gpu, self.u.shadow_bias, bias);
    }

    pub fn set_spot_light(&mut self, gpu: &mut Gpu, light: &SpotLight, bias: f32) {
        let half_angle = match light.camera.projection {
            Projection::Perspective { fov_y_rad, .. } => fov_y_rad * 0.5,
            Projection::Orthographic { .. } => std::f32::consts::FRAC_PI_4,
        };
        let p = &mut self.program;
        p.set_uniform(gpu, self.u.light_position, light.position().coords);
        p.set_uniform(gpu, self.u.light_direction, light.direction());
        p.set_uniform(gpu, self.u.light_diffuse, light.diffuse);
        p.set_uniform(gpu, self.u.light_specular, light.specular);
        p.set_uniform(gpu, self.u.attenuation, light.attenuation);
        p.set_uniform(gpu, self.u.shadow_far, light.camera.far());
        p.set_uniform(gpu, self.u.shadow_view_projection, light.camera.view_projection());
        p.set_uniform(gpu, self.u.shadow_bias, bias);
        p.set_uniform(gpu, self.u.cone_outer, half_angle.cos());
        p.set_uniform(gpu, self.u.cone_inner, (half_angle * 0.8).cos());
    }

    pub fn set_directional_light(&mut self, gpu: &mut Gpu, light: &DirectionalLight, bias: f32) {
        let p = &mut self.program;
        p.set_uniform(gpu, self.u.light_direction, light.direction());
        p.set_uniform(gpu, self.u.light_diffuse, light.diffuse);
        p.set_uniform(gpu, self.u.light_specular, light.specular);
        p.set_uniform(gpu, self.u.shadow_view_projection, light.camera.view_projection());
        p.set_uniform(gpu, self.u.shadow_bias, bias);
    }

    /// Position and far distance for the distance-encoding shadow kernel.
    pub fn set_shadow_origin(&mut self, gpu: &mut Gpu, position: Vector3<f32>, far: f32) {
        self.program.set_uniform(gpu, self.u.light_position, position);
        self.program.set_uniform(gpu, self.u.shadow_far, far);
    }

    pub fn set_shadow_map(&mut self, gpu: &mut Gpu, map: impl Into<UniformValue>) {
        self.program.set_uniform(gpu, self.u.shadow_map, map);
    }

    fn set_map(
        &mut self,
        gpu: &mut Gpu,
        cache: &mut ResourceCache,
        uniform: Uniform,
        image: &Image,
    ) {
        if uniform.0.is_some() {
            let texture = cache.texture(gpu, image);
            self.program.set_uniform(gpu, uniform, &texture);
        }
    }

    /// Binds transforms, material and buffers of one submesh and draws it.
    pub fn draw(
        &mut self,
        gpu: &mut Gpu,
        cache: &mut ResourceCache,
        state: &RenderState,
        submesh: &SubMesh,
        world: &Matrix4<f32>,
        normal: &Matrix4<f32>,
    ) {
        let u = self.u;
        let material = submesh.material.as_ref();
        {
            let p = &mut self.program;
            p.set_uniform(gpu, u.world, *world);
            p.set_uniform(gpu, u.normal_matrix, *normal);
            p.set_uniform(gpu, u.ka, material.ambient);
            p.set_uniform(gpu, u.kd, material.diffuse);
            p.set_uniform(gpu, u.ks, material.specular);
            p.set_uniform(gpu, u.ns, material.shininess);
            p.set_uniform(gpu, u.opacity, material.opacity);
        }
        self.set_map(gpu, cache, u.map_ka, &material.ambient_map);
        self.set_map(gpu, cache, u.map_kd, &material.diffuse_map);
        self.set_map(gpu, cache, u.map_ks, &material.specular_map);
        self.set_map(gpu, cache, u.map_d, &material.alpha_map);
        self.set_map(gpu, cache, u.map_bump, &material.bump_map);

        let buffers = cache.geometry_buffers(gpu, &submesh.geometry);
        let p = &mut self.program;
        let inputs = [
            (self.inputs.position, 3, Vertex::POSITION_OFFSET),
            (self.inputs.texcoord, 2, Vertex::TEXCOORD_OFFSET),
            (self.inputs.normal, 3, Vertex::NORMAL_OFFSET),
            (self.inputs.tangent, 3, Vertex::TANGENT_OFFSET),
        ];
        for (input, components, offset) in inputs {
            p.bind_input(gpu, input, &buffers.vertices, components, Vertex::STRIDE, offset);
        }
        p.bind_indices(gpu, Some(&buffers.indices));
        state.render(gpu, p, buffers.index_count);
    }
}

//=================================
// Mesh renderer
//=================================

/// A submesh that survived culling this frame.
#[derive(Debug, Clone, Copy)]
pub struct DrawItem {
    pub mesh: usize,
    pub submesh: usize,
    /// Index into the per-frame transform list.
    pub transform: usize,
    /// World-space bounds, used for light interaction.
    pub sphere: BoundingSphere,
}

/// World and normal matrix of a mesh with at least one visible submesh.
#[derive(Debug, Clone, Copy)]
pub struct MeshTransform {
    pub world: Matrix4<f32>,
    pub normal: Matrix4<f32>,
}

/// Light programs without and with the `SHADOWS` define.
struct LightPrograms {
    plain: MeshProgram,
    shadowed: MeshProgram,
}

impl LightPrograms {
    fn new<K: ShaderKernel + 'static>(
        gpu: &mut Gpu,
        name: &str,
        kernel: K,
    ) -> Result<Self, String> {
        let kernel = Arc::new(kernel);
        Ok(Self {
            plain: MeshProgram::new(gpu, ProgramDesc::new(name, kernel.clone()))?,
            shadowed: MeshProgram::new(
                gpu,
                ProgramDesc::new(format!("{name}+shadows"), kernel).with_defines([SHADOWS]),
            )?,
        })
    }

    fn pick(&mut self, shadows: bool) -> &mut MeshProgram {
        if shadows { &mut self.shadowed } else { &mut self.plain }
    }
}

/// Forward renderer: an ambient pass that fills the depth buffer, then one
/// additive pass per light restricted to the stored depth.
pub struct MeshRenderer {
    ambient: MeshProgram,
    point: LightPrograms,
    spot: LightPrograms,
    directional: LightPrograms,
    shadows: ShadowRenderer,
    items: Vec<DrawItem>,
    transforms: Vec<MeshTransform>,
    pub wireframe: bool,
    /// Skip point-light passes for submeshes out of the light's range.
    pub light_culling: bool,
}

impl MeshRenderer {
    pub fn new(gpu: &mut Gpu, shadow_settings: ShadowSettings) -> Result<Self, String> {
        Ok(Self {
            ambient: MeshProgram::new(
                gpu,
                ProgramDesc::new("mesh-ambient", Arc::new(MeshAmbientKernel)),
            )?,
            point: LightPrograms::new(gpu, "mesh-point", MeshPointLightKernel)?,
            spot: LightPrograms::new(gpu, "mesh-spot", MeshSpotLightKernel)?,
            directional: LightPrograms::new(gpu, "mesh-directional", MeshDirectionalLightKernel)?,
            shadows: ShadowRenderer::new(gpu, shadow_settings)?,
            items: Vec::new(),
            transforms: Vec::new(),
            wireframe: false,
            light_culling: true,
        })
    }

    pub fn items(&self) -> &[DrawItem] {
        &self.items
    }

    pub fn transform(&self, item: &DrawItem) -> &MeshTransform {
        &self.transforms[item.transform]
    }

    pub fn shadows(&self) -> &ShadowRenderer {
        &self.shadows
    }

    pub fn shadows_mut(&mut self) -> &mut ShadowRenderer {
        &mut self.shadows
    }

    /// Rebuilds the draw-item list for `camera`. Normal matrices are only
    /// computed for meshes with a visible submesh.
    pub fn prepare(&mut self, scene: &Scene, camera: &dyn Viewpoint) {
        self.items.clear();
        self.transforms.clear();

        let view = camera.view_matrix();
        let frustum = camera.frustum();
        for (m, mesh) in scene.meshes().iter().enumerate() {
            let world = mesh.world_matrix();
            let mut slot = None;
            for (s, submesh) in mesh.submeshes.iter().enumerate() {
                let sphere = submesh.world_sphere(&world);
                if frustum.excludes_sphere(&sphere) {
                    continue;
                }
                let transform = *slot.get_or_insert_with(|| {
                    self.transforms.push(MeshTransform {
                        world,
                        normal: normal_matrix(&(view * world)),
                    });
                    self.transforms.len() - 1
                });
                self.items.push(DrawItem {
                    mesh: m,
                    submesh: s,
                    transform,
                    sphere,
                });
            }
        }
        trace!(
            "{} draw items from {} meshes",
            self.items.len(),
            scene.meshes().len()
        );
    }

    fn state(&self, target: FramebufferId) -> RenderState {
        RenderState {
            framebuffer: target,
            // Wireframes show hidden edges as well.
            cull: if self.wireframe { CullMode::Off } else { CullMode::Back },
            raster: if self.wireframe {
                RasterMode::Line
            } else {
                RasterMode::Fill
            },
            ..RenderState::new()
        }
    }

    /// Renders `scene` into `target`, whose depth buffer must be cleared.
    pub fn render(
        &mut self,
        gpu: &mut Gpu,
        cache: &mut ResourceCache,
        scene: &Scene,
        camera: &dyn Viewpoint,
        target: FramebufferId,
    ) {
        self.prepare(scene, camera);

        for light in scene.lights().filter(|l| l.cast_shadows()) {
            self.shadows.render(gpu, cache, scene, light);
        }

        let view = camera.view_matrix();
        let projection = camera.projection_matrix();

        let state = RenderState {
            depth: DepthTest::Less,
            blend: BlendMode::Off,
            ..self.state(target)
        };
        let ambient = scene.ambient.map_or(Vector3::zeros(), |a| a.color);
        self.ambient.set_camera(gpu, &view, &projection);
        self.ambient.set_ambient(gpu, ambient);
        for item in &self.items {
            let t = &self.transforms[item.transform];
            let submesh = &scene.meshes()[item.mesh].submeshes[item.submesh];
            self.ambient
                .draw(gpu, cache, &state, submesh, &t.world, &t.normal);
        }

        let state = RenderState {
            depth: DepthTest::Equal,
            blend: BlendMode::Additive,
            ..self.state(target)
        };
        let bias = self.shadows.settings.bias;
        for light in scene.lights() {
            let shadowed = light.cast_shadows();
            let program = match light {
                Light::Point(l) => {
                    let p = self.point.pick(shadowed);
                    p.set_point_light(gpu, l, bias);
                    if shadowed {
                        let map = cache.point_shadow(l.id()).unwrap_or_else(|| {
                            panic!("point light {:?} has no shadow map", l.id())
                        });
                        p.set_shadow_map(gpu, &map);
                    }
                    p
                }
                Light::Spot(l) => {
                    let p = self.spot.pick(shadowed);
                    p.set_spot_light(gpu, l, bias);
                    if shadowed {
                        let map = cache.spot_shadow(l.id()).unwrap_or_else(|| {
                            panic!("spot light {:?} has no shadow map", l.id())
                        });
                        p.set_shadow_map(gpu, &map);
                    }
                    p
                }
                Light::Directional(l) => {
                    let p = self.directional.pick(shadowed);
                    p.set_directional_light(gpu, l, bias);
                    if shadowed {
                        let map = cache.directional_shadow(l.id()).unwrap_or_else(|| {
                            panic!("directional light {:?} has no shadow map", l.id())
                        });
                        p.set_shadow_map(gpu, &map);
                    }
                    p
                }
            };
            program.set_camera(gpu, &view, &projection);

            let mut drawn = 0;
            for item in &self.items {
                if self.light_culling && !light.interacts(&item.sphere) {
                    continue;
                }
                let t = &self.transforms[item.transform];
                let submesh = &scene.meshes()[item.mesh].submeshes[item.submesh];
                program.draw(gpu, cache, &state, submesh, &t.world, &t.normal);
                drawn += 1;
            }
            debug!("Light {:?} pass '{}': {} items", light.id(), program.name(), drawn);
        }
    }
}
