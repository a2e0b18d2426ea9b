use crate::core::device::{BlendMode, CullMode, DepthTest};
use crate::core::framebuffer::Framebuffer;
use crate::core::gpu::Gpu;
use crate::core::program::ProgramDesc;
use crate::core::state::RenderState;
use crate::pipeline::cache::ResourceCache;
use crate::pipeline::mesh_renderer::MeshProgram;
use crate::pipeline::shaders::shadow::{ShadowOmniKernel, ShadowOrthoKernel};
use crate::scene::Scene;
use crate::scene::camera::{Camera, Projection, Viewpoint};
use crate::scene::id::LightId;
use crate::scene::light::{DirectionalLight, Light, PointLight, SpotLight};
use log::{debug, trace};
use nalgebra::{Matrix4, Point3, Vector3};
use std::collections::HashMap;
use std::sync::Arc;

/// (forward, up) of the six cube faces in +X, -X, +Y, -Y, +Z, -Z order.
#[rustfmt::skip]
pub const CUBE_FACES: [(Vector3<f32>, Vector3<f32>); 6] = [
    (Vector3::new( 1.0,  0.0,  0.0), Vector3::new(0.0, -1.0,  0.0)),
    (Vector3::new(-1.0,  0.0,  0.0), Vector3::new(0.0, -1.0,  0.0)),
    (Vector3::new( 0.0,  1.0,  0.0), Vector3::new(0.0,  0.0,  1.0)),
    (Vector3::new( 0.0, -1.0,  0.0), Vector3::new(0.0,  0.0, -1.0)),
    (Vector3::new( 0.0,  0.0,  1.0), Vector3::new(0.0, -1.0,  0.0)),
    (Vector3::new( 0.0,  0.0, -1.0), Vector3::new(0.0, -1.0,  0.0)),
];

/// Near plane of every shadow camera.
pub const SHADOW_NEAR: f32 = 0.1;

/// The 90 degree camera that renders cube face `face` of a light at `position`.
pub fn cube_face_camera(position: Point3<f32>, face: usize, far: f32) -> Camera {
    let mut camera = Camera::new(
        position,
        Projection::Perspective {
            fov_y_rad: std::f32::consts::FRAC_PI_2,
            aspect_ratio: 1.0,
            near: SHADOW_NEAR,
            far,
        },
    );
    let (forward, up) = CUBE_FACES[face];
    camera.set_forward_up(&forward, &up);
    camera
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadowSettings {
    /// Edge of each point-light cube face.
    pub cube_size: usize,
    /// Edge of spot and directional shadow maps.
    pub map_size: usize,
    /// Depth offset subtracted before the shadow comparison.
    pub bias: f32,
    /// Skip lights whose map is already up to date with the scene epoch
    /// and the light's shadow camera.
    pub reuse_static: bool,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            cube_size: 512,
            map_size: 1024,
            bias: 0.005,
            reuse_static: false,
        }
    }
}

/// Renders shadow maps into the resource cache. One depth-only framebuffer
/// is reused; its depth attachment moves between maps and cube faces.
pub struct ShadowRenderer {
    omni: MeshProgram,
    ortho: MeshProgram,
    framebuffer: Framebuffer,
    pub settings: ShadowSettings,
    /// Scene epoch and shadow view-projection of each map's last render.
    rendered: HashMap<LightId, (u64, Matrix4<f32>)>,
}

impl ShadowRenderer {
    pub fn new(gpu: &mut Gpu, settings: ShadowSettings) -> Result<Self, String> {
        Ok(Self {
            omni: MeshProgram::new(gpu, ProgramDesc::new("shadow-omni", Arc::new(ShadowOmniKernel)))?,
            ortho: MeshProgram::new(
                gpu,
                ProgramDesc::new("shadow-ortho", Arc::new(ShadowOrthoKernel)),
            )?,
            framebuffer: Framebuffer::new(gpu),
            settings,
            rendered: HashMap::new(),
        })
    }

    fn state(&self) -> RenderState {
        RenderState {
            framebuffer: self.framebuffer.id,
            depth: DepthTest::Less,
            blend: BlendMode::Off,
            // Back faces as occluders keep lit front faces free of acne.
            cull: CullMode::Front,
            ..RenderState::new()
        }
    }

    /// Renders the shadow map of `light`, unless reuse is on and neither the
    /// scene nor the light's shadow camera changed since it was last rendered.
    pub fn render(&mut self, gpu: &mut Gpu, cache: &mut ResourceCache, scene: &Scene, light: Light) {
        // Pub light fields such as `shadow_far` bypass the epoch counter.
        let key = (scene.epoch(), shadow_signature(light));
        let id = light.id();
        let present = match light {
            Light::Point(_) => cache.point_shadow(id).is_some(),
            Light::Spot(_) => cache.spot_shadow(id).is_some(),
            Light::Directional(_) => cache.directional_shadow(id).is_some(),
        };
        if self.settings.reuse_static && present && self.rendered.get(&id) == Some(&key) {
            trace!("Shadow map of light {:?} is current", id);
            return;
        }

        match light {
            Light::Point(l) => self.render_point(gpu, cache, scene, l),
            Light::Spot(l) => self.render_spot(gpu, cache, scene, l),
            Light::Directional(l) => self.render_directional(gpu, cache, scene, l),
        }
        self.rendered.insert(id, key);
    }

    pub fn render_point(&mut self, gpu: &mut Gpu, cache: &mut ResourceCache, scene: &Scene, light: &PointLight) {
        let cube = cache.point_shadow_map(gpu, light.id(), self.settings.cube_size);
        let state = self.state();
        self.omni
            .set_shadow_origin(gpu, light.position().coords, light.shadow_far);

        for face in 0..6 {
            let camera = cube_face_camera(light.position(), face, light.shadow_far);
            self.framebuffer.attach_depth(gpu, cube.face(face));
            self.framebuffer.clear_depth(gpu, 1.0);
            let drawn = draw_casters(gpu, cache, &mut self.omni, &state, scene, &camera);
            trace!("Point light {:?} face {}: {} casters", light.id(), face, drawn);
        }
        debug!("Rendered shadow cube for point light {:?}", light.id());
    }

    pub fn render_spot(&mut self, gpu: &mut Gpu, cache: &mut ResourceCache, scene: &Scene, light: &SpotLight) {
        let map = cache.spot_shadow_map(gpu, light.id(), self.settings.map_size);
        let state = self.state();
        self.omni
            .set_shadow_origin(gpu, light.position().coords, light.camera.far());
        self.framebuffer.attach_depth(gpu, map.attachment());
        self.framebuffer.clear_depth(gpu, 1.0);
        let drawn = draw_casters(gpu, cache, &mut self.omni, &state, scene, &light.camera);
        debug!("Rendered shadow map for spot light {:?}: {} casters", light.id(), drawn);
    }

    pub fn render_directional(
        &mut self,
        gpu: &mut Gpu,
        cache: &mut ResourceCache,
        scene: &Scene,
        light: &DirectionalLight,
    ) {
        let map = cache.directional_shadow_map(gpu, light.id(), self.settings.map_size);
        let state = self.state();
        self.framebuffer.attach_depth(gpu, map.attachment());
        self.framebuffer.clear_depth(gpu, 1.0);
        let drawn = draw_casters(gpu, cache, &mut self.ortho, &state, scene, &light.camera);
        debug!(
            "Rendered shadow map for directional light {:?}: {} casters",
            light.id(),
            drawn
        );
    }
}

/// Draws every submesh inside `camera`'s frustum with a depth-only program.
fn draw_casters(
    gpu: &mut Gpu,
    cache: &mut ResourceCache,
    program: &mut MeshProgram,
    state: &RenderState,
    scene: &Scene,
    camera: &Camera,
) -> usize {
    let frustum = camera.frustum();
    program.set_camera(gpu, &camera.view_matrix(), &camera.projection_matrix());

    let mut drawn = 0;
    for mesh in scene.meshes() {
        let world = mesh.world_matrix();
        for submesh in &mesh.submeshes {
            if frustum.excludes_sphere(&submesh.world_sphere(&world)) {
                continue;
            }
            program.draw(gpu, cache, state, submesh, &world, &Matrix4::identity());
            drawn += 1;
        }
    }
    drawn
}

/// View-projection the shadow map of `light` is rendered with.
fn shadow_signature(light: Light) -> Matrix4<f32> {
    match light {
        Light::Point(l) => cube_face_camera(l.position(), 0, l.shadow_far).view_projection(),
        Light::Spot(l) => l.camera.view_projection(),
        Light::Directional(l) => l.camera.view_projection(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::material::Material;
    use crate::scene::mesh::{Mesh, cube};

    #[test]
    fn face_cameras_have_orthonormal_bases() {
        for face in 0..6 {
            let cam = cube_face_camera(Point3::origin(), face, 10.0);
            let (forward, _) = CUBE_FACES[face];
            assert!((cam.forward() - forward).norm() < 1e-6);
            let o = &cam.object;
            assert!(o.ux().dot(&o.uy()).abs() < 1e-6);
            assert!((o.ux().cross(&o.uy()) - o.uz()).norm() < 1e-6);
        }
    }

    #[test]
    fn positive_x_face_matches_cube_sampling() {
        // Cube face +X is addressed with s along -Z and t along -Y.
        let cam = cube_face_camera(Point3::origin(), 0, 10.0);
        assert!((cam.object.ux() - Vector3::new(0.0, 0.0, -1.0)).norm() < 1e-6);
        assert!((cam.object.uy() - Vector3::new(0.0, -1.0, 0.0)).norm() < 1e-6);
    }

    #[test]
    fn reuse_rerenders_when_shadow_far_changes() {
        let mut gpu = Gpu::software(16, 16);
        let mut cache = ResourceCache::new();
        let settings = ShadowSettings {
            cube_size: 16,
            map_size: 16,
            reuse_static: true,
            ..ShadowSettings::default()
        };
        let mut shadows = ShadowRenderer::new(&mut gpu, settings).unwrap();

        let mut scene = Scene::new();
        scene.add_mesh(Mesh::single("cube", cube(), Material::default()));
        let white = Vector3::repeat(1.0);
        scene.add_point_light(PointLight::new(Point3::new(0.0, 3.0, 0.0), white, white, 0.0).with_shadows(10.0));

        shadows.render(&mut gpu, &mut cache, &scene, Light::Point(&scene.point_lights()[0]));
        let first = gpu.stats.draw_calls;
        assert!(first > 0);

        shadows.render(&mut gpu, &mut cache, &scene, Light::Point(&scene.point_lights()[0]));
        assert_eq!(gpu.stats.draw_calls, first);

        scene.point_lights_mut()[0].shadow_far = 20.0;
        shadows.render(&mut gpu, &mut cache, &scene, Light::Point(&scene.point_lights()[0]));
        assert!(gpu.stats.draw_calls > first);
    }
}
