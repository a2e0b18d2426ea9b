pub mod camera;
pub mod geometry;
pub mod id;
pub mod image;
pub mod light;
pub mod material;
pub mod mesh;
pub mod object;

use crate::scene::id::{ImageId, next_epoch};
use crate::scene::image::Image;
use crate::scene::light::{AmbientLight, DirectionalLight, Light, PointLight, SpotLight};
use crate::scene::mesh::Mesh;
use std::sync::Arc;

/// Environment cube faces in +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Debug, Clone)]
pub struct Skybox {
    pub faces: [Arc<Image>; 6],
}

impl Skybox {
    pub fn new(faces: [Arc<Image>; 6]) -> Self {
        Self { faces }
    }

    /// The cube texture is cached under the identity of its first face.
    pub fn id(&self) -> ImageId {
        self.faces[0].id()
    }
}

/// Everything the renderer draws in one frame.
///
/// Contents are only added through the `add_*` methods so the scene epoch
/// tracks structural changes; items can still be moved through the `_mut`
/// accessors, which the per-item epochs cover.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    meshes: Vec<Mesh>,
    point_lights: Vec<PointLight>,
    spot_lights: Vec<SpotLight>,
    directional_lights: Vec<DirectionalLight>,
    pub ambient: Option<AmbientLight>,
    skybox: Option<Skybox>,
    epoch: u64,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            epoch: next_epoch(),
            ..Default::default()
        }
    }

    fn touch(&mut self) {
        self.epoch = next_epoch();
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> usize {
        self.meshes.push(mesh);
        self.touch();
        self.meshes.len() - 1
    }

    pub fn add_point_light(&mut self, light: PointLight) -> usize {
        self.point_lights.push(light);
        self.touch();
        self.point_lights.len() - 1
    }

    pub fn add_spot_light(&mut self, light: SpotLight) -> usize {
        self.spot_lights.push(light);
        self.touch();
        self.spot_lights.len() - 1
    }

    pub fn add_directional_light(&mut self, light: DirectionalLight) -> usize {
        self.directional_lights.push(light);
        self.touch();
        self.directional_lights.len() - 1
    }

    pub fn set_skybox(&mut self, skybox: Option<Skybox>) {
        self.skybox = skybox;
        self.touch();
    }

    pub fn meshes(&self) -> &[Mesh] {
        &self.meshes
    }

    pub fn meshes_mut(&mut self) -> &mut [Mesh] {
        &mut self.meshes
    }

    pub fn point_lights(&self) -> &[PointLight] {
        &self.point_lights
    }

    pub fn point_lights_mut(&mut self) -> &mut [PointLight] {
        &mut self.point_lights
    }

    pub fn spot_lights(&self) -> &[SpotLight] {
        &self.spot_lights
    }

    pub fn spot_lights_mut(&mut self) -> &mut [SpotLight] {
        &mut self.spot_lights
    }

    pub fn directional_lights(&self) -> &[DirectionalLight] {
        &self.directional_lights
    }

    pub fn directional_lights_mut(&mut self) -> &mut [DirectionalLight] {
        &mut self.directional_lights
    }

    pub fn skybox(&self) -> Option<&Skybox> {
        self.skybox.as_ref()
    }

    /// Point, then spot, then directional lights, each in insertion order.
    pub fn lights(&self) -> impl Iterator<Item = Light<'_>> {
        self.point_lights
            .iter()
            .map(Light::Point)
            .chain(self.spot_lights.iter().map(Light::Spot))
            .chain(self.directional_lights.iter().map(Light::Directional))
    }

    /// The latest mutation epoch of the scene or anything in it.
    pub fn epoch(&self) -> u64 {
        let meshes = self.meshes.iter().map(Mesh::epoch);
        let lights = self.lights().map(|l| l.epoch());
        meshes.chain(lights).fold(self.epoch, u64::max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::material::Material;
    use crate::scene::mesh::{Mesh, cube};
    use nalgebra::{Point3, Vector3};

    #[test]
    fn epoch_follows_moving_meshes() {
        let mut scene = Scene::new();
        scene.add_mesh(Mesh::single("box", cube(), Material::default()));
        let before = scene.epoch();
        assert_eq!(scene.epoch(), before);

        scene.meshes_mut()[0]
            .object
            .translate(&Vector3::new(1.0, 0.0, 0.0));
        assert!(scene.epoch() > before);
    }

    #[test]
    fn lights_are_listed_by_kind() {
        let mut scene = Scene::new();
        let white = Vector3::repeat(1.0);
        scene.add_directional_light(DirectionalLight::new(
            Point3::new(0.0, 10.0, 0.0),
            Point3::origin(),
            20.0,
            30.0,
            white,
            white,
        ));
        scene.add_point_light(PointLight::new(Point3::origin(), white, white, 0.1));
        let kinds: Vec<bool> = scene
            .lights()
            .map(|l| matches!(l, Light::Point(_)))
            .collect();
        assert_eq!(kinds, vec![true, false]);
    }
}
