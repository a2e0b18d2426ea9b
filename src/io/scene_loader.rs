use crate::io::config::{CameraConfig, Config, ObjectConfig};
use crate::io::obj_loader::load_obj;
use crate::scene::camera::Camera;
use crate::scene::image::Image;
use crate::scene::light::{AmbientLight, DirectionalLight, PointLight, SpotLight};
use crate::scene::material::Material;
use crate::scene::mesh::{Mesh, cube, plane, sphere};
use crate::scene::{Scene, Skybox};
use log::info;
use nalgebra::{Point3, Vector3};
use std::path::Path;
use std::sync::Arc;

/// A mesh the frame loop keeps rotating.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spin {
    pub mesh: usize,
    pub axis: Vector3<f32>,
    /// Radians per second.
    pub speed: f32,
}

/// Everything built from a configuration file.
pub struct LoadedScene {
    pub scene: Scene,
    pub camera: Camera,
    pub spins: Vec<Spin>,
}

pub fn build_camera(config: &CameraConfig, aspect_ratio: f32) -> Camera {
    let position = Point3::from(config.position);
    let target = Point3::from(config.target);
    let up = Vector3::from(config.up);
    if config.projection == "orthographic" {
        Camera::new_orthographic(
            position,
            target,
            up,
            config.ortho_height,
            aspect_ratio,
            config.near,
            config.far,
        )
    } else {
        Camera::new_perspective(
            position,
            target,
            up,
            config.fov.to_radians(),
            aspect_ratio,
            config.near,
            config.far,
        )
    }
}

/// Builds the scene described by `config`. Relative asset paths are resolved
/// against `base`, normally the directory of the configuration file.
pub fn build_scene(config: &Config, base: &Path) -> Result<LoadedScene, String> {
    let aspect_ratio = config.render.width as f32 / config.render.height.max(1) as f32;
    let camera = build_camera(&config.camera, aspect_ratio);
    let mut scene = Scene::new();

    // 1. Lights
    scene.ambient = config
        .ambient
        .as_ref()
        .map(|a| AmbientLight::new(Vector3::from(a.color)));
    for l in &config.point_lights {
        let mut light = PointLight::new(
            Point3::from(l.position),
            Vector3::from(l.diffuse),
            Vector3::from(l.specular),
            l.attenuation,
        );
        if l.cast_shadows {
            light = light.with_shadows(l.shadow_far);
        }
        scene.add_point_light(light);
    }
    for l in &config.spot_lights {
        let mut light = SpotLight::new(
            Point3::from(l.position),
            Point3::from(l.target),
            l.fov.to_radians(),
            l.far,
            Vector3::from(l.diffuse),
            Vector3::from(l.specular),
            l.attenuation,
        );
        light.cast_shadows = l.cast_shadows;
        scene.add_spot_light(light);
    }
    for l in &config.directional_lights {
        let mut light = DirectionalLight::new(
            Point3::from(l.position),
            Point3::from(l.target),
            l.extent,
            l.far,
            Vector3::from(l.diffuse),
            Vector3::from(l.specular),
        );
        light.cast_shadows = l.cast_shadows;
        scene.add_directional_light(light);
    }

    // 2. Objects
    let mut spins = Vec::new();
    for (i, object) in config.objects.iter().enumerate() {
        let mesh = build_object(object, i, base)?;
        let index = scene.add_mesh(mesh);
        if object.spin != 0.0 {
            spins.push(Spin {
                mesh: index,
                axis: Vector3::from(object.rotation.axis),
                speed: object.spin.to_radians(),
            });
        }
    }

    // 3. Environment
    if let Some(skybox) = &config.skybox {
        let mut faces = Vec::with_capacity(6);
        for face in &skybox.faces {
            faces.push(Arc::new(Image::load(base.join(face))?));
        }
        let faces: [Arc<Image>; 6] = faces
            .try_into()
            .map_err(|_| "A skybox needs exactly six faces".to_string())?;
        scene.set_skybox(Some(Skybox::new(faces)));
    }

    info!(
        "Scene built: {} meshes, {} point / {} spot / {} directional lights",
        scene.meshes().len(),
        scene.point_lights().len(),
        scene.spot_lights().len(),
        scene.directional_lights().len()
    );
    Ok(LoadedScene {
        scene,
        camera,
        spins,
    })
}

fn build_object(config: &ObjectConfig, index: usize, base: &Path) -> Result<Mesh, String> {
    let name = config
        .name
        .clone()
        .unwrap_or_else(|| format!("object-{}", index));

    let mut mesh = if let Some(path) = &config.path {
        let mut mesh = load_obj(base.join(path), config.smooth)?;
        mesh.name = name;
        for submesh in &mut mesh.submeshes {
            let overridden = apply_overrides((*submesh.material).clone(), config);
            submesh.material = Arc::new(overridden);
        }
        mesh
    } else {
        let geometry = match config.primitive.as_deref().unwrap_or("cube") {
            "cube" => cube(),
            "plane" => plane(config.size[0], config.size[1]),
            "sphere" => sphere(config.size[0], 32, 16),
            other => return Err(format!("Unknown primitive '{}' for {}", other, name)),
        };
        let material = apply_overrides(Material::new(name.clone()), config);
        Mesh::single(name, geometry, material)
    };

    let object = &mut mesh.object;
    object.set_position(Point3::from(config.position));
    object.rotate(
        &Vector3::from(config.rotation.axis),
        config.rotation.angle.to_radians(),
    );
    object.set_scale(Vector3::from(config.scale));
    Ok(mesh)
}

fn apply_overrides(mut material: Material, config: &ObjectConfig) -> Material {
    if let Some(c) = config.ambient {
        material.ambient = Vector3::from(c);
    }
    if let Some(c) = config.diffuse {
        material.diffuse = Vector3::from(c);
    }
    if let Some(c) = config.specular {
        material.specular = Vector3::from(c);
    }
    if let Some(ns) = config.shininess {
        material.shininess = ns;
    }
    material
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_lights_objects_and_spins() {
        let config = Config::parse(
            r#"
            [ambient]
            color = [0.2, 0.2, 0.2]

            [[point_lights]]
            cast_shadows = true
            shadow_far = 30.0

            [[directional_lights]]

            [[objects]]
            primitive = "plane"
            size = [20.0, 20.0]

            [[objects]]
            primitive = "sphere"
            position = [0.0, 2.0, 0.0]
            diffuse = [1.0, 0.0, 0.0]
            spin = 90.0
            "#,
        )
        .unwrap();
        let loaded = build_scene(&config, Path::new(".")).unwrap();
        let scene = &loaded.scene;

        assert_eq!(scene.meshes().len(), 2);
        assert_eq!(scene.lights().count(), 2);
        assert!(scene.point_lights()[0].cast_shadows);
        assert_eq!(scene.point_lights()[0].shadow_far, 30.0);
        let sphere = &scene.meshes()[1];
        assert_eq!(sphere.object.position(), Point3::new(0.0, 2.0, 0.0));
        assert_eq!(sphere.submeshes[0].material.diffuse, Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(loaded.spins.len(), 1);
        assert_eq!(loaded.spins[0].mesh, 1);
    }

    #[test]
    fn unknown_primitive_is_an_error() {
        let config = Config::parse("[[objects]]\nprimitive = \"teapot\"\n").unwrap();
        assert!(build_scene(&config, Path::new(".")).is_err());
    }
}
