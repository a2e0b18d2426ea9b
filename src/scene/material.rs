use crate::scene::id::MaterialId;
use crate::scene::image::Image;
use nalgebra::Vector3;
use std::sync::Arc;

/// Parameters for the Blinn-Phong lighting model.
///
/// Every map is always present: unset colour maps point at the shared
/// white sentinel and the bump map at the flat normal sentinel.
#[derive(Debug, Clone)]
pub struct Material {
    id: MaterialId,
    pub name: String,
    pub ambient: Vector3<f32>,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
    pub shininess: f32,
    pub opacity: f32,
    pub ambient_map: Arc<Image>,
    pub diffuse_map: Arc<Image>,
    pub specular_map: Arc<Image>,
    pub alpha_map: Arc<Image>,
    /// Tangent-space normal map.
    pub bump_map: Arc<Image>,
}

impl Default for Material {
    fn default() -> Self {
        Self::new("default")
    }
}

impl Material {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: MaterialId::new(),
            name: name.into(),
            ambient: Vector3::repeat(1.0),
            diffuse: Vector3::repeat(1.0),
            specular: Vector3::repeat(0.5),
            shininess: 32.0,
            opacity: 1.0,
            ambient_map: Image::white_transparent(),
            diffuse_map: Image::white_transparent(),
            specular_map: Image::white_transparent(),
            alpha_map: Image::white_transparent(),
            bump_map: Image::flat_normal(),
        }
    }

    pub fn id(&self) -> MaterialId {
        self.id
    }

    pub fn with_diffuse(mut self, diffuse: Vector3<f32>) -> Self {
        self.diffuse = diffuse;
        self
    }

    pub fn with_specular(mut self, specular: Vector3<f32>, shininess: f32) -> Self {
        self.specular = specular;
        self.shininess = shininess;
        self
    }

    pub fn with_ambient(mut self, ambient: Vector3<f32>) -> Self {
        self.ambient = ambient;
        self
    }

    /// Every image the material samples, in the order the mesh programs bind them.
    pub fn maps(&self) -> [&Arc<Image>; 5] {
        [
            &self.ambient_map,
            &self.diffuse_map,
            &self.specular_map,
            &self.alpha_map,
            &self.bump_map,
        ]
    }
}
