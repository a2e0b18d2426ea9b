use crate::geometry::frustum::BoundingSphere;
use crate::scene::camera::{Camera, Projection};
use crate::scene::id::LightId;
use crate::scene::object::Object;
use nalgebra::{Point3, Vector3};

/// Attenuation level below which a point light no longer lights a surface.
pub const ATTENUATION_CUTOFF: f32 = 0.05;

/// Distance attenuation 1 / (1 + a d^2).
#[inline]
pub fn attenuation(a: f32, distance: f32) -> f32 {
    1.0 / (1.0 + a * distance * distance)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AmbientLight {
    pub color: Vector3<f32>,
}

impl AmbientLight {
    pub fn new(color: Vector3<f32>) -> Self {
        Self { color }
    }
}

/// An omnidirectional light with a cube shadow map.
#[derive(Debug)]
pub struct PointLight {
    id: LightId,
    pub object: Object,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
    /// Quadratic attenuation coefficient; 0 means no falloff.
    pub attenuation: f32,
    /// Far plane of the shadow cube; also the depth normaliser.
    pub shadow_far: f32,
    pub cast_shadows: bool,
}

// Shadow maps are keyed by light id, so a copy is a new light.

impl Clone for PointLight {
    fn clone(&self) -> Self {
        Self {
            id: LightId::new(),
            object: self.object.clone(),
            ..*self
        }
    }
}

impl PointLight {
    pub fn new(position: Point3<f32>, diffuse: Vector3<f32>, specular: Vector3<f32>, attenuation: f32) -> Self {
        Self {
            id: LightId::new(),
            object: Object::at(position),
            diffuse,
            specular,
            attenuation,
            shadow_far: 25.0,
            cast_shadows: false,
        }
    }

    pub fn with_shadows(mut self, shadow_far: f32) -> Self {
        self.cast_shadows = true;
        self.shadow_far = shadow_far;
        self
    }

    pub fn id(&self) -> LightId {
        self.id
    }

    pub fn position(&self) -> Point3<f32> {
        self.object.position()
    }

    pub fn set_position(&mut self, position: Point3<f32>) {
        self.object.set_position(position);
    }

    pub fn epoch(&self) -> u64 {
        self.object.epoch()
    }

    /// Distance at which the attenuation reaches [`ATTENUATION_CUTOFF`].
    pub fn range(&self) -> f32 {
        if self.attenuation <= 0.0 {
            f32::INFINITY
        } else {
            ((1.0 / ATTENUATION_CUTOFF - 1.0) / self.attenuation).sqrt()
        }
    }

    /// True when the light's effective range reaches the sphere.
    pub fn interacts(&self, sphere: &BoundingSphere) -> bool {
        if self.attenuation <= 0.0 {
            return true;
        }
        let dist = (sphere.center - self.position()).norm();
        if dist <= sphere.radius {
            return true;
        }
        let gap = dist - sphere.radius;
        gap * gap < (1.0 / ATTENUATION_CUTOFF - 1.0) / self.attenuation
    }
}

/// A cone light; the cone is the frustum of its perspective camera.
#[derive(Debug)]
pub struct SpotLight {
    id: LightId,
    pub camera: Camera,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
    pub attenuation: f32,
    pub cast_shadows: bool,
}

impl Clone for SpotLight {
    fn clone(&self) -> Self {
        Self {
            id: LightId::new(),
            camera: self.camera.clone(),
            ..*self
        }
    }
}

impl SpotLight {
    /// `fov_rad` is the full cone angle; `far` bounds both the cone and its shadow map.
    pub fn new(
        position: Point3<f32>,
        target: Point3<f32>,
        fov_rad: f32,
        far: f32,
        diffuse: Vector3<f32>,
        specular: Vector3<f32>,
        attenuation: f32,
    ) -> Self {
        let up = stable_up(&(target - position));
        Self {
            id: LightId::new(),
            camera: Camera::new_perspective(position, target, up, fov_rad, 1.0, 0.1, far),
            diffuse,
            specular,
            attenuation,
            cast_shadows: false,
        }
    }

    pub fn id(&self) -> LightId {
        self.id
    }

    pub fn position(&self) -> Point3<f32> {
        self.camera.position()
    }

    pub fn direction(&self) -> Vector3<f32> {
        self.camera.forward()
    }

    pub fn epoch(&self) -> u64 {
        self.camera.epoch()
    }
}

/// Parallel light; its orthographic camera bounds the shadowed region.
#[derive(Debug)]
pub struct DirectionalLight {
    id: LightId,
    pub camera: Camera,
    pub diffuse: Vector3<f32>,
    pub specular: Vector3<f32>,
    pub cast_shadows: bool,
}

impl Clone for DirectionalLight {
    fn clone(&self) -> Self {
        Self {
            id: LightId::new(),
            camera: self.camera.clone(),
            ..*self
        }
    }
}

impl DirectionalLight {
    /// The light shines from `position` towards `target`; `extent` is the
    /// height of the orthographic shadow volume.
    pub fn new(
        position: Point3<f32>,
        target: Point3<f32>,
        extent: f32,
        far: f32,
        diffuse: Vector3<f32>,
        specular: Vector3<f32>,
    ) -> Self {
        let up = stable_up(&(target - position));
        Self {
            id: LightId::new(),
            camera: Camera::new_orthographic(position, target, up, extent, 1.0, 0.1, far),
            diffuse,
            specular,
            cast_shadows: false,
        }
    }

    pub fn id(&self) -> LightId {
        self.id
    }

    pub fn direction(&self) -> Vector3<f32> {
        self.camera.forward()
    }

    pub fn epoch(&self) -> u64 {
        self.camera.epoch()
    }

    pub fn extent(&self) -> f32 {
        match self.camera.projection {
            Projection::Orthographic { height, .. } => height,
            Projection::Perspective { .. } => 0.0,
        }
    }
}

/// +Y unless the light points straight up or down.
fn stable_up(direction: &Vector3<f32>) -> Vector3<f32> {
    let d = direction.normalize();
    if d.y.abs() > 0.99 {
        Vector3::z()
    } else {
        Vector3::y()
    }
}

/// Tagged view over any light of the scene.
#[derive(Debug, Clone, Copy)]
pub enum Light<'a> {
    Point(&'a PointLight),
    Spot(&'a SpotLight),
    Directional(&'a DirectionalLight),
}

impl Light<'_> {
    pub fn id(&self) -> LightId {
        match self {
            Light::Point(l) => l.id(),
            Light::Spot(l) => l.id(),
            Light::Directional(l) => l.id(),
        }
    }

    pub fn cast_shadows(&self) -> bool {
        match self {
            Light::Point(l) => l.cast_shadows,
            Light::Spot(l) => l.cast_shadows,
            Light::Directional(l) => l.cast_shadows,
        }
    }

    pub fn epoch(&self) -> u64 {
        match self {
            Light::Point(l) => l.epoch(),
            Light::Spot(l) => l.epoch(),
            Light::Directional(l) => l.epoch(),
        }
    }

    /// Per-submesh light culling; only point lights have a finite range.
    pub fn interacts(&self, sphere: &BoundingSphere) -> bool {
        match self {
            Light::Point(l) => l.interacts(sphere),
            Light::Spot(_) | Light::Directional(_) => true,
        }
    }
}
