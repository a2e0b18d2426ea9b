use crate::pipeline::effects::{BlurSettings, FogSettings};
use crate::pipeline::renderer::RenderSettings;
use crate::pipeline::shadow_renderer::ShadowSettings;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Scene description file. Every field has a default, so an empty file
/// renders the default scene settings with no objects.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub render: RenderConfig,
    pub shadows: ShadowConfig,
    pub fog: Option<FogSettings>,
    pub blur: Option<BlurSettings>,
    pub camera: CameraConfig,
    pub ambient: Option<AmbientConfig>,
    pub point_lights: Vec<PointLightConfig>,
    pub spot_lights: Vec<SpotLightConfig>,
    pub directional_lights: Vec<DirectionalLightConfig>,
    pub objects: Vec<ObjectConfig>,
    pub skybox: Option<SkyboxConfig>,
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Failed to read config file: {}", e))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, String> {
        toml::from_str(content).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Settings of the top-level renderer.
    pub fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            width: self.render.width,
            height: self.render.height,
            wireframe: self.render.wireframe,
            debug_arrows: self.render.debug_arrows,
            show_stats: self.render.show_stats,
            clear_color: self.render.clear_color,
            fog: self.fog,
            blur: self.blur,
            shadows: ShadowSettings {
                cube_size: self.shadows.cube_size,
                map_size: self.shadows.map_size,
                bias: self.shadows.bias,
                reuse_static: self.render.reuse_static_shadows,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    // --- Internal scene resolution ---
    pub width: usize,
    pub height: usize,

    // --- Window / default framebuffer ---
    pub window_width: usize,
    pub window_height: usize,

    // --- Headless output ---
    pub frames: usize,
    pub output: String,

    // --- Debug ---
    pub wireframe: bool,
    pub debug_arrows: bool,
    pub show_stats: bool,
    pub clear_color: [f32; 4],
    pub reuse_static_shadows: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            window_width: 1280,
            window_height: 720,
            frames: 1,
            output: "output.png".to_string(),
            wireframe: false,
            debug_arrows: false,
            show_stats: false,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            reuse_static_shadows: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShadowConfig {
    pub cube_size: usize,
    pub map_size: usize,
    pub bias: f32,
}

impl Default for ShadowConfig {
    fn default() -> Self {
        let settings = ShadowSettings::default();
        Self {
            cube_size: settings.cube_size,
            map_size: settings.map_size,
            bias: settings.bias,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub projection: String, // "perspective" | "orthographic"
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub up: [f32; 3],
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub ortho_height: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            projection: "perspective".to_string(),
            position: [0.0, 4.0, 8.0],
            target: [0.0, 0.0, 0.0],
            up: [0.0, 1.0, 0.0],
            fov: 60.0,
            ortho_height: 10.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmbientConfig {
    pub color: [f32; 3],
}

impl Default for AmbientConfig {
    fn default() -> Self {
        Self {
            color: [0.1, 0.1, 0.1],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PointLightConfig {
    pub position: [f32; 3],
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub attenuation: f32,
    pub cast_shadows: bool,
    pub shadow_far: f32,
}

impl Default for PointLightConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 5.0, 0.0],
            diffuse: [1.0, 1.0, 1.0],
            specular: [1.0, 1.0, 1.0],
            attenuation: 0.01,
            cast_shadows: false,
            shadow_far: 25.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotLightConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    /// Full cone angle in degrees.
    pub fov: f32,
    pub far: f32,
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub attenuation: f32,
    pub cast_shadows: bool,
}

impl Default for SpotLightConfig {
    fn default() -> Self {
        Self {
            position: [0.0, 5.0, 0.0],
            target: [0.0, 0.0, 0.0],
            fov: 45.0,
            far: 25.0,
            diffuse: [1.0, 1.0, 1.0],
            specular: [1.0, 1.0, 1.0],
            attenuation: 0.01,
            cast_shadows: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DirectionalLightConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    /// Height of the orthographic shadow volume.
    pub extent: f32,
    pub far: f32,
    pub diffuse: [f32; 3],
    pub specular: [f32; 3],
    pub cast_shadows: bool,
}

impl Default for DirectionalLightConfig {
    fn default() -> Self {
        Self {
            position: [-5.0, 10.0, 5.0],
            target: [0.0, 0.0, 0.0],
            extent: 20.0,
            far: 50.0,
            diffuse: [1.0, 1.0, 1.0],
            specular: [1.0, 1.0, 1.0],
            cast_shadows: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RotationConfig {
    pub axis: [f32; 3],
    /// Degrees.
    pub angle: f32,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            axis: [0.0, 1.0, 0.0],
            angle: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObjectConfig {
    pub name: Option<String>,
    /// OBJ file; takes precedence over `primitive`.
    pub path: Option<String>,
    /// "cube" | "plane" | "sphere"
    pub primitive: Option<String>,
    /// Edge lengths of a plane primitive, radius of a sphere in `size[0]`.
    pub size: [f32; 2],

    // --- Transform ---
    pub position: [f32; 3],
    pub rotation: RotationConfig,
    pub scale: [f32; 3],
    /// Degrees per second around `rotation.axis`, applied by the demo loop.
    pub spin: f32,

    // --- Material overrides ---
    pub ambient: Option<[f32; 3]>,
    pub diffuse: Option<[f32; 3]>,
    pub specular: Option<[f32; 3]>,
    pub shininess: Option<f32>,
    /// Recompute area-weighted vertex normals after loading.
    pub smooth: bool,
}

impl Default for ObjectConfig {
    fn default() -> Self {
        Self {
            name: None,
            path: None,
            primitive: None,
            size: [1.0, 1.0],
            position: [0.0, 0.0, 0.0],
            rotation: RotationConfig::default(),
            scale: [1.0, 1.0, 1.0],
            spin: 0.0,
            ambient: None,
            diffuse: None,
            specular: None,
            shininess: None,
            smooth: false,
        }
    }
}

/// Six face images in +X, -X, +Y, -Y, +Z, -Z order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkyboxConfig {
    pub faces: [String; 6],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_valid() {
        let config = Config::parse("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.render.width, 1920);
        assert_eq!(config.shadows.bias, 0.005);
        assert!(config.fog.is_none());
    }

    #[test]
    fn sections_override_defaults() {
        let config = Config::parse(
            r#"
            [render]
            width = 64
            height = 48
            reuse_static_shadows = true

            [fog]
            density = 0.5

            [[point_lights]]
            position = [1.0, 2.0, 3.0]
            cast_shadows = true

            [[objects]]
            primitive = "sphere"
            rotation = { axis = [1.0, 0.0, 0.0], angle = 90.0 }
            "#,
        )
        .unwrap();

        let settings = config.render_settings();
        assert_eq!((settings.width, settings.height), (64, 48));
        assert!(settings.shadows.reuse_static);
        let fog = settings.fog.unwrap();
        assert_eq!(fog.density, 0.5);
        assert_eq!(fog.color, FogSettings::default().color);
        assert_eq!(config.point_lights[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(config.point_lights[0].shadow_far, 25.0);
        assert_eq!(config.objects[0].rotation.angle, 90.0);
        assert_eq!(config.objects[0].scale, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn malformed_toml_is_an_error() {
        assert!(Config::parse("[render\nwidth = 1").is_err());
    }
}
