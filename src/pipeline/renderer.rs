use crate::core::device::{BlendMode, Filter, FramebufferId, TextureFormat, Wrap};
use crate::core::framebuffer::Framebuffer;
use crate::core::gpu::Gpu;
use crate::core::texture::Texture2D;
use crate::pipeline::arrow::ArrowRenderer;
use crate::pipeline::cache::ResourceCache;
use crate::pipeline::effects::{BlurEffect, BlurSettings, FogEffect, FogSettings};
use crate::pipeline::mesh_renderer::MeshRenderer;
use crate::pipeline::quad::QuadRenderer;
use crate::pipeline::shadow_renderer::ShadowSettings;
use crate::pipeline::skybox::SkyboxRenderer;
use crate::pipeline::text::TextRenderer;
use crate::scene::Scene;
use crate::scene::camera::Camera;
use image::RgbaImage;
use log::{debug, info};
use nalgebra::Vector4;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    /// Internal scene resolution, independent of the window.
    pub width: usize,
    pub height: usize,
    pub wireframe: bool,
    pub debug_arrows: bool,
    pub show_stats: bool,
    pub clear_color: [f32; 4],
    pub fog: Option<FogSettings>,
    pub blur: Option<BlurSettings>,
    pub shadows: ShadowSettings,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
            wireframe: false,
            debug_arrows: false,
            show_stats: false,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            fog: None,
            blur: None,
            shadows: ShadowSettings::default(),
        }
    }
}

/// A framebuffer with its own colour texture.
struct Target {
    framebuffer: Framebuffer,
    color: Texture2D,
}

impl Target {
    fn new(gpu: &mut Gpu, width: usize, height: usize) -> Self {
        let color = Texture2D::new(
            gpu,
            TextureFormat::Rgba8,
            Filter::Linear,
            Wrap::EdgeClamp,
            width,
            height,
        );
        let mut framebuffer = Framebuffer::new(gpu);
        framebuffer.attach_color(gpu, color.attachment());
        Self { framebuffer, color }
    }
}

/// Runs one frame: scene into an off-screen target, post effects, overlay,
/// then both targets onto the default framebuffer.
pub struct Renderer {
    pub settings: RenderSettings,
    cache: ResourceCache,
    scene: Target,
    depth: Texture2D,
    overlay: Target,
    swap: Target,
    meshes: MeshRenderer,
    skybox: SkyboxRenderer,
    quad: QuadRenderer,
    text: TextRenderer,
    arrows: ArrowRenderer,
    fog: FogEffect,
    blur: BlurEffect,
}

impl Renderer {
    pub fn new(gpu: &mut Gpu, settings: RenderSettings) -> Result<Self, String> {
        let (w, h) = (settings.width, settings.height);
        if w == 0 || h == 0 {
            return Err(format!("Invalid internal resolution {}x{}", w, h));
        }

        let mut scene = Target::new(gpu, w, h);
        let depth = Texture2D::new(
            gpu,
            TextureFormat::Depth16,
            Filter::Nearest,
            Wrap::EdgeClamp,
            w,
            h,
        );
        scene.framebuffer.attach_depth(gpu, depth.attachment());
        let overlay = Target::new(gpu, w, h);
        let swap = Target::new(gpu, w, h);
        for (name, target) in [("scene", &scene), ("overlay", &overlay), ("swap", &swap)] {
            if !target.framebuffer.complete(gpu) {
                return Err(format!("The {} framebuffer is incomplete", name));
            }
        }

        let renderer = Self {
            cache: ResourceCache::new(),
            meshes: MeshRenderer::new(gpu, settings.shadows)?,
            skybox: SkyboxRenderer::new(gpu)?,
            quad: QuadRenderer::new(gpu)?,
            text: TextRenderer::new(gpu)?,
            arrows: ArrowRenderer::new(gpu)?,
            fog: FogEffect::new(gpu)?,
            blur: BlurEffect::new(gpu)?,
            scene,
            depth,
            overlay,
            swap,
            settings,
        };
        info!("Renderer ready at {}x{} on '{}'", w, h, gpu.device().name());
        Ok(renderer)
    }

    /// Queues overlay text for the next frame, in internal-resolution pixels.
    pub fn print(&mut self, text: impl Into<String>, x: f32, y: f32, scale: f32, color: Vector4<f32>) {
        self.text.queue(text, x, y, scale, color);
    }

    pub fn render(&mut self, gpu: &mut Gpu, scene: &Scene, camera: &Camera) -> Result<(), String> {
        let start = Instant::now();
        let previous = gpu.stats;
        gpu.stats.reset();
        let (w, h) = (self.settings.width, self.settings.height);

        Framebuffer::default_framebuffer().clear_color(gpu, [0.0, 0.0, 0.0, 1.0]);
        self.scene
            .framebuffer
            .clear_color(gpu, self.settings.clear_color);
        self.scene.framebuffer.clear_depth(gpu, 1.0);
        self.overlay
            .framebuffer
            .clear_color(gpu, [0.0, 0.0, 0.0, 0.0]);

        let target = self.scene.framebuffer.id;
        if let Some(skybox) = scene.skybox() {
            self.skybox
                .render(gpu, &mut self.cache, skybox, camera, target)?;
        }

        self.meshes.wireframe = self.settings.wireframe;
        self.meshes.shadows_mut().settings = self.settings.shadows;
        self.meshes
            .render(gpu, &mut self.cache, scene, camera, target);

        if let Some(fog) = &self.settings.fog {
            self.fog.apply(gpu, &self.depth, camera, target, fog);
        }
        if let Some(blur) = &self.settings.blur {
            self.blur.apply(
                gpu,
                &self.scene.color,
                &self.swap.framebuffer,
                &self.swap.color,
                target,
                blur,
            );
        }

        let overlay = self.overlay.framebuffer.id;
        if self.settings.show_stats {
            let white = Vector4::new(1.0, 1.0, 1.0, 1.0);
            self.text.queue(previous.summary(), 8.0, 8.0, 2.0, white);
        }
        if self.settings.debug_arrows {
            self.arrows
                .render(gpu, scene, &self.meshes, camera, overlay);
        }
        self.text.render(gpu, overlay, w, h);

        self.quad
            .blit(gpu, &self.scene.color, FramebufferId::DEFAULT, BlendMode::Off);
        self.quad.blit(
            gpu,
            &self.overlay.color,
            FramebufferId::DEFAULT,
            BlendMode::AlphaOver,
        );

        gpu.stats.finish_frame(start.elapsed());
        debug!(
            "Frame {}: {} draw calls, {} vertices",
            gpu.stats.frames, gpu.stats.draw_calls, gpu.stats.vertices
        );
        Ok(())
    }

    pub fn mesh_renderer(&self) -> &MeshRenderer {
        &self.meshes
    }

    pub fn cache(&self) -> &ResourceCache {
        &self.cache
    }

    /// The scene colour target before compositing, top-left origin.
    pub fn scene_image(&self, gpu: &Gpu) -> Option<RgbaImage> {
        self.scene.framebuffer.read_image(gpu)
    }

    pub fn overlay_image(&self, gpu: &Gpu) -> Option<RgbaImage> {
        self.overlay.framebuffer.read_image(gpu)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small() -> RenderSettings {
        RenderSettings {
            width: 16,
            height: 16,
            ..RenderSettings::default()
        }
    }

    #[test]
    fn empty_scene_clears_and_composites() {
        let mut gpu = Gpu::software(8, 8);
        let settings = RenderSettings {
            clear_color: [0.0, 0.0, 1.0, 1.0],
            ..small()
        };
        let mut renderer = Renderer::new(&mut gpu, settings).unwrap();
        let camera = Camera::new_perspective(
            nalgebra::Point3::new(0.0, 0.0, 3.0),
            nalgebra::Point3::origin(),
            nalgebra::Vector3::y(),
            1.0,
            1.0,
            0.1,
            10.0,
        );
        renderer.render(&mut gpu, &Scene::new(), &camera).unwrap();

        // Only the two compositing blits.
        assert_eq!(gpu.stats.draw_calls, 2);
        assert_eq!(gpu.stats.frames, 1);
        let out = Framebuffer::default_framebuffer().read_image(&gpu).unwrap();
        assert_eq!(out.get_pixel(4, 4).0, [0, 0, 255, 255]);
    }

    #[test]
    fn zero_resolution_is_rejected() {
        let mut gpu = Gpu::software(8, 8);
        let settings = RenderSettings {
            width: 0,
            ..small()
        };
        assert!(Renderer::new(&mut gpu, settings).is_err());
    }
}
