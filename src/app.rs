//! Frame loop: a [`Game`] mutates the scene, the [`Renderer`] draws it and a
//! [`Window`] presents the default framebuffer.

use crate::core::framebuffer::Framebuffer;
use crate::core::gpu::Gpu;
use crate::io::image::{from_argb, to_argb};
use crate::pipeline::renderer::Renderer;
use crate::scene::Scene;
use crate::scene::camera::Camera;
use image::RgbaImage;
use log::{debug, info};
use std::time::Instant;

/// Keys the frame loop reports to the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Escape,
    Space,
    /// Wireframe toggle
    F1,
    /// Statistics overlay toggle
    F2,
    /// Tangent frame arrows toggle
    F3,
}

/// Where finished frames go.
pub trait Window {
    fn size(&self) -> (usize, usize);
    fn should_close(&self) -> bool;
    /// Shows one frame of `0RGB` pixels, row-major from the top-left.
    fn present(&mut self, frame: &[u32]) -> Result<(), String>;
    /// Keys pressed since the previous frame.
    fn keys(&mut self) -> Vec<Key>;
}

/// Off-screen window that closes after a fixed number of frames.
pub struct HeadlessWindow {
    width: usize,
    height: usize,
    frames: usize,
    presented: usize,
    last: Vec<u32>,
    script: Vec<(usize, Key)>,
}

impl HeadlessWindow {
    pub fn new(width: usize, height: usize, frames: usize) -> Self {
        Self {
            width,
            height,
            frames,
            presented: 0,
            last: Vec::new(),
            script: Vec::new(),
        }
    }

    /// Reports `key` as pressed before frame `frame` (0-based).
    pub fn press(mut self, frame: usize, key: Key) -> Self {
        self.script.push((frame, key));
        self
    }

    pub fn presented(&self) -> usize {
        self.presented
    }

    /// The last presented frame.
    pub fn last_frame(&self) -> Option<RgbaImage> {
        from_argb(self.width, self.height, &self.last)
    }
}

impl Window for HeadlessWindow {
    fn size(&self) -> (usize, usize) {
        (self.width, self.height)
    }

    fn should_close(&self) -> bool {
        self.presented >= self.frames
    }

    fn present(&mut self, frame: &[u32]) -> Result<(), String> {
        if frame.len() != self.width * self.height {
            return Err(format!(
                "Frame of {} pixels does not fit a {}x{} window",
                frame.len(),
                self.width,
                self.height
            ));
        }
        self.last.clear();
        self.last.extend_from_slice(frame);
        self.presented += 1;
        Ok(())
    }

    fn keys(&mut self) -> Vec<Key> {
        let frame = self.presented;
        self.script
            .iter()
            .filter(|(f, _)| *f == frame)
            .map(|(_, k)| *k)
            .collect()
    }
}

#[cfg(feature = "window")]
pub use self::native::MinifbWindow;

#[cfg(feature = "window")]
mod native {
    use super::{Key, Window};
    use minifb::{KeyRepeat, WindowOptions};

    /// On-screen window backed by minifb.
    pub struct MinifbWindow {
        window: minifb::Window,
        width: usize,
        height: usize,
    }

    impl MinifbWindow {
        pub fn new(title: &str, width: usize, height: usize) -> Result<Self, String> {
            let mut window = minifb::Window::new(
                title,
                width,
                height,
                WindowOptions {
                    resize: false,
                    ..WindowOptions::default()
                },
            )
            .map_err(|e| format!("Failed to open window: {}", e))?;
            window.set_target_fps(60);
            Ok(Self {
                window,
                width,
                height,
            })
        }
    }

    impl Window for MinifbWindow {
        fn size(&self) -> (usize, usize) {
            (self.width, self.height)
        }

        fn should_close(&self) -> bool {
            !self.window.is_open() || self.window.is_key_down(minifb::Key::Escape)
        }

        fn present(&mut self, frame: &[u32]) -> Result<(), String> {
            self.window
                .update_with_buffer(frame, self.width, self.height)
                .map_err(|e| format!("Failed to present frame: {}", e))
        }

        fn keys(&mut self) -> Vec<Key> {
            self.window
                .get_keys_pressed(KeyRepeat::No)
                .into_iter()
                .filter_map(|key| match key {
                    minifb::Key::Escape => Some(Key::Escape),
                    minifb::Key::Space => Some(Key::Space),
                    minifb::Key::F1 => Some(Key::F1),
                    minifb::Key::F2 => Some(Key::F2),
                    minifb::Key::F3 => Some(Key::F3),
                    _ => None,
                })
                .collect()
        }
    }
}

/// State shared between the frame loop and the game.
pub struct Context {
    pub gpu: Gpu,
    pub renderer: Renderer,
    pub scene: Scene,
    pub camera: Camera,
    /// Keys pressed since the previous frame.
    pub keys: Vec<Key>,
}

impl Context {
    pub fn pressed(&self, key: Key) -> bool {
        self.keys.contains(&key)
    }
}

pub trait Game {
    fn init(&mut self, ctx: &mut Context) -> Result<(), String>;
    /// Advances the game by `dt` seconds before each frame is rendered.
    fn update(&mut self, ctx: &mut Context, dt: f32) -> Result<(), String>;
}

pub struct Engine {
    pub ctx: Context,
}

impl Engine {
    pub fn new(gpu: Gpu, renderer: Renderer, scene: Scene, camera: Camera) -> Self {
        Self {
            ctx: Context {
                gpu,
                renderer,
                scene,
                camera,
                keys: Vec::new(),
            },
        }
    }

    /// Runs until the window asks to close and returns the number of frames.
    pub fn run(&mut self, window: &mut dyn Window, game: &mut dyn Game) -> Result<usize, String> {
        let ctx = &mut self.ctx;
        game.init(ctx)?;
        info!("Frame loop started ({}x{})", window.size().0, window.size().1);

        let started = Instant::now();
        let mut last = started;
        let mut frames = 0;
        while !window.should_close() {
            let now = Instant::now();
            let dt = (now - last).as_secs_f32();
            last = now;

            ctx.keys = window.keys();
            if ctx.pressed(Key::Escape) {
                break;
            }
            game.update(ctx, dt)?;
            ctx.renderer.render(&mut ctx.gpu, &ctx.scene, &ctx.camera)?;

            let frame = Framebuffer::default_framebuffer()
                .read_image(&ctx.gpu)
                .ok_or_else(|| "The default framebuffer cannot be read".to_string())?;
            window.present(&to_argb(&frame))?;
            frames += 1;
            debug!("Presented frame {} ({:.2} ms)", frames, dt * 1000.0);
        }

        let elapsed = started.elapsed().as_secs_f32();
        if frames > 0 && elapsed > 0.0 {
            info!(
                "Rendered {} frames, average FPS: {:.1}",
                frames,
                frames as f32 / elapsed
            );
        }
        Ok(frames)
    }
}
