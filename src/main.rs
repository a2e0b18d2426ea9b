use log::{error, info};
use nalgebra::Vector4;
use scene_renderer::app::{Context, Engine, Game, HeadlessWindow, Key, Window};
use scene_renderer::core::gpu::Gpu;
use scene_renderer::core::software::SoftwareDevice;
use scene_renderer::core::tracing::{CallCounts, TracingDevice};
use scene_renderer::io::cli::{Cli, Launch};
use scene_renderer::io::image::save_image;
use scene_renderer::io::scene_loader::{Spin, build_scene};
use scene_renderer::pipeline::renderer::Renderer;

/// Spins the configured objects and maps the debug keys onto render settings.
struct Demo {
    spins: Vec<Spin>,
    paused: bool,
}

impl Game for Demo {
    fn init(&mut self, ctx: &mut Context) -> Result<(), String> {
        info!("Controls: F1=Wireframe, F2=Stats, F3=Tangent frames, Space=Pause, Esc=Quit");
        info!(
            "{} meshes, {} lights, {} spinning",
            ctx.scene.meshes().len(),
            ctx.scene.lights().count(),
            self.spins.len()
        );
        Ok(())
    }

    fn update(&mut self, ctx: &mut Context, dt: f32) -> Result<(), String> {
        let settings = &mut ctx.renderer.settings;
        if ctx.keys.contains(&Key::F1) {
            settings.wireframe = !settings.wireframe;
            info!("Wireframe: {}", settings.wireframe);
        }
        if ctx.keys.contains(&Key::F2) {
            settings.show_stats = !settings.show_stats;
        }
        if ctx.keys.contains(&Key::F3) {
            settings.debug_arrows = !settings.debug_arrows;
        }
        if ctx.keys.contains(&Key::Space) {
            self.paused = !self.paused;
        }

        if !self.paused {
            let meshes = ctx.scene.meshes_mut();
            for spin in &self.spins {
                if let Some(mesh) = meshes.get_mut(spin.mesh) {
                    mesh.object.rotate(&spin.axis, spin.speed * dt);
                }
            }
        }

        let (w, h) = (ctx.renderer.settings.width, ctx.renderer.settings.height);
        let scale = (h as f32 / 360.0).max(1.0);
        ctx.renderer.print(
            format!("{}x{}", w, h),
            8.0,
            h as f32 - 24.0 * scale,
            scale,
            Vector4::new(1.0, 1.0, 0.6, 0.8),
        );
        Ok(())
    }
}

fn create_gpu(launch: &Launch) -> (Gpu, Option<CallCounts>) {
    let render = &launch.config.render;
    let device = SoftwareDevice::new(render.window_width, render.window_height);
    if launch.trace_gpu {
        let traced = TracingDevice::new(device);
        let counts = traced.counts();
        (Gpu::new(traced), Some(counts))
    } else {
        (Gpu::new(device), None)
    }
}

#[cfg(feature = "window")]
fn run_windowed(engine: &mut Engine, demo: &mut Demo, launch: &Launch) -> Result<(), String> {
    use scene_renderer::app::MinifbWindow;

    let render = &launch.config.render;
    let mut window = MinifbWindow::new("Scene Renderer", render.window_width, render.window_height)?;
    engine.run(&mut window, demo)?;
    Ok(())
}

#[cfg(not(feature = "window"))]
fn run_windowed(engine: &mut Engine, demo: &mut Demo, launch: &Launch) -> Result<(), String> {
    log::warn!("Built without the `window` feature; rendering headless");
    run_headless(engine, demo, launch)
}

fn run_headless(engine: &mut Engine, demo: &mut Demo, launch: &Launch) -> Result<(), String> {
    let render = &launch.config.render;
    let mut window = HeadlessWindow::new(render.window_width, render.window_height, render.frames);
    let frames = engine.run(&mut window, demo)?;
    info!("Rendered {} headless frame(s) at {:?}", frames, window.size());

    let image = window
        .last_frame()
        .ok_or_else(|| "No frame was presented".to_string())?;
    save_image(&image, &render.output)
}

fn run() -> Result<(), String> {
    let launch = Cli::process()?;
    let loaded = build_scene(&launch.config, &launch.base_dir)?;

    let (mut gpu, counts) = create_gpu(&launch);
    let renderer = Renderer::new(&mut gpu, launch.config.render_settings())?;
    let mut engine = Engine::new(gpu, renderer, loaded.scene, loaded.camera);
    let mut demo = Demo {
        spins: loaded.spins,
        paused: false,
    };

    if launch.window {
        run_windowed(&mut engine, &mut demo, &launch)?;
    } else {
        run_headless(&mut engine, &mut demo, &launch)?;
    }

    info!("{}", engine.ctx.gpu.stats.summary().replace('\n', ", "));
    if let Some(counts) = counts {
        info!("{} device calls", counts.total());
        counts.log_totals();
    }
    Ok(())
}

fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .filter_module("minifb", log::LevelFilter::Warn)
        .format_timestamp(None)
        .format_level(true)
        .init();

    run().inspect_err(|e| error!("{}", e))
}
