use crate::io::config::Config;
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};

/// Command line of the demo binary.
#[derive(Parser, Debug)]
#[command(name = "scene-renderer")]
#[command(about = "Forward scene renderer with per-light shadow maps")]
pub struct Cli {
    /// Scene description (TOML)
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<String>,

    /// PNG written after the last headless frame
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<String>,

    /// Number of headless frames to render
    #[arg(short, long)]
    pub frames: Option<usize>,

    /// Draw triangle edges only
    #[arg(long)]
    pub wireframe: bool,

    /// Show frame statistics as overlay text
    #[arg(long)]
    pub stats: bool,

    /// Count and log every device call
    #[arg(long)]
    pub trace_gpu: bool,

    /// Open a window instead of rendering headless
    #[arg(long)]
    pub window: bool,
}

/// Resolved launch parameters.
#[derive(Debug)]
pub struct Launch {
    pub config: Config,
    /// Directory relative asset paths are resolved against.
    pub base_dir: PathBuf,
    pub trace_gpu: bool,
    pub window: bool,
}

impl Cli {
    pub fn process() -> Result<Launch, String> {
        Self::parse().resolve()
    }

    /// Loads the configuration file and applies command-line overrides.
    pub fn resolve(self) -> Result<Launch, String> {
        let (mut config, base_dir) = match &self.config {
            Some(path) => {
                info!("Loading config: {}", path);
                let config =
                    Config::load(path).map_err(|e| format!("Config file {}: {}", path, e))?;
                let base = Path::new(path)
                    .parent()
                    .map(Path::to_path_buf)
                    .unwrap_or_default();
                (config, base)
            }
            None => {
                info!("No config given, using defaults");
                (Config::default(), PathBuf::from("."))
            }
        };

        if let Some(output) = self.output {
            config.render.output = output;
        }
        if let Some(frames) = self.frames {
            config.render.frames = frames.max(1);
        }
        config.render.wireframe |= self.wireframe;
        config.render.show_stats |= self.stats;

        Ok(Launch {
            config,
            base_dir,
            trace_gpu: self.trace_gpu,
            window: self.window,
        })
    }
}
