use std::{
    path::{Path, PathBuf},
    thread,
    time::Duration,
};

use clap::{Args, Parser, Subcommand};
use psy_visualiser_core::{
    CoverShape, Palette, RenderConfig, RenderManager, RenderOutcome, Resolution, RingShape,
    RotationAxis, StarfieldRotation, VisualizerError,
};
use tracing_subscriber::EnvFilter;

const PROGRESS_POLL: Duration = Duration::from_millis(500);

fn main() -> psy_visualiser_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Render { audio, options } => run_render(&audio, &options),
        Commands::Still {
            audio,
            frame,
            options,
        } => run_still(&audio, frame, &options),
        Commands::Config { options } => {
            println!("{}", options.build_config()?.to_json()?);
            Ok(())
        }
    }
}

fn run_render(audio: &Path, options: &RenderArgs) -> psy_visualiser_core::Result<()> {
    ensure_audio_exists(audio)?;
    let config = options.build_config()?;
    let output = options
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("visualization.mp4"));
    tracing::info!(
        audio = %audio.display(),
        output = %output.display(),
        palette = %config.palette,
        resolution = %config.resolution,
        fps = config.fps,
        preview = ?config.preview_seconds,
        "starting render"
    );

    let manager = RenderManager::new();
    let handle = manager.spawn_render(audio.to_path_buf(), output, config)?;

    let mut last_reported = 0;
    while !handle.is_finished() {
        thread::sleep(PROGRESS_POLL);
        let progress = handle.progress();
        let percent = (progress.fraction() * 100.0) as u32;
        if progress.total > 0 && percent / 10 > last_reported / 10 {
            tracing::info!(frame = progress.frame, total = progress.total, "{percent}% rendered");
            last_reported = percent;
        }
    }

    match handle.join()? {
        RenderOutcome::Complete { path, frames } => {
            tracing::info!(path = %path.display(), frames, "video saved");
        }
        RenderOutcome::SilentOnly { path, reason } => {
            tracing::warn!(path = %path.display(), %reason, "video saved without audio");
        }
    }
    Ok(())
}

fn run_still(
    audio: &Path,
    frame: Option<usize>,
    options: &RenderArgs,
) -> psy_visualiser_core::Result<()> {
    ensure_audio_exists(audio)?;
    let config = options.build_config()?;
    let output = options
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from("frame.png"));

    let image = RenderManager::new().render_still(audio, &config, frame)?;
    image.save(&output)?;
    tracing::info!(path = %output.display(), "still frame saved");
    Ok(())
}

fn ensure_audio_exists(audio: &Path) -> psy_visualiser_core::Result<()> {
    if audio.exists() {
        Ok(())
    } else {
        Err(VisualizerError::msg(format!(
            "audio file not found: {}",
            audio.display()
        )))
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Psychedelic music video generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render a music video from an audio file.
    Render {
        /// Audio file (wav is read directly, anything else through ffmpeg).
        audio: PathBuf,
        #[command(flatten)]
        options: RenderArgs,
    },
    /// Render a single frame to a PNG to check settings quickly.
    Still {
        audio: PathBuf,
        /// Frame index to render (default: middle of the track).
        #[arg(long)]
        frame: Option<usize>,
        #[command(flatten)]
        options: RenderArgs,
    },
    /// Print the effective configuration as JSON.
    Config {
        #[command(flatten)]
        options: RenderArgs,
    },
}

/// Flags shared by every subcommand; each overrides the `--config` file.
#[derive(Args, Debug)]
struct RenderArgs {
    /// Output path (default: visualization.mp4, or frame.png for `still`).
    #[arg(short, long)]
    output: Option<PathBuf>,
    /// Cover image shown at the centre.
    #[arg(short, long)]
    cover: Option<PathBuf>,
    /// Caption shown below the cover.
    #[arg(short, long)]
    text: Option<String>,
    /// rainbow, spring, summer, autumn, winter, ice, fire, water or earth.
    #[arg(short, long)]
    palette: Option<Palette>,
    #[arg(long)]
    fps: Option<u32>,
    /// Custom resolution as WIDTHxHEIGHT.
    #[arg(long, conflicts_with_all = ["phone_vertical", "phone_horizontal"])]
    resolution: Option<Resolution>,
    /// 1080x1920.
    #[arg(long, conflicts_with = "phone_horizontal")]
    phone_vertical: bool,
    /// 1920x1080.
    #[arg(long)]
    phone_horizontal: bool,
    /// none, x, y or z.
    #[arg(long)]
    waveform_rotation: Option<RotationAxis>,
    /// none, x, y or z.
    #[arg(long)]
    ring_rotation: Option<RotationAxis>,
    /// circle or square.
    #[arg(long)]
    ring_shape: Option<RingShape>,
    /// none, cw or ccw.
    #[arg(long)]
    starfield_rotation: Option<StarfieldRotation>,
    /// Render only the first SECONDS at half resolution and reduced quality.
    #[arg(long, value_name = "SECONDS")]
    preview: Option<f32>,
    /// square or round.
    #[arg(long)]
    cover_shape: Option<CoverShape>,
    /// Cover size multiplier.
    #[arg(long)]
    cover_size: Option<f32>,
    #[arg(long)]
    disable_rings: bool,
    #[arg(long)]
    disable_starfield: bool,
    /// Seed for the starfield particles.
    #[arg(long)]
    seed: Option<u64>,
    /// JSON configuration file to start from.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl RenderArgs {
    fn build_config(&self) -> psy_visualiser_core::Result<RenderConfig> {
        let mut config = match &self.config {
            Some(path) => RenderConfig::load(path)?,
            None => RenderConfig::default(),
        };

        if self.phone_vertical {
            config.resolution = Resolution::PHONE_VERTICAL;
        } else if self.phone_horizontal {
            config.resolution = Resolution::PHONE_HORIZONTAL;
        } else if let Some(resolution) = self.resolution {
            config.resolution = resolution;
        }

        if let Some(cover) = &self.cover {
            config.cover_path = Some(cover.clone());
        }
        if let Some(text) = &self.text {
            config.text = Some(text.clone());
        }
        if let Some(palette) = self.palette {
            config.palette = palette;
        }
        if let Some(fps) = self.fps {
            config.fps = fps;
        }
        if let Some(axis) = self.waveform_rotation {
            config.waveform_rotation = axis;
        }
        if let Some(axis) = self.ring_rotation {
            config.ring_rotation = axis;
        }
        if let Some(shape) = self.ring_shape {
            config.ring_shape = shape;
        }
        if let Some(rotation) = self.starfield_rotation {
            config.starfield_rotation = rotation;
        }
        if let Some(seconds) = self.preview {
            config.preview_seconds = Some(seconds);
        }
        if let Some(shape) = self.cover_shape {
            config.cover_shape = shape;
        }
        if let Some(size) = self.cover_size {
            config.cover_size = size;
        }
        if let Some(seed) = self.seed {
            config.star_seed = seed;
        }
        config.disable_rings |= self.disable_rings;
        config.disable_starfield |= self.disable_starfield;

        config.validate()?;
        Ok(config)
    }
}
