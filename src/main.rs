use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, Level};

use boomerang_forge::{
    config::Config,
    pipeline::{BoomerangCoordinator, BoomerangOptions},
    video::FfmpegBackend,
};

#[derive(Parser)]
#[command(
    name = "boomerang-forge",
    version,
    about = "Turn short video clips into boomerang loops",
    long_about = "Boomerang-Forge decodes a clip, plays it forward then backward a number of times and encodes the result as an H.264 MP4."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Configuration file (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Build a boomerang from a video file
    Video {
        /// Source video (MP4, MOV, ...)
        #[arg(short, long)]
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },

    /// Encode a directory of pre-ordered frame images
    Frames {
        /// Directory of frame images, sorted by file name
        #[arg(short, long)]
        dir: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct OutputArgs {
    /// Output video file path
    #[arg(short, long)]
    output: PathBuf,

    /// Number of loops (defaults to the configuration)
    #[arg(short, long)]
    loops: Option<u32>,

    /// Output frame rate (defaults to the configuration)
    #[arg(short, long)]
    fps: Option<u32>,
}

impl OutputArgs {
    fn options(&self, defaults: BoomerangOptions) -> BoomerangOptions {
        BoomerangOptions {
            loop_count: self.loops.unwrap_or(defaults.loop_count),
            fps: self.fps.unwrap_or(defaults.fps),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .init();

    info!("Starting Boomerang-Forge v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let config = match cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(&config_path)?
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };

    let backend = FfmpegBackend::new(&config.ffmpeg);
    if !backend.check_ffmpeg_available() {
        anyhow::bail!("ffmpeg not found at {:?}. Please install FFmpeg.", config.ffmpeg.ffmpeg_path);
    }

    let coordinator = BoomerangCoordinator::new(backend, config);
    let defaults = coordinator.default_options();

    let job = match &cli.command {
        Command::Video { input, output } => {
            info!("Input: {:?}", input);
            coordinator.create_boomerang(input, &output.output, output.options(defaults))?
        }
        Command::Frames { dir, output } => {
            info!("Frames: {:?}", dir);
            coordinator.create_boomerang_from_frames(dir, &output.output, output.options(defaults))?
        }
    };

    match job.wait().await {
        Ok(path) => {
            info!("Boomerang complete! Output saved to: {:?}", path);
            Ok(())
        }
        Err(e) => {
            error!("{}", e.user_message());
            Err(e.into())
        }
    }
}
