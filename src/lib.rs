//! # Boomerang-Forge
//!
//! Turn a short video clip into a forward-then-reverse "boomerang" loop.
//!
//! The pipeline decodes the source into upright frames, orders them as a
//! boomerang repeated a configurable number of times and re-encodes the result
//! as H.264 in an MP4 container, all off the caller's task.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use boomerang_forge::{
//!     config::Config,
//!     pipeline::{BoomerangCoordinator, BoomerangOptions},
//!     video::FfmpegBackend,
//! };
//!
//! # #[tokio::main]
//! # async fn main() -> anyhow::Result<()> {
//! let config = Config::default();
//! let backend = FfmpegBackend::new(&config.ffmpeg);
//! let coordinator = BoomerangCoordinator::new(backend, config);
//!
//! let job = coordinator.create_boomerang("clip.mov", "boomerang.mp4", BoomerangOptions::default())?;
//! let output = job.wait().await?;
//! println!("Boomerang saved to {}", output.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`video`] - Decoding, orientation, sequencing and encoding
//! - [`pipeline`] - Job coordination and lifecycle
//! - [`config`] - Configuration management
//! - [`error`] - Error taxonomy
//!
//! ## Custom Codec Backends
//!
//! Decoding and encoding go through [`TrackReader`](video::TrackReader) and
//! [`TrackWriter`](video::TrackWriter); implement
//! [`CodecBackend`](video::CodecBackend) to plug in something other than ffmpeg.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    config::Config,
    error::{BoomerangError, ErrorKind, Result},
    pipeline::{BoomerangCoordinator, BoomerangJob, BoomerangOptions, PipelineState},
    video::FfmpegBackend,
};
