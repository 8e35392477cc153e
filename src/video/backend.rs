//! Codec capability traits.
//!
//! The decoder and encoder only talk to these traits, so the pipeline runs
//! unchanged against the ffmpeg backend or an in-process one.

use std::path::Path;

use image::RgbImage;

use crate::error::{DecodeError, EncodeError};
use crate::video::timing::Timestamp;
use crate::video::types::{PixelBuffer, PixelLayout, VideoAsset};

/// Sequential access to the first video track of a file
pub trait TrackReader: Send {
    /// Open the source and describe its video track
    fn open(&mut self, path: &Path) -> Result<VideoAsset, DecodeError>;

    /// Next frame in presentation order, in natural (unrotated) orientation.
    /// `Ok(None)` marks end of stream.
    fn read_next_frame(&mut self) -> Result<Option<RgbImage>, DecodeError>;

    /// Release the underlying resources. Safe to call more than once.
    fn close(&mut self);
}

/// Output stream parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriterSettings {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Target bitrate in bits per second
    pub bitrate: u32,
    /// Maximum distance between keyframes, in frames
    pub max_keyframe_interval: u32,
    pub codec: String,
    pub pixel_layout: PixelLayout,
}

/// Timestamped frame sink producing one output container
pub trait TrackWriter: Send {
    /// Create the output file
    fn open(&mut self, path: &Path, settings: &WriterSettings) -> Result<(), EncodeError>;

    /// Pixel layout `append` expects
    fn pixel_layout(&self) -> PixelLayout {
        PixelLayout::Rgba
    }

    /// Whether the writer can take another frame right now
    fn is_ready_for_more_data(&self) -> bool;

    /// Append one frame at `pts`. Returns false if the writer rejected it.
    fn append(&mut self, frame: &PixelBuffer, pts: Timestamp) -> bool;

    /// Finalize the container. Returns false if finalizing failed.
    fn finish(&mut self) -> bool;

    /// Abandon the output and remove whatever was written
    fn cancel(&mut self);
}

/// Factory for readers and writers of one codec implementation
pub trait CodecBackend: Send + Sync + 'static {
    type Reader: TrackReader + 'static;
    type Writer: TrackWriter + 'static;

    fn name(&self) -> &str;

    fn reader(&self) -> Self::Reader;

    fn writer(&self) -> Self::Writer;
}
