use std::path::PathBuf;
use std::sync::Arc;

use image::{ImageBuffer, Rgb, RgbImage};

use crate::video::orientation::AffineTransform;
use crate::video::timing::Timestamp;

/// Represents a single decoded video frame
///
/// Wraps an RGB image buffer together with the position the frame had in
/// its source (playback order for decoded video, sorted position for a
/// frame directory).
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    buffer: RgbImage,
    index: usize,
}

impl Frame {
    /// Create a new frame from an RGB image buffer
    pub fn new(buffer: RgbImage, index: usize) -> Self {
        Self { buffer, index }
    }

    /// Create a new frame with the given dimensions filled with the specified color
    pub fn new_filled(width: u32, height: u32, color: [u8; 3], index: usize) -> Self {
        let buffer = ImageBuffer::from_fn(width, height, |_, _| Rgb(color));
        Self { buffer, index }
    }

    pub fn width(&self) -> u32 {
        self.buffer.width()
    }

    pub fn height(&self) -> u32 {
        self.buffer.height()
    }

    /// Originating presentation index
    pub fn index(&self) -> usize {
        self.index
    }

    /// Get a pixel at the given coordinates (returns RGB array)
    pub fn get_pixel(&self, x: u32, y: u32) -> [u8; 3] {
        self.buffer.get_pixel(x, y).0
    }

    /// Get the underlying image buffer
    pub fn as_image(&self) -> &RgbImage {
        &self.buffer
    }

    /// Size of the pixel data in bytes
    pub fn byte_size(&self) -> usize {
        self.buffer.as_raw().len()
    }
}

/// Source video description, read once when decoding starts
#[derive(Debug, Clone, PartialEq)]
pub struct VideoAsset {
    pub path: PathBuf,

    /// Size of the encoded frames before any rotation (width, height)
    pub natural_size: (u32, u32),

    /// Track transform describing how frames must be rotated for display
    pub preferred_transform: AffineTransform,

    /// Duration in seconds (if known)
    pub duration: Option<f64>,
}

/// Final, fully ordered list of frames handed to the encoder
///
/// Frames are shared, so a frame that appears once per cycle is stored once.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameSequence {
    frames: Vec<Arc<Frame>>,
}

impl FrameSequence {
    pub fn new(frames: Vec<Arc<Frame>>) -> Self {
        Self { frames }
    }

    pub fn frames(&self) -> &[Arc<Frame>] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Source indices in sequence order
    pub fn indices(&self) -> Vec<usize> {
        self.frames.iter().map(|frame| frame.index()).collect()
    }
}

impl FromIterator<Arc<Frame>> for FrameSequence {
    fn from_iter<I: IntoIterator<Item = Arc<Frame>>>(iter: I) -> Self {
        Self { frames: iter.into_iter().collect() }
    }
}

/// Everything the encoder needs for one output file
#[derive(Debug, Clone)]
pub struct EncodeRequest {
    output_path: PathBuf,
    fps: u32,
    sequence: FrameSequence,
}

impl EncodeRequest {
    pub fn new<P: Into<PathBuf>>(output_path: P, fps: u32, sequence: FrameSequence) -> Self {
        Self {
            output_path: output_path.into(),
            fps,
            sequence,
        }
    }

    pub fn output_path(&self) -> &std::path::Path {
        &self.output_path
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn sequence(&self) -> &FrameSequence {
        &self.sequence
    }
}

/// Pixel arrangement a writer expects for appended frames
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PixelLayout {
    Rgb24,
    Rgba,
    Bgra,
}

impl PixelLayout {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            Self::Rgb24 => 3,
            Self::Rgba | Self::Bgra => 4,
        }
    }

    /// Name ffmpeg uses for this layout
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Self::Rgb24 => "rgb24",
            Self::Rgba => "rgba",
            Self::Bgra => "bgra",
        }
    }
}

/// One frame converted into a writer's pixel layout
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

impl PixelBuffer {
    /// Convert an RGB image into `layout`, fully opaque where alpha applies
    pub fn from_rgb(image: &RgbImage, layout: PixelLayout) -> Self {
        let data = match layout {
            PixelLayout::Rgb24 => image.as_raw().clone(),
            PixelLayout::Rgba => image
                .pixels()
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            PixelLayout::Bgra => image
                .pixels()
                .flat_map(|p| [p[2], p[1], p[0], 255])
                .collect(),
        };

        Self {
            width: image.width(),
            height: image.height(),
            layout,
            data,
        }
    }

    pub fn expected_len(&self) -> usize {
        self.width as usize * self.height as usize * self.layout.bytes_per_pixel()
    }
}

/// Result of a finished encode
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedVideo {
    pub path: PathBuf,
    pub frame_count: usize,
    pub duration: Timestamp,
}
