//! # Video Module
//!
//! Frame decoding, orientation correction, boomerang sequencing and encoding,
//! all on top of the codec capability traits in [`backend`].

pub mod backend;
pub mod decoder;
pub mod encoder;
pub mod ffmpeg;
pub mod frames_dir;
pub mod orientation;
pub mod sequence;
pub mod timing;
pub mod types;

pub use backend::{CodecBackend, TrackReader, TrackWriter, WriterSettings};
pub use decoder::FrameDecoder;
pub use encoder::FrameEncoder;
pub use ffmpeg::FfmpegBackend;
pub use frames_dir::load_frame_directory;
pub use orientation::{apply_transform, transform_for, AffineTransform, Rotation};
pub use sequence::{build_boomerang, repeat_sequence};
pub use timing::Timestamp;
pub use types::{EncodeRequest, EncodedVideo, Frame, FrameSequence, PixelBuffer, PixelLayout, VideoAsset};
