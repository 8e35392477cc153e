use thiserror::Error;

use crate::pipeline::PipelineState;

/// Main error type for boomerang-forge
#[derive(Error, Debug)]
pub enum BoomerangError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    #[error("Pipeline error: {0}")]
    Generic(#[from] GenericError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Failures while turning a source video into frames
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("No decodable video track in {path}")]
    NoVideoTrack { path: String },

    #[error("Could not create a reader for {path}: {reason}")]
    ReaderCreationFailed { path: String, reason: String },

    #[error("Reading frames failed after {frames_read} frames: {reason}")]
    ReadFailure { frames_read: usize, reason: String },
}

/// Failures while writing frames into the output container
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("Video writer unavailable for {path}: {reason}")]
    WriterUnavailable { path: String, reason: String },

    #[error("No frames to encode")]
    NoFrames,

    #[error("Writer rejected frame {index}")]
    AppendFailed { index: usize },

    #[error("Finalizing {path} failed")]
    FinalizeFailed { path: String },
}

/// Failures that belong to no single codec stage
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenericError {
    #[error("No frame images found in directory: {path}")]
    EmptyFrameDirectory { path: String },

    #[error("File I/O failed for {path}: {reason}")]
    FileIOFailure { path: String, reason: String },

    #[error("A boomerang job is already in state {state}")]
    Busy { state: PipelineState },

    #[error("Boomerang job was cancelled")]
    Cancelled,

    #[error("Background task failed: {reason}")]
    TaskFailed { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Stable, data-free error identifiers handed to the surrounding editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NoVideoTrack,
    ReaderCreationFailed,
    ReadFailure,
    WriterUnavailable,
    NoFrames,
    AppendFailed,
    FinalizeFailed,
    EmptyFrameDirectory,
    FileIOFailure,
    Busy,
    Cancelled,
    TaskFailed,
    InvalidConfig,
}

/// Convenience type alias for Results using BoomerangError
pub type Result<T> = std::result::Result<T, BoomerangError>;

impl BoomerangError {
    /// Collapse the error into its boundary identifier
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Decode(DecodeError::NoVideoTrack { .. }) => ErrorKind::NoVideoTrack,
            Self::Decode(DecodeError::ReaderCreationFailed { .. }) => ErrorKind::ReaderCreationFailed,
            Self::Decode(DecodeError::ReadFailure { .. }) => ErrorKind::ReadFailure,
            Self::Encode(EncodeError::WriterUnavailable { .. }) => ErrorKind::WriterUnavailable,
            Self::Encode(EncodeError::NoFrames) => ErrorKind::NoFrames,
            Self::Encode(EncodeError::AppendFailed { .. }) => ErrorKind::AppendFailed,
            Self::Encode(EncodeError::FinalizeFailed { .. }) => ErrorKind::FinalizeFailed,
            Self::Generic(GenericError::EmptyFrameDirectory { .. }) => ErrorKind::EmptyFrameDirectory,
            Self::Generic(GenericError::FileIOFailure { .. }) => ErrorKind::FileIOFailure,
            Self::Generic(GenericError::Busy { .. }) => ErrorKind::Busy,
            Self::Generic(GenericError::Cancelled) => ErrorKind::Cancelled,
            Self::Generic(GenericError::TaskFailed { .. }) => ErrorKind::TaskFailed,
            Self::Config(_) => ErrorKind::InvalidConfig,
        }
    }

    /// Wrap an I/O failure on `path`
    pub fn io<P: AsRef<std::path::Path>>(path: P, err: std::io::Error) -> Self {
        GenericError::FileIOFailure {
            path: path.as_ref().display().to_string(),
            reason: err.to_string(),
        }
        .into()
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Decode(DecodeError::NoVideoTrack { path }) => {
                format!("'{}' does not contain a playable video track.", path)
            }
            Self::Generic(GenericError::EmptyFrameDirectory { path }) => {
                format!("No frame images were found in '{}'.", path)
            }
            Self::Generic(GenericError::Busy { .. }) => {
                "A boomerang is already being created. Please wait for it to finish.".to_string()
            }
            Self::Encode(EncodeError::WriterUnavailable { path, .. }) => {
                format!("Could not create the output video '{}'. Is ffmpeg installed?", path)
            }
            _ => self.to_string(),
        }
    }
}
