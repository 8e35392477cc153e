use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for boomerang-forge
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Defaults for both pipeline entry points
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Output writer settings
    #[serde(default)]
    pub encoder: EncoderConfig,

    /// Location of the external codec binaries
    #[serde(default)]
    pub ffmpeg: FfmpegConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content).map_err(|e| crate::BoomerangError::io(path, e))?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.encoder.validate()?;
        Ok(())
    }
}

/// Default loop count and frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of forward+reverse cycles in the output
    pub loop_count: u32,

    /// Output frame rate
    pub fps: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self { loop_count: 3, fps: 30 }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<()> {
        if self.loop_count == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.loop_count".to_string(),
                value: self.loop_count.to_string()
            }.into());
        }

        if self.fps == 0 {
            return Err(ConfigError::InvalidValue {
                key: "pipeline.fps".to_string(),
                value: self.fps.to_string()
            }.into());
        }

        Ok(())
    }
}

/// Writer configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncoderConfig {
    /// Target bitrate in bits per second
    pub bitrate: u32,

    /// Encoder name handed to the backend
    pub codec: String,

    /// Sleep between polls while the writer is not ready for more data
    pub readiness_poll_ms: u64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            bitrate: 6_000_000,
            codec: "libx264".to_string(),
            readiness_poll_ms: 5,
        }
    }
}

impl EncoderConfig {
    fn validate(&self) -> Result<()> {
        if self.bitrate == 0 {
            return Err(ConfigError::InvalidValue {
                key: "encoder.bitrate".to_string(),
                value: self.bitrate.to_string()
            }.into());
        }

        if self.codec.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "encoder.codec".to_string(),
                value: self.codec.clone()
            }.into());
        }

        Ok(())
    }

    pub fn readiness_poll(&self) -> Duration {
        Duration::from_millis(self.readiness_poll_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FfmpegConfig {
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
}

impl Default for FfmpegConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
        }
    }
}
