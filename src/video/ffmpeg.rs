//! Codec backend driving the system `ffmpeg` and `ffprobe` binaries.
//!
//! Decoding streams raw `rgb24` frames out of `ffmpeg -noautorotate`, so the
//! frames arrive in sensor orientation and the rotation found by `ffprobe`
//! is applied by the orientation corrector. Encoding pipes raw frames into
//! `ffmpeg` and produces H.264 in an MP4 container.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use image::RgbImage;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::FfmpegConfig;
use crate::error::{DecodeError, EncodeError};
use crate::video::backend::{CodecBackend, TrackReader, TrackWriter, WriterSettings};
use crate::video::orientation::AffineTransform;
use crate::video::timing::Timestamp;
use crate::video::types::{PixelBuffer, PixelLayout, VideoAsset};

/// Backend using external ffmpeg processes
#[derive(Debug, Clone)]
pub struct FfmpegBackend {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegBackend {
    pub fn new(config: &FfmpegConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg_path.clone(),
            ffprobe: config.ffprobe_path.clone(),
        }
    }

    pub fn check_ffmpeg_available(&self) -> bool {
        Command::new(&self.ffmpeg)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|status| status.success())
            .unwrap_or(false)
    }
}

impl Default for FfmpegBackend {
    fn default() -> Self {
        Self::new(&FfmpegConfig::default())
    }
}

impl CodecBackend for FfmpegBackend {
    type Reader = FfmpegReader;
    type Writer = FfmpegWriter;

    fn name(&self) -> &str {
        "ffmpeg"
    }

    fn reader(&self) -> FfmpegReader {
        FfmpegReader {
            ffmpeg: self.ffmpeg.clone(),
            ffprobe: self.ffprobe.clone(),
            child: None,
            stdout: None,
            stderr: StderrDrain::default(),
            frame_size: (0, 0),
            frames_read: 0,
        }
    }

    fn writer(&self) -> FfmpegWriter {
        FfmpegWriter {
            ffmpeg: self.ffmpeg.clone(),
            child: None,
            stdin: None,
            stderr: StderrDrain::default(),
            out_path: None,
            fps: 0,
            frames_written: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// stderr

/// Bytes of ffmpeg diagnostics kept for error reporting
const STDERR_TAIL: usize = 8 * 1024;

/// Reads a child's stderr on a helper thread so ffmpeg never blocks on a
/// full pipe. Only the last `STDERR_TAIL` bytes are kept.
#[derive(Default)]
struct StderrDrain(Option<JoinHandle<Vec<u8>>>);

impl StderrDrain {
    fn spawn(child: &mut Child) -> Self {
        let handle = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut tail = Vec::new();
                let mut chunk = [0u8; 4096];
                loop {
                    match stderr.read(&mut chunk) {
                        Ok(0) => break,
                        Ok(n) => {
                            tail.extend_from_slice(&chunk[..n]);
                            if tail.len() > STDERR_TAIL {
                                let excess = tail.len() - STDERR_TAIL;
                                tail.drain(..excess);
                            }
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                        Err(_) => break,
                    }
                }
                tail
            })
        });
        Self(handle)
    }

    /// Wait for the pipe to close and return what was collected.
    /// Call after the child has exited.
    fn collect(&mut self) -> String {
        self.0
            .take()
            .and_then(|handle| handle.join().ok())
            .map(|tail| String::from_utf8_lossy(&tail).trim().to_string())
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// ffprobe

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    duration: Option<String>,
    #[serde(default)]
    tags: HashMap<String, String>,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Clockwise display rotation in degrees.
    ///
    /// The display matrix side data reports counter-clockwise degrees, the
    /// legacy `rotate` tag reports clockwise degrees.
    fn clockwise_rotation(&self) -> i64 {
        if let Some(rotation) = self.side_data_list.iter().find_map(|sd| sd.rotation) {
            return -(rotation.round() as i64);
        }
        self.tags
            .get("rotate")
            .and_then(|r| r.trim().parse::<i64>().ok())
            .unwrap_or(0)
    }
}

fn parse_probe(path: &Path, json: &[u8]) -> Result<VideoAsset, DecodeError> {
    let probe: ProbeOutput = serde_json::from_slice(json).map_err(|e| DecodeError::ReaderCreationFailed {
        path: path.display().to_string(),
        reason: format!("invalid ffprobe output: {}", e),
    })?;

    let stream = probe
        .streams
        .into_iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or_else(|| DecodeError::NoVideoTrack { path: path.display().to_string() })?;

    let natural_size = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(DecodeError::NoVideoTrack { path: path.display().to_string() }),
    };

    Ok(VideoAsset {
        path: path.to_path_buf(),
        natural_size,
        preferred_transform: AffineTransform::from_clockwise_degrees(stream.clockwise_rotation(), natural_size),
        duration: stream.duration.as_deref().and_then(|d| d.parse().ok()),
    })
}

// ---------------------------------------------------------------------------
// Reader

pub struct FfmpegReader {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    stderr: StderrDrain,
    frame_size: (u32, u32),
    frames_read: usize,
}

impl FfmpegReader {
    fn probe(&self, path: &Path) -> Result<VideoAsset, DecodeError> {
        let output = Command::new(&self.ffprobe)
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path)
            .output()
            .map_err(|e| DecodeError::ReaderCreationFailed {
                path: path.display().to_string(),
                reason: format!("failed to run ffprobe: {}", e),
            })?;

        if !output.status.success() {
            return Err(DecodeError::ReaderCreationFailed {
                path: path.display().to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        parse_probe(path, &output.stdout)
    }

    fn read_failure(&self, reason: String) -> DecodeError {
        DecodeError::ReadFailure { frames_read: self.frames_read, reason }
    }

    /// Reap the process at end of stream; a non-zero exit is a read failure.
    fn finish_stream(&mut self) -> Result<(), DecodeError> {
        self.stdout = None;
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let status = child
            .wait()
            .map_err(|e| self.read_failure(format!("failed to wait for ffmpeg: {}", e)))?;
        let diagnostics = self.stderr.collect();
        if !status.success() {
            return Err(self.read_failure(format!("ffmpeg exited with {}: {}", status, diagnostics)));
        }
        if !diagnostics.is_empty() {
            debug!("ffmpeg decoder diagnostics: {}", diagnostics);
        }
        Ok(())
    }
}

impl TrackReader for FfmpegReader {
    fn open(&mut self, path: &Path) -> Result<VideoAsset, DecodeError> {
        let asset = self.probe(path)?;

        let mut child = Command::new(&self.ffmpeg)
            .args(["-v", "error", "-nostdin", "-noautorotate", "-i"])
            .arg(path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| DecodeError::ReaderCreationFailed {
                path: path.display().to_string(),
                reason: format!("failed to spawn ffmpeg: {}", e),
            })?;

        let stdout = child.stdout.take().ok_or_else(|| DecodeError::ReaderCreationFailed {
            path: path.display().to_string(),
            reason: "failed to open ffmpeg stdout".to_string(),
        })?;

        debug!("Spawned ffmpeg decoder for {:?}", path);
        self.stderr = StderrDrain::spawn(&mut child);
        self.frame_size = asset.natural_size;
        self.frames_read = 0;
        self.child = Some(child);
        self.stdout = Some(stdout);
        Ok(asset)
    }

    fn read_next_frame(&mut self) -> Result<Option<RgbImage>, DecodeError> {
        let Some(stdout) = self.stdout.as_mut() else {
            return Ok(None);
        };

        let (width, height) = self.frame_size;
        let mut data = vec![0u8; width as usize * height as usize * 3];
        let mut filled = 0;
        while filled < data.len() {
            match stdout.read(&mut data[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(self.read_failure(e.to_string())),
            }
        }

        if filled == 0 {
            self.finish_stream()?;
            return Ok(None);
        }
        if filled < data.len() {
            return Err(self.read_failure(format!(
                "truncated frame: {} of {} bytes",
                filled,
                data.len()
            )));
        }

        self.frames_read += 1;
        RgbImage::from_raw(width, height, data)
            .map(Some)
            .ok_or_else(|| self.read_failure("frame buffer size mismatch".to_string()))
    }

    fn close(&mut self) {
        self.stdout = None;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.stderr.collect();
    }
}

impl Drop for FfmpegReader {
    fn drop(&mut self) {
        self.close();
    }
}

// ---------------------------------------------------------------------------
// Writer

pub struct FfmpegWriter {
    ffmpeg: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stderr: StderrDrain,
    out_path: Option<PathBuf>,
    fps: u32,
    frames_written: usize,
}

fn writer_args(settings: &WriterSettings) -> Vec<String> {
    let mut args: Vec<String> = [
        "-y", "-loglevel", "error", "-f", "rawvideo", "-pix_fmt",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect();

    args.push(settings.pixel_layout.ffmpeg_name().to_string());
    args.extend([
        "-s".to_string(),
        format!("{}x{}", settings.width, settings.height),
        "-r".to_string(),
        settings.fps.to_string(),
        "-i".to_string(),
        "pipe:0".to_string(),
        "-an".to_string(),
        // yuv420p needs even dimensions
        "-vf".to_string(),
        "scale=trunc(iw/2)*2:trunc(ih/2)*2".to_string(),
        "-c:v".to_string(),
        settings.codec.clone(),
        "-b:v".to_string(),
        settings.bitrate.to_string(),
        "-g".to_string(),
        settings.max_keyframe_interval.to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        "-f".to_string(),
        "mp4".to_string(),
    ]);
    args
}

impl TrackWriter for FfmpegWriter {
    fn open(&mut self, path: &Path, settings: &WriterSettings) -> Result<(), EncodeError> {
        let unavailable = |reason: String| EncodeError::WriterUnavailable {
            path: path.display().to_string(),
            reason,
        };

        if settings.width == 0 || settings.height == 0 || settings.fps == 0 {
            return Err(unavailable(format!(
                "invalid stream {}x{} @ {} fps",
                settings.width, settings.height, settings.fps
            )));
        }

        let mut child = Command::new(&self.ffmpeg)
            .args(writer_args(settings))
            .arg(path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| unavailable(format!("failed to spawn ffmpeg (is it installed and on PATH?): {}", e)))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| unavailable("failed to open ffmpeg stdin".to_string()))?;

        debug!("Spawned ffmpeg encoder for {:?}", path);
        self.stderr = StderrDrain::spawn(&mut child);
        self.child = Some(child);
        self.stdin = Some(stdin);
        self.out_path = Some(path.to_path_buf());
        self.fps = settings.fps;
        self.frames_written = 0;
        Ok(())
    }

    fn pixel_layout(&self) -> PixelLayout {
        PixelLayout::Rgba
    }

    fn is_ready_for_more_data(&self) -> bool {
        // Pipe writes block while ffmpeg is busy, which is the pacing we want.
        true
    }

    fn append(&mut self, frame: &PixelBuffer, pts: Timestamp) -> bool {
        // rawvideo input at a fixed rate: frame n is shown at n/fps, so only
        // the next contiguous timestamp can be honoured.
        let expected = Timestamp::for_frame(self.frames_written, self.fps);
        if pts != expected {
            warn!("Out of sequence timestamp {} (expected {})", pts, expected);
            return false;
        }
        if frame.data.len() != frame.expected_len() || frame.layout != PixelLayout::Rgba {
            warn!("Frame buffer does not match the negotiated layout");
            return false;
        }

        let Some(stdin) = self.stdin.as_mut() else {
            return false;
        };
        if let Err(e) = stdin.write_all(&frame.data) {
            warn!("Failed to write frame to ffmpeg stdin: {}", e);
            return false;
        }
        self.frames_written += 1;
        true
    }

    fn finish(&mut self) -> bool {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return false;
        };

        let status = child.wait();
        let diagnostics = self.stderr.collect();
        match status {
            Ok(status) if status.success() => true,
            Ok(status) => {
                warn!("ffmpeg exited with {}: {}", status, diagnostics);
                false
            }
            Err(e) => {
                warn!("Failed to wait for ffmpeg to finish: {}", e);
                false
            }
        }
    }

    fn cancel(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
        self.stderr.collect();
        if let Some(path) = self.out_path.take() {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!("Failed to remove partial output {:?}: {}", path, e);
                }
            }
        }
    }
}

impl Drop for FfmpegWriter {
    fn drop(&mut self) {
        if self.child.is_some() {
            self.cancel();
        }
    }
}
