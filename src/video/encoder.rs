use std::path::PathBuf;
use std::time::Duration;

use image::imageops::FilterType;
use tracing::{debug, info, warn};

use crate::config::EncoderConfig;
use crate::error::EncodeError;
use crate::video::backend::{TrackWriter, WriterSettings};
use crate::video::timing::Timestamp;
use crate::video::types::{EncodeRequest, EncodedVideo, Frame, PixelBuffer};

/// Writes an ordered frame sequence into a video file
pub struct FrameEncoder<W: TrackWriter> {
    writer: W,
    bitrate: u32,
    codec: String,
    readiness_poll: Duration,
}

impl<W: TrackWriter> FrameEncoder<W> {
    pub fn new(writer: W, config: &EncoderConfig) -> Self {
        Self {
            writer,
            bitrate: config.bitrate,
            codec: config.codec.clone(),
            readiness_poll: config.readiness_poll(),
        }
    }

    /// Encode `request`, returning the output path on success.
    ///
    /// Frame `i` is stamped exactly `i / fps`. The output takes the size of the
    /// first frame; later frames of a different size are resized to match.
    pub fn encode(mut self, request: &EncodeRequest) -> Result<EncodedVideo, EncodeError> {
        let frames = request.sequence().frames();
        let first = frames.first().ok_or(EncodeError::NoFrames)?;

        let fps = request.fps();
        let output_path = request.output_path().to_path_buf();
        if fps == 0 {
            return Err(EncodeError::WriterUnavailable {
                path: output_path.display().to_string(),
                reason: "frame rate must be at least 1 fps".to_string(),
            });
        }
        let settings = WriterSettings {
            width: first.width(),
            height: first.height(),
            fps,
            bitrate: self.bitrate,
            max_keyframe_interval: fps,
            codec: self.codec.clone(),
            pixel_layout: self.writer.pixel_layout(),
        };

        debug!("Opening writer for {:?} with {:?}", output_path, settings);
        self.writer.open(&output_path, &settings)?;

        let mut next = 0;
        while next < frames.len() {
            // Let the writer's own buffering set the pace.
            if !self.writer.is_ready_for_more_data() {
                std::thread::sleep(self.readiness_poll);
                continue;
            }

            let buffer = self.convert(&frames[next], &settings);
            let pts = Timestamp::for_frame(next, fps);
            if !self.writer.append(&buffer, pts) {
                warn!("Writer rejected frame {} at {}", next, pts);
                self.writer.cancel();
                return Err(EncodeError::AppendFailed { index: next });
            }
            next += 1;
        }

        if !self.writer.finish() {
            return Err(EncodeError::FinalizeFailed { path: output_path.display().to_string() });
        }

        let encoded = EncodedVideo {
            path: output_path,
            frame_count: frames.len(),
            duration: Timestamp::for_frame(frames.len(), fps),
        };
        info!(
            "Encoded {} frames at {} fps ({:.2}s) into {:?}",
            encoded.frame_count,
            fps,
            encoded.duration.as_secs_f64(),
            encoded.path
        );
        Ok(encoded)
    }

    fn convert(&self, frame: &Frame, settings: &WriterSettings) -> PixelBuffer {
        if frame.width() == settings.width && frame.height() == settings.height {
            return PixelBuffer::from_rgb(frame.as_image(), settings.pixel_layout);
        }

        debug!(
            "Resizing frame {} from {}x{} to {}x{}",
            frame.index(),
            frame.width(),
            frame.height(),
            settings.width,
            settings.height
        );
        let resized = image::imageops::resize(
            frame.as_image(),
            settings.width,
            settings.height,
            FilterType::Lanczos3,
        );
        PixelBuffer::from_rgb(&resized, settings.pixel_layout)
    }
}

/// Encode `request` with a fresh writer from `writer`.
pub fn encode<W: TrackWriter>(
    writer: W,
    request: &EncodeRequest,
    config: &EncoderConfig,
) -> Result<PathBuf, EncodeError> {
    FrameEncoder::new(writer, config).encode(request).map(|encoded| encoded.path)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::video::backend::memory::MemoryBackend;
    use crate::video::backend::CodecBackend;
    use crate::video::sequence::repeat_sequence;
    use crate::video::types::FrameSequence;
    use tempfile::tempdir;

    fn frames(n: usize) -> Vec<Arc<Frame>> {
        (0..n)
            .map(|i| Arc::new(Frame::new_filled(4, 2, [i as u8, 0, 0], i)))
            .collect()
    }

    #[test]
    fn test_empty_sequence_fails_before_opening_writer() {
        let backend = MemoryBackend::default();
        let request = EncodeRequest::new("/tmp/never.mp4", 30, FrameSequence::default());

        let err = encode(backend.writer(), &request, &EncoderConfig::default()).unwrap_err();
        assert_eq!(err, EncodeError::NoFrames);
        assert!(backend.state.lock().unwrap().settings.is_none());
    }

    #[test]
    fn test_zero_fps_fails_before_opening_writer() {
        let backend = MemoryBackend::default();
        let request = EncodeRequest::new("/tmp/never.mp4", 0, repeat_sequence(&frames(1), 1));

        let err = encode(backend.writer(), &request, &EncoderConfig::default()).unwrap_err();
        assert!(matches!(err, EncodeError::WriterUnavailable { .. }));
        assert!(backend.state.lock().unwrap().settings.is_none());
    }

    #[test]
    fn test_timestamps_are_index_over_fps() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("out.mp4");
        let backend = MemoryBackend::default();
        let request = EncodeRequest::new(&out, 30, repeat_sequence(&frames(10), 2));

        let path = encode(backend.writer(), &request, &EncoderConfig::default()).unwrap();
        assert_eq!(path, out);

        let written = backend.written(&out);
        assert_eq!(written.len(), 20);
        for (i, frame) in written.iter().enumerate() {
            assert_eq!(frame.pts, Timestamp::new(i as i64, 30));
            assert_eq!(frame.red, (i % 10) as u8);
        }
    }

    #[test]
    fn test_writer_settings() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::default();
        let request = EncodeRequest::new(dir.path().join("a.mp4"), 24, repeat_sequence(&frames(3), 1));

        encode(backend.writer(), &request, &EncoderConfig::default()).unwrap();

        let settings = backend.state.lock().unwrap().settings.clone().unwrap();
        assert_eq!(settings.max_keyframe_interval, 24);
        assert_eq!(settings.bitrate, EncoderConfig::default().bitrate);
        assert_eq!((settings.width, settings.height), (4, 2));
    }

    #[test]
    fn test_waits_for_writer_readiness() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("slow.mp4");
        let backend = MemoryBackend::default();
        backend.state.lock().unwrap().busy_polls = 3;
        let config = EncoderConfig { readiness_poll_ms: 0, ..EncoderConfig::default() };
        let request = EncodeRequest::new(&out, 30, repeat_sequence(&frames(5), 1));

        encode(backend.writer(), &request, &config).unwrap();
        assert_eq!(backend.written(&out).len(), 5);
    }

    #[test]
    fn test_mismatched_frames_are_resized() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("mixed.mp4");
        let backend = MemoryBackend::default();
        let mixed = FrameSequence::new(vec![
            Arc::new(Frame::new_filled(4, 2, [1, 0, 0], 0)),
            Arc::new(Frame::new_filled(8, 8, [2, 0, 0], 1)),
        ]);

        encode(backend.writer(), &EncodeRequest::new(&out, 30, mixed), &EncoderConfig::default()).unwrap();
        assert!(backend.written(&out).iter().all(|f| (f.width, f.height) == (4, 2)));
    }

    #[test]
    fn test_rejected_append_cancels_output() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("rejected.mp4");
        let backend = MemoryBackend::default();
        backend.state.lock().unwrap().reject_append_at = Some(2);
        let request = EncodeRequest::new(&out, 30, repeat_sequence(&frames(5), 1));

        let err = encode(backend.writer(), &request, &EncoderConfig::default()).unwrap_err();
        assert_eq!(err, EncodeError::AppendFailed { index: 2 });
        assert!(!out.exists());
    }

    #[test]
    fn test_writer_unavailable() {
        let backend = MemoryBackend::default();
        backend.state.lock().unwrap().fail_open_writer = true;
        let request = EncodeRequest::new("/tmp/x.mp4", 30, repeat_sequence(&frames(2), 1));

        let err = encode(backend.writer(), &request, &EncoderConfig::default()).unwrap_err();
        assert!(matches!(err, EncodeError::WriterUnavailable { .. }));
    }

    #[test]
    fn test_finalize_failure() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::default();
        backend.state.lock().unwrap().fail_finish = true;
        let request = EncodeRequest::new(dir.path().join("f.mp4"), 30, repeat_sequence(&frames(2), 1));

        let err = encode(backend.writer(), &request, &EncoderConfig::default()).unwrap_err();
        assert!(matches!(err, EncodeError::FinalizeFailed { .. }));
    }
}
