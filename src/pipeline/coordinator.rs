use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::{self, JoinHandle};
use tracing::{debug, info, warn};

use crate::config::{Config, PipelineConfig};
use crate::error::{BoomerangError, GenericError, Result};
use crate::pipeline::state::{PipelineState, StateGuard};
use crate::video::backend::CodecBackend;
use crate::video::decoder::FrameDecoder;
use crate::video::encoder::FrameEncoder;
use crate::video::frames_dir::load_frame_directory;
use crate::video::sequence::{build_boomerang, repeat_sequence};
use crate::video::types::{EncodeRequest, FrameSequence};

/// Per-call loop count and frame rate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoomerangOptions {
    pub loop_count: u32,
    pub fps: u32,
}

impl Default for BoomerangOptions {
    fn default() -> Self {
        Self::from(&PipelineConfig::default())
    }
}

impl From<&PipelineConfig> for BoomerangOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            loop_count: config.loop_count,
            fps: config.fps,
        }
    }
}

impl BoomerangOptions {
    pub fn validate(&self) -> Result<()> {
        PipelineConfig { loop_count: self.loop_count, fps: self.fps }.validate()
    }
}

/// Cooperative cancellation flag shared between a job and its caller.
///
/// Checked between pipeline stages only; a stage that has started runs to
/// completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(GenericError::Cancelled.into());
        }
        Ok(())
    }
}

/// A running boomerang job
pub struct BoomerangJob {
    handle: JoinHandle<Result<PathBuf>>,
    cancel: CancellationToken,
}

impl BoomerangJob {
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Wait for the job's single terminal result
    pub async fn wait(self) -> Result<PathBuf> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) => Err(GenericError::TaskFailed { reason: e.to_string() }.into()),
        }
    }
}

/// Where the frames of a job come from
enum FrameSource {
    /// Decode a video and build the boomerang order
    Video(PathBuf),
    /// Load an already forward+backward ordered image directory
    Directory(PathBuf),
}

/// Orchestrates decode → sequence → encode for one job at a time
///
/// A new job is only accepted while the coordinator is `Idle`; once a job has
/// finished, call [`reset`](Self::reset) before starting the next one.
pub struct BoomerangCoordinator<B: CodecBackend> {
    backend: Arc<B>,
    config: Arc<Config>,
    state: Arc<watch::Sender<PipelineState>>,
}

impl<B: CodecBackend> BoomerangCoordinator<B> {
    pub fn new(backend: B, config: Config) -> Self {
        let (state, _) = watch::channel(PipelineState::Idle);
        Self {
            backend: Arc::new(backend),
            config: Arc::new(config),
            state: Arc::new(state),
        }
    }

    /// Loop count and fps from the configuration
    pub fn default_options(&self) -> BoomerangOptions {
        BoomerangOptions::from(&self.config.pipeline)
    }

    pub fn state(&self) -> PipelineState {
        *self.state.borrow()
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state.subscribe()
    }

    /// Return a finished coordinator to `Idle`
    pub fn reset(&self) -> Result<()> {
        let mut busy = None;
        self.state.send_if_modified(|state| {
            if state.is_in_flight() {
                busy = Some(*state);
                return false;
            }
            let changed = *state != PipelineState::Idle;
            *state = PipelineState::Idle;
            changed
        });
        match busy {
            Some(state) => Err(GenericError::Busy { state }.into()),
            None => Ok(()),
        }
    }

    /// Decode `input_path`, build the boomerang and encode it to `output_path`.
    ///
    /// Any file already at `output_path` is removed first. Must be called from
    /// within a tokio runtime.
    pub fn create_boomerang<I, O>(
        &self,
        input_path: I,
        output_path: O,
        options: BoomerangOptions,
    ) -> Result<BoomerangJob>
    where
        I: Into<PathBuf>,
        O: Into<PathBuf>,
    {
        self.start(FrameSource::Video(input_path.into()), output_path.into(), options)
    }

    /// Encode the images in `frame_dir`, sorted by file name, repeated
    /// `loop_count` times. The directory is taken to be in final
    /// forward+backward order already, so no reversal is applied.
    pub fn create_boomerang_from_frames<D, O>(
        &self,
        frame_dir: D,
        output_path: O,
        options: BoomerangOptions,
    ) -> Result<BoomerangJob>
    where
        D: Into<PathBuf>,
        O: Into<PathBuf>,
    {
        self.start(FrameSource::Directory(frame_dir.into()), output_path.into(), options)
    }

    fn start(&self, source: FrameSource, output_path: PathBuf, options: BoomerangOptions) -> Result<BoomerangJob> {
        options.validate()?;
        self.begin()?;

        let cancel = CancellationToken::new();
        let job = Job {
            backend: Arc::clone(&self.backend),
            config: Arc::clone(&self.config),
            guard: StateGuard::new(Arc::clone(&self.state)),
            cancel: cancel.clone(),
            options,
        };

        let handle = tokio::spawn(job.run(source, output_path));
        Ok(BoomerangJob { handle, cancel })
    }

    /// Idle -> Decoding, atomically
    fn begin(&self) -> Result<()> {
        let mut rejected = None;
        self.state.send_if_modified(|state| {
            if *state != PipelineState::Idle {
                rejected = Some(*state);
                return false;
            }
            *state = PipelineState::Decoding;
            true
        });
        match rejected {
            Some(state) => {
                warn!("Rejecting boomerang request: coordinator is {}", state);
                Err(GenericError::Busy { state }.into())
            }
            None => Ok(()),
        }
    }
}

struct Job<B: CodecBackend> {
    backend: Arc<B>,
    config: Arc<Config>,
    guard: StateGuard,
    cancel: CancellationToken,
    options: BoomerangOptions,
}

impl<B: CodecBackend> Job<B> {
    async fn run(self, source: FrameSource, output_path: PathBuf) -> Result<PathBuf> {
        info!(
            "🎬 Boomerang job started on {} backend ({} loops @ {} fps)",
            self.backend.name(),
            self.options.loop_count,
            self.options.fps
        );

        let result = self.execute(source, output_path).await;
        match &result {
            Ok(path) => {
                self.guard.set(PipelineState::Completed);
                info!("🎉 Boomerang written to {:?}", path);
            }
            Err(e) => {
                self.guard.set(PipelineState::Failed);
                warn!("Boomerang job failed: {}", e);
            }
        }
        result
    }

    async fn execute(&self, source: FrameSource, output_path: PathBuf) -> Result<PathBuf> {
        remove_stale_output(&output_path).await?;

        let sequence = match source {
            FrameSource::Video(input_path) => self.sequence_from_video(input_path).await?,
            FrameSource::Directory(frame_dir) => self.sequence_from_directory(frame_dir).await?,
        };

        self.cancel.check()?;
        self.guard.set(PipelineState::Encoding);

        let request = EncodeRequest::new(output_path, self.options.fps, sequence);
        let backend = Arc::clone(&self.backend);
        let config = Arc::clone(&self.config);
        let encoded = run_blocking(move || {
            FrameEncoder::new(backend.writer(), &config.encoder)
                .encode(&request)
                .map_err(BoomerangError::from)
        })
        .await?;

        Ok(encoded.path)
    }

    async fn sequence_from_video(&self, input_path: PathBuf) -> Result<FrameSequence> {
        info!("📹 Decoding {:?}", input_path);
        let backend = Arc::clone(&self.backend);
        let frames = run_blocking(move || {
            FrameDecoder::new(backend.reader())
                .decode(&input_path)
                .map_err(BoomerangError::from)
        })
        .await?;

        self.cancel.check()?;
        let sequence = build_boomerang(&frames, self.options.loop_count);
        debug!("Boomerang of {} source frames has {} frames", frames.len(), sequence.len());
        Ok(sequence)
    }

    async fn sequence_from_directory(&self, frame_dir: PathBuf) -> Result<FrameSequence> {
        info!("🖼️  Loading frames from {:?}", frame_dir);
        let frames = run_blocking(move || load_frame_directory(&frame_dir)).await?;

        self.cancel.check()?;
        Ok(repeat_sequence(&frames, self.options.loop_count))
    }
}

/// Run blocking codec work on tokio's blocking pool
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    task::spawn_blocking(work)
        .await
        .map_err(|e| GenericError::TaskFailed { reason: e.to_string() })?
}

async fn remove_stale_output(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            debug!("Removed existing output {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(BoomerangError::io(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::video::backend::memory::{MemoryBackend, MemorySource};
    use crate::video::timing::Timestamp;
    use image::{Rgb, RgbImage};
    use tempfile::tempdir;

    fn coordinator(backend: &MemoryBackend) -> BoomerangCoordinator<MemoryBackend> {
        BoomerangCoordinator::new(backend.clone(), Config::default())
    }

    #[tokio::test]
    async fn test_video_boomerang_end_to_end() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("boomerang.mp4");
        let backend = MemoryBackend::default().with_source("clip.mov", MemorySource::solid(5));
        let coordinator = coordinator(&backend);

        let job = coordinator
            .create_boomerang("clip.mov", &out, BoomerangOptions::default())
            .unwrap();
        let path = job.wait().await.unwrap();

        assert_eq!(path, out);
        assert_eq!(coordinator.state(), PipelineState::Completed);

        let reds: Vec<u8> = backend.written(&out).iter().map(|f| f.red).collect();
        assert_eq!(reds.len(), 24);
        assert_eq!(&reds[..8], &[0, 1, 2, 3, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn test_frames_directory_scenario() {
        let dir = tempdir().unwrap();
        let frames_dir = dir.path().join("frames");
        std::fs::create_dir(&frames_dir).unwrap();
        for i in 0..10u8 {
            RgbImage::from_pixel(4, 4, Rgb([i, 0, 0]))
                .save(frames_dir.join(format!("frame_{:03}.png", i)))
                .unwrap();
        }
        let out = dir.path().join("from_frames.mp4");
        let backend = MemoryBackend::default();
        let coordinator = coordinator(&backend);

        let options = BoomerangOptions { loop_count: 2, fps: 30 };
        coordinator
            .create_boomerang_from_frames(&frames_dir, &out, options)
            .unwrap()
            .wait()
            .await
            .unwrap();

        let written = backend.written(&out);
        assert_eq!(written.len(), 20);
        // no reversal for pre-ordered directories
        let reds: Vec<u8> = written.iter().map(|f| f.red).collect();
        assert_eq!(&reds[..10], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        assert_eq!(&reds[10..], &[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
        for (i, frame) in written.iter().enumerate() {
            assert_eq!(frame.pts, Timestamp::for_frame(i, 30));
        }
    }

    #[tokio::test]
    async fn test_empty_frames_directory() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::default();
        let coordinator = coordinator(&backend);

        let err = coordinator
            .create_boomerang_from_frames(dir.path(), dir.path().join("out.mp4"), BoomerangOptions::default())
            .unwrap()
            .wait()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::EmptyFrameDirectory);
        assert_eq!(coordinator.state(), PipelineState::Failed);
    }

    #[tokio::test]
    async fn test_overwrite_leaves_no_residue() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("same.mp4");
        std::fs::write(&out, "stale bytes from an older export").unwrap();

        let mut second = MemorySource::solid(2);
        for frame in second.frames.iter_mut() {
            frame.pixels_mut().for_each(|p| p.0[0] = 200);
        }
        let backend = MemoryBackend::default()
            .with_source("first.mov", MemorySource::solid(6))
            .with_source("second.mov", second);
        let coordinator = coordinator(&backend);

        coordinator
            .create_boomerang("first.mov", &out, BoomerangOptions::default())
            .unwrap()
            .wait()
            .await
            .unwrap();
        let first_manifest = std::fs::read_to_string(&out).unwrap();
        assert!(!first_manifest.contains("stale"));

        coordinator.reset().unwrap();
        coordinator
            .create_boomerang("second.mov", &out, BoomerangOptions::default())
            .unwrap()
            .wait()
            .await
            .unwrap();

        let manifest = std::fs::read_to_string(&out).unwrap();
        assert_eq!(manifest.lines().count(), 6);
        assert!(manifest.lines().all(|line| line.starts_with("200 ")));
    }

    #[tokio::test]
    async fn test_decode_failure_writes_nothing() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("broken.mp4");
        std::fs::write(&out, "old").unwrap();

        let mut source = MemorySource::solid(8);
        source.fail_after = Some(3);
        let backend = MemoryBackend::default().with_source("broken.mov", source);
        let coordinator = coordinator(&backend);

        let err = coordinator
            .create_boomerang("broken.mov", &out, BoomerangOptions::default())
            .unwrap()
            .wait()
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ReadFailure);
        assert!(!out.exists());
        assert!(backend.state.lock().unwrap().settings.is_none());
        assert_eq!(coordinator.state(), PipelineState::Failed);
    }

    #[tokio::test]
    async fn test_source_without_frames_has_no_video_track() {
        let dir = tempdir().unwrap();
        let mut source = MemorySource::solid(1);
        source.frames.clear();
        let backend = MemoryBackend::default().with_source("empty.mov", source);
        let coordinator = coordinator(&backend);

        let err = coordinator
            .create_boomerang("empty.mov", dir.path().join("e.mp4"), BoomerangOptions::default())
            .unwrap()
            .wait()
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoVideoTrack);
    }

    #[tokio::test]
    async fn test_second_call_while_running_is_rejected() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::default().with_source("clip.mov", MemorySource::solid(4));
        let coordinator = coordinator(&backend);

        let job = coordinator
            .create_boomerang("clip.mov", dir.path().join("a.mp4"), BoomerangOptions::default())
            .unwrap();
        let rejected = coordinator
            .create_boomerang("clip.mov", dir.path().join("b.mp4"), BoomerangOptions::default());
        assert!(matches!(
            rejected,
            Err(BoomerangError::Generic(GenericError::Busy { .. }))
        ));
        assert!(coordinator.reset().is_err());

        job.wait().await.unwrap();
        assert!(!dir.path().join("b.mp4").exists());
    }

    #[tokio::test]
    async fn test_finished_coordinator_requires_reset() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::default().with_source("clip.mov", MemorySource::solid(3));
        let coordinator = coordinator(&backend);

        coordinator
            .create_boomerang("clip.mov", dir.path().join("a.mp4"), BoomerangOptions::default())
            .unwrap()
            .wait()
            .await
            .unwrap();

        let err = coordinator
            .create_boomerang("clip.mov", dir.path().join("b.mp4"), BoomerangOptions::default())
            .err()
            .unwrap();
        assert_eq!(err.kind(), ErrorKind::Busy);

        coordinator.reset().unwrap();
        assert_eq!(coordinator.state(), PipelineState::Idle);
        coordinator
            .create_boomerang("clip.mov", dir.path().join("b.mp4"), BoomerangOptions::default())
            .unwrap()
            .wait()
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_state_transitions_are_observable() {
        let dir = tempdir().unwrap();
        let backend = MemoryBackend::default().with_source("clip.mov", MemorySource::solid(3));
        let coordinator = coordinator(&backend);
        let mut states = coordinator.subscribe();

        let job = coordinator
            .create_boomerang("clip.mov", dir.path().join("a.mp4"), BoomerangOptions::default())
            .unwrap();
        assert_eq!(*states.borrow_and_update(), PipelineState::Decoding);

        job.wait().await.unwrap();
        assert_eq!(*states.borrow_and_update(), PipelineState::Completed);
    }

    #[tokio::test]
    async fn test_cancelled_before_encoding() {
        let dir = tempdir().unwrap();
        let out = dir.path().join("cancelled.mp4");
        let backend = MemoryBackend::default().with_source("clip.mov", MemorySource::solid(3));
        let coordinator = coordinator(&backend);

        let job = coordinator
            .create_boomerang("clip.mov", &out, BoomerangOptions::default())
            .unwrap();
        job.cancellation_token().cancel();

        let err = job.wait().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert!(!out.exists());
        assert_eq!(coordinator.state(), PipelineState::Failed);
    }

    #[tokio::test]
    async fn test_invalid_options_leave_coordinator_idle() {
        let backend = MemoryBackend::default();
        let coordinator = coordinator(&backend);

        let result = coordinator.create_boomerang("a.mov", "b.mp4", BoomerangOptions { loop_count: 0, fps: 30 });
        assert_eq!(result.err().unwrap().kind(), ErrorKind::InvalidConfig);
        assert_eq!(coordinator.state(), PipelineState::Idle);
    }
}
