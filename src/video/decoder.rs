use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::DecodeError;
use crate::video::backend::TrackReader;
use crate::video::orientation::{apply_transform, transform_for};
use crate::video::types::{Frame, VideoAsset};

/// Turns a source video into upright, in-memory frames
pub struct FrameDecoder<R: TrackReader> {
    reader: R,
}

impl<R: TrackReader> FrameDecoder<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Decode every frame of `path`.
    ///
    /// All or nothing: a failure part-way through drops the frames decoded so far.
    pub fn decode<P: AsRef<Path>>(mut self, path: P) -> Result<Vec<Arc<Frame>>, DecodeError> {
        let path = path.as_ref();
        let result = self.decode_all(path);
        self.reader.close();
        result
    }

    fn decode_all(&mut self, path: &Path) -> Result<Vec<Arc<Frame>>, DecodeError> {
        let asset = self.reader.open(path)?;
        if asset.natural_size.0 == 0 || asset.natural_size.1 == 0 {
            return Err(DecodeError::NoVideoTrack { path: path.display().to_string() });
        }

        let transform = transform_for(&asset.preferred_transform, asset.natural_size);
        log_asset(&asset);

        let mut frames = Vec::new();
        while let Some(image) = self.reader.read_next_frame()? {
            let upright = apply_transform(image, &transform);
            frames.push(Arc::new(Frame::new(upright, frames.len())));
        }

        let bytes: usize = frames.iter().map(|f| f.byte_size()).sum();
        info!("Decoded {} frames ({} KiB in memory)", frames.len(), bytes / 1024);
        Ok(frames)
    }
}

fn log_asset(asset: &VideoAsset) {
    debug!(
        "Source {:?}: {}x{}, {:?}, duration {:?}",
        asset.path,
        asset.natural_size.0,
        asset.natural_size.1,
        asset.preferred_transform.rotation(),
        asset.duration
    );
}
