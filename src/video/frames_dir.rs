use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use tracing::{debug, info};

use crate::error::{BoomerangError, GenericError, Result};
use crate::video::types::Frame;

/// Load a directory of pre-ordered frame images.
///
/// Hidden files and non-image files are skipped; the rest are sorted by file
/// name and each frame's index is its position in that order.
pub fn load_frame_directory<P: AsRef<Path>>(directory: P) -> Result<Vec<Arc<Frame>>> {
    let directory = directory.as_ref();
    let paths = list_frame_files(directory)?;

    if paths.is_empty() {
        return Err(GenericError::EmptyFrameDirectory {
            path: directory.display().to_string(),
        }.into());
    }

    debug!("Loading {} frame images from {:?}", paths.len(), directory);

    // par_iter + collect keeps the sorted order
    let frames = paths
        .par_iter()
        .enumerate()
        .map(|(index, path)| load_image_as_frame(path, index).map(Arc::new))
        .collect::<Result<Vec<_>>>()?;

    info!("Loaded {} frames from {:?}", frames.len(), directory);
    Ok(frames)
}

/// Image files in `directory`, sorted lexicographically by file name.
/// A missing directory yields an empty list.
pub fn list_frame_files(directory: &Path) -> Result<Vec<PathBuf>> {
    if !directory.is_dir() {
        return Ok(Vec::new());
    }

    let entries = std::fs::read_dir(directory).map_err(|e| BoomerangError::io(directory, e))?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| BoomerangError::io(directory, e))?.path();
        if path.is_file() && !is_hidden_file(&path) && is_image_file(&path) {
            paths.push(path);
        }
    }

    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(paths)
}

fn load_image_as_frame(path: &Path, index: usize) -> Result<Frame> {
    let image = image::open(path).map_err(|e| GenericError::FileIOFailure {
        path: path.display().to_string(),
        reason: e.to_string(),
    })?;

    let rgb_image = match image {
        image::DynamicImage::ImageRgb8(img) => img,
        _ => image.to_rgb8(),
    };

    Ok(Frame::new(rgb_image, index))
}

fn is_image_file(path: &Path) -> bool {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) => matches!(
            ext.to_lowercase().as_str(),
            "jpg" | "jpeg" | "png" | "bmp" | "gif" | "tiff" | "webp"
        ),
        None => false,
    }
}

fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with('.'))
        .unwrap_or(false)
}
