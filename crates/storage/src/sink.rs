//! Evidence image sinks

use std::fs;
use std::path::Path;

use frame::VideoFrame;
use image::ImageFormat;

use crate::StorageError;

/// Destination for evidence snapshots
pub trait ImageSink: Send + Sync {
    fn save_image(&self, path: &Path, frame: &VideoFrame) -> Result<(), StorageError>;
}

/// Writes JPEG files, creating the parent directory on demand
#[derive(Debug, Default, Clone, Copy)]
pub struct JpegFileSink;

impl ImageSink for JpegFileSink {
    fn save_image(&self, path: &Path, frame: &VideoFrame) -> Result<(), StorageError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let img = frame
            .to_rgb_image()
            .map_err(|e| StorageError::ImageWrite(e.to_string()))?;
        img.save_with_format(path, ImageFormat::Jpeg)
            .map_err(|e| StorageError::ImageWrite(format!("{}: {}", path.display(), e)))
    }
}
