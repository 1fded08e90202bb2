//! Phone detector configuration

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Smallest accepted inference downscale cap
pub const MIN_MAX_DIM: u32 = 160;

/// Phone detector configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PhoneDetectorConfig {
    /// YOLO ONNX model; the contour heuristic is used when unset or unloadable
    pub model_path: Option<PathBuf>,

    /// Newline-separated class labels; COCO names when unset
    pub labels_path: Option<PathBuf>,

    /// Detection confidence threshold
    pub confidence: f32,

    /// NMS IoU threshold
    pub iou: f32,

    /// Square model input size
    pub image_size: u32,

    /// Run inference every Nth frame
    pub frame_skip: u32,

    /// Frames larger than this are downscaled before inference
    pub max_dim: u32,
}

impl Default for PhoneDetectorConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            labels_path: None,
            confidence: 0.35,
            iou: 0.45,
            image_size: 640,
            frame_skip: 3,
            max_dim: 960,
        }
    }
}

impl PhoneDetectorConfig {
    /// Frame skip floored at 1
    pub fn effective_frame_skip(&self) -> u32 {
        self.frame_skip.max(1)
    }

    /// Downscale cap floored at [`MIN_MAX_DIM`]
    pub fn effective_max_dim(&self) -> u32 {
        self.max_dim.max(MIN_MAX_DIM)
    }

    /// How many skipped frames keep a positive decision alive
    pub fn persist_frames(&self) -> u32 {
        self.effective_frame_skip().saturating_sub(1).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floors() {
        let config = PhoneDetectorConfig {
            frame_skip: 0,
            max_dim: 32,
            ..Default::default()
        };
        assert_eq!(config.effective_frame_skip(), 1);
        assert_eq!(config.effective_max_dim(), 160);
        assert_eq!(config.persist_frames(), 1);
    }

    #[test]
    fn test_default_persistence() {
        let config = PhoneDetectorConfig::default();
        assert_eq!(config.effective_frame_skip(), 3);
        assert_eq!(config.persist_frames(), 2);
    }
}
