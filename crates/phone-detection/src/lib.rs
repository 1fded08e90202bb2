//! Phone Detection
//!
//! Per-frame "is a phone visible" decision for exam proctoring:
//! - Contour-geometry heuristic (always available)
//! - Optional YOLO model via tract with frame skipping and short persistence
//! - Heuristic fallback whenever the model is absent or inference fails

pub mod config;
pub mod heuristic;
pub mod model;
pub mod onnx;

pub use config::PhoneDetectorConfig;
pub use heuristic::detect_phone_like_object;
pub use model::{
    resolve_phone_classes, BBox, Detection, ModelDetector, ObjectClassifier, PredictParams,
};
pub use onnx::OnnxYoloClassifier;

use frame::{FrameError, VideoFrame};
use thiserror::Error;
use tracing::{info, warn};

/// Phone detection error types
#[derive(Error, Debug)]
pub enum PhoneError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Label file unreadable: {0}")]
    Labels(String),

    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Phone detector strategy
pub enum PhoneDetector {
    /// Contour heuristic on every frame
    Heuristic,
    /// Trained model with frame skipping
    Model(ModelDetector),
}

impl PhoneDetector {
    /// Build from configuration, degrading to the heuristic when the model cannot load
    pub fn from_config(config: &PhoneDetectorConfig) -> Self {
        let Some(model_path) = config.model_path.as_deref() else {
            info!("No phone model configured, using contour heuristic");
            return Self::Heuristic;
        };

        let labels_path = config.labels_path.as_deref();
        match OnnxYoloClassifier::load(model_path, labels_path, config.image_size) {
            Ok(classifier) => Self::with_classifier(Box::new(classifier), config),
            Err(e) => {
                warn!("Phone model unavailable, using contour heuristic: {}", e);
                Self::Heuristic
            }
        }
    }

    /// Model strategy on top of any classifier
    pub fn with_classifier(
        classifier: Box<dyn ObjectClassifier>,
        config: &PhoneDetectorConfig,
    ) -> Self {
        Self::Model(ModelDetector::new(classifier, config))
    }

    /// Whether the trained model is in use
    pub fn model_enabled(&self) -> bool {
        matches!(self, Self::Model(_))
    }

    /// Phone decision for the next frame
    pub fn detect(&self, frame: &VideoFrame) -> bool {
        match self {
            Self::Heuristic => detect_phone_like_object(frame),
            Self::Model(detector) => detector.detect(frame),
        }
    }
}

impl Default for PhoneDetector {
    fn default() -> Self {
        Self::Heuristic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconfigured_model_uses_heuristic() {
        let detector = PhoneDetector::from_config(&PhoneDetectorConfig::default());
        assert!(!detector.model_enabled());
    }

    #[test]
    fn test_unloadable_model_falls_back() {
        let config = PhoneDetectorConfig {
            model_path: Some("/nonexistent/model.onnx".into()),
            ..Default::default()
        };
        let detector = PhoneDetector::from_config(&config);
        assert!(!detector.model_enabled());
        let blank = VideoFrame::from_fn(32, 32, |_, _| [90, 90, 90]);
        assert!(!detector.detect(&blank));
    }
}
