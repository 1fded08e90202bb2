//! Candidate Face Analysis
//!
//! Per-frame analysis of the exam-taker's webcam:
//! - Face counting (none / exactly one / several)
//! - Horizontal head-yaw proxy from eye and nose landmarks
//! - Padded single-face crops for signature extraction
//! - Registration pose guidance (centre / left / right, distance check)
//!
//! Face detection and landmark models are supplied by the host through
//! [`FaceGeometryProvider`].

pub mod analysis;
pub mod config;
pub mod crop;
pub mod detector;

pub use analysis::{AnalysisResult, PoseAnalyzer, PoseCheck, PoseHint, Violation};
pub use config::PoseConfig;
pub use crop::{extract_single_face_crop, face_area_ratio, CropRegion, FaceCrop};
pub use detector::{FaceBox, FaceGeometryProvider, FaceLandmarks, Point};

use thiserror::Error;

/// Face analysis error types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FaceError {
    #[error("No face detected")]
    NoFace,

    #[error("Multiple faces detected ({0})")]
    MultipleFaces(usize),

    #[error("Face crop failed")]
    CropFailed,

    #[error("Face detection failed: {0}")]
    Provider(String),
}
