//! Face geometry capability consumed from the host

use frame::VideoFrame;
use serde::{Deserialize, Serialize};

use crate::FaceError;

/// Point in normalized image coordinates (0..1 on both axes)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Face bounding box, relative to frame size
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FaceBox {
    pub xmin: f32,
    pub ymin: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

/// Landmarks needed for the yaw proxy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    /// Outer corner of the subject's left eye (image-left in a mirrored feed)
    pub left_eye_outer: Point,
    /// Outer corner of the subject's right eye
    pub right_eye_outer: Point,
    pub nose_tip: Point,
}

/// Face detection / landmark capability supplied by the host application.
///
/// Implementations wrap whatever detector the deployment ships with. They must
/// be shareable across request threads.
pub trait FaceGeometryProvider: Send + Sync {
    /// Detect every face in the frame
    fn detect_faces(&self, frame: &VideoFrame) -> Result<Vec<FaceBox>, FaceError>;

    /// Landmarks for the most prominent face, `None` when extraction fails
    fn detect_landmarks(&self, frame: &VideoFrame) -> Result<Option<FaceLandmarks>, FaceError>;
}
