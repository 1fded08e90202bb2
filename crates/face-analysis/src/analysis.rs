//! Per-frame face analysis results and the pose analyzer

use std::fmt;
use std::sync::Arc;

use frame::VideoFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::crop::face_area_ratio;
use crate::{FaceError, FaceGeometryProvider, FaceLandmarks, PoseConfig};

/// Violation tags reported for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Violation {
    /// No face in view (left the seat, camera covered)
    NoFace,

    /// More than one face in view
    MultipleFaces,

    /// Head turned away from the screen
    LookingSideways,

    /// Frame too dark for reliable analysis
    LowLighting,

    /// Phone-like object visible for a sustained stretch
    PhoneVisible,

    /// Face no longer matches the enrolled candidate
    IdentityMismatch,
}

impl Violation {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Violation::NoFace => "no_face",
            Violation::MultipleFaces => "multiple_faces",
            Violation::LookingSideways => "looking_sideways",
            Violation::LowLighting => "low_lighting",
            Violation::PhoneVisible => "phone_visible",
            Violation::IdentityMismatch => "identity_mismatch",
        }
    }

    /// Parse a persisted tag
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "no_face" => Some(Violation::NoFace),
            "multiple_faces" => Some(Violation::MultipleFaces),
            "looking_sideways" => Some(Violation::LookingSideways),
            "low_lighting" => Some(Violation::LowLighting),
            "phone_visible" => Some(Violation::PhoneVisible),
            "identity_mismatch" => Some(Violation::IdentityMismatch),
            _ => None,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Face analysis result for one frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Number of faces detected
    pub face_count: usize,

    /// Signed, eye-distance-normalized yaw proxy (single face with landmarks only)
    pub yaw: Option<f32>,

    /// Violations in detection order
    pub violations: Vec<Violation>,
}

impl AnalysisResult {
    /// Check if any violations are present
    pub fn has_violations(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn has(&self, violation: Violation) -> bool {
        self.violations.contains(&violation)
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }
}

/// Registration pose guidance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoseHint {
    Center,
    Left,
    Right,
    Unknown,
}

/// Result of a registration pose check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseCheck {
    pub face_count: usize,
    pub yaw: Option<f32>,
    pub face_area_ratio: Option<f32>,
    pub close_enough: bool,
    pub pose_hint: PoseHint,
}

/// Signed yaw proxy: nose offset from the eye midpoint over half the eye span
pub fn yaw_score(landmarks: &FaceLandmarks) -> f32 {
    let left = landmarks.left_eye_outer;
    let right = landmarks.right_eye_outer;
    let eye_mid_x = (left.x + right.x) / 2.0;
    let half_eye_dist = ((right.x - left.x).abs() / 2.0).max(1e-6);
    (landmarks.nose_tip.x - eye_mid_x) / half_eye_dist
}

/// Face count and head-yaw analyzer
pub struct PoseAnalyzer {
    config: PoseConfig,
    provider: Arc<dyn FaceGeometryProvider>,
}

impl PoseAnalyzer {
    /// Create a new analyzer on top of the host's face geometry provider
    pub fn new(config: PoseConfig, provider: Arc<dyn FaceGeometryProvider>) -> Self {
        Self { config, provider }
    }

    /// Analyze a single frame for face presence and head yaw
    pub fn analyze(&self, frame: &VideoFrame) -> Result<AnalysisResult, FaceError> {
        let faces = self.provider.detect_faces(frame)?;
        let face_count = faces.len();

        if face_count == 0 {
            return Ok(AnalysisResult {
                face_count: 0,
                yaw: None,
                violations: vec![Violation::NoFace],
            });
        }

        if face_count > 1 {
            return Ok(AnalysisResult {
                face_count,
                yaw: None,
                violations: vec![Violation::MultipleFaces],
            });
        }

        let landmarks = match self.provider.detect_landmarks(frame) {
            Ok(Some(landmarks)) => landmarks,
            Ok(None) => {
                debug!("Landmarks unavailable for single face");
                return Ok(AnalysisResult {
                    face_count: 1,
                    ..Default::default()
                });
            }
            Err(e) => {
                debug!("Landmark extraction failed: {}", e);
                return Ok(AnalysisResult {
                    face_count: 1,
                    ..Default::default()
                });
            }
        };

        let yaw = yaw_score(&landmarks);
        let mut violations = Vec::new();
        if yaw.abs() > self.config.sideways_threshold {
            violations.push(Violation::LookingSideways);
        }

        Ok(AnalysisResult {
            face_count: 1,
            yaw: Some(yaw),
            violations,
        })
    }

    /// Guide the candidate through centre / left / right enrollment captures
    pub fn registration_check(&self, frame: &VideoFrame) -> Result<PoseCheck, FaceError> {
        let result = self.analyze(frame)?;

        let face_area_ratio = if result.face_count == 1 {
            Some(face_area_ratio(
                self.provider.as_ref(),
                frame,
                self.config.crop_padding,
            )?)
        } else {
            None
        };

        let pose_hint = match (result.face_count, result.yaw) {
            (1, Some(yaw)) => self.pose_hint(yaw),
            _ => PoseHint::Unknown,
        };

        let close_enough = face_area_ratio
            .map(|ratio| ratio >= self.config.registration_min_face_area_ratio)
            .unwrap_or(false);

        Ok(PoseCheck {
            face_count: result.face_count,
            yaw: result.yaw,
            face_area_ratio,
            close_enough,
            pose_hint,
        })
    }

    fn pose_hint(&self, yaw: f32) -> PoseHint {
        if yaw.abs() <= self.config.registration_center_max {
            PoseHint::Center
        } else if yaw >= self.config.registration_side_min {
            PoseHint::Right
        } else if yaw <= -self.config.registration_side_min {
            PoseHint::Left
        } else {
            PoseHint::Unknown
        }
    }
}
