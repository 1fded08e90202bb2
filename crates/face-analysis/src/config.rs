//! Pose analysis configuration

use serde::{Deserialize, Serialize};

/// Pose and face-crop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    /// |yaw| above this flags `looking_sideways`
    pub sideways_threshold: f32,

    /// |yaw| at or below this counts as a centred registration pose
    pub registration_center_max: f32,

    /// |yaw| at or above this counts as a left/right registration pose
    pub registration_side_min: f32,

    /// Minimum padded face-box area over frame area for enrollment samples
    pub registration_min_face_area_ratio: f32,

    /// Padding added on each side of the detected face box, as a fraction of its size
    pub crop_padding: f32,
}

impl Default for PoseConfig {
    fn default() -> Self {
        Self {
            sideways_threshold: 0.28,
            registration_center_max: 0.10,
            registration_side_min: 0.12,
            registration_min_face_area_ratio: 0.12,
            crop_padding: 0.2,
        }
    }
}

impl PoseConfig {
    /// Create strict config (flags smaller head turns)
    pub fn strict() -> Self {
        Self {
            sideways_threshold: 0.20,
            ..Default::default()
        }
    }

    /// Create lenient config (tolerates larger head turns)
    pub fn lenient() -> Self {
        Self {
            sideways_threshold: 0.40,
            ..Default::default()
        }
    }
}
