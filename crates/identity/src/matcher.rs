//! Identity re-verification against enrolled signatures

use std::sync::Arc;

use face_analysis::{extract_single_face_crop, FaceGeometryProvider};
use frame::VideoFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{compute_signature, IdentityError, IdentityKey, UserDirectory};

/// Similarity thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    /// One-time gate before the exam starts
    pub start_threshold: f32,

    /// Continuous re-verification during the exam (tolerates lighting/angle drift)
    pub live_threshold: f32,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            start_threshold: 0.84,
            live_threshold: 0.78,
        }
    }
}

/// Result of comparing a frame against a candidate's references
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MatchOutcome {
    pub is_match: bool,
    pub best_score: f32,
    pub threshold: f32,
}

/// Matches fresh face crops against enrolled references
pub struct IdentityMatcher {
    provider: Arc<dyn FaceGeometryProvider>,
    crop_padding: f32,
}

impl IdentityMatcher {
    pub fn new(provider: Arc<dyn FaceGeometryProvider>, crop_padding: f32) -> Self {
        Self {
            provider,
            crop_padding,
        }
    }

    /// Verify that the single face in `frame` belongs to `key`
    pub fn verify(
        &self,
        users: &UserDirectory,
        key: &IdentityKey,
        frame: &VideoFrame,
        threshold: f32,
    ) -> Result<MatchOutcome, IdentityError> {
        let user = users
            .get(key)
            .ok_or_else(|| IdentityError::NotRegistered(key.to_string()))?;

        let crop = extract_single_face_crop(self.provider.as_ref(), frame, self.crop_padding)?;
        let probe = compute_signature(&crop.image);

        let best_score = user
            .best_score(&probe)
            .ok_or_else(|| IdentityError::NoComparableSignature(key.to_string()))?;

        let is_match = best_score >= threshold;
        debug!(key = %key, best_score, threshold, is_match, "Identity verified");

        Ok(MatchOutcome {
            is_match,
            best_score,
            threshold,
        })
    }
}
