//! Candidate enrollment

use std::sync::Arc;

use face_analysis::{extract_single_face_crop, FaceGeometryProvider, PoseConfig};
use frame::VideoFrame;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{compute_signature, is_valid_person_name, EnrolledUser, IdentityError, IdentityKey};

/// Registration form fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EnrollmentRequest {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub email: String,
}

impl EnrollmentRequest {
    /// Check the profile fields before any image work
    pub fn validate(&self) -> Result<IdentityKey, IdentityError> {
        let key = IdentityKey::normalize(&self.username)
            .ok_or(IdentityError::InvalidProfile("Username is required"))?;
        if !is_valid_person_name(&self.first_name) {
            return Err(IdentityError::InvalidProfile("Valid first name is required"));
        }
        if !is_valid_person_name(&self.last_name) {
            return Err(IdentityError::InvalidProfile("Valid last name is required"));
        }
        Ok(key)
    }
}

/// Builds enrolled-user records from registration captures
pub struct Enroller {
    provider: Arc<dyn FaceGeometryProvider>,
    crop_padding: f32,
    min_face_area_ratio: f32,
}

impl Enroller {
    pub fn new(provider: Arc<dyn FaceGeometryProvider>, pose: &PoseConfig) -> Self {
        Self {
            provider,
            crop_padding: pose.crop_padding,
            min_face_area_ratio: pose.registration_min_face_area_ratio,
        }
    }

    /// Turn every capture into a reference signature; any bad capture fails the whole request
    pub fn enroll(
        &self,
        request: &EnrollmentRequest,
        frames: &[VideoFrame],
    ) -> Result<EnrolledUser, IdentityError> {
        let key = request.validate()?;
        if frames.is_empty() {
            return Err(IdentityError::InvalidProfile("At least one image is required"));
        }

        let mut signatures = Vec::with_capacity(frames.len());
        for (idx, frame) in frames.iter().enumerate() {
            let crop = extract_single_face_crop(self.provider.as_ref(), frame, self.crop_padding)?;
            if crop.area_ratio < self.min_face_area_ratio {
                return Err(IdentityError::FaceTooSmall {
                    ratio: crop.area_ratio,
                    min: self.min_face_area_ratio,
                });
            }
            debug!(
                key = %key,
                sample = idx,
                area_ratio = crop.area_ratio,
                "Enrollment sample accepted"
            );
            signatures.push(compute_signature(&crop.image));
        }

        let user = EnrolledUser::new(
            &request.username,
            &request.first_name,
            &request.last_name,
            &request.email,
            signatures,
        )?;
        info!(key = %key, samples = user.signatures().len(), "Enrollment built");
        Ok(user)
    }
}
