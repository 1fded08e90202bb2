//! Candidate Identity
//!
//! Face-signature based identity checks for exam candidates:
//! - Signature extraction from a padded face crop
//! - Candidate enrollment (one or more samples per candidate)
//! - Start-of-exam and continuous re-verification matching

pub mod enrollment;
pub mod matcher;
pub mod signature;
pub mod user;

pub use enrollment::{Enroller, EnrollmentRequest};
pub use matcher::{IdentityConfig, IdentityMatcher, MatchOutcome};
pub use signature::{compute_signature, cosine_similarity, Signature, SignatureError};
pub use user::{is_valid_person_name, EnrolledUser, IdentityKey, UserDirectory};

use face_analysis::FaceError;
use thiserror::Error;

/// Identity error types
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("User is not registered: {0}")]
    NotRegistered(String),

    #[error(transparent)]
    Face(#[from] FaceError),

    #[error("{0}")]
    InvalidProfile(&'static str),

    #[error(
        "Move closer to the camera and keep your face larger in frame \
         (ratio {ratio:.3} < {min:.3})"
    )]
    FaceTooSmall { ratio: f32, min: f32 },

    #[error("Invalid signature: {0}")]
    Signature(#[from] SignatureError),

    #[error("No enrolled signature for {0} is comparable with the probe")]
    NoComparableSignature(String),
}
