//! Face signature codec
//!
//! A lightweight hand-crafted descriptor: a 32-bin intensity histogram of the
//! normalized face patch concatenated with a standardized 24x24 thumbnail. It
//! needs no model and is fully deterministic.

use frame::VideoFrame;
use image::imageops;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Histogram bin count
pub const HISTOGRAM_BINS: usize = 32;
/// Side of the square the face is normalized to
pub const NORMALIZED_SIZE: u32 = 64;
/// Side of the standardized thumbnail
pub const PATCH_SIZE: u32 = 24;
/// Length of signatures produced by [`compute_signature`]
pub const SIGNATURE_LEN: usize = HISTOGRAM_BINS + (PATCH_SIZE * PATCH_SIZE) as usize;

const EPSILON: f32 = 1e-8;
const NORM_TOLERANCE: f32 = 1e-4;

/// Signature construction errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignatureError {
    #[error("Signature is empty")]
    Empty,

    #[error("Signature contains non-finite values")]
    NonFinite,

    #[error("Signature has zero norm")]
    ZeroNorm,
}

/// L2-normalized face descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f32>", into = "Vec<f32>")]
pub struct Signature(Vec<f32>);

impl Signature {
    /// Build a signature from raw values, normalizing unless already unit length
    pub fn from_raw(values: Vec<f32>) -> Result<Self, SignatureError> {
        if values.is_empty() {
            return Err(SignatureError::Empty);
        }
        if values.iter().any(|v| !v.is_finite()) {
            return Err(SignatureError::NonFinite);
        }

        let norm = l2_norm(&values);
        if norm <= EPSILON {
            return Err(SignatureError::ZeroNorm);
        }
        if (norm - 1.0).abs() <= NORM_TOLERANCE {
            return Ok(Self(values));
        }
        Ok(Self(scale(values, norm)))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn norm(&self) -> f32 {
        l2_norm(&self.0)
    }

    /// Cosine similarity, `None` when the descriptors have different lengths
    pub fn similarity(&self, other: &Signature) -> Option<f32> {
        if self.len() != other.len() {
            return None;
        }
        Some(cosine_similarity(&self.0, &other.0))
    }
}

impl TryFrom<Vec<f32>> for Signature {
    type Error = SignatureError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Signature::from_raw(values)
    }
}

impl From<Signature> for Vec<f32> {
    fn from(signature: Signature) -> Self {
        signature.0
    }
}

/// Compute the signature of a tightly cropped face
pub fn compute_signature(face: &VideoFrame) -> Signature {
    let gray = face.to_grayscale();
    // area-averaging resample
    let normalized = imageops::thumbnail(&gray, NORMALIZED_SIZE, NORMALIZED_SIZE);

    let mut histogram = vec![0f32; HISTOGRAM_BINS];
    for pixel in normalized.pixels() {
        let bin = pixel[0] as usize * HISTOGRAM_BINS / 256;
        histogram[bin] += 1.0;
    }
    let hist_norm = l2_norm(&histogram);
    let histogram = scale(histogram, hist_norm);

    let thumb = imageops::thumbnail(&normalized, PATCH_SIZE, PATCH_SIZE);
    let patch: Vec<f32> = thumb.pixels().map(|p| p[0] as f32).collect();
    let count = patch.len() as f32;
    let mean = patch.iter().sum::<f32>() / count;
    let std = (patch.iter().map(|v| (v - mean) * (v - mean)).sum::<f32>() / count).sqrt();
    let standardized: Vec<f32> = patch.iter().map(|v| (v - mean) / (std + EPSILON)).collect();
    let patch_norm = l2_norm(&standardized);
    let standardized = scale(standardized, patch_norm);

    let mut combined = histogram;
    combined.extend(standardized);
    let norm = l2_norm(&combined);
    Signature(scale(combined, norm))
}

/// Cosine similarity with an epsilon-stabilized denominator
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    dot / (l2_norm(a) * l2_norm(b) + EPSILON)
}

fn l2_norm(values: &[f32]) -> f32 {
    values.iter().map(|v| v * v).sum::<f32>().sqrt()
}

fn scale(mut values: Vec<f32>, norm: f32) -> Vec<f32> {
    let denom = norm + EPSILON;
    for v in values.iter_mut() {
        *v /= denom;
    }
    values
}
