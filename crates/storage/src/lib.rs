//! Storage Layer
//!
//! File-backed persistence for the proctoring engine:
//! - Enrolled candidates (JSON, legacy single-signature records accepted)
//! - Violation event log with per-candidate retention
//! - Evidence snapshot images behind an [`ImageSink`]

pub mod config;
pub mod evidence;
mod repository;
pub mod sink;

pub use config::StorageConfig;
pub use evidence::{evidence_filename, trust_score, EvidenceStore, UserSummary, ViolationEvent};
pub use repository::EnrollmentRepository;
pub use sink::{ImageSink, JpegFileSink};

use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Lock error: {0}")]
    Lock(String),
    #[error("Could not save evidence image: {0}")]
    ImageWrite(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}
