//! Proctoring Monitor
//!
//! Turns per-frame analyzer output into stable, rate-limited violations:
//! - Per-session streak counters and the phone-visible latch
//! - Cooldown-gated evidence capture
//! - `ProctorEngine` orchestration for registration, start-of-exam
//!   verification and live frame analysis
//! - Settings loading and logging bootstrap

pub mod clock;
pub mod config;
pub mod engine;
pub mod logging;
pub mod session;
pub mod settings;

pub use clock::{Clock, SystemClock};
pub use config::MonitorConfig;
pub use engine::{EngineBuilder, ExamSummary, FrameReport, ProctorEngine, StartVerification};
pub use logging::{init_logging, LogSettings};
pub use session::{SessionTable, SessionTrackState};
pub use settings::Settings;

use face_analysis::FaceError;
use frame::FrameError;
use identity::IdentityError;
use storage::StorageError;
use thiserror::Error;

/// Monitor error types
#[derive(Error, Debug)]
pub enum MonitorError {
    #[error(transparent)]
    Frame(#[from] FrameError),

    #[error(transparent)]
    Face(#[from] FaceError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("Unauthorized monitoring session for {0}")]
    NotVerified(String),

    #[error("Session state lock poisoned")]
    StatePoisoned,

    #[error("Configuration error: {0}")]
    Config(String),
}
