//! Storage locations

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Relative prefix recorded in every event's `image_path`
pub const CAPTURES_PREFIX: &str = "violation_captures";

/// Where enrollment and evidence data live on disk
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Enrolled candidates JSON
    pub enrolled_users_file: PathBuf,

    /// Violation events JSON
    pub violation_events_file: PathBuf,

    /// Directory receiving evidence JPEGs
    pub captures_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enrolled_users_file: PathBuf::from("registered_faces.json"),
            violation_events_file: PathBuf::from("violation_events.json"),
            captures_dir: PathBuf::from(CAPTURES_PREFIX),
        }
    }
}

impl StorageConfig {
    /// Place all files under one data directory
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        Self {
            enrolled_users_file: dir.join("registered_faces.json"),
            violation_events_file: dir.join("violation_events.json"),
            captures_dir: dir.join(CAPTURES_PREFIX),
        }
    }
}
