//! Deployment settings
//!
//! Defaults come from each component's config struct. An optional file
//! (TOML, JSON, YAML, ...) and `PROCTOR__<SECTION>__<FIELD>` environment
//! variables are layered on top, e.g. `PROCTOR__MONITOR__EVIDENCE_COOLDOWN_SECS=10`.

use std::path::Path;

use face_analysis::PoseConfig;
use identity::IdentityConfig;
use phone_detection::PhoneDetectorConfig;
use serde::{Deserialize, Serialize};
use storage::StorageConfig;

use crate::{LogSettings, MonitorConfig, MonitorError};

/// Environment variable prefix
pub const ENV_PREFIX: &str = "PROCTOR";

/// Complete engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub log: LogSettings,
    pub pose: PoseConfig,
    pub identity: IdentityConfig,
    pub phone: PhoneDetectorConfig,
    pub monitor: MonitorConfig,
    pub storage: StorageConfig,
}

impl Settings {
    /// Load defaults, then the optional file, then `PROCTOR__*` variables
    pub fn load(path: Option<&Path>) -> Result<Self, MonitorError> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    pub(crate) fn load_with_prefix(
        path: Option<&Path>,
        prefix: &str,
    ) -> Result<Self, MonitorError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder
            .add_source(
                config::Environment::with_prefix(prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .and_then(|c| c.try_deserialize::<Settings>())
            .map_err(|e| MonitorError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults_without_sources() {
        let settings = Settings::load_with_prefix(None, "PROCTOR_TEST_EMPTY").unwrap();
        assert_eq!(settings.identity.start_threshold, 0.84);
        assert_eq!(settings.identity.live_threshold, 0.78);
        assert_eq!(settings.monitor.mismatch_streak_threshold, 3);
        assert_eq!(settings.phone.frame_skip, 3);
        assert!(settings.phone.model_path.is_none());
        assert_eq!(settings.pose.sideways_threshold, 0.28);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proctor.toml");
        fs::write(
            &path,
            r#"
[monitor]
evidence_cooldown_secs = 20
phone_streak_threshold = 3

[phone]
model_path = "models/yolov8n.onnx"

[log]
json = true
"#,
        )
        .unwrap();

        let settings = Settings::load_with_prefix(Some(&path), "PROCTOR_TEST_FILE").unwrap();
        assert_eq!(settings.monitor.evidence_cooldown_secs, 20);
        assert_eq!(settings.monitor.phone_streak_threshold, 3);
        assert_eq!(settings.monitor.mismatch_streak_threshold, 3);
        assert_eq!(
            settings.phone.model_path.as_deref(),
            Some(Path::new("models/yolov8n.onnx"))
        );
        assert!(settings.log.json);
    }

    #[test]
    fn test_environment_overrides_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("proctor.json");
        fs::write(&path, r#"{"monitor": {"low_light_threshold": 40.0}}"#).unwrap();

        std::env::set_var("PROCTOR_TEST_ENV__MONITOR__LOW_LIGHT_THRESHOLD", "75.5");
        let settings = Settings::load_with_prefix(Some(&path), "PROCTOR_TEST_ENV").unwrap();
        std::env::remove_var("PROCTOR_TEST_ENV__MONITOR__LOW_LIGHT_THRESHOLD");

        assert_eq!(settings.monitor.low_light_threshold, 75.5);
    }

    #[test]
    fn test_missing_file_is_optional() {
        let missing = Path::new("/nonexistent/proctor.toml");
        let settings = Settings::load_with_prefix(Some(missing), "PROCTOR_TEST_MISSING").unwrap();
        assert_eq!(settings.monitor.max_events_per_user, 200);
    }
}
