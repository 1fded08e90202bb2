//! Violation policy configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Streak, lighting and evidence thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Consecutive live mismatches before `identity_mismatch`
    pub mismatch_streak_threshold: u32,

    /// Consecutive phone-positive frames before `phone_visible`
    pub phone_streak_threshold: u32,

    /// Mean grayscale brightness below which `low_lighting` is flagged
    pub low_light_threshold: f32,

    /// Minimum seconds between two evidence captures per candidate
    pub evidence_cooldown_secs: u64,

    /// Retained violation events per candidate
    pub max_events_per_user: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            mismatch_streak_threshold: 3,
            phone_streak_threshold: 2,
            low_light_threshold: 60.0,
            evidence_cooldown_secs: 8,
            max_events_per_user: 200,
        }
    }
}

impl MonitorConfig {
    /// Create strict config (escalate sooner)
    pub fn strict() -> Self {
        Self {
            mismatch_streak_threshold: 2,
            phone_streak_threshold: 1,
            ..Default::default()
        }
    }

    /// Create lenient config (tolerate longer streaks)
    pub fn lenient() -> Self {
        Self {
            mismatch_streak_threshold: 5,
            phone_streak_threshold: 4,
            ..Default::default()
        }
    }

    pub fn evidence_cooldown(&self) -> Duration {
        Duration::from_secs(self.evidence_cooldown_secs)
    }
}
