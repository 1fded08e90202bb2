//! Per-session violation tracking state

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

use identity::IdentityKey;
use tracing::debug;

use crate::MonitorError;

/// Streaks, latch and cooldown for one verified candidate
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionTrackState {
    pub mismatch_streak: u32,
    pub phone_streak: u32,
    /// Set once `phone_visible` fired for the current episode
    pub phone_violation_active: bool,
    pub last_capture: Option<Instant>,
}

impl SessionTrackState {
    /// Update the phone streak; true when this frame starts a new violation episode
    pub fn record_phone(&mut self, detected: bool, threshold: u32) -> bool {
        if !detected {
            self.phone_streak = 0;
            self.phone_violation_active = false;
            return false;
        }

        self.phone_streak += 1;
        if self.phone_streak >= threshold && !self.phone_violation_active {
            self.phone_violation_active = true;
            return true;
        }
        false
    }

    /// Update the mismatch streak from a live verification
    pub fn record_identity(&mut self, matched: bool) {
        if matched {
            self.mismatch_streak = 0;
        } else {
            self.mismatch_streak += 1;
        }
    }

    pub fn reset_mismatch(&mut self) {
        self.mismatch_streak = 0;
    }

    pub fn mismatch_breached(&self, threshold: u32) -> bool {
        self.mismatch_streak >= threshold
    }

    /// True when no capture happened yet or the cooldown has fully elapsed
    pub fn capture_due(&self, now: Instant, cooldown: Duration) -> bool {
        match self.last_capture {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= cooldown,
        }
    }

    pub fn mark_captured(&mut self, now: Instant) {
        self.last_capture = Some(now);
    }
}

/// One row per active session; each row has its own lock
#[derive(Debug, Default)]
pub struct SessionTable {
    rows: RwLock<HashMap<IdentityKey, Arc<Mutex<SessionTrackState>>>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start or fully reset a session
    pub fn start(&self, key: &IdentityKey) -> Result<(), MonitorError> {
        let mut rows = self.rows.write().map_err(|_| MonitorError::StatePoisoned)?;
        rows.insert(key.clone(), Arc::new(Mutex::new(SessionTrackState::default())));
        debug!(key = %key, "Session started");
        Ok(())
    }

    /// Drop a session; returns whether one existed
    pub fn discard(&self, key: &IdentityKey) -> Result<bool, MonitorError> {
        let mut rows = self.rows.write().map_err(|_| MonitorError::StatePoisoned)?;
        let existed = rows.remove(key).is_some();
        if existed {
            debug!(key = %key, "Session discarded");
        }
        Ok(existed)
    }

    /// Shared handle to a session row
    pub fn row(
        &self,
        key: &IdentityKey,
    ) -> Result<Option<Arc<Mutex<SessionTrackState>>>, MonitorError> {
        let rows = self.rows.read().map_err(|_| MonitorError::StatePoisoned)?;
        Ok(rows.get(key).cloned())
    }

    /// Copy of a session's current state
    pub fn snapshot(&self, key: &IdentityKey) -> Result<Option<SessionTrackState>, MonitorError> {
        match self.row(key)? {
            Some(row) => {
                let state = row.lock().map_err(|_| MonitorError::StatePoisoned)?;
                Ok(Some(state.clone()))
            }
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(name: &str) -> IdentityKey {
        IdentityKey::normalize(name).unwrap()
    }

    #[test]
    fn test_phone_latch_fires_once_per_episode() {
        let mut state = SessionTrackState::default();
        let fired: Vec<bool> = [true, true, true, true, false, true, true]
            .iter()
            .map(|&detected| state.record_phone(detected, 2))
            .collect();
        assert_eq!(fired, vec![false, true, false, false, false, false, true]);
    }

    #[test]
    fn test_phone_threshold_one() {
        let mut state = SessionTrackState::default();
        assert!(state.record_phone(true, 1));
        assert!(!state.record_phone(true, 1));
        assert_eq!(state.phone_streak, 2);
    }

    #[test]
    fn test_mismatch_streak() {
        let mut state = SessionTrackState::default();
        state.record_identity(false);
        state.record_identity(false);
        assert!(!state.mismatch_breached(3));
        state.record_identity(false);
        assert!(state.mismatch_breached(3));
        state.record_identity(true);
        assert_eq!(state.mismatch_streak, 0);
    }

    #[test]
    fn test_cooldown_gate() {
        let mut state = SessionTrackState::default();
        let t0 = Instant::now();
        let cooldown = Duration::from_secs(8);
        assert!(state.capture_due(t0, cooldown));

        state.mark_captured(t0);
        assert!(!state.capture_due(t0 + Duration::from_secs(7), cooldown));
        assert!(state.capture_due(t0 + Duration::from_secs(8), cooldown));
    }

    #[test]
    fn test_table_lifecycle() {
        let table = SessionTable::new();
        let alice = key("alice");
        assert!(table.row(&alice).unwrap().is_none());

        table.start(&alice).unwrap();
        {
            let row = table.row(&alice).unwrap().unwrap();
            row.lock().unwrap().mismatch_streak = 2;
        }
        assert_eq!(table.snapshot(&alice).unwrap().unwrap().mismatch_streak, 2);

        // restarting resets
        table.start(&alice).unwrap();
        assert_eq!(table.snapshot(&alice).unwrap().unwrap(), SessionTrackState::default());

        assert!(table.discard(&alice).unwrap());
        assert!(!table.discard(&alice).unwrap());
        assert!(table.is_empty());
    }
}
