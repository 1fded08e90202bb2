//! Violation evidence log

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use face_analysis::Violation;
use frame::VideoFrame;
use identity::{IdentityKey, UserDirectory};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::CAPTURES_PREFIX;
use crate::repository::write_replacing;
use crate::{ImageSink, StorageConfig, StorageError};

type EventLog = HashMap<IdentityKey, VecDeque<ViolationEvent>>;

/// One captured violation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationEvent {
    pub timestamp: DateTime<Utc>,
    /// Relative path, `violation_captures/<file>`
    pub image_path: String,
    pub violations: Vec<Violation>,
    pub username: String,
}

/// Admin dashboard row
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSummary {
    pub key: IdentityKey,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub samples: usize,
    pub violation_count: usize,
    pub last_violation: Option<DateTime<Utc>>,
}

/// Exam-summary trust score: 100 minus 5 per violation, floored at 0
pub fn trust_score(violations: usize) -> u32 {
    100u32.saturating_sub(violations.min(20) as u32 * 5)
}

/// `<key with spaces as _>_<UTC timestamp>_<8 hex>.jpg`
pub fn evidence_filename(key: &IdentityKey, at: DateTime<Utc>) -> String {
    let nonce = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}.jpg",
        key.as_str().replace(' ', "_"),
        at.format("%Y%m%dT%H%M%S%6fZ"),
        &nonce[..8]
    )
}

/// Per-candidate event log persisted as JSON, images delegated to a sink
pub struct EvidenceStore {
    events_file: PathBuf,
    captures_dir: PathBuf,
    max_events_per_user: usize,
    sink: Box<dyn ImageSink>,
    events: Mutex<EventLog>,
}

impl EvidenceStore {
    /// Open the store, loading any existing event log
    pub fn open(
        config: &StorageConfig,
        max_events_per_user: usize,
        sink: Box<dyn ImageSink>,
    ) -> Self {
        let events = load_events(&config.violation_events_file);
        info!(
            path = %config.violation_events_file.display(),
            users = events.len(),
            max_events_per_user,
            "Evidence store opened"
        );
        Self {
            events_file: config.violation_events_file.clone(),
            captures_dir: config.captures_dir.clone(),
            max_events_per_user: max_events_per_user.max(1),
            sink,
            events: Mutex::new(events),
        }
    }

    /// Capture evidence now
    pub fn append(
        &self,
        key: &IdentityKey,
        username: &str,
        violations: &[Violation],
        frame: &VideoFrame,
    ) -> Result<ViolationEvent, StorageError> {
        self.append_at(key, username, violations, frame, Utc::now())
    }

    /// Save the snapshot, record the event, trim to the retention cap and persist
    pub fn append_at(
        &self,
        key: &IdentityKey,
        username: &str,
        violations: &[Violation],
        frame: &VideoFrame,
        at: DateTime<Utc>,
    ) -> Result<ViolationEvent, StorageError> {
        let filename = evidence_filename(key, at);
        self.sink.save_image(&self.captures_dir.join(&filename), frame)?;

        let event = ViolationEvent {
            timestamp: at,
            image_path: format!("{}/{}", CAPTURES_PREFIX, filename),
            violations: violations.to_vec(),
            username: username.to_string(),
        };

        let mut events = self.lock()?;
        let per_user = events.entry(key.clone()).or_default();
        per_user.push_back(event.clone());
        while per_user.len() > self.max_events_per_user {
            per_user.pop_front();
        }
        let retained = per_user.len();

        persist_events(&self.events_file, &events)?;
        debug!(key = %key, retained, image = %event.image_path, "Violation evidence recorded");
        Ok(event)
    }

    /// Events for one candidate, oldest first
    pub fn events(&self, key: &IdentityKey) -> Result<Vec<ViolationEvent>, StorageError> {
        Ok(self
            .lock()?
            .get(key)
            .map(|list| list.iter().cloned().collect())
            .unwrap_or_default())
    }

    /// Events for the admin detail view, newest first
    pub fn events_newest_first(
        &self,
        key: &IdentityKey,
    ) -> Result<Vec<ViolationEvent>, StorageError> {
        Ok(self
            .lock()?
            .get(key)
            .map(|list| {
                list.iter()
                    .rev()
                    .filter(|event| !event.image_path.is_empty())
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    /// One row per enrolled candidate, sorted by lowercase username
    pub fn user_summaries(&self, users: &UserDirectory) -> Result<Vec<UserSummary>, StorageError> {
        let events = self.lock()?;
        let mut rows: Vec<UserSummary> = users
            .snapshot()
            .iter()
            .map(|user| {
                let list = events.get(&user.key);
                UserSummary {
                    key: user.key.clone(),
                    username: user.username.clone(),
                    first_name: user.first_name.clone(),
                    last_name: user.last_name.clone(),
                    email: user.email.clone(),
                    samples: user.signatures().len(),
                    violation_count: list.map(VecDeque::len).unwrap_or(0),
                    last_violation: list.and_then(|l| l.back()).map(|e| e.timestamp),
                }
            })
            .collect();
        rows.sort_by_key(|row| row.username.to_lowercase());
        Ok(rows)
    }

    fn lock(&self) -> Result<MutexGuard<'_, EventLog>, StorageError> {
        self.events
            .lock()
            .map_err(|e| StorageError::Lock(e.to_string()))
    }
}

fn persist_events(path: &Path, events: &EventLog) -> Result<(), StorageError> {
    let ordered: BTreeMap<&str, &VecDeque<ViolationEvent>> =
        events.iter().map(|(key, list)| (key.as_str(), list)).collect();
    let json = serde_json::to_string_pretty(&ordered)?;
    write_replacing(path, json.as_bytes())
}

/// Lenient load; malformed entries are dropped, a bad file yields an empty log
fn load_events(path: &Path) -> EventLog {
    if !path.exists() {
        return EventLog::new();
    }

    let payload = match fs::read_to_string(path)
        .map_err(StorageError::from)
        .and_then(|text| serde_json::from_str::<Value>(&text).map_err(StorageError::from))
    {
        Ok(payload) => payload,
        Err(e) => {
            warn!(path = %path.display(), "Violation log unreadable, starting empty: {}", e);
            return EventLog::new();
        }
    };

    let Value::Object(entries) = payload else {
        warn!(path = %path.display(), "Violation log is not an object, starting empty");
        return EventLog::new();
    };

    entries
        .iter()
        .filter_map(|(key, value)| {
            let key = IdentityKey::normalize(key)?;
            let items = value.as_array()?;
            Some((key, items.iter().filter_map(parse_event).collect()))
        })
        .collect()
}

fn parse_event(item: &Value) -> Option<ViolationEvent> {
    let text = |field: &str| item.get(field).and_then(Value::as_str).map(str::trim);

    let image_path = text("image_path").filter(|s| !s.is_empty())?;
    let timestamp = text("timestamp").filter(|s| !s.is_empty())?;
    let timestamp = DateTime::parse_from_rfc3339(timestamp).ok()?.with_timezone(&Utc);
    let violations = item
        .get("violations")?
        .as_array()?
        .iter()
        .filter_map(Value::as_str)
        .filter_map(Violation::from_tag)
        .collect();

    Some(ViolationEvent {
        timestamp,
        image_path: image_path.to_string(),
        violations,
        username: text("username").unwrap_or("").to_string(),
    })
}
