//! Enrolled candidate repository

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use identity::{EnrolledUser, Signature, UserDirectory};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::StorageError;

/// On-disk shape of one candidate
#[derive(Serialize)]
struct EnrolledUserRecord<'a> {
    username: &'a str,
    signatures: Vec<&'a [f32]>,
    first_name: &'a str,
    last_name: &'a str,
    email: &'a str,
}

/// JSON file of enrolled candidates keyed by identity key
pub struct EnrollmentRepository {
    path: PathBuf,
}

impl EnrollmentRepository {
    /// Create a repository backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load every well-formed candidate; a missing or unreadable file yields none
    pub fn load(&self) -> Vec<EnrolledUser> {
        if !self.path.exists() {
            info!(path = %self.path.display(), "No enrollment file yet");
            return Vec::new();
        }

        let payload = match fs::read_to_string(&self.path)
            .map_err(StorageError::from)
            .and_then(|text| serde_json::from_str::<Value>(&text).map_err(StorageError::from))
        {
            Ok(payload) => payload,
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    "Enrollment file unreadable, starting empty: {}", e
                );
                return Vec::new();
            }
        };

        let Value::Object(entries) = payload else {
            warn!(path = %self.path.display(), "Enrollment file is not an object, starting empty");
            return Vec::new();
        };

        let users: Vec<EnrolledUser> = entries
            .iter()
            .filter_map(|(key, value)| {
                let user = parse_user(value.as_object()?);
                if user.is_none() {
                    debug!(key = %key, "Skipping malformed enrollment record");
                }
                user
            })
            .collect();

        info!(path = %self.path.display(), users = users.len(), "Enrollments loaded");
        users
    }

    /// Persist the whole directory
    pub fn save(&self, users: &UserDirectory) -> Result<(), StorageError> {
        let snapshot = users.snapshot();
        let payload: BTreeMap<&str, EnrolledUserRecord<'_>> = snapshot
            .iter()
            .map(|user| {
                (
                    user.key.as_str(),
                    EnrolledUserRecord {
                        username: &user.username,
                        signatures: user.signatures().iter().map(Signature::as_slice).collect(),
                        first_name: &user.first_name,
                        last_name: &user.last_name,
                        email: &user.email,
                    },
                )
            })
            .collect();

        let json = serde_json::to_string_pretty(&payload)?;
        write_replacing(&self.path, json.as_bytes())?;
        debug!(path = %self.path.display(), users = payload.len(), "Enrollments saved");
        Ok(())
    }
}

fn parse_user(record: &Map<String, Value>) -> Option<EnrolledUser> {
    let username = text_field(record, "username");
    if username.is_empty() {
        return None;
    }

    let signatures: Vec<Signature> = match record.get("signatures") {
        Some(Value::Array(items)) => items.iter().filter_map(parse_signature).collect(),
        _ => record
            .get("signature")
            .and_then(parse_signature)
            .into_iter()
            .collect(),
    };

    EnrolledUser::new(
        username,
        text_field(record, "first_name"),
        text_field(record, "last_name"),
        text_field(record, "email"),
        signatures,
    )
    .ok()
}

fn text_field<'a>(record: &'a Map<String, Value>, field: &str) -> &'a str {
    record
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .unwrap_or("")
}

/// Non-empty numeric array; invalid vectors are dropped
fn parse_signature(value: &Value) -> Option<Signature> {
    let items = value.as_array()?;
    let values: Option<Vec<f32>> = items.iter().map(|v| v.as_f64().map(|f| f as f32)).collect();
    Signature::from_raw(values?).ok()
}

/// Write through a sibling temp file so readers never see a partial document
pub(crate) fn write_replacing(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
