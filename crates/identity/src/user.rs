//! Enrolled candidates and the in-memory directory

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{IdentityError, Signature};

/// Case-normalized username used to index enrollment and session state
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityKey(String);

impl IdentityKey {
    /// Trim and lowercase a username; `None` when nothing is left
    pub fn normalize(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_lowercase()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Letter first, then up to 48 letters, apostrophes, spaces or hyphens
pub fn is_valid_person_name(value: &str) -> bool {
    let value = value.trim();
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    let rest: Vec<char> = chars.collect();
    rest.len() <= 48
        && rest
            .iter()
            .all(|c| c.is_ascii_alphabetic() || matches!(c, '\'' | ' ' | '-'))
}

/// Enrolled exam candidate
#[derive(Debug, Clone, PartialEq)]
pub struct EnrolledUser {
    pub key: IdentityKey,
    /// Username as typed at registration
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    /// Reference signatures in enrollment order
    signatures: Vec<Signature>,
}

impl EnrolledUser {
    /// Create a candidate record; at least one signature is required
    pub fn new(
        username: &str,
        first_name: &str,
        last_name: &str,
        email: &str,
        signatures: Vec<Signature>,
    ) -> Result<Self, IdentityError> {
        let key = IdentityKey::normalize(username)
            .ok_or(IdentityError::InvalidProfile("Username is required"))?;
        if signatures.is_empty() {
            return Err(IdentityError::InvalidProfile("Could not build face signatures"));
        }
        Ok(Self {
            key,
            username: username.trim().to_string(),
            first_name: first_name.trim().to_string(),
            last_name: last_name.trim().to_string(),
            email: email.trim().to_string(),
            signatures,
        })
    }

    pub fn signatures(&self) -> &[Signature] {
        &self.signatures
    }

    /// Best cosine similarity against the references, skipping incomparable ones
    pub fn best_score(&self, probe: &Signature) -> Option<f32> {
        self.signatures
            .iter()
            .filter_map(|reference| probe.similarity(reference))
            .reduce(f32::max)
    }
}

/// Enrolled candidates keyed by identity
#[derive(Debug, Default)]
pub struct UserDirectory {
    users: RwLock<HashMap<IdentityKey, Arc<EnrolledUser>>>,
}

impl UserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory from loaded records
    pub fn from_users<I>(users: I) -> Self
    where
        I: IntoIterator<Item = EnrolledUser>,
    {
        let map = users
            .into_iter()
            .map(|user| (user.key.clone(), Arc::new(user)))
            .collect();
        Self {
            users: RwLock::new(map),
        }
    }

    pub fn get(&self, key: &IdentityKey) -> Option<Arc<EnrolledUser>> {
        self.read().get(key).cloned()
    }

    pub fn contains(&self, key: &IdentityKey) -> bool {
        self.read().contains_key(key)
    }

    /// Insert or fully replace a candidate, returning the previous record
    pub fn insert(&self, user: EnrolledUser) -> Option<Arc<EnrolledUser>> {
        let key = user.key.clone();
        let samples = user.signatures().len();
        let previous = self
            .users
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.clone(), Arc::new(user));
        info!(key = %key, samples, replaced = previous.is_some(), "Enrolled user stored");
        previous
    }

    /// Undo an [`insert`](Self::insert): put back `previous`, or drop the key when there was none
    pub fn restore(&self, key: &IdentityKey, previous: Option<Arc<EnrolledUser>>) {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        match previous {
            Some(user) => {
                users.insert(key.clone(), user);
            }
            None => {
                users.remove(key);
            }
        }
        debug!(key = %key, "Enrolled user restored");
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// All candidates ordered by identity key
    pub fn snapshot(&self) -> Vec<Arc<EnrolledUser>> {
        let mut users: Vec<_> = self.read().values().cloned().collect();
        users.sort_by(|a, b| a.key.cmp(&b.key));
        users
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<IdentityKey, Arc<EnrolledUser>>> {
        self.users.read().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn vector(rng: &mut StdRng, dim: usize) -> Vec<f32> {
        (0..dim).map(|_| rng.gen_range(-1.0..1.0)).collect()
    }

    fn noisy(rng: &mut StdRng, base: &[f32], noise: f32) -> Signature {
        let raw: Vec<f32> = base.iter().map(|v| v + rng.gen_range(-noise..noise)).collect();
        Signature::from_raw(raw).unwrap()
    }

    /// 1:N search for the candidate whose references best match the probe
    fn best_match(dir: &UserDirectory, probe: &Signature) -> Option<IdentityKey> {
        dir.read()
            .values()
            .filter_map(|user| user.best_score(probe).map(|score| (&user.key, score)))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(key, _)| key.clone())
    }

    fn user(name: &str, signatures: Vec<Signature>) -> EnrolledUser {
        EnrolledUser::new(name, "Ada", "Lovelace", "ada@example.com", signatures).unwrap()
    }

    #[test]
    fn test_identity_key_normalization() {
        assert_eq!(IdentityKey::normalize("  Alice.W ").unwrap().as_str(), "alice.w");
        assert!(IdentityKey::normalize("   ").is_none());
    }

    #[test]
    fn test_person_name_rules() {
        assert!(is_valid_person_name("Mary-Jane"));
        assert!(is_valid_person_name(" O'Neil "));
        assert!(is_valid_person_name("De la Cruz"));
        assert!(!is_valid_person_name(""));
        assert!(!is_valid_person_name("-Bob"));
        assert!(!is_valid_person_name("R2D2"));
        assert!(!is_valid_person_name(&"a".repeat(50)));
        assert!(is_valid_person_name(&"a".repeat(49)));
    }

    #[test]
    fn test_enrolled_user_requires_signatures() {
        let err = EnrolledUser::new("bob", "Bob", "Stone", "", vec![]).unwrap_err();
        assert!(matches!(err, IdentityError::InvalidProfile(_)));

        let err = EnrolledUser::new(" ", "Bob", "Stone", "", vec![]).unwrap_err();
        assert!(matches!(err, IdentityError::InvalidProfile("Username is required")));
    }

    #[test]
    fn test_directory_replaces_whole_record() {
        let dir = UserDirectory::new();
        let a = Signature::from_raw(vec![1.0, 0.0]).unwrap();
        let b = Signature::from_raw(vec![0.0, 1.0]).unwrap();

        assert!(dir.insert(user("Carol", vec![a.clone(), b.clone()])).is_none());
        let previous = dir.insert(user("CAROL", vec![b])).unwrap();
        assert_eq!(previous.signatures().len(), 2);

        let key = IdentityKey::normalize("carol").unwrap();
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.get(&key).unwrap().signatures().len(), 1);
        assert_eq!(dir.get(&key).unwrap().username, "CAROL");
    }

    #[test]
    fn test_best_score_takes_maximum() {
        let u = user(
            "dan",
            vec![
                Signature::from_raw(vec![1.0, 0.0]).unwrap(),
                Signature::from_raw(vec![0.6, 0.8]).unwrap(),
                Signature::from_raw(vec![1.0, 0.0, 0.0]).unwrap(),
            ],
        );
        let probe = Signature::from_raw(vec![0.0, 1.0]).unwrap();
        assert!((u.best_score(&probe).unwrap() - 0.8).abs() < 1e-5);

        let odd = Signature::from_raw(vec![1.0, 1.0, 1.0, 1.0]).unwrap();
        assert_eq!(u.best_score(&odd), None);
    }

    #[test]
    fn test_restore_undoes_insert() {
        let dir = UserDirectory::new();
        let a = Signature::from_raw(vec![1.0, 0.0]).unwrap();
        let b = Signature::from_raw(vec![0.0, 1.0]).unwrap();
        let key = IdentityKey::normalize("erin").unwrap();

        let previous = dir.insert(user("erin", vec![a.clone()]));
        dir.restore(&key, previous);
        assert!(dir.is_empty());

        dir.insert(user("erin", vec![a.clone()]));
        let previous = dir.insert(user("Erin", vec![b]));
        dir.restore(&key, previous);
        let kept = dir.get(&key).unwrap();
        assert_eq!(kept.username, "erin");
        assert_eq!(kept.signatures(), &[a]);
    }

    #[test]
    fn test_top1_identification_100_users() {
        let mut rng = StdRng::seed_from_u64(7);
        let dim = 96;
        let count = 100;

        let mut bases = Vec::new();
        let mut users = Vec::new();
        for idx in 0..count {
            let base = Signature::from_raw(vector(&mut rng, dim)).unwrap();
            let refs = (0..3).map(|_| noisy(&mut rng, base.as_slice(), 0.04)).collect();
            users.push(user(&format!("user{:03}", idx), refs));
            bases.push((IdentityKey::normalize(&format!("user{:03}", idx)).unwrap(), base));
        }
        let dir = UserDirectory::from_users(users);

        let mut probe_rng = StdRng::seed_from_u64(42);
        let correct = bases
            .iter()
            .filter(|(key, base)| {
                let probe = noisy(&mut probe_rng, base.as_slice(), 0.035);
                best_match(&dir, &probe).as_ref() == Some(key)
            })
            .count();

        let accuracy = correct as f32 / count as f32;
        assert!(accuracy >= 0.98, "top-1 accuracy {:.2}", accuracy);
    }
}
