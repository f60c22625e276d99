//! Persisted user table for the hashed-credential backend.
//!
//! Records live in a single `users.json` under the data root. All access goes
//! through `UserStore`, which serializes read-modify-write cycles behind a
//! process-wide mutex so concurrent logins and cold-start bootstraps cannot
//! interleave. The uniqueness invariant on `username` is enforced at insert:
//! a later duplicate insert fails rather than replacing the existing record.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

fn default_role() -> String { "user".to_string() }

/// One row of the user table. The password digest is an Argon2 PHC string;
/// plaintext secrets are never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoredUser {
    pub id: String,
    pub username: String,
    pub password_hash: String,
    #[serde(default = "default_role")]
    pub role: String,
}

#[derive(Debug, Error)]
pub enum InsertError {
    #[error("user '{0}' already exists")]
    Duplicate(String),
    #[error("user store I/O: {0}")]
    Store(anyhow::Error),
}

/// Handle to the on-disk user table. Cloneable; clones share the same lock.
#[derive(Clone)]
pub struct UserStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl UserStore {
    pub fn new(root: &Path) -> Self {
        Self { path: root.join("users.json"), lock: Arc::new(Mutex::new(())) }
    }

    /// Path of the backing file; doubles as the store identity reported by
    /// the connectivity probe.
    pub fn path(&self) -> &Path { &self.path }

    fn read_all(&self) -> Result<Vec<StoredUser>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)
            .with_context(|| format!("reading user table {}", self.path.display()))?;
        let users: Vec<StoredUser> = serde_json::from_str(&raw)
            .with_context(|| format!("parsing user table {}", self.path.display()))?;
        Ok(users)
    }

    fn write_all(&self, users: &[StoredUser]) -> Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("creating user table folder {}", dir.display()))?;
        }
        let raw = serde_json::to_string_pretty(users)?;
        std::fs::write(&self.path, raw)
            .with_context(|| format!("writing user table {}", self.path.display()))?;
        Ok(())
    }

    /// Exact, case-sensitive lookup by username.
    pub fn find(&self, username: &str) -> Result<Option<StoredUser>> {
        let _g = self.lock.lock();
        let users = self.read_all()?;
        Ok(users.into_iter().find(|u| u.username == username))
    }

    /// Insert a new record. Fails with `InsertError::Duplicate` if a record
    /// with the same username already exists.
    pub fn insert(&self, user: StoredUser) -> Result<(), InsertError> {
        let _g = self.lock.lock();
        let mut users = self.read_all().map_err(InsertError::Store)?;
        if users.iter().any(|u| u.username == user.username) {
            return Err(InsertError::Duplicate(user.username));
        }
        debug!(username = %user.username, "user table insert");
        users.push(user);
        self.write_all(&users).map_err(InsertError::Store)
    }

    /// Remove a record by username. Returns whether a record was removed.
    pub fn delete(&self, username: &str) -> Result<bool> {
        let _g = self.lock.lock();
        let mut users = self.read_all()?;
        let before = users.len();
        users.retain(|u| u.username != username);
        if users.len() == before {
            return Ok(false);
        }
        self.write_all(&users)?;
        Ok(true)
    }

    /// Cheap health check: the table can be opened and parsed.
    pub fn ping(&self) -> Result<()> {
        let _g = self.lock.lock();
        self.read_all().map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn user(name: &str) -> StoredUser {
        StoredUser {
            id: uuid::Uuid::new_v4().to_string(),
            username: name.to_string(),
            password_hash: "$argon2id$fake".to_string(),
            role: "user".to_string(),
        }
    }

    #[test]
    fn insert_then_find() {
        let tmp = tempdir().unwrap();
        let store = UserStore::new(tmp.path());
        assert!(store.find("alice").unwrap().is_none());
        store.insert(user("alice")).unwrap();
        let found = store.find("alice").unwrap().unwrap();
        assert_eq!(found.username, "alice");
        assert_eq!(found.role, "user");
    }

    #[test]
    fn duplicate_insert_fails_and_keeps_original() {
        let tmp = tempdir().unwrap();
        let store = UserStore::new(tmp.path());
        let first = user("alice");
        let original_id = first.id.clone();
        store.insert(first).unwrap();
        let err = store.insert(user("alice")).unwrap_err();
        assert!(matches!(err, InsertError::Duplicate(ref n) if n == "alice"));
        assert_eq!(store.find("alice").unwrap().unwrap().id, original_id);
    }

    #[test]
    fn lookup_is_case_sensitive() {
        let tmp = tempdir().unwrap();
        let store = UserStore::new(tmp.path());
        store.insert(user("Admin")).unwrap();
        assert!(store.find("admin").unwrap().is_none());
        assert!(store.find("Admin").unwrap().is_some());
    }

    #[test]
    fn delete_removes_record() {
        let tmp = tempdir().unwrap();
        let store = UserStore::new(tmp.path());
        store.insert(user("alice")).unwrap();
        assert!(store.delete("alice").unwrap());
        assert!(!store.delete("alice").unwrap());
        assert!(store.find("alice").unwrap().is_none());
    }

    #[test]
    fn corrupt_table_surfaces_error() {
        let tmp = tempdir().unwrap();
        let store = UserStore::new(tmp.path());
        std::fs::write(store.path(), "not json").unwrap();
        assert!(store.find("alice").is_err());
        assert!(store.ping().is_err());
    }
}
