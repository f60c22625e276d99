//! Credential verification backends.
//!
//! Two interchangeable backends sit behind the `CredentialBackend` trait so
//! the session gate never branches on which one is configured:
//! - `FixedCredentials`: a constant username/password pair, no I/O.
//! - `StoredCredentials`: Argon2 digests in the persisted user table.
//!
//! Verification yields either a `UserRecord` (never carrying the digest) or
//! a `VerifyError`. `Rejected` covers both unknown users and wrong passwords
//! so the result leaks no existence signal; `Unavailable` is reserved for
//! store I/O faults and must never be conflated with a rejection.

use anyhow::{Result, anyhow};
use argon2::{Argon2, PasswordHasher, PasswordVerifier};
use chrono::{DateTime, Utc};
use password_hash::{PasswordHash, SaltString};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::users::{InsertError, StoredUser, UserStore};

/// Well-known administrative identifier seeded on first initialization.
pub const BOOTSTRAP_USERNAME: &str = "admin";
pub const BOOTSTRAP_PASSWORD: &str = "admin";
pub const BOOTSTRAP_ROLE: &str = "admin";

/// Verified user reference handed to the session gate.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    /// Unknown user or wrong password; the two are indistinguishable.
    #[error("invalid credentials")]
    Rejected,
    /// The backing store could not be reached or read.
    #[error("credential store unavailable: {0}")]
    Unavailable(anyhow::Error),
}

/// Result of a connectivity probe. Recomputed on demand, never cached, and
/// never allowed to influence the gate.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub connected: bool,
    pub database: String,
    pub timestamp: DateTime<Utc>,
}

pub trait CredentialBackend: Send + Sync {
    /// Verify a presented username/password pair against the store.
    fn verify(&self, username: &str, password: &str) -> Result<UserRecord, VerifyError>;

    /// Report whether the backing store is reachable. Must not raise; all
    /// failures are captured and reported as `connected: false`.
    fn probe(&self) -> StoreStatus;
}

pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
    let argon2 = Argon2::default();
    let phc = argon2.hash_password(password.as_bytes(), &salt).map_err(|e| anyhow!(e.to_string()))?.to_string();
    Ok(phc)
}

pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        let argon2 = Argon2::default();
        argon2.verify_password(password.as_bytes(), &parsed).is_ok()
    } else { false }
}

/// Constant-pair backend: no store behind it, accept/reject only.
pub struct FixedCredentials {
    username: String,
    password: String,
}

impl FixedCredentials {
    pub fn new<S: Into<String>>(username: S, password: S) -> Self {
        Self { username: username.into(), password: password.into() }
    }
}

impl CredentialBackend for FixedCredentials {
    fn verify(&self, username: &str, password: &str) -> Result<UserRecord, VerifyError> {
        if username == self.username && password == self.password {
            Ok(UserRecord {
                id: "1".to_string(),
                username: username.to_string(),
                role: BOOTSTRAP_ROLE.to_string(),
            })
        } else {
            Err(VerifyError::Rejected)
        }
    }

    fn probe(&self) -> StoreStatus {
        StoreStatus {
            connected: false,
            database: "local authentication only".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Hashed-store backend over the persisted user table.
#[derive(Clone)]
pub struct StoredCredentials {
    store: UserStore,
}

impl StoredCredentials {
    pub fn new(store: UserStore) -> Self { Self { store } }

    pub fn store(&self) -> &UserStore { &self.store }

    /// Seed the well-known admin record if absent. Idempotent per identifier:
    /// an existing record is left untouched, and losing the insert race to a
    /// concurrent cold start is treated as success.
    pub fn ensure_bootstrap_admin(&self) -> Result<()> {
        if self.store.find(BOOTSTRAP_USERNAME)?.is_some() {
            return Ok(());
        }
        let record = StoredUser {
            id: uuid::Uuid::new_v4().to_string(),
            username: BOOTSTRAP_USERNAME.to_string(),
            password_hash: hash_password(BOOTSTRAP_PASSWORD)?,
            role: BOOTSTRAP_ROLE.to_string(),
        };
        match self.store.insert(record) {
            Ok(()) => {
                info!(username = BOOTSTRAP_USERNAME, "seeded bootstrap admin record");
                Ok(())
            }
            Err(InsertError::Duplicate(_)) => Ok(()),
            Err(InsertError::Store(e)) => Err(e),
        }
    }
}

impl CredentialBackend for StoredCredentials {
    fn verify(&self, username: &str, password: &str) -> Result<UserRecord, VerifyError> {
        let found = self.store.find(username).map_err(VerifyError::Unavailable)?;
        let Some(user) = found else {
            return Err(VerifyError::Rejected);
        };
        if !verify_password(&user.password_hash, password) {
            return Err(VerifyError::Rejected);
        }
        debug!(username = %user.username, "credentials verified");
        Ok(UserRecord { id: user.id, username: user.username, role: user.role })
    }

    fn probe(&self) -> StoreStatus {
        let timestamp = Utc::now();
        match self.store.ping() {
            Ok(()) => StoreStatus {
                connected: true,
                database: self.store.path().display().to_string(),
                timestamp,
            },
            Err(e) => StoreStatus {
                connected: false,
                database: format!("{e:#}"),
                timestamp,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn password_hash_roundtrip() {
        let phc = hash_password("tr1cky").unwrap();
        assert!(verify_password(&phc, "tr1cky"));
        assert!(!verify_password(&phc, "wrong"));
        assert!(!verify_password("not-a-phc-string", "tr1cky"));
    }

    #[test]
    fn fixed_backend_accepts_exact_pair_only() {
        let backend = FixedCredentials::new("admin", "admin");
        let rec = backend.verify("admin", "admin").unwrap();
        assert_eq!(rec.role, "admin");
        assert!(matches!(backend.verify("admin", "wrong"), Err(VerifyError::Rejected)));
        assert!(matches!(backend.verify("Admin", "admin"), Err(VerifyError::Rejected)));
        assert!(matches!(backend.verify("", ""), Err(VerifyError::Rejected)));
    }

    #[test]
    fn fixed_backend_probe_reports_no_store() {
        let backend = FixedCredentials::new("admin", "admin");
        let status = backend.probe();
        assert!(!status.connected);
        assert_eq!(status.database, "local authentication only");
    }

    #[test]
    fn bootstrap_is_idempotent() {
        let tmp = tempdir().unwrap();
        let backend = StoredCredentials::new(UserStore::new(tmp.path()));
        backend.ensure_bootstrap_admin().unwrap();
        let first = backend.store().find(BOOTSTRAP_USERNAME).unwrap().unwrap();
        backend.ensure_bootstrap_admin().unwrap();
        let second = backend.store().find(BOOTSTRAP_USERNAME).unwrap().unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn stored_backend_verify_matrix() {
        let tmp = tempdir().unwrap();
        let backend = StoredCredentials::new(UserStore::new(tmp.path()));
        backend.ensure_bootstrap_admin().unwrap();

        let rec = backend.verify(BOOTSTRAP_USERNAME, BOOTSTRAP_PASSWORD).unwrap();
        assert_eq!(rec.username, "admin");
        assert_eq!(rec.role, "admin");

        assert!(matches!(backend.verify(BOOTSTRAP_USERNAME, "wrong"), Err(VerifyError::Rejected)));
        assert!(matches!(backend.verify("nobody", "anything"), Err(VerifyError::Rejected)));
    }

    #[test]
    fn record_never_carries_digest() {
        let tmp = tempdir().unwrap();
        let backend = StoredCredentials::new(UserStore::new(tmp.path()));
        backend.ensure_bootstrap_admin().unwrap();
        let rec = backend.verify(BOOTSTRAP_USERNAME, BOOTSTRAP_PASSWORD).unwrap();
        let json = serde_json::to_string(&rec).unwrap();
        assert!(!json.contains("argon2"));
        assert!(!json.contains("password"));
    }

    #[test]
    fn broken_store_is_unavailable_not_rejected() {
        let tmp = tempdir().unwrap();
        let store = UserStore::new(tmp.path());
        std::fs::write(store.path(), "not json").unwrap();
        let backend = StoredCredentials::new(store);
        assert!(matches!(backend.verify("admin", "admin"), Err(VerifyError::Unavailable(_))));
    }

    #[test]
    fn probe_on_broken_store_reports_disconnected() {
        let tmp = tempdir().unwrap();
        let store = UserStore::new(tmp.path());
        std::fs::write(store.path(), "not json").unwrap();
        let status = StoredCredentials::new(store).probe();
        assert!(!status.connected);
        assert!(!status.database.is_empty());
    }
}
