//! Secure per-installation identity storage.
//!
//! Persists the stable device UUID, the current access token, and the
//! salted digest used for offline credential verification. Stored as JSON
//! in the platform data directory with owner-only permissions.

use anyhow::{Context, Result};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;
use std::sync::Mutex;
use uuid::Uuid;

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

/// On-disk record, one per installation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IdentityRecord {
    /// Stable per-installation identifier, generated once and never
    /// regenerated while present.
    device_uuid: Option<Uuid>,
    /// Access token for authenticated resource fetches.
    token: Option<String>,
    /// Credential for offline verification, if one has been stored.
    offline: Option<OfflineCredential>,
}

/// Salted digest of the last successfully used password.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct OfflineCredential {
    username: String,
    /// base64url, 16 random bytes.
    salt: String,
    /// base64url(sha256(salt || password)).
    digest: String,
}

fn digest_password(salt: &[u8], password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    URL_SAFE_NO_PAD.encode(hasher.finalize())
}

/// Read-through cache over the identity file.
///
/// A missing device UUID is a soft failure for callers: features continue
/// with reduced fidelity, never a hard authentication failure.
#[derive(Debug)]
pub struct IdentityStore {
    path: PathBuf,
    record: Mutex<IdentityRecord>,
}

impl IdentityStore {
    /// Default storage path in the platform data directory.
    pub fn default_path() -> Result<PathBuf> {
        let data_dir =
            dirs::data_local_dir().context("Could not determine local data directory")?;
        Ok(data_dir.join("fieldgate").join("identity.json"))
    }

    /// Open the store at the default path.
    pub fn open() -> Result<Self> {
        Ok(Self::open_at(Self::default_path()?))
    }

    /// Open the store at a specific path.
    ///
    /// A missing or unreadable file yields an empty record; the first
    /// successful write recreates it.
    pub fn open_at(path: PathBuf) -> Self {
        let record = match File::open(&path) {
            Ok(file) => serde_json::from_reader(BufReader::new(file)).unwrap_or_else(|err| {
                tracing::warn!(path = %path.display(), %err, "identity file unreadable, starting fresh");
                IdentityRecord::default()
            }),
            Err(_) => IdentityRecord::default(),
        };
        Self {
            path,
            record: Mutex::new(record),
        }
    }

    fn persist(&self, record: &IdentityRecord) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let file = File::create(&self.path)
            .with_context(|| format!("Failed to create identity file: {}", self.path.display()))?;

        // Owner read/write only on Unix
        #[cfg(unix)]
        {
            let mut perms = file.metadata()?.permissions();
            perms.set_mode(0o600);
            file.set_permissions(perms)?;
        }

        serde_json::to_writer_pretty(BufWriter::new(file), record)
            .with_context(|| format!("Failed to write identity file: {}", self.path.display()))
    }

    /// The stable device UUID, generating and persisting one on first call.
    ///
    /// Returns `None` when a fresh UUID could not be persisted; an
    /// identifier that survives only in memory would violate stability, so
    /// none is produced at all.
    pub fn retrieve_device_uuid(&self) -> Option<Uuid> {
        let mut record = self.record.lock().expect("identity lock poisoned");
        if let Some(existing) = record.device_uuid {
            return Some(existing);
        }

        let fresh = Uuid::new_v4();
        record.device_uuid = Some(fresh);
        if let Err(err) = self.persist(&record) {
            tracing::warn!(%err, "could not persist device identifier");
            record.device_uuid = None;
            return None;
        }
        Some(fresh)
    }

    /// The stored access token, if any.
    pub fn token(&self) -> Option<String> {
        self.record
            .lock()
            .expect("identity lock poisoned")
            .token
            .clone()
    }

    /// Store or clear the access token.
    pub fn store_token(&self, token: Option<String>) -> Result<()> {
        let mut record = self.record.lock().expect("identity lock poisoned");
        record.token = token;
        self.persist(&record)
    }

    /// Record a credential for later offline verification.
    ///
    /// Overwrites any previous credential; one record per installation.
    pub fn store_offline_credential(&self, username: &str, password: &str) -> Result<()> {
        let salt: [u8; 16] = rand::thread_rng().gen();
        let credential = OfflineCredential {
            username: username.to_string(),
            salt: URL_SAFE_NO_PAD.encode(salt),
            digest: digest_password(&salt, password),
        };

        let mut record = self.record.lock().expect("identity lock poisoned");
        record.offline = Some(credential);
        self.persist(&record)
    }

    /// Verify a username/password pair against the stored credential.
    pub fn verify_offline(&self, username: &str, password: &str) -> bool {
        let record = self.record.lock().expect("identity lock poisoned");
        let Some(ref credential) = record.offline else {
            return false;
        };
        if credential.username != username {
            return false;
        }
        let Ok(salt) = URL_SAFE_NO_PAD.decode(&credential.salt) else {
            return false;
        };
        digest_password(&salt, password) == credential.digest
    }
}
