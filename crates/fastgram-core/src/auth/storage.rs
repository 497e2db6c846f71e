use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// What survives between runs: the token pair and the login flag expiry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(rename = "accessToken", skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(rename = "refreshToken", skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(rename = "loggedInUntil", skip_serializing_if = "Option::is_none")]
    pub logged_in_until: Option<DateTime<Utc>>,
}

impl StoredSession {
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.logged_in_until.is_none()
    }
}

/// Persistence backend for the token store.
pub trait SessionStorage: Send + Sync {
    /// Read the persisted session, `None` when nothing has been saved.
    fn load(&self) -> Result<Option<StoredSession>>;

    fn save(&self, session: &StoredSession) -> Result<()>;

    /// Remove the persisted session. Removing a missing session is not an error.
    fn remove(&self) -> Result<()>;
}

/// Session persisted as JSON on disk.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// Store `session.json` inside `dir`
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<StoredSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read session file")?;
        let session = serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(session))
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(session)?;
        std::fs::write(&self.path, contents).context("Failed to write session file")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// Process-local storage; nothing is written anywhere.
#[derive(Default)]
pub struct MemoryStorage {
    session: Mutex<Option<StoredSession>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an already populated session
    pub fn with_session(session: StoredSession) -> Self {
        Self {
            session: Mutex::new(Some(session)),
        }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<StoredSession>> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<StoredSession>> {
        Ok(self.slot().clone())
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        *self.slot() = Some(session.clone());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.slot() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> StoredSession {
        StoredSession {
            access_token: Some("a1".to_string()),
            refresh_token: Some("r1".to_string()),
            logged_in_until: Some(Utc::now()),
        }
    }

    #[test]
    fn test_file_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(dir.path().join("nested"));

        assert_eq!(storage.load().unwrap(), None);

        let session = sample();
        storage.save(&session).unwrap();
        assert_eq!(storage.load().unwrap(), Some(session));

        storage.remove().unwrap();
        assert!(!storage.path().exists());
        // Removing twice is fine
        storage.remove().unwrap();
    }

    #[test]
    fn test_file_storage_uses_camel_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        storage.save(&sample()).unwrap();

        let raw = std::fs::read_to_string(storage.path()).unwrap();
        assert!(raw.contains("\"accessToken\""));
        assert!(raw.contains("\"refreshToken\""));
    }

    #[test]
    fn test_file_storage_rejects_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::in_dir(dir.path());
        std::fs::write(storage.path(), "{ not json").unwrap();
        assert!(storage.load().is_err());
    }

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.load().unwrap(), None);
        storage.save(&sample()).unwrap();
        assert!(storage.load().unwrap().is_some());
        storage.remove().unwrap();
        assert_eq!(storage.load().unwrap(), None);
    }
}
