use anyhow::{Context, Result};
use keyring::Entry;

use super::storage::{SessionStorage, StoredSession};

const SERVICE_NAME: &str = "fastgram";

/// Keychain account holding the serialized session
const SESSION_ACCOUNT: &str = "session";

/// Session kept in the OS keychain instead of a plain file.
pub struct KeyringStorage {
    service: String,
    account: String,
}

impl Default for KeyringStorage {
    fn default() -> Self {
        Self::new(SERVICE_NAME, SESSION_ACCOUNT)
    }
}

impl KeyringStorage {
    pub fn new(service: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            account: account.into(),
        }
    }

    fn entry(&self) -> Result<Entry> {
        Entry::new(&self.service, &self.account).context("Failed to create keyring entry")
    }
}

impl SessionStorage for KeyringStorage {
    fn load(&self) -> Result<Option<StoredSession>> {
        match self.entry()?.get_password() {
            Ok(secret) => {
                let session =
                    serde_json::from_str(&secret).context("Failed to parse keychain session")?;
                Ok(Some(session))
            }
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to retrieve session from keychain"),
        }
    }

    fn save(&self, session: &StoredSession) -> Result<()> {
        let secret = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&secret)
            .context("Failed to store session in keychain")?;
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).context("Failed to delete session from keychain"),
        }
    }
}
