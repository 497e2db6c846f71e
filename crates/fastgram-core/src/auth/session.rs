use std::fmt;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::storage::{SessionStorage, StoredSession};

/// Cookie mirrored for the route guard
pub const LOGIN_FLAG_COOKIE: &str = "fg_logged_in";

/// Access and refresh bearer tokens, treated as opaque strings.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialPair {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

impl CredentialPair {
    pub fn new(access_token: impl Into<String>, refresh_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
        }
    }
}

// Tokens never end up in logs
impl fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPair")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &"<redacted>")
            .finish()
    }
}

/// The "logged in" marker consumed by the route guard.
///
/// It expires on its own schedule, independent of the token TTL, and is only
/// a navigation hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LoginFlag {
    expires_at: Option<DateTime<Utc>>,
}

impl LoginFlag {
    pub fn expiring_at(expires_at: DateTime<Utc>) -> Self {
        Self {
            expires_at: Some(expires_at),
        }
    }

    pub fn unset() -> Self {
        Self::default()
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn is_set(&self) -> bool {
        self.is_set_at(Utc::now())
    }

    pub fn is_set_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map(|at| now < at).unwrap_or(false)
    }

    /// `Set-Cookie` value mirroring this flag; an unset flag expires the cookie.
    pub fn set_cookie(&self, now: DateTime<Utc>) -> String {
        match self.expires_at {
            Some(at) if now < at => {
                let max_age = (at - now).num_seconds().max(1);
                format!("{}=1; Path=/; Max-Age={}", LOGIN_FLAG_COOKIE, max_age)
            }
            _ => format!("{}=; Path=/; Max-Age=0", LOGIN_FLAG_COOKIE),
        }
    }
}

/// Owns the credential pair and login flag for one client session.
///
/// The in-memory copy is authoritative for readers; every mutation is written
/// through to the storage backend. A failed write is logged and does not undo
/// the in-memory change, so callers always observe the state they asked for.
pub struct TokenStore {
    storage: Box<dyn SessionStorage>,
    state: RwLock<StoredSession>,
    flag_max_age: Duration,
}

impl TokenStore {
    /// Build the store and hydrate it from `storage`.
    ///
    /// An unreadable or corrupt record is logged and treated as signed out.
    pub fn hydrate(storage: Box<dyn SessionStorage>, flag_max_age: Duration) -> Self {
        let state = match storage.load() {
            Ok(Some(session)) => {
                debug!(
                    has_access = session.access_token.is_some(),
                    has_refresh = session.refresh_token.is_some(),
                    "Session loaded"
                );
                session
            }
            Ok(None) => {
                debug!("No session data found");
                StoredSession::default()
            }
            Err(e) => {
                warn!(error = %e, "Failed to load session, starting signed out");
                StoredSession::default()
            }
        };

        Self {
            storage,
            state: RwLock::new(state),
            flag_max_age,
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.read().access_token.clone()
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.read().refresh_token.clone()
    }

    /// Both tokens, if both are present
    pub fn credentials(&self) -> Option<CredentialPair> {
        let state = self.read();
        match (&state.access_token, &state.refresh_token) {
            (Some(access), Some(refresh)) => Some(CredentialPair::new(access, refresh)),
            _ => None,
        }
    }

    /// Persist a new pair and raise the login flag for the configured window.
    pub fn set_tokens(&self, pair: &CredentialPair) {
        let mut state = self.write();
        *state = StoredSession {
            access_token: Some(pair.access_token.clone()),
            refresh_token: Some(pair.refresh_token.clone()),
            logged_in_until: Some(
                Utc::now()
                    .checked_add_signed(self.flag_max_age)
                    .unwrap_or(DateTime::<Utc>::MAX_UTC),
            ),
        };
        if let Err(e) = self.storage.save(&state) {
            warn!(error = %e, "Failed to save session");
        }
    }

    /// Drop both tokens and the login flag. Clearing an empty store is a no-op.
    pub fn clear(&self) {
        let mut state = self.write();
        *state = StoredSession::default();
        if let Err(e) = self.storage.remove() {
            warn!(error = %e, "Failed to remove persisted session");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    pub fn login_flag(&self) -> LoginFlag {
        self.read()
            .logged_in_until
            .map(LoginFlag::expiring_at)
            .unwrap_or_default()
    }

    /// Whether the route guard should treat the client as signed in
    pub fn is_logged_in(&self) -> bool {
        self.login_flag().is_set()
    }

    fn read(&self) -> RwLockReadGuard<'_, StoredSession> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoredSession> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::storage::MemoryStorage;

    /// Storage that shares its slot with the test and can be told to fail
    #[derive(Clone, Default)]
    struct SharedStorage {
        inner: Arc<MemoryStorage>,
        fail_writes: bool,
    }

    impl SessionStorage for SharedStorage {
        fn load(&self) -> anyhow::Result<Option<StoredSession>> {
            self.inner.load()
        }

        fn save(&self, session: &StoredSession) -> anyhow::Result<()> {
            if self.fail_writes {
                anyhow::bail!("disk full");
            }
            self.inner.save(session)
        }

        fn remove(&self) -> anyhow::Result<()> {
            if self.fail_writes {
                anyhow::bail!("read-only filesystem");
            }
            self.inner.remove()
        }
    }

    struct BrokenStorage;

    impl SessionStorage for BrokenStorage {
        fn load(&self) -> anyhow::Result<Option<StoredSession>> {
            anyhow::bail!("corrupt")
        }
        fn save(&self, _: &StoredSession) -> anyhow::Result<()> {
            Ok(())
        }
        fn remove(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn store() -> TokenStore {
        TokenStore::hydrate(Box::new(MemoryStorage::new()), Duration::days(7))
    }

    #[test]
    fn test_set_tokens_round_trip() {
        let store = store();
        store.set_tokens(&CredentialPair::new("a", "r"));
        assert_eq!(store.access_token().as_deref(), Some("a"));
        assert_eq!(store.refresh_token().as_deref(), Some("r"));
        assert_eq!(store.credentials(), Some(CredentialPair::new("a", "r")));
        assert!(store.is_logged_in());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = store();
        store.set_tokens(&CredentialPair::new("a", "r"));

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.access_token(), None);
        assert_eq!(store.refresh_token(), None);
        assert!(!store.is_logged_in());

        store.clear();
        assert!(store.is_empty());
        assert_eq!(store.login_flag(), LoginFlag::unset());
    }

    #[test]
    fn test_writes_through_and_hydrates() {
        let storage = SharedStorage::default();
        let store = TokenStore::hydrate(Box::new(storage.clone()), Duration::days(7));
        store.set_tokens(&CredentialPair::new("a1", "r1"));

        let persisted = storage.inner.load().unwrap().unwrap();
        assert_eq!(persisted.access_token.as_deref(), Some("a1"));

        let reloaded = TokenStore::hydrate(Box::new(storage.clone()), Duration::days(7));
        assert_eq!(reloaded.refresh_token().as_deref(), Some("r1"));
        assert!(reloaded.is_logged_in());

        reloaded.clear();
        assert_eq!(storage.inner.load().unwrap(), None);
    }

    #[test]
    fn test_failed_write_keeps_memory_state() {
        let storage = SharedStorage {
            fail_writes: true,
            ..Default::default()
        };
        let store = TokenStore::hydrate(Box::new(storage), Duration::days(7));

        store.set_tokens(&CredentialPair::new("a", "r"));
        assert_eq!(store.access_token().as_deref(), Some("a"));

        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_corrupt_storage_starts_signed_out() {
        let store = TokenStore::hydrate(Box::new(BrokenStorage), Duration::days(7));
        assert!(store.is_empty());
        assert!(!store.is_logged_in());
    }

    #[test]
    fn test_login_flag_expires_independently_of_tokens() {
        let storage = MemoryStorage::with_session(StoredSession {
            access_token: Some("a".to_string()),
            refresh_token: Some("r".to_string()),
            logged_in_until: Some(Utc::now() - Duration::minutes(1)),
        });
        let store = TokenStore::hydrate(Box::new(storage), Duration::days(7));
        assert!(!store.is_logged_in());
        assert_eq!(store.access_token().as_deref(), Some("a"));
    }

    #[test]
    fn test_login_flag_cookie() {
        let now = Utc::now();
        let flag = LoginFlag::expiring_at(now + Duration::seconds(604_800));
        assert!(flag.is_set_at(now));
        assert_eq!(flag.set_cookie(now), "fg_logged_in=1; Path=/; Max-Age=604800");

        assert!(!flag.is_set_at(now + Duration::days(8)));
        assert_eq!(
            LoginFlag::unset().set_cookie(now),
            "fg_logged_in=; Path=/; Max-Age=0"
        );
    }

    #[test]
    fn test_oversized_flag_lifetime_does_not_overflow() {
        let store = TokenStore::hydrate(Box::new(MemoryStorage::new()), Duration::days(1_000_000_000));
        store.set_tokens(&CredentialPair::new("a", "r"));
        assert_eq!(store.access_token().as_deref(), Some("a"));
        assert!(store.is_logged_in());
    }

    #[test]
    fn test_credential_pair_debug_is_redacted() {
        let debug = format!("{:?}", CredentialPair::new("secret-a", "secret-r"));
        assert!(!debug.contains("secret"));
    }
}
