//! The session context owned by the application root.
//!
//! `SessionManager` wires the token store, auth operations, authenticated
//! client and event channel together. Build one at startup with
//! [`SessionManager::init`] (which hydrates the persisted session) and hand
//! clones of its parts to whatever needs them.

use std::sync::Arc;

use anyhow::{Context, Result};
use reqwest::Client;
use tokio::sync::broadcast;
use tracing::info;

use crate::api::ApiClient;
use crate::auth::{
    AuthService, FileStorage, KeyringStorage, MemoryStorage, SessionStorage, TokenStore,
};
use crate::config::{Config, StorageBackend};
use crate::events::{SessionEvent, SessionEvents};
use crate::services::UsersService;

const USER_AGENT: &str = concat!("fastgram/", env!("CARGO_PKG_VERSION"));

pub struct SessionManager {
    store: Arc<TokenStore>,
    events: SessionEvents,
    auth: AuthService,
    api: ApiClient,
}

impl SessionManager {
    /// Build the session using the storage backend named in `config`.
    pub fn init(config: &Config) -> Result<Self> {
        let storage: Box<dyn SessionStorage> = match config.storage {
            StorageBackend::File => Box::new(FileStorage::in_dir(config.data_dir()?)),
            StorageBackend::Keyring => Box::new(KeyringStorage::default()),
            StorageBackend::Memory => Box::new(MemoryStorage::new()),
        };
        Self::with_storage(config, storage)
    }

    pub fn with_storage(config: &Config, storage: Box<dyn SessionStorage>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let store = Arc::new(TokenStore::hydrate(storage, config.login_flag_max_age()));
        let events = SessionEvents::new();
        let auth = AuthService::new(http.clone(), config.base_url(), store.clone(), events.clone());
        let api = ApiClient::new(http, auth.clone())
            .with_rate_limit(config.rate_limit_retries, config.rate_limit_backoff());

        info!(
            base_url = %config.base_url(),
            storage = ?config.storage,
            logged_in = store.is_logged_in(),
            "Session initialized"
        );

        Ok(Self {
            store,
            events,
            auth,
            api,
        })
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.store
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn users(&self) -> UsersService {
        UsersService::new(self.api.clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    pub fn is_logged_in(&self) -> bool {
        self.store.is_logged_in()
    }

    /// Drop the local session without contacting the server
    pub fn teardown(&self) {
        self.store.clear();
    }
}
