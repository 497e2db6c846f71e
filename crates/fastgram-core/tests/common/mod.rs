#![allow(dead_code)]

use fastgram_core::auth::{MemoryStorage, StoredSession};
use fastgram_core::config::StorageBackend;
use fastgram_core::{Config, SessionEvent, SessionManager};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use wiremock::MockServer;

pub fn config_for(base_url: &str) -> Config {
    Config {
        api_base_url: base_url.to_string(),
        request_timeout_ms: 2_000,
        rate_limit_backoff_ms: 10,
        storage: StorageBackend::Memory,
        ..Config::default()
    }
}

pub fn manager(server: &MockServer) -> SessionManager {
    SessionManager::with_storage(&config_for(&server.uri()), Box::new(MemoryStorage::new()))
        .expect("Failed to build session manager")
}

/// Manager whose store already holds `access`/`refresh`
pub fn signed_in_manager(server: &MockServer, access: &str, refresh: &str) -> SessionManager {
    let session = StoredSession {
        access_token: Some(access.to_string()),
        refresh_token: Some(refresh.to_string()),
        logged_in_until: Some(chrono::Utc::now() + chrono::Duration::days(7)),
    };
    SessionManager::with_storage(
        &config_for(&server.uri()),
        Box::new(MemoryStorage::with_session(session)),
    )
    .expect("Failed to build session manager")
}

pub fn user_json(id: i64, username: &str) -> Value {
    json!({
        "id": id,
        "username": username,
        "email": format!("{username}@example.com"),
        "fullName": "Ada Lovelace",
        "bio": "",
        "profilePictureUrl": "",
        "isVerified": false,
        "createdAt": "2024-03-01T10:00:00.000Z",
        "updatedAt": "2024-03-01T10:00:00.000Z"
    })
}

pub fn sign_in_body(access: &str, refresh: &str) -> Value {
    json!({
        "success": true,
        "message": "Login successful",
        "data": {
            "user": user_json(7, "ada"),
            "accessToken": access,
            "refreshToken": refresh
        }
    })
}

pub fn refresh_body(access: &str, refresh: &str) -> Value {
    json!({
        "success": true,
        "message": "Token refreshed",
        "data": { "accessToken": access, "refreshToken": refresh }
    })
}

pub async fn hits(server: &MockServer, path: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == path)
        .count()
}

/// Authorization headers sent to `path`, in order
pub async fn bearer_tokens(server: &MockServer, path: &str) -> Vec<Option<String>> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path() == path)
        .map(|request| {
            request
                .headers
                .get("authorization")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .collect()
}

pub fn drain(rx: &mut broadcast::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
