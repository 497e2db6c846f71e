//! Authentication module for managing client sessions.
//!
//! This module provides:
//! - `TokenStore`: the credential pair and login flag, persisted between runs
//! - `SessionStorage`: pluggable persistence (file, OS keychain, memory)
//! - `AuthService`: register, login, refresh, logout, logout-all, verify
//!
//! Concurrent refreshes are collapsed into a single request.

pub mod credentials;
mod refresh;
pub mod service;
pub mod session;
pub mod storage;

pub use credentials::KeyringStorage;
pub use service::{AuthService, AuthSession, RegisterRequest};
pub use session::{CredentialPair, LoginFlag, TokenStore, LOGIN_FLAG_COOKIE};
pub use storage::{FileStorage, MemoryStorage, SessionStorage, StoredSession};
