//! Core library for the FastGram client.
//!
//! Holds the client session: token storage, the auth operations that open
//! and close a session, and an API client that refreshes expired
//! credentials once and retries transparently.
//!
//! - `auth`: token store, storage backends, auth operations
//! - `api`: authenticated client, envelope decoding, error taxonomy
//! - `guard`: login-flag route guard
//! - `events`: typed session notifications
//! - `manager`: the root session context
//! - `services`: profile endpoints
//! - `config`: configuration file and environment overrides

pub mod api;
pub mod auth;
pub mod config;
pub mod events;
pub mod guard;
pub mod manager;
pub mod models;
pub mod services;

pub use api::{ApiClient, ApiError, ApiRequest};
pub use auth::{AuthService, AuthSession, CredentialPair, RegisterRequest, TokenStore};
pub use config::Config;
pub use events::SessionEvent;
pub use guard::{GuardDecision, RouteGuard};
pub use manager::SessionManager;
