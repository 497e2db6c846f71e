//! REST API client module for FastGram services.
//!
//! This module provides the `ApiClient` that sends authenticated requests
//! with transparent refresh-and-retry, the `ApiRequest` description it sends,
//! and the envelope decoding shared by every endpoint.
//!
//! The API uses bearer token authentication obtained through the
//! `/api/auth/*` endpoints (see `crate::auth`).

pub mod client;
pub mod envelope;
pub mod error;

pub use client::{ApiClient, ApiRequest};
pub use envelope::{decode_body, handle_json, ApiMessage, Envelope};
pub use error::ApiError;
