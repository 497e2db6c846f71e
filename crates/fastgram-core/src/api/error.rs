use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

/// Errors surfaced by auth operations and the authenticated API client.
///
/// Cloneable so a single shared refresh can hand the same failure to every
/// caller waiting on it.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    /// The server rejected the input shape or content. The message is shown verbatim.
    #[error("{message}")]
    Validation { message: String },

    /// Any other non-2xx response.
    #[error("{message}")]
    Request { status: StatusCode, message: String },

    #[error("Missing refresh token")]
    MissingCredential,

    /// Refreshing the session failed; local credentials have been cleared.
    #[error("Authentication required")]
    AuthenticationRequired,

    #[error("Request timed out")]
    Timeout,

    /// The background refresh task panicked or was aborted.
    #[error("Token refresh did not complete")]
    RefreshInterrupted,

    #[error("Network error: {0}")]
    Network(#[source] Arc<reqwest::Error>),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else {
            ApiError::Network(Arc::new(err))
        }
    }
}

impl ApiError {
    /// HTTP status behind this error, when the server produced one.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Request { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the caller has to sign in again before retrying.
    pub fn requires_login(&self) -> bool {
        matches!(
            self,
            ApiError::AuthenticationRequired | ApiError::MissingCredential
        )
    }
}
