//! Authenticated API client for the FastGram REST API.
//!
//! `ApiClient::send` attaches the current bearer token and, when the server
//! answers 401 or 403, refreshes the session once and resends the request
//! once. If the session cannot be refreshed the local credentials are
//! cleared, `LoginRequired` is published and the caller gets
//! `ApiError::AuthenticationRequired`.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::envelope::handle_json;
use super::ApiError;
use crate::auth::AuthService;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
/// 3 retries with exponential backoff usually succeeds without excessive delay.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
/// 1 second is polite to the server while not making users wait too long.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// A request that can be sent, and resent after a refresh, by `ApiClient`.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    target: String,
    headers: HeaderMap,
    query: Vec<(String, String)>,
    body: Option<serde_json::Value>,
    retry_on_auth_failure: bool,
}

impl ApiRequest {
    /// `target` is a path relative to the API base URL or an absolute URL.
    pub fn new(method: Method, target: impl Into<String>) -> Self {
        Self {
            method,
            target: target.into(),
            headers: HeaderMap::new(),
            query: Vec::new(),
            body: None,
            retry_on_auth_failure: true,
        }
    }

    pub fn get(target: impl Into<String>) -> Self {
        Self::new(Method::GET, target)
    }

    pub fn post(target: impl Into<String>) -> Self {
        Self::new(Method::POST, target)
    }

    pub fn put(target: impl Into<String>) -> Self {
        Self::new(Method::PUT, target)
    }

    pub fn delete(target: impl Into<String>) -> Self {
        Self::new(Method::DELETE, target)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Result<Self, ApiError> {
        let value = serde_json::to_value(body)
            .map_err(|e| ApiError::InvalidRequest(format!("Failed to encode body: {}", e)))?;
        self.body = Some(value);
        Ok(self)
    }

    /// Return 401/403 responses as-is instead of refreshing and resending
    pub fn without_auth_retry(mut self) -> Self {
        self.retry_on_auth_failure = false;
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn retries_on_auth_failure(&self) -> bool {
        self.retry_on_auth_failure
    }
}

/// API client for FastGram.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    auth: AuthService,
    max_rate_limit_retries: u32,
    initial_backoff: Duration,
}

impl ApiClient {
    pub fn new(http: Client, auth: AuthService) -> Self {
        Self {
            http,
            auth,
            max_rate_limit_retries: MAX_RATE_LIMIT_RETRIES,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        }
    }

    /// Override the 429 backoff policy
    pub fn with_rate_limit(mut self, max_retries: u32, initial_backoff: Duration) -> Self {
        self.max_rate_limit_retries = max_retries;
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    /// Resolve a request target against the base URL
    pub fn url(&self, target: &str) -> String {
        if target.starts_with("http://") || target.starts_with("https://") {
            target.to_string()
        } else if target.starts_with('/') {
            format!("{}{}", self.auth.base_url(), target)
        } else {
            format!("{}/{}", self.auth.base_url(), target)
        }
    }

    /// Build an absolute URL from path segments, percent-encoding each one.
    pub fn endpoint(&self, segments: &[&str]) -> Result<String, ApiError> {
        let mut url = Url::parse(self.auth.base_url())
            .map_err(|e| ApiError::InvalidRequest(format!("Invalid base URL: {}", e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| ApiError::InvalidRequest("Base URL cannot carry a path".to_string()))?;
            path.pop_if_empty().extend(segments);
        }
        Ok(url.to_string())
    }

    /// Send with the current access token, recovering once from an auth failure.
    pub async fn send(&self, request: &ApiRequest) -> Result<Response, ApiError> {
        let token = self.auth.store().access_token();
        let response = self.dispatch(request, token.as_deref()).await?;

        let status = response.status();
        if !is_auth_failure(status) || !request.retry_on_auth_failure {
            return Ok(response);
        }
        drop(response);

        debug!(status = %status, target = %request.target, "Authentication failed, refreshing session");
        match self.auth.recover(token.as_deref()).await {
            Ok(_) => {
                let token = self.auth.store().access_token();
                self.dispatch(request, token.as_deref()).await
            }
            Err(e) => {
                debug!(error = %e, target = %request.target, "Session could not be refreshed");
                self.auth.expire_session();
                Err(ApiError::AuthenticationRequired)
            }
        }
    }

    /// `send`, then decode the body as JSON
    pub async fn send_json<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T, ApiError> {
        let response = self.send(request).await?;
        handle_json(response).await
    }

    pub async fn get_json<T: DeserializeOwned>(&self, target: &str) -> Result<T, ApiError> {
        self.send_json(&ApiRequest::get(target)).await
    }

    /// One attempt at the request, backing off while the server answers 429.
    /// After the last retry the 429 response is returned as-is.
    async fn dispatch(&self, request: &ApiRequest, token: Option<&str>) -> Result<Response, ApiError> {
        let url = self.url(&request.target);
        let mut headers = request.headers.clone();
        if token.is_some() {
            headers.remove(AUTHORIZATION);
        }

        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let mut builder = self
                .http
                .request(request.method.clone(), &url)
                .headers(headers.clone());
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(token) = token {
                builder = builder.bearer_auth(token);
            }
            if let Some(ref body) = request.body {
                builder = builder.json(body);
            }

            let response = builder.send().await?;
            if response.status() != StatusCode::TOO_MANY_REQUESTS
                || retries >= self.max_rate_limit_retries
            {
                return Ok(response);
            }

            retries += 1;
            warn!(
                url = %url,
                retry = retries,
                backoff_ms = backoff.as_millis() as u64,
                "Rate limited, backing off"
            );
            tokio::time::sleep(backoff).await;
            backoff *= 2; // Exponential backoff
        }
    }
}

fn is_auth_failure(status: StatusCode) -> bool {
    status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::{MemoryStorage, TokenStore};
    use crate::events::SessionEvents;

    fn client(base_url: &str) -> ApiClient {
        let http = Client::new();
        let store = Arc::new(TokenStore::hydrate(
            Box::new(MemoryStorage::new()),
            chrono::Duration::days(7),
        ));
        let auth = AuthService::new(http.clone(), base_url, store, SessionEvents::new());
        ApiClient::new(http, auth)
    }

    #[test]
    fn test_url_resolution() {
        let api = client("http://localhost:3000/");
        assert_eq!(api.url("/api/posts"), "http://localhost:3000/api/posts");
        assert_eq!(api.url("api/posts"), "http://localhost:3000/api/posts");
        assert_eq!(api.url("https://cdn.example.com/x"), "https://cdn.example.com/x");
    }

    #[test]
    fn test_endpoint_encodes_segments() {
        let api = client("http://localhost:3000");
        let url = api.endpoint(&["api", "users", "ada lovelace/admin", "follow"]).unwrap();
        assert_eq!(url, "http://localhost:3000/api/users/ada%20lovelace%2Fadmin/follow");
    }

    #[test]
    fn test_endpoint_keeps_base_path() {
        let api = client("https://example.com/gateway");
        let url = api.endpoint(&["api", "users", "profile"]).unwrap();
        assert_eq!(url, "https://example.com/gateway/api/users/profile");
    }

    #[test]
    fn test_request_builder_defaults() {
        let request = ApiRequest::post("/api/posts")
            .json(&serde_json::json!({ "caption": "hi" }))
            .unwrap()
            .query("page", 2);
        assert_eq!(*request.method(), Method::POST);
        assert_eq!(request.target(), "/api/posts");
        assert!(request.retries_on_auth_failure());
        assert!(!request.without_auth_retry().retries_on_auth_failure());
    }

    #[test]
    fn test_is_auth_failure() {
        assert!(is_auth_failure(StatusCode::UNAUTHORIZED));
        assert!(is_auth_failure(StatusCode::FORBIDDEN));
        assert!(!is_auth_failure(StatusCode::NOT_FOUND));
        assert!(!is_auth_failure(StatusCode::OK));
    }
}
