//! Network operations that open, renew and close a session.

use std::fmt;
use std::sync::Arc;

use futures::FutureExt;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::refresh::RefreshGate;
use super::session::{CredentialPair, TokenStore};
use crate::api::envelope::{handle_json, ApiMessage, Envelope};
use crate::api::ApiError;
use crate::events::{SessionEvent, SessionEvents};
use crate::models::User;

const REGISTER_PATH: &str = "/api/auth/register";
const LOGIN_PATH: &str = "/api/auth/login";
const REFRESH_PATH: &str = "/api/auth/refresh";
const LOGOUT_PATH: &str = "/api/auth/logout";
const LOGOUT_ALL_PATH: &str = "/api/auth/logout-all";
const VERIFY_PATH: &str = "/api/auth/verify";

#[derive(Clone, Serialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(rename = "fullName")]
    pub full_name: String,
}

impl fmt::Debug for RegisterRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterRequest")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("full_name", &self.full_name)
            .finish()
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct SignInPayload {
    user: User,
    #[serde(rename = "accessToken")]
    access_token: String,
    #[serde(rename = "refreshToken")]
    refresh_token: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UserPayload {
    pub(crate) user: User,
}

/// Result of a successful login or registration.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub tokens: CredentialPair,
    pub message: String,
}

/// Login, registration, refresh, logout and identity checks.
///
/// Clone is cheap: state lives behind an `Arc` and `reqwest::Client` shares
/// its connection pool.
#[derive(Clone)]
pub struct AuthService {
    inner: Arc<Inner>,
}

struct Inner {
    http: Client,
    base_url: String,
    store: Arc<TokenStore>,
    events: SessionEvents,
    refresh: RefreshGate,
}

/// Clears the session when dropped, so logout cleanup also runs if the
/// logout future is cancelled mid-request.
struct ClearOnDrop<'a> {
    store: &'a TokenStore,
    events: &'a SessionEvents,
}

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.store.clear();
        self.events.publish(SessionEvent::SignedOut);
    }
}

impl AuthService {
    pub fn new(
        http: Client,
        base_url: impl Into<String>,
        store: Arc<TokenStore>,
        events: SessionEvents,
    ) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                store,
                events,
                refresh: RefreshGate::new(),
            }),
        }
    }

    pub fn store(&self) -> &Arc<TokenStore> {
        &self.inner.store
    }

    pub fn events(&self) -> &SessionEvents {
        &self.inner.events
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// Create an account and sign in with the returned credentials
    pub async fn register(&self, request: &RegisterRequest) -> Result<AuthSession, ApiError> {
        debug!(username = %request.username, "Registering account");
        self.sign_in(REGISTER_PATH, request).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, ApiError> {
        debug!(email = %email, "Logging in");
        self.sign_in(LOGIN_PATH, &LoginRequest { email, password })
            .await
    }

    async fn sign_in<B: Serialize>(&self, path: &str, body: &B) -> Result<AuthSession, ApiError> {
        let response = self
            .inner
            .http
            .post(self.endpoint(path))
            .json(body)
            .send()
            .await?;

        let envelope: Envelope<SignInPayload> = handle_json(response).await?;
        let SignInPayload {
            user,
            access_token,
            refresh_token,
        } = envelope.data;

        let tokens = CredentialPair::new(access_token, refresh_token);
        self.inner.store.set_tokens(&tokens);
        self.inner
            .events
            .publish(SessionEvent::SignedIn { user_id: user.id });
        info!(user_id = user.id, "Signed in");

        Ok(AuthSession {
            user,
            tokens,
            message: envelope.message,
        })
    }

    /// Exchange the stored refresh token for a new credential pair.
    ///
    /// Fails with `MissingCredential` without touching the network when no
    /// refresh token is stored. A failed refresh leaves the store as it was;
    /// deciding whether that ends the session is up to the caller. Concurrent
    /// calls share a single request.
    pub async fn refresh_tokens(&self) -> Result<CredentialPair, ApiError> {
        if self.inner.store.refresh_token().is_none() {
            return Err(ApiError::MissingCredential);
        }

        let this = self.clone();
        self.inner
            .refresh
            .run(move || async move { this.perform_refresh().await }.boxed())
            .await
    }

    async fn perform_refresh(&self) -> Result<CredentialPair, ApiError> {
        let sent = self
            .inner
            .store
            .refresh_token()
            .ok_or(ApiError::MissingCredential)?;

        debug!("Refreshing tokens");
        let response = self
            .inner
            .http
            .post(self.endpoint(REFRESH_PATH))
            .json(&json!({ "refreshToken": sent }))
            .send()
            .await?;

        let envelope: Envelope<CredentialPair> = match handle_json(response).await {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "Token refresh rejected");
                return Err(e);
            }
        };

        // The session may have ended or been replaced while the request ran
        match self.inner.store.refresh_token() {
            Some(current) if current == sent => {
                self.inner.store.set_tokens(&envelope.data);
                self.inner.events.publish(SessionEvent::TokensRefreshed);
                debug!("Tokens refreshed");
                Ok(envelope.data)
            }
            Some(_) => {
                debug!("Session replaced during refresh, keeping newer credentials");
                self.inner
                    .store
                    .credentials()
                    .ok_or(ApiError::MissingCredential)
            }
            None => {
                debug!("Session ended during refresh, discarding new credentials");
                Err(ApiError::MissingCredential)
            }
        }
    }

    /// Credentials to retry with after a request sent with `used_token` was rejected.
    ///
    /// When the stored access token already differs from the rejected one,
    /// another caller has refreshed in the meantime and no new refresh is made.
    pub(crate) async fn recover(&self, used_token: Option<&str>) -> Result<CredentialPair, ApiError> {
        if let Some(current) = self.inner.store.credentials() {
            if used_token != Some(current.access_token.as_str()) {
                debug!("Access token changed since the request was sent");
                return Ok(current);
            }
        }
        self.refresh_tokens().await
    }

    /// Drop the local session after it could not be recovered and ask the UI
    /// to show the login view.
    pub(crate) fn expire_session(&self) {
        warn!("Session expired, clearing credentials");
        self.inner.store.clear();
        self.inner.events.publish(SessionEvent::LoginRequired);
    }

    /// End this session. Best effort towards the server; the local session is
    /// always cleared and this never fails.
    pub async fn logout(&self) {
        let _clear = ClearOnDrop {
            store: &self.inner.store,
            events: &self.inner.events,
        };

        let access = self.inner.store.access_token();
        let refresh = self.inner.store.refresh_token();
        if access.is_none() && refresh.is_none() {
            debug!("Already logged out");
            return;
        }

        let mut request = self.inner.http.post(self.endpoint(LOGOUT_PATH));
        if let Some(ref token) = access {
            request = request.bearer_auth(token);
        }
        if let Some(ref token) = refresh {
            request = request.json(&json!({ "refreshToken": token }));
        }

        match Self::notify(request).await {
            Ok(_) => info!("Logged out"),
            Err(e) => warn!(error = %e, "Logout request failed, clearing local session anyway"),
        }
    }

    /// Invalidate every session of the account server-side, then clear locally.
    /// Never fails.
    pub async fn logout_all(&self) {
        let _clear = ClearOnDrop {
            store: &self.inner.store,
            events: &self.inner.events,
        };

        let mut request = self.inner.http.post(self.endpoint(LOGOUT_ALL_PATH));
        if let Some(token) = self.inner.store.access_token() {
            request = request.bearer_auth(token);
        }

        match Self::notify(request).await {
            Ok(_) => info!("Logged out of all sessions"),
            Err(e) => warn!(error = %e, "Logout-all request failed, clearing local session anyway"),
        }
    }

    /// Fetch the identity behind the current access token
    pub async fn verify(&self) -> Result<User, ApiError> {
        let mut request = self.inner.http.get(self.endpoint(VERIFY_PATH));
        if let Some(token) = self.inner.store.access_token() {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let envelope: Envelope<UserPayload> = handle_json(response).await?;
        Ok(envelope.data.user)
    }

    async fn notify(request: RequestBuilder) -> Result<ApiMessage, ApiError> {
        let response = request.send().await?;
        handle_json(response).await
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.inner.base_url, path)
    }
}
