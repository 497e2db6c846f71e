use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{ApiClient, ApiError, ApiMessage, ApiRequest, Envelope};
use crate::auth::service::UserPayload;
use crate::events::SessionEvent;
use crate::models::{ProfileUpdate, PublicUser, User};

const PROFILE_PATH: &str = "/api/users/profile";
const CHANGE_PASSWORD_PATH: &str = "/api/users/change-password";

/// Page size used by the web client for follower lists
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Serialize)]
struct ChangePassword<'a> {
    #[serde(rename = "currentPassword")]
    current_password: &'a str,
    #[serde(rename = "newPassword")]
    new_password: &'a str,
}

#[derive(Debug, Deserialize)]
struct PublicUserPayload {
    user: PublicUser,
}

/// One page of a follower or following list. The API names the array after
/// the list it belongs to.
#[derive(Debug, Default, Deserialize)]
struct ConnectionsPayload {
    #[serde(default)]
    followers: Option<Vec<PublicUser>>,
    #[serde(default)]
    following: Option<Vec<PublicUser>>,
}

impl ConnectionsPayload {
    fn into_users(self) -> Vec<PublicUser> {
        self.followers.or(self.following).unwrap_or_default()
    }
}

/// Profile endpoints, called through the authenticated client.
#[derive(Clone)]
pub struct UsersService {
    api: ApiClient,
}

impl UsersService {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn my_profile(&self) -> Result<User, ApiError> {
        let envelope: Envelope<UserPayload> = self.api.get_json(PROFILE_PATH).await?;
        Ok(envelope.data.user)
    }

    /// Apply a partial update and announce the new profile to subscribers
    pub async fn update_my_profile(&self, update: &ProfileUpdate) -> Result<User, ApiError> {
        if update.is_empty() {
            return Err(ApiError::InvalidRequest("Nothing to update".to_string()));
        }

        let request = ApiRequest::put(PROFILE_PATH).json(update)?;
        let envelope: Envelope<UserPayload> = self.api.send_json(&request).await?;
        let user = envelope.data.user;

        debug!(user_id = user.id, "Profile updated");
        self.api
            .auth()
            .events()
            .publish(SessionEvent::ProfileUpdated { user: user.clone() });
        Ok(user)
    }

    pub async fn change_password(
        &self,
        current_password: &str,
        new_password: &str,
    ) -> Result<ApiMessage, ApiError> {
        let request = ApiRequest::put(CHANGE_PASSWORD_PATH).json(&ChangePassword {
            current_password,
            new_password,
        })?;
        self.api.send_json(&request).await
    }

    /// Public profile lookup. The token is sent when present, but an auth
    /// failure is returned as-is rather than refreshing.
    pub async fn user_by_username(&self, username: &str) -> Result<PublicUser, ApiError> {
        let url = self.api.endpoint(&["api", "users", username])?;
        let request = ApiRequest::get(url).without_auth_retry();
        let envelope: Envelope<PublicUserPayload> = self.api.send_json(&request).await?;
        Ok(envelope.data.user)
    }

    pub async fn follow(&self, username: &str) -> Result<ApiMessage, ApiError> {
        let url = self.api.endpoint(&["api", "users", username, "follow"])?;
        self.api.send_json(&ApiRequest::post(url)).await
    }

    /// Accounts following `username`, one page at a time (pages start at 1)
    pub async fn list_followers(
        &self,
        username: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<PublicUser>, ApiError> {
        self.connections(username, "followers", page, limit).await
    }

    /// Accounts `username` follows, one page at a time (pages start at 1)
    pub async fn list_following(
        &self,
        username: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<PublicUser>, ApiError> {
        self.connections(username, "following", page, limit).await
    }

    async fn connections(
        &self,
        username: &str,
        list: &str,
        page: u32,
        limit: u32,
    ) -> Result<Vec<PublicUser>, ApiError> {
        let url = self.api.endpoint(&["api", "users", username, list])?;
        let request = ApiRequest::get(url)
            .query("page", page.max(1))
            .query("limit", limit.max(1))
            .without_auth_retry();
        let envelope: Envelope<ConnectionsPayload> = self.api.send_json(&request).await?;
        Ok(envelope.data.into_users())
    }

    pub async fn unfollow(&self, username: &str) -> Result<ApiMessage, ApiError> {
        let url = self.api.endpoint(&["api", "users", username, "follow"])?;
        self.api.send_json(&ApiRequest::delete(url)).await
    }
}
