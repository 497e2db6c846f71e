use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// The signed-in account as returned by `/api/auth/*` and `/api/users/profile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub email: String,
    #[serde(rename = "fullName", default, deserialize_with = "null_as_empty")]
    pub full_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(rename = "profilePictureUrl", default)]
    pub profile_picture_url: Option<String>,
    #[serde(rename = "isVerified", default)]
    pub is_verified: bool,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "updatedAt")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl User {
    /// Full name when set, otherwise the handle
    pub fn display_name(&self) -> String {
        display_name(&self.full_name, &self.username)
    }
}

/// Another account's public profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: i64,
    pub username: String,
    #[serde(rename = "fullName", default, deserialize_with = "null_as_empty")]
    pub full_name: String,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(rename = "profilePictureUrl", default)]
    pub profile_picture_url: Option<String>,
    #[serde(rename = "isVerified", default)]
    pub is_verified: bool,
    #[serde(rename = "createdAt")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(rename = "followersCount", default)]
    pub followers_count: u64,
    #[serde(rename = "followingCount", default)]
    pub following_count: u64,
    #[serde(rename = "postsCount", default)]
    pub posts_count: u64,
}

impl PublicUser {
    pub fn display_name(&self) -> String {
        display_name(&self.full_name, &self.username)
    }
}

/// Partial profile update; unset fields are left untouched server-side.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(rename = "fullName", skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(rename = "profilePictureUrl", skip_serializing_if = "Option::is_none")]
    pub profile_picture_url: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.full_name.is_none()
            && self.bio.is_none()
            && self.profile_picture_url.is_none()
    }
}

fn display_name(full_name: &str, username: &str) -> String {
    let trimmed = full_name.trim();
    if trimmed.is_empty() {
        format!("@{}", username)
    } else {
        trimmed.to_string()
    }
}

// The API sends `null` for unset text fields
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}
