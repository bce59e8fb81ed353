use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Collection holding one profile per account, keyed by auth uid.
pub const USERS: &str = "users";
/// Collection of keyword → GIF entries, keyed by normalized keyword.
pub const DATASETS: &str = "datasets";
pub const FEEDBACK: &str = "feedback";
pub const MAINTENANCE_DOC: &str = "settings/maintenance";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    #[default]
    User,
}

/// A user or admin profile as stored in `users/<uid>`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub email: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Role,
    #[serde(default)]
    pub is_online: bool,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_login_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migrated_from: Option<String>,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// An admin that exists only in the database until its first login.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingAdmin {
    pub email: String,
    pub name: String,
    pub role: Role,
    pub is_online: bool,
    pub created_at: DateTime<Utc>,
    pub pending: bool,
    pub pending_password_hash: String,
}

impl PendingAdmin {
    /// The profile this placeholder turns into once the auth account exists.
    pub fn into_profile(self) -> UserProfile {
        UserProfile {
            email: self.email,
            name: self.name,
            role: Role::Admin,
            is_online: false,
            created_at: self.created_at,
            last_login_at: None,
            migrated_from: None,
        }
    }
}

/// A row of the user-management listing.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserSummary {
    pub id: String,
    #[serde(flatten)]
    pub profile: UserProfile,
    pub pending: bool,
}

/// Tokens handed to an admin after a successful login.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub uid: String,
    pub email: String,
    pub name: String,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_in: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DatasetEntry {
    pub keyword: String,
    pub gif_url: String,
    #[serde(default)]
    pub storage_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Feedback {
    pub user_id: String,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// A feedback record with its id and, when the author still has a profile,
/// the author's email and name.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackView {
    pub id: String,
    #[serde(flatten)]
    pub feedback: Feedback,
    pub author_email: Option<String>,
    pub author_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct MaintenanceSettings {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
}

/// Any document of the `users` collection: a profile, possibly flagged as a
/// pending placeholder.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredUser {
    #[serde(flatten)]
    pub profile: UserProfile,
    #[serde(default)]
    pub pending: bool,
}
