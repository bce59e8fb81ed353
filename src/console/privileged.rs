//! Privileged account operations, served as callable endpoints.
//!
//! Each operation runs with the service account's credentials, so each one
//! first passes the caller through [`Console::require_admin`].

use super::models::{Role, UserProfile, USERS};
use super::{normalize_email, validate_email, validate_name, validate_password, Console};
use crate::auth::models::{CreateUserRequest, UpdateUserRequest, UserRecord};
use crate::error::{AdminError, Result};
use crate::firestore::query::Query;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminAccountRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub caller_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateAdminAccountResponse {
    pub id: String,
    /// Lets the new admin choose their own password.
    pub password_reset_link: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub new_password: String,
    #[serde(default)]
    pub caller_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountRequest {
    pub email: String,
    #[serde(default)]
    pub caller_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetUserInfoRequest {
    pub email: String,
    #[serde(default)]
    pub caller_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OkResponse {
    pub ok: bool,
}

impl OkResponse {
    fn ok() -> Self {
        Self { ok: true }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub auth_record: Option<UserRecord>,
    pub profile_record: Option<UserProfile>,
}

pub struct Privileged<'a> {
    console: &'a Console,
}

impl<'a> Privileged<'a> {
    pub(crate) fn new(console: &'a Console) -> Self {
        Self { console }
    }

    pub async fn create_admin_account(
        &self,
        caller_id: &str,
        request: CreateAdminAccountRequest,
    ) -> Result<CreateAdminAccountResponse> {
        self.console.require_admin(caller_id).await?;

        let name = validate_name(&request.name)?;
        let email = normalize_email(&request.email);
        validate_email(&email)?;
        validate_password(&request.password)?;

        if !self.console.accounts().pending_admins(&email).await?.is_empty() {
            return Err(AdminError::AlreadyExists(
                "A pending admin with this email already exists.".to_string(),
            ));
        }

        let user = self
            .console
            .auth
            .create_user(CreateUserRequest {
                email: Some(email.clone()),
                password: Some(request.password),
                display_name: Some(name.clone()),
                ..Default::default()
            })
            .await?;
        let uid = user.local_id;

        let profile = UserProfile {
            email: email.clone(),
            name,
            role: Role::Admin,
            is_online: false,
            created_at: Utc::now(),
            last_login_at: None,
            migrated_from: None,
        };

        if let Err(e) = self.console.firestore.collection(USERS).create(&uid, &profile).await {
            tracing::warn!(uid = %uid, error = %e, "admin profile write failed, removing auth account");
            if let Err(cleanup) = self.console.auth.delete_user(&uid).await {
                tracing::error!(uid = %uid, error = %cleanup, "failed to remove orphaned auth account");
            }
            return Err(e.into());
        }

        let password_reset_link = self.console.auth.generate_password_reset_link(&email).await?;
        tracing::info!(caller_id, uid = %uid, "created admin account");

        Ok(CreateAdminAccountResponse {
            id: uid,
            password_reset_link,
        })
    }

    pub async fn reset_password(&self, caller_id: &str, request: ResetPasswordRequest) -> Result<OkResponse> {
        self.console.require_admin(caller_id).await?;

        let email = normalize_email(&request.email);
        validate_email(&email)?;
        validate_password(&request.new_password)?;

        if let Some(user) = self.console.auth.find_user_by_email(&email).await? {
            self.console
                .auth
                .update_user(UpdateUserRequest {
                    local_id: user.local_id.clone(),
                    password: Some(request.new_password),
                    ..Default::default()
                })
                .await?;
            tracing::info!(caller_id, uid = %user.local_id, "reset password");
            return Ok(OkResponse::ok());
        }

        let pending = self.console.accounts().pending_admins(&email).await?;
        if pending.is_empty() {
            return Err(no_account());
        }

        let hash = super::pending_password_hash(&email, &request.new_password);
        let users = self.console.firestore.collection(USERS);
        for (id, _) in &pending {
            users.doc(id).update(&json!({ "pendingPasswordHash": hash })).await?;
        }
        tracing::info!(caller_id, placeholders = pending.len(), "reset pending admin password");

        Ok(OkResponse::ok())
    }

    pub async fn delete_account(&self, caller_id: &str, request: DeleteAccountRequest) -> Result<OkResponse> {
        let caller = self.console.require_admin(caller_id).await?;

        let email = normalize_email(&request.email);
        validate_email(&email)?;
        if normalize_email(&caller.email) == email {
            return Err(AdminError::PermissionDenied(
                "You cannot delete your own account.".to_string(),
            ));
        }

        let users = self.console.firestore.collection(USERS);
        let mut found = false;

        if let Some(user) = self.console.auth.find_user_by_email(&email).await? {
            self.console.auth.delete_user(&user.local_id).await?;
            users.doc(&user.local_id).delete().await?;
            tracing::info!(caller_id, uid = %user.local_id, "deleted account");
            found = true;
        }

        for (id, _) in self.console.accounts().pending_admins(&email).await? {
            users.doc(&id).delete().await?;
            tracing::info!(caller_id, placeholder_id = %id, "deleted pending admin");
            found = true;
        }

        if found {
            Ok(OkResponse::ok())
        } else {
            Err(no_account())
        }
    }

    pub async fn get_user_info(&self, caller_id: &str, request: GetUserInfoRequest) -> Result<UserInfo> {
        self.console.require_admin(caller_id).await?;

        let email = normalize_email(&request.email);
        validate_email(&email)?;

        let auth_record = self.console.auth.find_user_by_email(&email).await?;

        let profile_record = match &auth_record {
            Some(user) => {
                self.console
                    .firestore
                    .collection(USERS)
                    .doc(&user.local_id)
                    .get::<UserProfile>()
                    .await?
            }
            None => {
                let query = Query::new(USERS).where_eq("email", &email)?.limit(1);
                let snapshot = self.console.firestore.query(query).get().await?;
                snapshot
                    .decode_all::<UserProfile>()?
                    .into_iter()
                    .next()
                    .map(|(_, profile)| profile)
            }
        };

        if auth_record.is_none() && profile_record.is_none() {
            return Err(no_account());
        }

        Ok(UserInfo {
            auth_record,
            profile_record,
        })
    }
}

fn no_account() -> AdminError {
    AdminError::NotFound("No account was found for this email.".to_string())
}
