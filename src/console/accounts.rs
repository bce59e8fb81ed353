//! Admin sign-in and user management.

use super::models::{AdminSession, PendingAdmin, Role, StoredUser, UserProfile, UserSummary, USERS};
use super::{
    normalize_email, pending_password_hash, user_path, validate_email, validate_name,
    validate_password, Console,
};
use crate::auth::models::{CreateUserRequest, SignInResponse, UpdateUserRequest};
use crate::auth::{AuthError, AuthErrorCode};
use crate::error::{AdminError, Result};
use crate::firestore::query::Query;
use crate::firestore::FirestoreError;
use chrono::Utc;
use serde_json::json;

const DEFAULT_TOKEN_LIFETIME_SECS: u64 = 3600;

pub struct Accounts<'a> {
    console: &'a Console,
}

impl<'a> Accounts<'a> {
    pub(crate) fn new(console: &'a Console) -> Self {
        Self { console }
    }

    /// Signs an admin in.
    ///
    /// A first login of a pending admin creates its auth account and turns
    /// the placeholder into a regular profile. A profile or placeholder
    /// stored under an id other than the auth uid is moved to the uid on
    /// the way.
    pub async fn login(&self, email: &str, password: &str) -> Result<AdminSession> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AdminError::InvalidArgument(
                "Email and password are required.".to_string(),
            ));
        }

        let signed_in = match self.console.auth.sign_in_with_password(&email, password).await {
            Ok(signed_in) => signed_in,
            Err(e) => match e.code() {
                Some(AuthErrorCode::EmailNotFound | AuthErrorCode::InvalidLoginCredentials) => {
                    self.activate_pending_admin(&email, password).await?
                }
                Some(AuthErrorCode::InvalidPassword) => return Err(AdminError::InvalidCredentials),
                _ => return Err(e.into()),
            },
        };

        let uid = signed_in.local_id.clone();
        let users = self.console.firestore.collection(USERS);

        let profile = match users.doc(&uid).get::<UserProfile>().await? {
            Some(profile) => profile,
            None => self
                .recover_profile(&uid, &email)
                .await?
                .ok_or(AdminError::NotAdmin)?,
        };

        if !profile.is_admin() {
            tracing::warn!(uid = %uid, "non-admin account tried to sign in");
            return Err(AdminError::NotAdmin);
        }

        users
            .doc(&uid)
            .update(&json!({ "isOnline": true, "lastLoginAt": Utc::now() }))
            .await?;
        tracing::info!(uid = %uid, "admin signed in");

        Ok(AdminSession {
            uid,
            email: profile.email,
            name: profile.name,
            expires_in: signed_in
                .expires_in
                .parse()
                .unwrap_or(DEFAULT_TOKEN_LIFETIME_SECS),
            id_token: signed_in.id_token,
            refresh_token: signed_in.refresh_token,
        })
    }

    /// Marks the admin offline.
    pub async fn logout(&self, uid: &str) -> Result<()> {
        self.console
            .firestore
            .collection(USERS)
            .doc(uid)
            .update(&json!({ "isOnline": false }))
            .await?;
        tracing::info!(uid, "admin signed out");
        Ok(())
    }

    /// Pending placeholders registered for `email`, with their document ids.
    pub(crate) async fn pending_admins(&self, email: &str) -> Result<Vec<(String, PendingAdmin)>> {
        let query = Query::new(USERS)
            .where_eq("email", normalize_email(email))?
            .where_eq("pending", true)?;
        let snapshot = self.console.firestore.query(query).get().await?;
        Ok(snapshot.decode_all()?)
    }

    // Creates the auth account of a pending admin whose placeholder matches
    // the password, swaps the placeholder for a profile keyed by the new uid,
    // then signs in.
    async fn activate_pending_admin(&self, email: &str, password: &str) -> Result<SignInResponse> {
        let hash = pending_password_hash(email, password);
        let placeholder = self
            .pending_admins(email)
            .await?
            .into_iter()
            .find(|(_, pending)| pending.pending_password_hash == hash);

        let Some((placeholder_id, pending)) = placeholder else {
            return Err(AdminError::InvalidCredentials);
        };

        let request = CreateUserRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
            display_name: Some(pending.name.clone()),
            ..Default::default()
        };
        let user = match self.console.auth.create_user(request).await {
            Ok(user) => user,
            // The account exists already, so the password was simply wrong.
            Err(e) if e.code() == Some(AuthErrorCode::EmailExists) => {
                return Err(AdminError::InvalidCredentials)
            }
            Err(e) => return Err(e.into()),
        };
        let uid = user.local_id;

        let firestore = &self.console.firestore;
        let existing = firestore.collection(USERS).doc(&uid).get_snapshot().await?;

        let mut batch = firestore.batch();
        if !existing.exists() {
            batch.create(&user_path(&uid), &pending.into_profile())?;
        }
        batch.delete(&user_path(&placeholder_id));

        match batch.commit().await {
            Ok(_) => {}
            // Another sign-in created the profile first; only the placeholder is left over.
            Err(FirestoreError::AlreadyExists(_)) => {
                firestore.collection(USERS).doc(&placeholder_id).delete().await?;
            }
            Err(e) => return Err(e.into()),
        }
        tracing::info!(uid = %uid, placeholder_id = %placeholder_id, "activated pending admin");

        Ok(self.console.auth.sign_in_with_password(email, password).await?)
    }

    // Moves a profile stored under another id to `users/<uid>`. A pending
    // placeholder left behind by an activation that created the auth account
    // but never committed the swap is finished the same way.
    async fn recover_profile(&self, uid: &str, email: &str) -> Result<Option<UserProfile>> {
        let query = Query::new(USERS).where_eq("email", email)?;
        let snapshot = self.console.firestore.query(query).get().await?;

        // Regular records win over placeholders.
        let found = snapshot
            .decode_all::<StoredUser>()?
            .into_iter()
            .filter(|(id, _)| id != uid)
            .min_by_key(|(_, stored)| stored.pending);

        let Some((old_id, stored)) = found else {
            return Ok(None);
        };

        let mut profile = stored.profile;
        if !stored.pending {
            profile.migrated_from = Some(old_id.clone());
        }

        let mut batch = self.console.firestore.batch();
        batch.create(&user_path(uid), &profile)?;
        batch.delete(&user_path(&old_id));
        match batch.commit().await {
            Ok(_) => {}
            // A concurrent sign-in finished the move first.
            Err(FirestoreError::AlreadyExists(_)) => {
                return Ok(self.console.firestore.collection(USERS).doc(uid).get().await?);
            }
            Err(e) => return Err(e.into()),
        }

        if stored.pending {
            tracing::info!(uid, placeholder_id = %old_id, "finished pending admin activation");
        } else {
            tracing::info!(uid, old_id = %old_id, "migrated profile to auth uid");
        }

        Ok(Some(profile))
    }

    /// Registers an admin that only exists in the database until its first
    /// login, which creates the auth account with the same password.
    pub async fn create_pending_admin(&self, name: &str, email: &str, password: &str) -> Result<String> {
        let name = validate_name(name)?;
        let email = normalize_email(email);
        validate_email(&email)?;
        validate_password(password)?;

        if self.console.auth.find_user_by_email(&email).await?.is_some()
            || !self.pending_admins(&email).await?.is_empty()
        {
            return Err(AdminError::AlreadyExists(
                "An account with this email already exists.".to_string(),
            ));
        }

        let pending = PendingAdmin {
            pending_password_hash: pending_password_hash(&email, password),
            email,
            name,
            role: Role::Admin,
            is_online: false,
            created_at: Utc::now(),
            pending: true,
        };

        let doc = self.console.firestore.collection(USERS).add(&pending).await?;
        tracing::info!(id = %doc.id(), "registered pending admin");
        Ok(doc.id().to_string())
    }

    /// All profiles and pending admins, newest first.
    pub async fn list_users(&self) -> Result<Vec<UserSummary>> {
        let stored: Vec<(String, StoredUser)> =
            self.console.firestore.collection(USERS).get_all().await?;

        let mut users: Vec<UserSummary> = stored
            .into_iter()
            .map(|(id, stored)| UserSummary {
                id,
                profile: stored.profile,
                pending: stored.pending,
            })
            .collect();
        users.sort_by(|a, b| b.profile.created_at.cmp(&a.profile.created_at));
        Ok(users)
    }

    /// Changes a user's role. Admins cannot demote themselves.
    pub async fn set_role(&self, caller_id: &str, uid: &str, role: Role) -> Result<()> {
        if caller_id == uid && role != Role::Admin {
            return Err(AdminError::PermissionDenied(
                "You cannot remove your own admin role.".to_string(),
            ));
        }

        self.console
            .firestore
            .collection(USERS)
            .doc(uid)
            .update(&json!({ "role": role }))
            .await
            .map_err(|e| not_found_as(e, uid))?;
        tracing::info!(caller_id, uid, ?role, "changed user role");
        Ok(())
    }

    /// Renames a user in both the auth service and the profile.
    pub async fn rename_user(&self, uid: &str, name: &str) -> Result<()> {
        let name = validate_name(name)?;

        let request = UpdateUserRequest {
            local_id: uid.to_string(),
            display_name: Some(name.clone()),
            ..Default::default()
        };
        match self.console.auth.update_user(request).await {
            Ok(_) => {}
            // Pending admins have no auth account yet.
            Err(e) if is_missing_account(&e) => {}
            Err(e) => return Err(e.into()),
        }

        self.console
            .firestore
            .collection(USERS)
            .doc(uid)
            .update(&json!({ "name": name }))
            .await
            .map_err(|e| not_found_as(e, uid))?;
        Ok(())
    }
}

fn is_missing_account(err: &AuthError) -> bool {
    matches!(
        err.code(),
        Some(AuthErrorCode::UserNotFound | AuthErrorCode::EmailNotFound)
    )
}

fn not_found_as(err: FirestoreError, uid: &str) -> AdminError {
    match err {
        FirestoreError::NotFound(_) => AdminError::NotFound(format!("No user with id {}.", uid)),
        other => other.into(),
    }
}
