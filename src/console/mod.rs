//! Console operations.
//!
//! [`Console`] bundles the three backend clients and hands out one small
//! service per console page: [`accounts`](Console::accounts),
//! [`privileged`](Console::privileged), [`datasets`](Console::datasets),
//! [`feedback`](Console::feedback), [`reports`](Console::reports) and
//! [`maintenance`](Console::maintenance).

pub mod accounts;
pub mod datasets;
pub mod feedback;
pub mod maintenance;
pub mod models;
pub mod privileged;
pub mod reports;

#[cfg(test)]
mod tests;

use crate::auth::FirebaseAuth;
use crate::error::{AdminError, Result};
use crate::firestore::FirebaseFirestore;
use crate::storage::FirebaseStorage;
use models::{UserProfile, USERS};
use sha2::{Digest, Sha256};

pub use accounts::Accounts;
pub use datasets::Datasets;
pub use feedback::FeedbackLog;
pub use maintenance::Maintenance;
pub use privileged::Privileged;
pub use reports::Reports;

const MIN_PASSWORD_LEN: usize = 6;

pub struct Console {
    pub(crate) auth: FirebaseAuth,
    pub(crate) firestore: FirebaseFirestore,
    pub(crate) storage: FirebaseStorage,
}

impl Console {
    pub fn new(auth: FirebaseAuth, firestore: FirebaseFirestore, storage: FirebaseStorage) -> Self {
        Self {
            auth,
            firestore,
            storage,
        }
    }

    pub fn accounts(&self) -> Accounts<'_> {
        Accounts::new(self)
    }

    pub fn privileged(&self) -> Privileged<'_> {
        Privileged::new(self)
    }

    pub fn datasets(&self) -> Datasets<'_> {
        Datasets::new(self)
    }

    pub fn feedback(&self) -> FeedbackLog<'_> {
        FeedbackLog::new(self)
    }

    pub fn reports(&self) -> Reports<'_> {
        Reports::new(self)
    }

    pub fn maintenance(&self) -> Maintenance<'_> {
        Maintenance::new(self)
    }

    /// The admin policy shared by every privileged operation: the caller's
    /// own profile must exist and carry the admin role.
    pub async fn require_admin(&self, caller_id: &str) -> Result<UserProfile> {
        if caller_id.is_empty() {
            return Err(AdminError::Unauthenticated);
        }

        let profile: Option<UserProfile> = self.firestore.collection(USERS).doc(caller_id).get().await?;
        match profile {
            Some(profile) if profile.is_admin() => Ok(profile),
            _ => {
                tracing::warn!(caller_id, "rejected non-admin caller");
                Err(AdminError::PermissionDenied(
                    "Only admins can perform this action.".to_string(),
                ))
            }
        }
    }
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(crate) fn validate_email(email: &str) -> Result<()> {
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.contains(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(AdminError::InvalidArgument(
            "Please enter a valid email address.".to_string(),
        ))
    }
}

pub(crate) fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AdminError::InvalidArgument(format!(
            "Password must be at least {} characters.",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

pub(crate) fn validate_name(name: &str) -> Result<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AdminError::InvalidArgument("Name is required.".to_string()));
    }
    Ok(name.to_string())
}

/// Hash stored on pending admin placeholders in place of the password.
pub(crate) fn pending_password_hash(email: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_email(email).as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

pub(crate) fn user_path(uid: &str) -> String {
    format!("{}/{}", USERS, uid)
}
