//! Console error taxonomy.
//!
//! Every console operation fails with an [`AdminError`]. Backend error codes
//! are classified once, in [`AdminError::kind`], and the text shown to an
//! admin comes from [`AdminError::user_message`], so call sites never map
//! codes to strings themselves.

use crate::auth::{AuthError, AuthErrorCode};
use crate::firestore::FirestoreError;
use crate::storage::StorageError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Authentication backend error: {0}")]
    Auth(#[from] AuthError),
    #[error("Database error: {0}")]
    Firestore(#[from] FirestoreError),
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Account is not an admin")]
    NotAdmin,
    #[error("Authentication required")]
    Unauthenticated,
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

/// Canonical error classes, shared by the callable protocol and the REST API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    ResourceExhausted,
    Unavailable,
    Internal,
}

impl ErrorKind {
    /// Status string of the Firebase callable protocol.
    pub fn callable_status(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "INVALID_ARGUMENT",
            ErrorKind::Unauthenticated => "UNAUTHENTICATED",
            ErrorKind::PermissionDenied => "PERMISSION_DENIED",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::AlreadyExists => "ALREADY_EXISTS",
            ErrorKind::ResourceExhausted => "RESOURCE_EXHAUSTED",
            ErrorKind::Unavailable => "UNAVAILABLE",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    pub fn http_status(self) -> http::StatusCode {
        use http::StatusCode;
        match self {
            ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthenticated => StatusCode::UNAUTHORIZED,
            ErrorKind::PermissionDenied => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::AlreadyExists => StatusCode::CONFLICT,
            ErrorKind::ResourceExhausted => StatusCode::TOO_MANY_REQUESTS,
            ErrorKind::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

fn transport_kind(err: &reqwest_middleware::Error) -> ErrorKind {
    match err {
        reqwest_middleware::Error::Reqwest(e) if e.is_connect() || e.is_timeout() => ErrorKind::Unavailable,
        _ => ErrorKind::Internal,
    }
}

impl AdminError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AdminError::Auth(err) => match err.code() {
                Some(AuthErrorCode::EmailExists) => ErrorKind::AlreadyExists,
                Some(AuthErrorCode::EmailNotFound | AuthErrorCode::UserNotFound) => ErrorKind::NotFound,
                Some(
                    AuthErrorCode::InvalidPassword
                    | AuthErrorCode::InvalidLoginCredentials
                    | AuthErrorCode::UserDisabled,
                ) => ErrorKind::Unauthenticated,
                Some(AuthErrorCode::WeakPassword | AuthErrorCode::InvalidEmail) => ErrorKind::InvalidArgument,
                Some(AuthErrorCode::TooManyAttempts) => ErrorKind::ResourceExhausted,
                Some(AuthErrorCode::Other(_)) | None => match err {
                    AuthError::MiddlewareError(e) => transport_kind(e),
                    _ => ErrorKind::Internal,
                },
            },
            AdminError::Firestore(FirestoreError::NotFound(_)) => ErrorKind::NotFound,
            AdminError::Firestore(FirestoreError::AlreadyExists(_)) => ErrorKind::AlreadyExists,
            AdminError::Firestore(FirestoreError::MiddlewareError(e)) => transport_kind(e),
            AdminError::Firestore(_) => ErrorKind::Internal,
            AdminError::Storage(StorageError::NotFound(_)) => ErrorKind::NotFound,
            AdminError::Storage(StorageError::PreconditionFailed(_)) => ErrorKind::AlreadyExists,
            AdminError::Storage(StorageError::MiddlewareError(e)) => transport_kind(e),
            AdminError::Storage(_) => ErrorKind::Internal,
            AdminError::InvalidCredentials | AdminError::Unauthenticated => ErrorKind::Unauthenticated,
            AdminError::NotAdmin | AdminError::PermissionDenied(_) => ErrorKind::PermissionDenied,
            AdminError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AdminError::NotFound(_) => ErrorKind::NotFound,
            AdminError::AlreadyExists(_) => ErrorKind::AlreadyExists,
        }
    }

    /// The fixed, human-readable message shown to an admin.
    ///
    /// Messages of console-level errors are written for the admin already;
    /// backend failures are translated by code, and anything unexpected gets
    /// a generic message so internal details stay in the logs.
    pub fn user_message(&self) -> String {
        match self {
            AdminError::InvalidCredentials => "Invalid email or password.".to_string(),
            AdminError::NotAdmin => "Access denied. This account does not have admin privileges.".to_string(),
            AdminError::Unauthenticated => "Please sign in to continue.".to_string(),
            AdminError::PermissionDenied(msg)
            | AdminError::InvalidArgument(msg)
            | AdminError::NotFound(msg)
            | AdminError::AlreadyExists(msg) => msg.clone(),
            AdminError::Auth(err) => match err.code() {
                Some(AuthErrorCode::EmailExists) => "An account with this email already exists.".to_string(),
                Some(AuthErrorCode::EmailNotFound | AuthErrorCode::UserNotFound) => {
                    "No account was found for this email.".to_string()
                }
                Some(AuthErrorCode::InvalidPassword | AuthErrorCode::InvalidLoginCredentials) => {
                    "Invalid email or password.".to_string()
                }
                Some(AuthErrorCode::UserDisabled) => "This account has been disabled.".to_string(),
                Some(AuthErrorCode::WeakPassword) => "Password must be at least 6 characters.".to_string(),
                Some(AuthErrorCode::InvalidEmail) => "The email address is not valid.".to_string(),
                Some(AuthErrorCode::TooManyAttempts) => {
                    "Too many attempts. Please wait a moment and try again.".to_string()
                }
                _ => self.generic_message(),
            },
            AdminError::Firestore(_) | AdminError::Storage(_) => match self.kind() {
                ErrorKind::NotFound => "The requested record no longer exists.".to_string(),
                ErrorKind::AlreadyExists => "A record with this name already exists.".to_string(),
                _ => self.generic_message(),
            },
        }
    }

    fn generic_message(&self) -> String {
        match self.kind() {
            ErrorKind::Unavailable => "The backend is unreachable. Check your connection and try again.".to_string(),
            _ => "Something went wrong. Please try again.".to_string(),
        }
    }
}

pub type Result<T, E = AdminError> = std::result::Result<T, E>;
