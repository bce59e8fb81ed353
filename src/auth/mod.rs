//! Firebase Authentication (Identity Toolkit) client.
//!
//! Covers the account operations the console needs: admin-side user
//! management through the project-scoped API, password sign-in through the
//! public API, and verification of the ID tokens that sign-in hands out.

pub mod keys;
pub mod models;
pub mod verifier;

use crate::auth::models::{
    CreateUserRequest, DeleteAccountRequest, GetAccountInfoRequest, GetAccountInfoResponse,
    ListUsersResponse, OobCodeRequest, OobCodeResponse, SignInRequest, SignInResponse,
    UpdateUserRequest, UserRecord,
};
use crate::core::middleware::AuthMiddleware;
use crate::core::{authorized_client, parse_error_response};
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;
use std::fmt;
use thiserror::Error;


const IDENTITY_TOOLKIT_V1_API: &str = "https://identitytoolkit.googleapis.com/v1/projects/{project_id}";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    #[error("API error: {0}")]
    ApiError(String),
    #[error("User not found")]
    UserNotFound,
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Web API key is not configured")]
    ApiKeyMissing,
}

/// Error codes reported by the Identity Toolkit API.
///
/// The API reports them as the leading token of the error message, e.g.
/// `WEAK_PASSWORD : Password should be at least 6 characters`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthErrorCode {
    EmailExists,
    EmailNotFound,
    InvalidPassword,
    InvalidLoginCredentials,
    UserDisabled,
    WeakPassword,
    InvalidEmail,
    TooManyAttempts,
    UserNotFound,
    Other(String),
}

impl AuthErrorCode {
    pub fn from_message(message: &str) -> Self {
        let token = message
            .split(|c: char| c == ' ' || c == ':')
            .next()
            .unwrap_or_default();
        match token {
            "EMAIL_EXISTS" | "DUPLICATE_EMAIL" => Self::EmailExists,
            "EMAIL_NOT_FOUND" => Self::EmailNotFound,
            "INVALID_PASSWORD" => Self::InvalidPassword,
            "INVALID_LOGIN_CREDENTIALS" => Self::InvalidLoginCredentials,
            "USER_DISABLED" => Self::UserDisabled,
            "WEAK_PASSWORD" => Self::WeakPassword,
            "INVALID_EMAIL" => Self::InvalidEmail,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => Self::TooManyAttempts,
            "USER_NOT_FOUND" => Self::UserNotFound,
            other => Self::Other(other.to_string()),
        }
    }
}

impl fmt::Display for AuthErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::EmailExists => "EMAIL_EXISTS",
            Self::EmailNotFound => "EMAIL_NOT_FOUND",
            Self::InvalidPassword => "INVALID_PASSWORD",
            Self::InvalidLoginCredentials => "INVALID_LOGIN_CREDENTIALS",
            Self::UserDisabled => "USER_DISABLED",
            Self::WeakPassword => "WEAK_PASSWORD",
            Self::InvalidEmail => "INVALID_EMAIL",
            Self::TooManyAttempts => "TOO_MANY_ATTEMPTS_TRY_LATER",
            Self::UserNotFound => "USER_NOT_FOUND",
            Self::Other(s) => s,
        };
        f.write_str(s)
    }
}

impl AuthError {
    /// The backend error code carried by this error, if any.
    pub fn code(&self) -> Option<AuthErrorCode> {
        match self {
            AuthError::ApiError(msg) => Some(AuthErrorCode::from_message(msg)),
            AuthError::UserNotFound => Some(AuthErrorCode::UserNotFound),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct FirebaseAuth {
    client: ClientWithMiddleware,
    base_url: String,
    api_key: Option<String>,
}

impl FirebaseAuth {
    /// Creates a new `FirebaseAuth` instance.
    ///
    /// This is typically called via `SignTalkApp::auth()`.
    pub fn new(middleware: AuthMiddleware, api_key: Option<String>) -> Self {
        let project_id = middleware.project_id().unwrap_or_default().to_string();
        let base_url = IDENTITY_TOOLKIT_V1_API.replace("{project_id}", &project_id);

        Self {
            client: authorized_client(middleware),
            base_url,
            api_key,
        }
    }

    /// Creates a client against a custom project URL, e.g. an emulator or a mock
    /// server. The URL must end in `/v1/projects/<project>`.
    pub fn new_with_client(client: ClientWithMiddleware, base_url: String) -> Self {
        Self {
            client,
            base_url,
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    // Public (non project-scoped) endpoints live under the API version root.
    fn public_url(&self) -> &str {
        self.base_url
            .split("/projects/")
            .next()
            .unwrap_or(&self.base_url)
    }

    async fn post_json<B: Serialize>(
        &self,
        url: &str,
        body: &B,
        failure: &str,
    ) -> Result<reqwest::Response, AuthError> {
        let response = self
            .client
            .post(url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(body)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::ApiError(parse_error_response(response, failure).await));
        }

        Ok(response)
    }

    pub async fn create_user(&self, request: CreateUserRequest) -> Result<UserRecord, AuthError> {
        let url = format!("{}/accounts", self.base_url);
        let response = self.post_json(&url, &request, "Create user failed").await?;
        let user: UserRecord = response.json().await?;
        tracing::debug!(uid = %user.local_id, "created auth account");
        Ok(user)
    }

    pub async fn update_user(&self, request: UpdateUserRequest) -> Result<UserRecord, AuthError> {
        let url = format!("{}/accounts:update", self.base_url);
        let response = self.post_json(&url, &request, "Update user failed").await?;
        let user: UserRecord = response.json().await?;
        Ok(user)
    }

    pub async fn delete_user(&self, uid: &str) -> Result<(), AuthError> {
        let url = format!("{}/accounts:delete", self.base_url);
        let request = DeleteAccountRequest {
            local_id: uid.to_string(),
        };
        self.post_json(&url, &request, "Delete user failed").await?;
        tracing::debug!(uid, "deleted auth account");
        Ok(())
    }

    async fn get_account_info(&self, request: GetAccountInfoRequest) -> Result<UserRecord, AuthError> {
        let url = format!("{}/accounts:lookup", self.base_url);
        let response = self.post_json(&url, &request, "Get user failed").await?;
        let result: GetAccountInfoResponse = response.json().await?;

        result
            .users
            .and_then(|mut users| users.pop())
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn get_user(&self, uid: &str) -> Result<UserRecord, AuthError> {
        let request = GetAccountInfoRequest {
            local_id: Some(vec![uid.to_string()]),
            email: None,
        };
        self.get_account_info(request).await
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<UserRecord, AuthError> {
        let request = GetAccountInfoRequest {
            local_id: None,
            email: Some(vec![email.to_string()]),
        };
        self.get_account_info(request).await
    }

    /// Like `get_user_by_email`, but a missing account is `Ok(None)`.
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, AuthError> {
        match self.get_user_by_email(email).await {
            Ok(user) => Ok(Some(user)),
            Err(AuthError::UserNotFound) => Ok(None),
            Err(e) if e.code() == Some(AuthErrorCode::UserNotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Lists one page of auth accounts.
    pub async fn list_users(
        &self,
        max_results: u32,
        page_token: Option<&str>,
    ) -> Result<ListUsersResponse, AuthError> {
        let url = format!("{}/accounts:batchGet", self.base_url);

        let mut params = vec![("maxResults", max_results.to_string())];
        if let Some(token) = page_token {
            params.push(("nextPageToken", token.to_string()));
        }

        let response = self.client.get(&url).query(&params).send().await?;

        if !response.status().is_success() {
            return Err(AuthError::ApiError(
                parse_error_response(response, "List users failed").await,
            ));
        }

        Ok(response.json().await?)
    }

    /// Signs in with email and password, returning the session tokens.
    ///
    /// Requires the project's web API key.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<SignInResponse, AuthError> {
        let api_key = self.api_key.as_deref().ok_or(AuthError::ApiKeyMissing)?;
        let url = format!(
            "{}/accounts:signInWithPassword?key={}",
            self.public_url(),
            api_key
        );
        let request = SignInRequest {
            email: email.to_string(),
            password: password.to_string(),
            return_secure_token: true,
        };

        let response = self.post_json(&url, &request, "Sign in failed").await?;
        Ok(response.json().await?)
    }

    /// Generates an out-of-band password reset link for `email`.
    pub async fn generate_password_reset_link(&self, email: &str) -> Result<String, AuthError> {
        let url = format!("{}/accounts:sendOobCode", self.base_url);
        let request = OobCodeRequest {
            request_type: "PASSWORD_RESET".to_string(),
            email: email.to_string(),
            return_oob_link: true,
        };

        let response = self
            .post_json(&url, &request, "Generate password reset link failed")
            .await?;
        let result: OobCodeResponse = response.json().await?;
        Ok(result.oob_link)
    }
}
