//! Bearer-token authentication of console callers.

use super::{ApiError, AppState};
use crate::console::models::UserProfile;
use crate::error::{AdminError, Result};
use axum::extract::FromRequestParts;
use axum::http::{header, request::Parts, HeaderMap};

/// Uid of the caller whose ID token is in the `Authorization` header.
pub(crate) async fn verified_uid(state: &AppState, headers: &HeaderMap) -> Result<String> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AdminError::Unauthenticated)?;

    let claims = state.verifier.verify(token).await.map_err(|e| {
        tracing::debug!(error = %e, "rejected bearer token");
        AdminError::Unauthenticated
    })?;

    Ok(claims.sub)
}

/// A verified caller holding the admin role.
#[derive(Debug, Clone)]
pub struct AdminCaller {
    pub uid: String,
    pub profile: UserProfile,
}

impl FromRequestParts<AppState> for AdminCaller {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let uid = verified_uid(state, &parts.headers).await?;
        let profile = state.console.require_admin(&uid).await?;
        Ok(AdminCaller { uid, profile })
    }
}
