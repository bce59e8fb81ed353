//! Firebase callable protocol for the privileged account operations.
//!
//! Requests carry `{"data": {...}}` and succeed with `{"result": ...}`. The
//! caller is always the uid of the verified ID token; a `callerId` sent in
//! `data` must name that same uid.

use super::session::verified_uid;
use super::{AppState, CallableError};
use crate::console::privileged::{
    CreateAdminAccountRequest, DeleteAccountRequest, GetUserInfoRequest, ResetPasswordRequest,
};
use crate::error::{AdminError, Result};
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
    response::{IntoResponse, Response},
    Json,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct CallableRequest {
    #[serde(default)]
    data: serde_json::Value,
}

#[derive(Debug, Serialize)]
struct CallableResult<T: Serialize> {
    result: T,
}

fn reply<T: Serialize>(result: T) -> Response {
    Json(CallableResult { result }).into_response()
}

fn decode<T: DeserializeOwned>(data: serde_json::Value) -> Result<T> {
    serde_json::from_value(data).map_err(|e| AdminError::InvalidArgument(format!("Invalid request: {}", e)))
}

fn check_caller(claimed: Option<&str>, uid: &str) -> Result<()> {
    match claimed {
        Some(claimed) if claimed != uid => {
            tracing::warn!(claimed, uid, "callerId does not match the signed-in user");
            Err(AdminError::PermissionDenied(
                "callerId does not match the signed-in user.".to_string(),
            ))
        }
        _ => Ok(()),
    }
}

/// POST /callable/{name}
pub async fn handle(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, CallableError> {
    let uid = verified_uid(&state, &headers).await?;

    let request: CallableRequest = serde_json::from_slice(&body)
        .map_err(|_| AdminError::InvalidArgument("Request body must be {\"data\": ...}.".to_string()))?;

    tracing::debug!(function = %name, uid = %uid, "callable invoked");
    let privileged = state.console.privileged();

    let response = match name.as_str() {
        "createAdminAccount" => {
            let req: CreateAdminAccountRequest = decode(request.data)?;
            check_caller(req.caller_id.as_deref(), &uid)?;
            reply(privileged.create_admin_account(&uid, req).await?)
        }
        "resetPassword" => {
            let req: ResetPasswordRequest = decode(request.data)?;
            check_caller(req.caller_id.as_deref(), &uid)?;
            reply(privileged.reset_password(&uid, req).await?)
        }
        "deleteAccount" => {
            let req: DeleteAccountRequest = decode(request.data)?;
            check_caller(req.caller_id.as_deref(), &uid)?;
            reply(privileged.delete_account(&uid, req).await?)
        }
        "getUserInfo" => {
            let req: GetUserInfoRequest = decode(request.data)?;
            check_caller(req.caller_id.as_deref(), &uid)?;
            reply(privileged.get_user_info(&uid, req).await?)
        }
        _ => {
            return Err(AdminError::NotFound(format!("Unknown function '{}'.", name)).into());
        }
    };

    Ok(response)
}
