//! REST endpoints of the console pages.
//!
//! Every handler except `login` and the public maintenance status takes an
//! [`AdminCaller`], so it only runs for a verified admin.

use super::{AdminCaller, ApiError, AppState};
use crate::console::models::{
    AdminSession, DatasetEntry, FeedbackView, MaintenanceSettings, Role, UserSummary,
};
use crate::console::reports::ReportSummary;
use crate::error::{AdminError, Result};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use base64::Engine;
use serde::{Deserialize, Serialize};

const DEFAULT_FEEDBACK_LIMIT: usize = 100;
const DEFAULT_REPORT_DAYS: u32 = 30;

/// Success envelope.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

fn success<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(ApiResponse { success: true, data })
}

// GIFs arrive base64-encoded, optionally as a data URL.
fn decode_gif(encoded: &str) -> Result<Vec<u8>> {
    let encoded = match encoded.split_once(";base64,") {
        Some((prefix, data)) if prefix.starts_with("data:") => data,
        _ => encoded,
    };
    base64::engine::general_purpose::STANDARD
        .decode(encoded.trim())
        .map_err(|_| AdminError::InvalidArgument("The GIF must be base64-encoded.".to_string()))
}

#[derive(Debug, Serialize)]
pub struct Done {
    pub ok: bool,
}

fn done() -> ApiResult<Done> {
    success(Done { ok: true })
}

// --- session ------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// POST /api/login
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> ApiResult<AdminSession> {
    success(state.console.accounts().login(&request.email, &request.password).await?)
}

/// POST /api/logout
pub async fn logout(State(state): State<AppState>, caller: AdminCaller) -> ApiResult<Done> {
    state.console.accounts().logout(&caller.uid).await?;
    done()
}

// --- users --------------------------------------------------------------

/// GET /api/users
pub async fn list_users(State(state): State<AppState>, _caller: AdminCaller) -> ApiResult<Vec<UserSummary>> {
    success(state.console.accounts().list_users().await?)
}

#[derive(Debug, Deserialize)]
pub struct RoleRequest {
    pub role: Role,
}

/// PUT /api/users/{uid}/role
pub async fn set_role(
    State(state): State<AppState>,
    caller: AdminCaller,
    Path(uid): Path<String>,
    Json(request): Json<RoleRequest>,
) -> ApiResult<Done> {
    state.console.accounts().set_role(&caller.uid, &uid, request.role).await?;
    done()
}

#[derive(Debug, Deserialize)]
pub struct NameRequest {
    pub name: String,
}

/// PUT /api/users/{uid}/name
pub async fn rename_user(
    State(state): State<AppState>,
    _caller: AdminCaller,
    Path(uid): Path<String>,
    Json(request): Json<NameRequest>,
) -> ApiResult<Done> {
    state.console.accounts().rename_user(&uid, &request.name).await?;
    done()
}

#[derive(Debug, Deserialize)]
pub struct PendingAdminRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct Created {
    pub id: String,
}

/// POST /api/users/pending
pub async fn create_pending_admin(
    State(state): State<AppState>,
    _caller: AdminCaller,
    Json(request): Json<PendingAdminRequest>,
) -> ApiResult<Created> {
    let id = state
        .console
        .accounts()
        .create_pending_admin(&request.name, &request.email, &request.password)
        .await?;
    success(Created { id })
}

// --- datasets -----------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct DatasetQuery {
    pub q: Option<String>,
}

/// GET /api/datasets?q=
pub async fn list_datasets(
    State(state): State<AppState>,
    _caller: AdminCaller,
    Query(query): Query<DatasetQuery>,
) -> ApiResult<Vec<DatasetEntry>> {
    let datasets = state.console.datasets();
    let entries = match query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(term) => datasets.search(term).await?,
        None => datasets.list().await?,
    };
    success(entries)
}

#[derive(Debug, Deserialize)]
pub struct NewDataset {
    pub keyword: String,
    pub gif: String,
}

/// POST /api/datasets
pub async fn add_dataset(
    State(state): State<AppState>,
    _caller: AdminCaller,
    Json(request): Json<NewDataset>,
) -> ApiResult<DatasetEntry> {
    let gif = decode_gif(&request.gif)?;
    success(state.console.datasets().add(&request.keyword, &gif).await?)
}

/// GET /api/datasets/{keyword}
pub async fn get_dataset(
    State(state): State<AppState>,
    _caller: AdminCaller,
    Path(keyword): Path<String>,
) -> ApiResult<DatasetEntry> {
    success(state.console.datasets().get(&keyword).await?)
}

#[derive(Debug, Deserialize)]
pub struct GifUpload {
    pub gif: String,
}

/// PUT /api/datasets/{keyword}
pub async fn replace_dataset_gif(
    State(state): State<AppState>,
    _caller: AdminCaller,
    Path(keyword): Path<String>,
    Json(request): Json<GifUpload>,
) -> ApiResult<DatasetEntry> {
    let gif = decode_gif(&request.gif)?;
    success(state.console.datasets().replace_gif(&keyword, &gif).await?)
}

/// DELETE /api/datasets/{keyword}
pub async fn delete_dataset(
    State(state): State<AppState>,
    _caller: AdminCaller,
    Path(keyword): Path<String>,
) -> ApiResult<Done> {
    state.console.datasets().delete(&keyword).await?;
    done()
}

#[derive(Debug, Deserialize)]
pub struct RenameRequest {
    pub keyword: String,
}

/// POST /api/datasets/{keyword}/rename
pub async fn rename_dataset(
    State(state): State<AppState>,
    _caller: AdminCaller,
    Path(keyword): Path<String>,
    Json(request): Json<RenameRequest>,
) -> ApiResult<DatasetEntry> {
    success(state.console.datasets().rename(&keyword, &request.keyword).await?)
}

// --- feedback -----------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackQuery {
    pub limit: Option<usize>,
    pub user_id: Option<String>,
}

/// GET /api/feedback?limit=&userId=
pub async fn list_feedback(
    State(state): State<AppState>,
    _caller: AdminCaller,
    Query(query): Query<FeedbackQuery>,
) -> ApiResult<Vec<FeedbackView>> {
    let feedback = state.console.feedback();
    let records = match query.user_id {
        Some(user_id) => feedback.list_for_user(&user_id).await?,
        None => feedback.list(query.limit.unwrap_or(DEFAULT_FEEDBACK_LIMIT)).await?,
    };
    success(records)
}

/// DELETE /api/feedback/{id}
pub async fn delete_feedback(
    State(state): State<AppState>,
    _caller: AdminCaller,
    Path(id): Path<String>,
) -> ApiResult<Done> {
    state.console.feedback().delete(&id).await?;
    done()
}

// --- reports and maintenance ----------------------------------------------

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    pub days: Option<u32>,
}

/// GET /api/reports?days=
pub async fn reports(
    State(state): State<AppState>,
    _caller: AdminCaller,
    Query(query): Query<ReportQuery>,
) -> ApiResult<ReportSummary> {
    success(
        state
            .console
            .reports()
            .summary(query.days.unwrap_or(DEFAULT_REPORT_DAYS))
            .await?,
    )
}

/// GET /api/maintenance
pub async fn maintenance_status(
    State(state): State<AppState>,
    _caller: AdminCaller,
) -> ApiResult<MaintenanceSettings> {
    success(state.console.maintenance().status().await?)
}

#[derive(Debug, Deserialize)]
pub struct MaintenanceRequest {
    pub enabled: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// PUT /api/maintenance
pub async fn set_maintenance(
    State(state): State<AppState>,
    caller: AdminCaller,
    Json(request): Json<MaintenanceRequest>,
) -> ApiResult<MaintenanceSettings> {
    success(
        state
            .console
            .maintenance()
            .set(&caller.uid, request.enabled, request.message.as_deref())
            .await?,
    )
}

/// GET /maintenance, read by the apps without signing in.
pub async fn public_maintenance_status(State(state): State<AppState>) -> ApiResult<MaintenanceSettings> {
    let mut status = state.console.maintenance().status().await?;
    status.updated_by = None;
    success(status)
}
