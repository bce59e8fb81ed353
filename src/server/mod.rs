//! HTTP surface of the console.
//!
//! Two protocols share one router: the Firebase callable protocol for the
//! privileged account operations under `/callable`, and a JSON REST API for
//! the console pages under `/api`.

mod api;
mod callable;
mod error;
mod session;

pub use error::{ApiError, CallableError};
pub use session::AdminCaller;

use crate::auth::verifier::TokenVerifier;
use crate::console::Console;
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub console: Arc<Console>,
    pub verifier: Arc<dyn TokenVerifier>,
}

impl AppState {
    pub fn new(console: Console, verifier: impl TokenVerifier + 'static) -> Self {
        Self {
            console: Arc::new(console),
            verifier: Arc::new(verifier),
        }
    }
}

/// Largest accepted request body on the dataset routes. GIFs travel
/// base64-encoded, which adds a third to their size.
pub const MAX_DATASET_BODY_BYTES: usize = 32 * 1024 * 1024;

fn dataset_routes() -> Router<AppState> {
    Router::new()
        .route("/datasets", get(api::list_datasets).post(api::add_dataset))
        .route(
            "/datasets/{keyword}",
            get(api::get_dataset)
                .put(api::replace_dataset_gif)
                .delete(api::delete_dataset),
        )
        .route("/datasets/{keyword}/rename", post(api::rename_dataset))
        .layer(DefaultBodyLimit::max(MAX_DATASET_BODY_BYTES))
}

pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Session
        .route("/login", post(api::login))
        .route("/logout", post(api::logout))
        // Users
        .route("/users", get(api::list_users))
        .route("/users/pending", post(api::create_pending_admin))
        .route("/users/{uid}/role", put(api::set_role))
        .route("/users/{uid}/name", put(api::rename_user))
        // Datasets
        .merge(dataset_routes())
        // Feedback
        .route("/feedback", get(api::list_feedback))
        .route("/feedback/{id}", axum::routing::delete(api::delete_feedback))
        // Reports and maintenance
        .route("/reports", get(api::reports))
        .route("/maintenance", get(api::maintenance_status).put(api::set_maintenance));

    let public_routes = Router::new()
        .route("/health", get(health_check))
        .route("/maintenance", get(api::public_maintenance_status));

    Router::new()
        .route("/callable/{name}", post(callable::handle))
        .nest("/api", api_routes)
        .merge(public_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
