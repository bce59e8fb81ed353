//! Cloud Firestore module.
//!
//! A REST client covering the document operations the console performs:
//! reading and writing single documents, listing collections, equality
//! queries and atomic write batches.
//!
//! Paths are addressed through [`CollectionReference`] and [`DocumentReference`],
//! which borrow the client they were created from.

pub mod batch;
pub mod models;
pub mod query;
pub mod reference;
pub mod snapshot;


use self::batch::WriteBatch;
use self::query::{ExecutableQuery, Query};
use self::reference::{CollectionReference, DocumentReference};
use crate::core::middleware::AuthMiddleware;
use crate::core::{authorized_client, FirebaseErrorResponse};
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;

const FIRESTORE_V1_API: &str =
    "https://firestore.googleapis.com/v1/projects/{project_id}/databases/(default)/documents";

/// Errors that can occur during Firestore operations.
#[derive(Error, Debug)]
pub enum FirestoreError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Firestore API.
    #[error("API error: {0}")]
    ApiError(String),
    /// The target document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),
    /// A create (or create precondition) hit an existing document.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Turns a failed response into a `FirestoreError`, keeping the
/// not-found / already-exists distinction callers branch on.
pub(crate) async fn api_error(response: reqwest::Response, failure: &str) -> FirestoreError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let parsed = serde_json::from_str::<FirebaseErrorResponse>(&text).ok();

    let message = match &parsed {
        Some(error) => format!("{}: {}", failure, error.display_message()),
        None => format!("{} {}: {}", failure, status, text),
    };

    match parsed.as_ref().and_then(|e| e.error.status.as_deref()) {
        Some("ALREADY_EXISTS") => FirestoreError::AlreadyExists(message),
        Some("NOT_FOUND") => FirestoreError::NotFound(message),
        _ if status == reqwest::StatusCode::NOT_FOUND => FirestoreError::NotFound(message),
        _ => FirestoreError::ApiError(message),
    }
}

/// Client for interacting with Cloud Firestore.
pub struct FirebaseFirestore {
    client: ClientWithMiddleware,
    base_url: String,
}

impl FirebaseFirestore {
    /// Creates a new `FirebaseFirestore` instance.
    ///
    /// This is typically called via `SignTalkApp::firestore()`.
    pub fn new(middleware: AuthMiddleware) -> Self {
        let project_id = middleware.project_id().unwrap_or_default().to_string();
        let base_url = FIRESTORE_V1_API.replace("{project_id}", &project_id);

        Self {
            client: authorized_client(middleware),
            base_url,
        }
    }

    /// Creates a client against a custom documents URL (an emulator or a mock server).
    ///
    /// The URL must end in `/databases/<db>/documents`.
    pub fn new_with_client(client: ClientWithMiddleware, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Gets a `CollectionReference` instance that refers to the collection at the specified path.
    ///
    /// # Arguments
    ///
    /// * `collection_id` - The ID of the collection (e.g., "users").
    pub fn collection(&self, collection_id: &str) -> CollectionReference<'_> {
        CollectionReference {
            client: &self.client,
            path: format!("{}/{}", self.base_url, collection_id),
        }
    }

    /// Gets a `DocumentReference` instance that refers to the document at the specified path.
    ///
    /// # Arguments
    ///
    /// * `document_path` - The slash-separated path to the document (e.g., "users/user1").
    pub fn doc(&self, document_path: &str) -> DocumentReference<'_> {
        DocumentReference {
            client: &self.client,
            path: format!("{}/{}", self.base_url, document_path),
        }
    }

    /// Creates a write batch, used for performing multiple writes as a single atomic operation.
    pub fn batch(&self) -> WriteBatch<'_> {
        WriteBatch::new(&self.client, self.base_url.clone())
    }

    /// Creates an executable query from a query definition.
    pub fn query(&self, query: Query) -> ExecutableQuery<'_> {
        ExecutableQuery::new(&self.client, self.base_url.clone(), query)
    }
}
