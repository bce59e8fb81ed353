//! Cloud Storage for Firebase module.
//!
//! This module provides functionality for interacting with the Google Cloud Storage bucket
//! associated with your Firebase project. It supports uploading, copying and deleting files,
//! managing file metadata, and building Firebase download URLs.
//!
//! # Examples
//!
//! ```rust,ignore
//! # use signtalk_admin::SignTalkApp;
//! # async fn run(app: SignTalkApp) {
//! let storage = app.storage();
//! let bucket = storage.bucket(None); // Use default bucket
//!
//! let file = bucket.file("gifs/hello.gif");
//! let _ = file.save(gif_bytes, "image/gif").await;
//! # }
//! ```

pub mod bucket;
pub mod file;

use crate::core::authorized_client;
use crate::core::middleware::AuthMiddleware;
use bucket::Bucket;
use reqwest_middleware::ClientWithMiddleware;
use thiserror::Error;

const STORAGE_V1_API: &str = "https://storage.googleapis.com/storage/v1";
const FIREBASE_DOWNLOAD_API: &str = "https://firebasestorage.googleapis.com/v0";

/// Errors that can occur during Storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Wrapper for `reqwest::Error`.
    #[error("HTTP Request failed: {0}")]
    RequestError(#[from] reqwest::Error),
    /// Wrapper for `reqwest_middleware::Error`.
    #[error("Middleware error: {0}")]
    MiddlewareError(#[from] reqwest_middleware::Error),
    /// Errors returned by the Cloud Storage API.
    #[error("API error: {0}")]
    ApiError(String),
    /// The object does not exist.
    #[error("Object not found: {0}")]
    NotFound(String),
    /// A generation precondition did not hold, e.g. the object already exists.
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
    /// Wrapper for `serde_json::Error`.
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    /// The configured API root is not a valid URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Client for interacting with Cloud Storage for Firebase.
#[derive(Clone)]
pub struct FirebaseStorage {
    client: ClientWithMiddleware,
    pub base_url: String,
    pub upload_url: String,
    pub download_url: String,
    default_bucket: String,
}

impl FirebaseStorage {
    /// Creates a new `FirebaseStorage` instance.
    ///
    /// `bucket` overrides the default bucket, which is otherwise derived from the
    /// project id (`<project>.appspot.com`).
    pub fn new(middleware: AuthMiddleware, bucket: Option<String>) -> Self {
        let project_id = middleware.project_id().unwrap_or_default().to_string();
        let default_bucket = bucket.unwrap_or_else(|| format!("{}.appspot.com", project_id));

        Self {
            client: authorized_client(middleware),
            base_url: STORAGE_V1_API.to_string(),
            upload_url: STORAGE_V1_API.replace("/storage/v1", "/upload/storage/v1"),
            download_url: FIREBASE_DOWNLOAD_API.to_string(),
            default_bucket,
        }
    }

    /// Creates a client against a custom JSON API root (an emulator or a mock server).
    ///
    /// `base_url` is expected to end in `/storage/v1`; uploads go to the
    /// matching `/upload/storage/v1` and download URLs are built under `/v0`
    /// on the same host.
    pub fn new_with_client(client: ClientWithMiddleware, base_url: String, bucket: &str) -> Self {
        let root = base_url
            .strip_suffix("/storage/v1")
            .unwrap_or(&base_url)
            .to_string();

        Self {
            client,
            upload_url: format!("{}/upload/storage/v1", root),
            download_url: format!("{}/v0", root),
            base_url,
            default_bucket: bucket.to_string(),
        }
    }

    /// Gets a `Bucket` instance that refers to the specific bucket.
    ///
    /// # Arguments
    ///
    /// * `name` - The name of the bucket (e.g. "my-project.appspot.com").
    ///   If not provided, the configured default bucket is used.
    pub fn bucket(&self, name: Option<&str>) -> Bucket {
        let bucket_name = name.unwrap_or(&self.default_bucket).to_string();
        Bucket::new(self.clone(), bucket_name)
    }

    pub(crate) fn client(&self) -> &ClientWithMiddleware {
        &self.client
    }
}
