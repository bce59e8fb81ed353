use crate::storage::{FirebaseStorage, StorageError};
use reqwest::header;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Custom metadata key Firebase uses for download tokens.
pub const DOWNLOAD_TOKENS_KEY: &str = "firebaseStorageDownloadTokens";

/// Represents a file within a Google Cloud Storage bucket.
pub struct File {
    storage: FirebaseStorage,
    bucket_name: String,
    name: String,
}

/// Metadata for a Google Cloud Storage object.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_control: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, String>>,
}

impl ObjectMetadata {
    /// The first Firebase download token recorded on the object.
    pub fn download_token(&self) -> Option<&str> {
        self.metadata
            .as_ref()
            .and_then(|m| m.get(DOWNLOAD_TOKENS_KEY))
            .and_then(|tokens| tokens.split(',').next())
            .filter(|t| !t.is_empty())
    }
}

// Appends `segments` to `base` as individually percent-encoded path
// segments, so an object name's `/` becomes `%2F`.
fn object_path(base: &str, segments: &[&str]) -> Result<String, StorageError> {
    let mut url = url::Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| StorageError::ApiError(format!("Cannot append a path to {}", base)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.into())
}

async fn api_error(response: reqwest::Response, failure: &str) -> StorageError {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let message = format!("{} {}: {}", failure, status, text);
    match status {
        reqwest::StatusCode::NOT_FOUND => StorageError::NotFound(message),
        reqwest::StatusCode::PRECONDITION_FAILED => StorageError::PreconditionFailed(message),
        _ => StorageError::ApiError(message),
    }
}

impl File {
    pub(crate) fn new(storage: FirebaseStorage, bucket_name: String, name: String) -> Self {
        Self {
            storage,
            bucket_name,
            name,
        }
    }

    /// Returns the name of the file.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the name of the bucket containing the file.
    pub fn bucket(&self) -> &str {
        &self.bucket_name
    }

    fn object_url(&self) -> Result<String, StorageError> {
        object_path(
            &self.storage.base_url,
            &["b", self.bucket_name.as_str(), "o", self.name.as_str()],
        )
    }

    /// Uploads data to the file using the simple (media) upload API.
    ///
    /// # Arguments
    ///
    /// * `body` - The data to upload.
    /// * `mime_type` - The MIME type of the data.
    pub async fn save(
        &self,
        body: impl Into<reqwest::Body>,
        mime_type: &str,
    ) -> Result<ObjectMetadata, StorageError> {
        self.upload(body, mime_type, &[]).await
    }

    /// Uploads data only if no object exists at this name yet.
    ///
    /// Fails with [`StorageError::PreconditionFailed`] when the object exists,
    /// leaving it untouched.
    pub async fn save_new(
        &self,
        body: impl Into<reqwest::Body>,
        mime_type: &str,
    ) -> Result<ObjectMetadata, StorageError> {
        self.upload(body, mime_type, &[("ifGenerationMatch", "0")]).await
    }

    async fn upload(
        &self,
        body: impl Into<reqwest::Body>,
        mime_type: &str,
        preconditions: &[(&str, &str)],
    ) -> Result<ObjectMetadata, StorageError> {
        let url = format!("{}/b/{}/o", self.storage.upload_url, self.bucket_name);

        let response = self
            .storage
            .client()
            .post(&url)
            .query(&[("uploadType", "media"), ("name", self.name.as_str())])
            .query(preconditions)
            .header(header::CONTENT_TYPE, mime_type)
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Upload failed").await);
        }

        tracing::debug!(bucket = %self.bucket_name, object = %self.name, "uploaded object");
        Ok(response.json().await?)
    }

    /// Deletes the file.
    pub async fn delete(&self) -> Result<(), StorageError> {
        let response = self.storage.client().delete(self.object_url()?).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Delete failed").await);
        }

        Ok(())
    }

    /// Gets the file's metadata.
    pub async fn get_metadata(&self) -> Result<ObjectMetadata, StorageError> {
        let response = self.storage.client().get(self.object_url()?).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Get metadata failed").await);
        }

        Ok(response.json().await?)
    }

    /// Patches the file's metadata, returning the updated metadata.
    pub async fn set_metadata(&self, metadata: &ObjectMetadata) -> Result<ObjectMetadata, StorageError> {
        let response = self
            .storage
            .client()
            .patch(self.object_url()?)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(metadata)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Set metadata failed").await);
        }

        Ok(response.json().await?)
    }

    /// Copies the file to `destination` in the same bucket, metadata included,
    /// returning the new object's metadata.
    pub async fn copy_to(&self, destination: &str) -> Result<ObjectMetadata, StorageError> {
        let url = object_path(
            &self.storage.base_url,
            &[
                "b",
                self.bucket_name.as_str(),
                "o",
                self.name.as_str(),
                "copyTo",
                "b",
                self.bucket_name.as_str(),
                "o",
                destination,
            ],
        )?;

        let response = self
            .storage
            .client()
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body("{}")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Copy failed").await);
        }

        tracing::debug!(bucket = %self.bucket_name, from = %self.name, to = destination, "copied object");
        Ok(response.json().await?)
    }

    /// The public Firebase download URL for this file, authorized by `token`.
    pub fn download_url(&self, token: &str) -> Result<String, StorageError> {
        let mut url = url::Url::parse(&object_path(
            &self.storage.download_url,
            &["b", self.bucket_name.as_str(), "o", self.name.as_str()],
        )?)?;
        url.query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("token", token);
        Ok(url.into())
    }
}
