//! Keyword → GIF dataset management.
//!
//! Each entry lives in `datasets/<keyword>` and points at the blob
//! `gifs/<keyword>.gif` through a Firebase download URL.

use super::models::{DatasetEntry, DATASETS};
use super::Console;
use crate::error::{AdminError, ErrorKind, Result};
use crate::storage::file::{ObjectMetadata, DOWNLOAD_TOKENS_KEY};
use crate::storage::StorageError;
use chrono::Utc;
use std::collections::HashMap;
use uuid::Uuid;

const GIF_MIME: &str = "image/gif";
const MAX_KEYWORD_LEN: usize = 100;

/// Trims, lowercases and collapses inner whitespace to single spaces.
pub fn normalize_keyword(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalizes `raw` and checks it can serve as a document id.
pub fn validate_keyword(raw: &str) -> Result<String> {
    let keyword = normalize_keyword(raw);

    let problem = if keyword.is_empty() {
        Some("Keyword is required.".to_string())
    } else if keyword.chars().count() > MAX_KEYWORD_LEN {
        Some(format!("Keyword must be at most {} characters.", MAX_KEYWORD_LEN))
    } else if keyword.contains(['/', '?', '#', '%'])
        || keyword == "."
        || keyword == ".."
        || keyword.starts_with("__")
    {
        Some(format!("'{}' cannot be used as a keyword.", keyword))
    } else {
        None
    };

    match problem {
        Some(message) => Err(AdminError::InvalidArgument(message)),
        None => Ok(keyword),
    }
}

pub fn storage_path(keyword: &str) -> String {
    format!("gifs/{}.gif", keyword)
}

fn dataset_path(keyword: &str) -> String {
    format!("{}/{}", DATASETS, keyword)
}

fn check_gif(bytes: &[u8]) -> Result<()> {
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        Ok(())
    } else {
        Err(AdminError::InvalidArgument("The file must be a GIF image.".to_string()))
    }
}

fn token_metadata(token: &str) -> ObjectMetadata {
    ObjectMetadata {
        metadata: Some(HashMap::from([(DOWNLOAD_TOKENS_KEY.to_string(), token.to_string())])),
        ..Default::default()
    }
}

fn not_found(keyword: &str) -> AdminError {
    AdminError::NotFound(format!("No dataset entry for '{}'.", keyword))
}

pub struct Datasets<'a> {
    console: &'a Console,
}

impl<'a> Datasets<'a> {
    pub(crate) fn new(console: &'a Console) -> Self {
        Self { console }
    }

    /// All entries, sorted by keyword.
    pub async fn list(&self) -> Result<Vec<DatasetEntry>> {
        let mut entries: Vec<DatasetEntry> = self
            .console
            .firestore
            .collection(DATASETS)
            .get_all::<DatasetEntry>()
            .await?
            .into_iter()
            .map(|(_, entry)| entry)
            .collect();
        entries.sort_by(|a, b| a.keyword.cmp(&b.keyword));
        Ok(entries)
    }

    /// Entries whose keyword contains the normalized `term`.
    pub async fn search(&self, term: &str) -> Result<Vec<DatasetEntry>> {
        let term = normalize_keyword(term);
        let mut entries = self.list().await?;
        entries.retain(|entry| entry.keyword.contains(&term));
        Ok(entries)
    }

    pub async fn get(&self, keyword: &str) -> Result<DatasetEntry> {
        let keyword = validate_keyword(keyword)?;
        self.console
            .firestore
            .collection(DATASETS)
            .doc(&keyword)
            .get::<DatasetEntry>()
            .await?
            .ok_or_else(|| not_found(&keyword))
    }

    /// Uploads the GIF for a new keyword and records the entry.
    pub async fn add(&self, keyword: &str, gif: &[u8]) -> Result<DatasetEntry> {
        let keyword = validate_keyword(keyword)?;
        check_gif(gif)?;

        let datasets = self.console.firestore.collection(DATASETS);
        if datasets.doc(&keyword).get_snapshot().await?.exists() {
            return Err(already_exists(&keyword));
        }

        let path = storage_path(&keyword);
        let written = async {
            // The upload only succeeds if no GIF sits at the path yet, so a
            // concurrent add of the same keyword cannot overwrite the other's.
            let gif_url = self.upload(&path, gif, true).await?;
            let entry = DatasetEntry {
                keyword: keyword.clone(),
                gif_url,
                storage_path: path.clone(),
                updated_at: Some(Utc::now()),
            };
            datasets.create(&keyword, &entry).await?;
            Ok::<_, AdminError>(entry)
        }
        .await;

        match written {
            Ok(entry) => {
                tracing::info!(keyword = %keyword, "added dataset entry");
                Ok(entry)
            }
            // The blob at the path belongs to the entry that won.
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                tracing::warn!(keyword = %keyword, error = %e, "dataset entry was added concurrently");
                Err(already_exists(&keyword))
            }
            Err(e) => {
                tracing::warn!(keyword = %keyword, error = %e, "adding dataset entry failed, removing blob");
                self.remove_blob(&path).await;
                Err(e)
            }
        }
    }

    /// Uploads a new GIF for an existing keyword under a fresh download token.
    pub async fn replace_gif(&self, keyword: &str, gif: &[u8]) -> Result<DatasetEntry> {
        check_gif(gif)?;
        let mut entry = self.get(keyword).await?;
        if entry.storage_path.is_empty() {
            entry.storage_path = storage_path(&entry.keyword);
        }

        entry.gif_url = self.upload(&entry.storage_path, gif, false).await?;
        entry.updated_at = Some(Utc::now());

        self.console
            .firestore
            .collection(DATASETS)
            .doc(&entry.keyword)
            .update(&serde_json::json!({
                "gifUrl": entry.gif_url,
                "storagePath": entry.storage_path,
                "updatedAt": entry.updated_at,
            }))
            .await?;
        tracing::info!(keyword = %entry.keyword, "replaced dataset GIF");

        Ok(entry)
    }

    /// Moves an entry and its GIF to a new keyword.
    ///
    /// The blob is copied first and the document swap is a single batch, so
    /// a failure at any step leaves the old entry intact. The old blob is
    /// deleted only after the batch committed.
    pub async fn rename(&self, old_keyword: &str, new_keyword: &str) -> Result<DatasetEntry> {
        let old_keyword = validate_keyword(old_keyword)?;
        let new_keyword = validate_keyword(new_keyword)?;

        let entry = self.get(&old_keyword).await?;
        if old_keyword == new_keyword {
            return Ok(entry);
        }

        let firestore = &self.console.firestore;
        if firestore.collection(DATASETS).doc(&new_keyword).get_snapshot().await?.exists() {
            return Err(already_exists(&new_keyword));
        }

        let old_path = if entry.storage_path.is_empty() {
            storage_path(&old_keyword)
        } else {
            entry.storage_path.clone()
        };
        let new_path = storage_path(&new_keyword);

        let bucket = self.console.storage.bucket(None);
        let copied = bucket.file(&old_path).copy_to(&new_path).await?;

        let moved = async {
            let new_file = bucket.file(&new_path);
            let token = match copied.download_token() {
                Some(token) => token.to_string(),
                None => {
                    let token = Uuid::new_v4().to_string();
                    new_file.set_metadata(&token_metadata(&token)).await?;
                    token
                }
            };

            let renamed = DatasetEntry {
                keyword: new_keyword.clone(),
                gif_url: new_file.download_url(&token)?,
                storage_path: new_path.clone(),
                updated_at: Some(Utc::now()),
            };

            let mut batch = firestore.batch();
            batch.create(&dataset_path(&new_keyword), &renamed)?;
            batch.delete(&dataset_path(&old_keyword));
            batch.commit().await?;
            Ok::<_, AdminError>(renamed)
        }
        .await;

        let renamed = match moved {
            Ok(renamed) => renamed,
            Err(e) => {
                tracing::warn!(from = %old_keyword, to = %new_keyword, error = %e, "rename failed, removing copied blob");
                self.remove_blob(&new_path).await;
                return Err(e);
            }
        };

        if let Err(e) = bucket.file(&old_path).delete().await {
            tracing::warn!(path = %old_path, error = %e, "failed to delete old GIF after rename");
        }
        tracing::info!(from = %old_keyword, to = %new_keyword, "renamed dataset entry");

        Ok(renamed)
    }

    /// Deletes the entry, then its GIF. A GIF that is already gone is fine.
    pub async fn delete(&self, keyword: &str) -> Result<()> {
        let entry = self.get(keyword).await?;
        let path = if entry.storage_path.is_empty() {
            storage_path(&entry.keyword)
        } else {
            entry.storage_path
        };

        self.console
            .firestore
            .collection(DATASETS)
            .doc(&entry.keyword)
            .delete()
            .await?;

        match self.console.storage.bucket(None).file(&path).delete().await {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(e) => return Err(e.into()),
        }
        tracing::info!(keyword = %entry.keyword, "deleted dataset entry");

        Ok(())
    }

    // Uploads the GIF, attaches a fresh download token and returns the
    // download URL. With `only_new` an existing object is left alone.
    async fn upload(&self, path: &str, gif: &[u8], only_new: bool) -> Result<String> {
        let file = self.console.storage.bucket(None).file(path);
        if only_new {
            file.save_new(gif.to_vec(), GIF_MIME).await?;
        } else {
            file.save(gif.to_vec(), GIF_MIME).await?;
        }

        let token = Uuid::new_v4().to_string();
        file.set_metadata(&token_metadata(&token)).await?;

        Ok(file.download_url(&token)?)
    }

    async fn remove_blob(&self, path: &str) {
        match self.console.storage.bucket(None).file(path).delete().await {
            Ok(()) | Err(StorageError::NotFound(_)) => {}
            Err(e) => tracing::error!(path, error = %e, "failed to remove orphaned GIF"),
        }
    }
}

fn already_exists(keyword: &str) -> AdminError {
    AdminError::AlreadyExists(format!("A dataset entry for '{}' already exists.", keyword))
}
