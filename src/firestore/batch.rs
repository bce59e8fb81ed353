use super::models::{
    CommitRequest, CommitResponse, Document, DocumentMask, Precondition, Write, WriteOperation,
    WriteResult,
};
use super::reference::{convert_serializable_to_fields, resource_name};
use super::{api_error, FirestoreError};
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::Serialize;

/// Represents a Firestore Write Batch.
///
/// Every write added to the batch is applied atomically on `commit()`: either
/// all of them land or none do. Preconditions (such as `create` requiring the
/// document to be absent) are checked as part of the commit.
///
/// # Examples
///
/// ```rust,no_run
/// # use signtalk_admin::firestore::FirebaseFirestore;
/// # use serde_json::json;
/// # async fn run(firestore: FirebaseFirestore) -> Result<(), Box<dyn std::error::Error>> {
/// let mut batch = firestore.batch();
/// batch.create("datasets/hello", &json!({ "keyword": "hello" }))?;
/// batch.delete("datasets/hi");
/// batch.commit().await?;
/// # Ok(())
/// # }
/// ```
pub struct WriteBatch<'a> {
    client: &'a ClientWithMiddleware,
    base_url: String,
    writes: Vec<Write>,
}

impl<'a> WriteBatch<'a> {
    pub(crate) fn new(client: &'a ClientWithMiddleware, base_url: String) -> Self {
        Self {
            client,
            base_url,
            writes: Vec::new(),
        }
    }

    /// Overwrites the document referred to by `document_path`, creating it if needed.
    pub fn set<T: Serialize>(&mut self, document_path: &str, value: &T) -> Result<&mut Self, FirestoreError> {
        let document = self.document(document_path, value)?;
        self.writes.push(Write {
            operation: WriteOperation::Update(document),
            update_mask: None,
            current_document: None,
        });
        Ok(self)
    }

    /// Updates the fields present in `value`. The document must exist.
    pub fn update<T: Serialize>(&mut self, document_path: &str, value: &T) -> Result<&mut Self, FirestoreError> {
        let document = self.document(document_path, value)?;
        let field_paths = document.fields.keys().cloned().collect();

        self.writes.push(Write {
            operation: WriteOperation::Update(document),
            update_mask: Some(DocumentMask { field_paths }),
            current_document: Some(Precondition { exists: Some(true) }),
        });
        Ok(self)
    }

    /// Creates the document. The commit fails if it already exists.
    pub fn create<T: Serialize>(&mut self, document_path: &str, value: &T) -> Result<&mut Self, FirestoreError> {
        let document = self.document(document_path, value)?;
        self.writes.push(Write {
            operation: WriteOperation::Update(document),
            update_mask: None,
            current_document: Some(Precondition { exists: Some(false) }),
        });
        Ok(self)
    }

    /// Deletes the document referred to by `document_path`.
    pub fn delete(&mut self, document_path: &str) -> &mut Self {
        let name = self.resource_name(document_path);
        self.writes.push(Write {
            operation: WriteOperation::Delete(name),
            update_mask: None,
            current_document: None,
        });
        self
    }

    /// The number of buffered writes.
    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    fn document<T: Serialize>(&self, document_path: &str, value: &T) -> Result<Document, FirestoreError> {
        Ok(Document {
            name: self.resource_name(document_path),
            fields: convert_serializable_to_fields(value)?,
            ..Default::default()
        })
    }

    fn resource_name(&self, document_path: &str) -> String {
        resource_name(&format!("{}/{}", self.base_url, document_path))
    }

    /// Commits the batch of writes.
    pub async fn commit(self) -> Result<Vec<WriteResult>, FirestoreError> {
        if self.writes.is_empty() {
            return Ok(Vec::new());
        }

        let url = format!("{}:commit", self.base_url);
        let write_count = self.writes.len();

        let request = CommitRequest {
            writes: self.writes,
        };

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .body(serde_json::to_vec(&request)?)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Commit batch failed").await);
        }

        let result: CommitResponse = response.json().await?;
        tracing::debug!(writes = write_count, "committed write batch");
        Ok(result.write_results)
    }
}
