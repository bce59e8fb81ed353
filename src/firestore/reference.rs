use super::models::{ArrayValue, Document, ListDocumentsResponse, MapValue, Value, ValueType};
use super::snapshot::DocumentSnapshot;
use super::{api_error, FirestoreError};
use reqwest::header;
use reqwest_middleware::ClientWithMiddleware;
use serde::de::{DeserializeOwned, Error};
use serde::ser::Error as SerError;
use serde::Serialize;
use serde_json::map::Map;
use serde_json::Value as SerdeValue;
use std::collections::HashMap;

const LIST_PAGE_SIZE: &str = "300";

// Helper to convert Firestore's value map to a standard serde_json::Value
pub(crate) fn convert_fields_to_serde_value(
    fields: HashMap<String, Value>,
) -> Result<SerdeValue, FirestoreError> {
    let mut map = Map::new();
    for (key, value) in fields {
        map.insert(key, convert_value_to_serde_value(value)?);
    }
    Ok(SerdeValue::Object(map))
}

pub(crate) fn convert_value_to_serde_value(value: Value) -> Result<SerdeValue, FirestoreError> {
    use serde_json::json;
    Ok(match value.value_type {
        ValueType::StringValue(s) => SerdeValue::String(s),
        ValueType::IntegerValue(s) => {
            let i: i64 = s.parse().map_err(|e| {
                <serde_json::Error as Error>::custom(format!(
                    "Failed to parse integer string '{}': {}",
                    s, e
                ))
            })?;
            SerdeValue::Number(i.into())
        }
        ValueType::DoubleValue(d) => SerdeValue::Number(
            serde_json::Number::from_f64(d).ok_or_else(|| {
                <serde_json::Error as Error>::custom(format!("Invalid f64 value: {}", d))
            })?,
        ),
        ValueType::BooleanValue(b) => SerdeValue::Bool(b),
        ValueType::MapValue(map_value) => convert_fields_to_serde_value(map_value.fields)?,
        ValueType::ArrayValue(array_value) => {
            let values = array_value
                .values
                .into_iter()
                .map(convert_value_to_serde_value)
                .collect::<Result<Vec<_>, _>>()?;
            SerdeValue::Array(values)
        }
        ValueType::NullValue(_) => SerdeValue::Null,
        // RFC 3339 strings, which chrono deserializes directly.
        ValueType::TimestampValue(s) => SerdeValue::String(s),
        ValueType::GeoPointValue(gp) => {
            json!({ "latitude": gp.latitude, "longitude": gp.longitude })
        }
        ValueType::BytesValue(s) => SerdeValue::String(s),
        ValueType::ReferenceValue(s) => SerdeValue::String(s),
    })
}

// Helper to convert a serializable Rust struct to Firestore's value map
pub(crate) fn convert_serializable_to_fields<T: Serialize>(
    value: &T,
) -> Result<HashMap<String, Value>, FirestoreError> {
    let serde_value = serde_json::to_value(value)?;
    if let SerdeValue::Object(map) = serde_value {
        let mut fields = HashMap::new();
        for (k, v) in map {
            fields.insert(k, convert_serde_value_to_firestore_value(v)?);
        }
        Ok(fields)
    } else {
        Err(FirestoreError::SerializationError(SerError::custom(
            "Can only set objects as documents",
        )))
    }
}

pub(crate) fn convert_serde_value_to_firestore_value(value: SerdeValue) -> Result<Value, FirestoreError> {
    let value_type = match value {
        SerdeValue::Null => ValueType::NullValue(()),
        SerdeValue::Bool(b) => ValueType::BooleanValue(b),
        SerdeValue::Number(n) => {
            if let Some(i) = n.as_i64() {
                ValueType::IntegerValue(i.to_string())
            } else if let Some(f) = n.as_f64() {
                ValueType::DoubleValue(f)
            } else {
                return Err(FirestoreError::SerializationError(SerError::custom(format!(
                    "Unsupported number type: {}",
                    n
                ))));
            }
        }
        SerdeValue::String(s) => ValueType::StringValue(s),
        SerdeValue::Array(a) => {
            let values = a
                .into_iter()
                .map(convert_serde_value_to_firestore_value)
                .collect::<Result<Vec<_>, _>>()?;
            ValueType::ArrayValue(ArrayValue { values })
        }
        SerdeValue::Object(o) => {
            let mut fields = HashMap::new();
            for (k, v) in o {
                fields.insert(k, convert_serde_value_to_firestore_value(v)?);
            }
            ValueType::MapValue(MapValue { fields })
        }
    };
    Ok(Value { value_type })
}

/// Strips the API host from a document URL, leaving the resource name
/// (`projects/<p>/databases/(default)/documents/...`) the write APIs expect.
pub(crate) fn resource_name(url: &str) -> String {
    match url.find("projects/") {
        Some(idx) => url[idx..].to_string(),
        None => url.to_string(),
    }
}

/// Decodes a raw document into `T`.
pub(crate) fn decode_document<T: DeserializeOwned>(doc: &Document) -> Result<T, FirestoreError> {
    let serde_value = convert_fields_to_serde_value(doc.fields.clone())?;
    Ok(serde_json::from_value(serde_value)?)
}

#[derive(Clone, Debug)]
pub struct DocumentReference<'a> {
    pub(crate) client: &'a ClientWithMiddleware,
    pub(crate) path: String,
}

impl<'a> DocumentReference<'a> {
    /// The last segment of the document path.
    pub fn id(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or_default()
    }

    /// The resource name used by batched writes.
    pub fn resource_name(&self) -> String {
        resource_name(&self.path)
    }

    pub async fn get<T: DeserializeOwned>(&self) -> Result<Option<T>, FirestoreError> {
        let snapshot = self.get_snapshot().await?;
        snapshot.data()
    }

    pub async fn get_snapshot(&self) -> Result<DocumentSnapshot<'a>, FirestoreError> {
        let response = self.client.get(&self.path).send().await?;

        let document = if response.status() == reqwest::StatusCode::NOT_FOUND {
            None
        } else if !response.status().is_success() {
            return Err(api_error(response, "Get document failed").await);
        } else {
            Some(response.json::<Document>().await?)
        };

        Ok(DocumentSnapshot {
            id: self.id().to_string(),
            reference: self.clone(),
            document,
            read_time: None,
        })
    }

    /// Overwrites the document, creating it if needed.
    pub async fn set<T: Serialize>(&self, value: &T) -> Result<(), FirestoreError> {
        let fields = convert_serializable_to_fields(value)?;
        let body = serde_json::to_vec(&serde_json::json!({ "fields": fields }))?;

        let response = self
            .client
            .patch(&self.path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Set document failed").await);
        }

        Ok(())
    }

    /// Updates the fields present in `value` on an existing document.
    ///
    /// Fails with `FirestoreError::NotFound` if the document does not exist.
    pub async fn update<T: Serialize>(&self, value: &T) -> Result<(), FirestoreError> {
        let fields = convert_serializable_to_fields(value)?;

        let mut query: Vec<(&str, String)> = fields
            .keys()
            .map(|field| ("updateMask.fieldPaths", field.clone()))
            .collect();
        query.push(("currentDocument.exists", "true".to_string()));

        let body = serde_json::to_vec(&serde_json::json!({ "fields": fields }))?;

        let response = self
            .client
            .patch(&self.path)
            .query(&query)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Update document failed").await);
        }

        Ok(())
    }

    pub async fn delete(&self) -> Result<(), FirestoreError> {
        let response = self.client.delete(&self.path).send().await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Delete document failed").await);
        }

        Ok(())
    }
}

#[derive(Clone, Debug)]
pub struct CollectionReference<'a> {
    pub(crate) client: &'a ClientWithMiddleware,
    pub(crate) path: String,
}

impl<'a> CollectionReference<'a> {
    pub fn doc(&self, document_id: &str) -> DocumentReference<'a> {
        DocumentReference {
            client: self.client,
            path: format!("{}/{}", self.path, document_id),
        }
    }

    /// Lists every document in the collection, following page tokens.
    pub async fn list_documents(&self) -> Result<Vec<DocumentSnapshot<'a>>, FirestoreError> {
        let mut snapshots = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut query = vec![("pageSize", LIST_PAGE_SIZE.to_string())];
            if let Some(token) = page_token.take() {
                query.push(("pageToken", token));
            }

            let response = self.client.get(&self.path).query(&query).send().await?;

            if !response.status().is_success() {
                return Err(api_error(response, "List documents failed").await);
            }

            let page: ListDocumentsResponse = response.json().await?;
            for doc in page.documents {
                snapshots.push(self.snapshot_of(doc));
            }

            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        Ok(snapshots)
    }

    /// Lists and decodes every document, paired with its id.
    pub async fn get_all<T: DeserializeOwned>(&self) -> Result<Vec<(String, T)>, FirestoreError> {
        let mut out = Vec::new();
        for snapshot in self.list_documents().await? {
            if let Some(data) = snapshot.data()? {
                out.push((snapshot.id, data));
            }
        }
        Ok(out)
    }

    /// Adds a document with an auto-generated id.
    pub async fn add<T: Serialize>(&self, value: &T) -> Result<DocumentReference<'a>, FirestoreError> {
        let fields = convert_serializable_to_fields(value)?;
        let body = serde_json::to_vec(&serde_json::json!({ "fields": fields }))?;

        let response = self
            .client
            .post(&self.path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Add document failed").await);
        }

        let doc: Document = response.json().await?;
        let id = doc.name.rsplit('/').next().unwrap_or_default();
        Ok(self.doc(id))
    }

    /// Creates the document `document_id`.
    ///
    /// Fails with `FirestoreError::AlreadyExists` if it is already present.
    pub async fn create<T: Serialize>(
        &self,
        document_id: &str,
        value: &T,
    ) -> Result<DocumentReference<'a>, FirestoreError> {
        let fields = convert_serializable_to_fields(value)?;
        let body = serde_json::to_vec(&serde_json::json!({ "fields": fields }))?;

        let response = self
            .client
            .post(&self.path)
            .query(&[("documentId", document_id)])
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response, "Create document failed").await);
        }

        Ok(self.doc(document_id))
    }

    fn snapshot_of(&self, doc: Document) -> DocumentSnapshot<'a> {
        let id = doc.name.rsplit('/').next().unwrap_or_default().to_string();
        DocumentSnapshot {
            reference: self.doc(&id),
            id,
            document: Some(doc),
            read_time: None,
        }
    }
}
