use super::models::Document;
use super::reference::{convert_value_to_serde_value, decode_document, DocumentReference};
use super::FirestoreError;
use serde::de::DeserializeOwned;

/// A snapshot of a document in Firestore.
///
/// It contains data read from a document in your Firestore database.
/// The data can be extracted with `.data()`.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot<'a> {
    pub(crate) id: String,
    pub(crate) reference: DocumentReference<'a>,
    pub(crate) document: Option<Document>,
    pub(crate) read_time: Option<String>,
}

impl<'a> DocumentSnapshot<'a> {
    /// The ID of the document.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The `DocumentReference` for the document.
    pub fn reference(&self) -> &DocumentReference<'a> {
        &self.reference
    }

    /// Returns `true` if the document exists.
    pub fn exists(&self) -> bool {
        self.document.is_some()
    }

    /// The time the document was last updated. Returns `None` if the document does not exist.
    pub fn update_time(&self) -> Option<&str> {
        self.document.as_ref().map(|d| d.update_time.as_str())
    }

    /// The time this snapshot was read.
    pub fn read_time(&self) -> Option<&str> {
        self.read_time.as_deref()
    }

    /// Retrieves all fields in the document as a specific type.
    ///
    /// Returns `Ok(None)` if the document does not exist.
    pub fn data<T: DeserializeOwned>(&self) -> Result<Option<T>, FirestoreError> {
        self.document.as_ref().map(decode_document::<T>).transpose()
    }

    /// Retrieves a top-level field from the document.
    pub fn get_field<T: DeserializeOwned>(&self, field: &str) -> Result<Option<T>, FirestoreError> {
        match self.document.as_ref().and_then(|doc| doc.fields.get(field)) {
            Some(value) => {
                let serde_value = convert_value_to_serde_value(value.clone())?;
                Ok(Some(serde_json::from_value(serde_value)?))
            }
            None => Ok(None),
        }
    }
}

/// A `QuerySnapshot` contains zero or more `DocumentSnapshot` objects.
#[derive(Debug, Clone)]
pub struct QuerySnapshot<'a> {
    pub(crate) documents: Vec<DocumentSnapshot<'a>>,
    pub(crate) read_time: Option<String>,
}

impl<'a> QuerySnapshot<'a> {
    /// The documents in this snapshot.
    pub fn documents(&self) -> &[DocumentSnapshot<'a>] {
        &self.documents
    }

    /// Returns `true` if there are no documents in the snapshot.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// The number of documents in the snapshot.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// The time this snapshot was read.
    pub fn read_time(&self) -> Option<&str> {
        self.read_time.as_deref()
    }

    /// Iterates over the document snapshots.
    pub fn iter(&self) -> std::slice::Iter<'_, DocumentSnapshot<'a>> {
        self.documents.iter()
    }

    /// Decodes every document, paired with its id.
    pub fn decode_all<T: DeserializeOwned>(&self) -> Result<Vec<(String, T)>, FirestoreError> {
        let mut out = Vec::with_capacity(self.documents.len());
        for snapshot in &self.documents {
            if let Some(data) = snapshot.data()? {
                out.push((snapshot.id.clone(), data));
            }
        }
        Ok(out)
    }
}

impl<'s, 'a> IntoIterator for &'s QuerySnapshot<'a> {
    type Item = &'s DocumentSnapshot<'a>;
    type IntoIter = std::slice::Iter<'s, DocumentSnapshot<'a>>;

    fn into_iter(self) -> Self::IntoIter {
        self.documents.iter()
    }
}
