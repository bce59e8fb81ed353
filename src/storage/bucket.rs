use crate::storage::file::File;
use crate::storage::FirebaseStorage;

/// A reference to a Google Cloud Storage bucket.
#[derive(Clone)]
pub struct Bucket {
    storage: FirebaseStorage,
    name: String,
}

impl Bucket {
    pub(crate) fn new(storage: FirebaseStorage, name: String) -> Self {
        Self { storage, name }
    }

    /// Returns the name of the bucket.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Gets a `File` instance that refers to the file at the specified path.
    ///
    /// # Arguments
    ///
    /// * `name` - The path to the file within the bucket (e.g., "gifs/hello.gif").
    pub fn file(&self, name: &str) -> File {
        File::new(self.storage.clone(), self.name.clone(), name.to_string())
    }
}
