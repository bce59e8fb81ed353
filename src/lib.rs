//! Administrative backend for SignTalk.
//!
//! The crate is split in two layers. The Firebase clients ([`auth`],
//! [`firestore`], [`storage`]) speak the REST APIs of the managed services
//! with a service account; the [`console`] builds the admin operations on
//! top of them, and [`server`] exposes those over HTTP.
//!
//! ```rust,ignore
//! let key = yup_oauth2::read_service_account_key("service-account.json").await?;
//! let app = SignTalkApp::new(key, "web-api-key", None);
//! let session = app.console().accounts().login("admin@example.com", "secret").await?;
//! ```

pub mod auth;
pub mod config;
pub mod console;
pub mod core;
pub mod error;
pub mod firestore;
pub mod server;
pub mod storage;

use auth::FirebaseAuth;
use console::Console;
use crate::core::middleware::AuthMiddleware;
use firestore::FirebaseFirestore;
use storage::FirebaseStorage;
use yup_oauth2::ServiceAccountKey;

/// Entry point holding the service-account credentials shared by every client.
pub struct SignTalkApp {
    middleware: AuthMiddleware,
    api_key: String,
    storage_bucket: Option<String>,
}

impl SignTalkApp {
    pub fn new(
        service_account_key: ServiceAccountKey,
        api_key: impl Into<String>,
        storage_bucket: Option<String>,
    ) -> Self {
        Self {
            middleware: AuthMiddleware::new(service_account_key),
            api_key: api_key.into(),
            storage_bucket,
        }
    }

    pub fn project_id(&self) -> Option<&str> {
        self.middleware.project_id()
    }

    pub fn auth(&self) -> FirebaseAuth {
        FirebaseAuth::new(self.middleware.clone(), Some(self.api_key.clone()))
    }

    pub fn firestore(&self) -> FirebaseFirestore {
        FirebaseFirestore::new(self.middleware.clone())
    }

    pub fn storage(&self) -> FirebaseStorage {
        FirebaseStorage::new(self.middleware.clone(), self.storage_bucket.clone())
    }

    pub fn console(&self) -> Console {
        Console::new(self.auth(), self.firestore(), self.storage())
    }
}
