//! Maintenance mode switch read by the apps.

use super::models::{MaintenanceSettings, MAINTENANCE_DOC};
use super::Console;
use crate::error::Result;
use chrono::Utc;

pub struct Maintenance<'a> {
    console: &'a Console,
}

impl<'a> Maintenance<'a> {
    pub(crate) fn new(console: &'a Console) -> Self {
        Self { console }
    }

    /// Current settings. A missing document means maintenance is off.
    pub async fn status(&self) -> Result<MaintenanceSettings> {
        let settings = self
            .console
            .firestore
            .doc(MAINTENANCE_DOC)
            .get::<MaintenanceSettings>()
            .await?;
        Ok(settings.unwrap_or_default())
    }

    pub async fn set(&self, caller_id: &str, enabled: bool, message: Option<&str>) -> Result<MaintenanceSettings> {
        let settings = MaintenanceSettings {
            enabled,
            message: message
                .map(str::trim)
                .filter(|m| !m.is_empty())
                .map(str::to_string),
            updated_at: Some(Utc::now()),
            updated_by: Some(caller_id.to_string()),
        };

        self.console.firestore.doc(MAINTENANCE_DOC).set(&settings).await?;
        tracing::info!(caller_id, enabled, "maintenance mode updated");

        Ok(settings)
    }
}
