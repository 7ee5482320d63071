//! Record of the most recent export and import.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{PoisonError, RwLock};

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStatus {
    pub last_export_at: Option<DateTime<Utc>>,
    pub last_import_at: Option<DateTime<Utc>>,
    /// `timestamp` of the snapshot that was last imported.
    pub imported_snapshot_timestamp: Option<String>,
}

#[derive(Debug, Default)]
pub struct TransferLog {
    status: RwLock<TransferStatus>,
}

impl TransferLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_export(&self, at: DateTime<Utc>) {
        self.status
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .last_export_at = Some(at);
    }

    pub fn record_import(&self, at: DateTime<Utc>, snapshot_timestamp: &str) {
        let mut status = self.status.write().unwrap_or_else(PoisonError::into_inner);
        status.last_import_at = Some(at);
        status.imported_snapshot_timestamp = Some(snapshot_timestamp.to_string());
    }

    pub fn status(&self) -> TransferStatus {
        self.status
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
