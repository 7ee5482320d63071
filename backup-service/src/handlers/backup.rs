//! Local-file export and import against the server-side module registry.

use super::{record_outcome, reject};
use crate::models::{RestoreResponse, TransferStatus};
use crate::services::BackupError;
use crate::snapshot::{apply, codec};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use service_core::error::AppError;

/// `GET /api/backup/export`: the current state as a downloadable file.
pub async fn export(State(state): State<AppState>) -> Result<Response, AppError> {
    let now = Utc::now();
    let snapshot = codec::collect(&state.modules, now);
    let result = codec::to_bytes(&snapshot).map_err(BackupError::from);
    record_outcome("local_export", &result);
    let bytes = result?;

    state.transfers.record_export(now);
    let file_name = codec::export_file_name(&state.config.backup.export_base_name, now);
    tracing::info!(file_name = %file_name, modules = snapshot.modules().len(), "Backup exported");

    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        bytes,
    )
        .into_response())
}

/// `POST /api/backup/import`: validate an uploaded file, then apply it.
pub async fn import(State(state): State<AppState>, body: Bytes) -> Response {
    let snapshot = match codec::parse(&body) {
        Ok(snapshot) => snapshot,
        Err(e) => return reject("local_import", e),
    };

    let report = apply(&snapshot, &state.modules);
    state
        .transfers
        .record_import(Utc::now(), snapshot.created_at());
    record_outcome::<()>("local_import", &Ok(()));

    tracing::info!(
        version = %snapshot.schema_version(),
        applied = report.applied_modules.len(),
        partial = report.is_partial(),
        "Backup imported from file"
    );
    Json(RestoreResponse::new(&snapshot, report)).into_response()
}

/// `GET /api/backup/status`
pub async fn status(State(state): State<AppState>) -> Json<TransferStatus> {
    Json(state.transfers.status())
}
