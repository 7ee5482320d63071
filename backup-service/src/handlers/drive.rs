//! Remote backups on Google Drive and study materials stored there.

use super::{reject, with_live_client};
use crate::models::{
    FileIdQuery, FileListResponse, FolderQuery, LoadResponse, MaterialContentResponse,
    RestoreResponse, SaveResponse,
};
use crate::services::drive::MARKDOWN_MIME;
use crate::services::{AuthorizedClient, BackupError};
use crate::snapshot::{apply, codec, Snapshot};
use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use axum_extra::extract::cookie::PrivateCookieJar;
use chrono::Utc;
use service_core::error::AppError;
use validator::Validate;

/// `POST /api/drive/save`: upload a client-supplied snapshot after
/// validating it.
pub async fn save(State(state): State<AppState>, jar: PrivateCookieJar, body: Bytes) -> Response {
    let snapshot = match codec::parse(&body) {
        Ok(snapshot) => snapshot,
        Err(e) => return reject("drive_save", e),
    };

    let state = &state;
    with_live_client(state, jar, "drive_save", |client| async move {
        upload_snapshot(state, &client, &snapshot).await
    })
    .await
}

/// `POST /api/drive/backup`: snapshot the registered modules and upload.
pub async fn backup(State(state): State<AppState>, jar: PrivateCookieJar) -> Response {
    let state = &state;
    with_live_client(state, jar, "drive_backup", |client| async move {
        let snapshot = codec::collect(&state.modules, Utc::now());
        if snapshot.modules().is_empty() {
            return Err(BackupError::from(codec::ValidationError::EmptyModules));
        }
        let saved = upload_snapshot(state, &client, &snapshot).await?;
        state.transfers.record_export(Utc::now());
        Ok::<_, BackupError>(saved)
    })
    .await
}

/// `GET /api/drive/list`
pub async fn list(State(state): State<AppState>, jar: PrivateCookieJar) -> Response {
    let state = &state;
    with_live_client(state, jar, "drive_list", |client| async move {
        let files = state.gateway.list(&client).await?;
        Ok::<_, BackupError>(Json(FileListResponse {
            success: true,
            files,
        }))
    })
    .await
}

/// `GET /api/drive/load?fileId=`: download and validate, without applying.
pub async fn load(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(query): Query<FileIdQuery>,
) -> Result<Response, AppError> {
    query.validate()?;

    let state = &state;
    Ok(with_live_client(state, jar, "drive_load", |client| async move {
        let snapshot = download_snapshot(state, &client, &query.file_id).await?;
        Ok::<_, BackupError>(Json(LoadResponse {
            success: true,
            data: snapshot,
        }))
    })
    .await)
}

/// `POST /api/drive/restore?fileId=`: download, validate, then apply.
pub async fn restore(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(query): Query<FileIdQuery>,
) -> Result<Response, AppError> {
    query.validate()?;

    let state = &state;
    Ok(with_live_client(state, jar, "drive_restore", |client| async move {
        let snapshot = download_snapshot(state, &client, &query.file_id).await?;
        let report = apply(&snapshot, &state.modules);
        state
            .transfers
            .record_import(Utc::now(), snapshot.created_at());

        tracing::info!(
            file_id = %query.file_id,
            applied = report.applied_modules.len(),
            partial = report.is_partial(),
            "Backup restored from Google Drive"
        );
        Ok::<_, BackupError>(Json(RestoreResponse::new(&snapshot, report)))
    })
    .await)
}

/// `GET /api/drive/materials?folderId=`
pub async fn list_materials(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(query): Query<FolderQuery>,
) -> Result<Response, AppError> {
    query.validate()?;

    let state = &state;
    Ok(with_live_client(state, jar, "materials_list", |client| async move {
        let files = state
            .gateway
            .list_folder(&client, &query.folder_id, MARKDOWN_MIME)
            .await?;
        Ok::<_, BackupError>(Json(FileListResponse {
            success: true,
            files,
        }))
    })
    .await)
}

/// `GET /api/drive/materials/{fileId}`
pub async fn material_content(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Path(file_id): Path<String>,
) -> Response {
    let state = &state;
    with_live_client(state, jar, "materials_load", |client| async move {
        let bytes = state.gateway.download(&client, &file_id).await?;
        Ok::<_, BackupError>(Json(MaterialContentResponse {
            success: true,
            content: String::from_utf8_lossy(&bytes).into_owned(),
        }))
    })
    .await
}

async fn upload_snapshot(
    state: &AppState,
    client: &AuthorizedClient,
    snapshot: &Snapshot,
) -> Result<Json<SaveResponse>, BackupError> {
    let bytes = codec::to_bytes(snapshot)?;
    let name = codec::remote_file_name(&state.config.backup.remote_file_prefix, Utc::now());
    let file = state.gateway.upload(client, &name, bytes).await?;

    Ok(Json(SaveResponse {
        success: true,
        file_id: file.id,
        file_name: file.name,
    }))
}

async fn download_snapshot(
    state: &AppState,
    client: &AuthorizedClient,
    file_id: &str,
) -> Result<Snapshot, BackupError> {
    let bytes = state.gateway.download(client, file_id).await?;
    let snapshot = codec::parse(&bytes)?;
    tracing::info!(
        file_id = %file_id,
        version = %snapshot.schema_version(),
        modules = snapshot.modules().len(),
        "Backup downloaded and validated"
    );
    Ok(snapshot)
}
