use crate::models::ModuleListResponse;
use crate::services::BackupError;
use crate::snapshot::ModuleError;
use crate::AppState;
use axum::extract::{Path, State};
use axum::Json;
use serde_json::Value;
use service_core::error::AppError;

/// `GET /api/modules`
pub async fn list_modules(State(state): State<AppState>) -> Json<ModuleListResponse> {
    Json(ModuleListResponse {
        modules: state.modules.names().into_iter().map(str::to_string).collect(),
    })
}

/// `GET /api/modules/{name}`
pub async fn get_module(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Value>, AppError> {
    let module = state
        .modules
        .get(&name)
        .ok_or_else(|| BackupError::from(ModuleError::Unknown(name.clone())))?;
    let value = module.export_state().map_err(BackupError::from)?;
    Ok(Json(value))
}

/// `PUT /api/modules/{name}`: replace one module's whole state.
pub async fn put_module(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(value): Json<Value>,
) -> Result<Json<Value>, AppError> {
    let module = state
        .modules
        .get(&name)
        .ok_or_else(|| BackupError::from(ModuleError::Unknown(name.clone())))?;

    if !value.is_object() {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Module state must be a JSON object"
        )));
    }

    module.replace_state(value).map_err(BackupError::from)?;
    tracing::info!(module = %name, "Module state replaced");
    Ok(Json(module.export_state().map_err(BackupError::from)?))
}
