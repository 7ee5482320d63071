//! Service-level error taxonomy and its HTTP mapping.

use crate::services::drive::GatewayError;
use crate::services::token_manager::TokenError;
use crate::snapshot::{ModuleError, ValidationError};
use service_core::error::AppError;

pub const RECONNECT_MESSAGE: &str = "Not connected to Google Drive. Please reconnect.";
pub const REFRESH_FAILED_MESSAGE: &str =
    "Session expired and could not be refreshed. Please reconnect.";

#[derive(Debug, thiserror::Error)]
pub enum BackupError {
    #[error("no usable credential")]
    Unauthenticated,

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error(transparent)]
    ValidationFailed(#[from] ValidationError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Module(#[from] ModuleError),

    #[error("failed to encode backup: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<TokenError> for BackupError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Unauthenticated => BackupError::Unauthenticated,
            TokenError::RefreshFailed(reason) => BackupError::RefreshFailed(reason),
        }
    }
}

impl From<BackupError> for AppError {
    fn from(err: BackupError) -> Self {
        match err {
            BackupError::Unauthenticated => AppError::Unauthorized(anyhow::anyhow!(RECONNECT_MESSAGE)),
            BackupError::RefreshFailed(_) => {
                AppError::Unauthorized(anyhow::anyhow!(REFRESH_FAILED_MESSAGE))
            }
            BackupError::ValidationFailed(e) => AppError::BadRequest(anyhow::anyhow!(e)),
            BackupError::Gateway(GatewayError::Unauthorized) => {
                AppError::Unauthorized(anyhow::anyhow!(RECONNECT_MESSAGE))
            }
            BackupError::Gateway(GatewayError::NotFound(id)) => {
                AppError::NotFound(anyhow::anyhow!("File not found on Google Drive: {}", id))
            }
            BackupError::Gateway(e @ GatewayError::TooLarge { .. }) => {
                AppError::PayloadTooLarge(anyhow::anyhow!(e))
            }
            BackupError::Gateway(e) => AppError::BadGateway(e.to_string()),
            BackupError::Module(ModuleError::Unknown(name)) => {
                AppError::NotFound(anyhow::anyhow!("Unknown module: {}", name))
            }
            BackupError::Module(e @ ModuleError::Rejected { .. }) => {
                AppError::BadRequest(anyhow::anyhow!(e))
            }
            BackupError::Module(e) => AppError::InternalError(anyhow::anyhow!(e)),
            BackupError::Encoding(e) => AppError::InternalError(anyhow::Error::new(e)),
        }
    }
}
