use crate::services::drive::RemoteFileRef;
use crate::snapshot::{ApplyReport, Snapshot};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FileIdQuery {
    #[validate(length(min = 1, max = 256, message = "fileId is required"))]
    pub file_id: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct FolderQuery {
    #[validate(length(min = 1, max = 256, message = "folderId is required"))]
    pub folder_id: String,
}

/// Query parameters the provider sends back to the OAuth callback.
#[derive(Debug, Default, Deserialize)]
pub struct OAuthCallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatusResponse {
    pub is_authenticated: bool,
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub success: bool,
    pub file_id: String,
    pub file_name: String,
}

#[derive(Debug, Serialize)]
pub struct FileListResponse {
    pub success: bool,
    pub files: Vec<RemoteFileRef>,
}

#[derive(Debug, Serialize)]
pub struct LoadResponse {
    pub success: bool,
    pub data: Snapshot,
}

/// Result of applying a backup. `partial` is set when some module with
/// data in the backup could not be restored.
#[derive(Debug, Serialize)]
pub struct RestoreResponse {
    pub success: bool,
    pub partial: bool,
    pub version: String,
    pub timestamp: String,
    pub report: ApplyReport,
}

impl RestoreResponse {
    pub fn new(snapshot: &Snapshot, report: ApplyReport) -> Self {
        Self {
            success: true,
            partial: report.is_partial(),
            version: snapshot.schema_version().to_string(),
            timestamp: snapshot.created_at().to_string(),
            report,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MaterialContentResponse {
    pub success: bool,
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct ModuleListResponse {
    pub modules: Vec<String>,
}
