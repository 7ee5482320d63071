//! Google Drive v3 gateway.
//!
//! Lists, uploads and downloads backup blobs as named JSON files. Every call
//! is made with a live [`AuthorizedClient`] from the token manager; this
//! module never refreshes tokens itself.

use crate::services::token_manager::AuthorizedClient;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub const JSON_MIME: &str = "application/json";
pub const MARKDOWN_MIME: &str = "text/markdown";

const LIST_PAGE_SIZE: &str = "50";
const FILE_FIELDS: &str = "id,name,createdTime,modifiedTime";

/// File metadata as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFileRef {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("storage provider rejected the credentials")]
    Unauthorized,

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("storage provider error ({status}): {message}")]
    Provider { status: u16, message: String },

    #[error("downloaded file exceeds the {limit} byte limit")]
    TooLarge { limit: usize },

    #[error("downloaded file is empty")]
    EmptyBody,

    #[error("storage provider unreachable: {0}")]
    Transport(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        GatewayError::Transport(e.to_string())
    }
}

/// Remote blob storage used for backups and study materials.
#[async_trait]
pub trait BackupGateway: Send + Sync {
    /// Backup files, newest first.
    async fn list(&self, client: &AuthorizedClient) -> Result<Vec<RemoteFileRef>, GatewayError>;

    async fn upload(
        &self,
        client: &AuthorizedClient,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFileRef, GatewayError>;

    /// Full file content, bounded by the configured ceiling.
    async fn download(
        &self,
        client: &AuthorizedClient,
        file_id: &str,
    ) -> Result<Vec<u8>, GatewayError>;

    /// Files of the given MIME type directly inside a folder.
    async fn list_folder(
        &self,
        client: &AuthorizedClient,
        folder_id: &str,
        mime_type: &str,
    ) -> Result<Vec<RemoteFileRef>, GatewayError>;
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<RemoteFileRef>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    error: ProviderErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorDetail {
    message: String,
}

#[derive(Debug, Clone)]
pub struct DriveGateway {
    api_base_url: String,
    file_prefix: String,
    max_download_bytes: usize,
}

impl DriveGateway {
    pub fn new(api_base_url: &str, file_prefix: &str, max_download_bytes: usize) -> Self {
        Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            file_prefix: file_prefix.to_string(),
            max_download_bytes,
        }
    }

    fn files_url(&self) -> String {
        format!("{}/drive/v3/files", self.api_base_url)
    }

    fn file_url(&self, file_id: &str) -> String {
        format!("{}/{}", self.files_url(), urlencoding::encode(file_id))
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/drive/v3/files", self.api_base_url)
    }

    fn backup_query(&self) -> String {
        format!(
            "name contains '{}_' and mimeType='{}' and trashed = false",
            escape_query_literal(&self.file_prefix),
            JSON_MIME
        )
    }

    async fn query_files(
        &self,
        client: &AuthorizedClient,
        query: &str,
    ) -> Result<Vec<RemoteFileRef>, GatewayError> {
        let files_field = format!("files({})", FILE_FIELDS);
        let response = client
            .get(&self.files_url())
            .query(&[
                ("q", query),
                ("fields", files_field.as_str()),
                ("orderBy", "modifiedTime desc"),
                ("pageSize", LIST_PAGE_SIZE),
                ("spaces", "drive"),
            ])
            .send()
            .await?;

        let response = check_status(response, None).await?;
        let list: FileList = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("invalid file list: {}", e)))?;
        Ok(list.files)
    }
}

#[async_trait]
impl BackupGateway for DriveGateway {
    async fn list(&self, client: &AuthorizedClient) -> Result<Vec<RemoteFileRef>, GatewayError> {
        let files = self.query_files(client, &self.backup_query()).await?;
        tracing::info!(count = files.len(), "Listed backup files");
        Ok(files)
    }

    async fn upload(
        &self,
        client: &AuthorizedClient,
        name: &str,
        bytes: Vec<u8>,
    ) -> Result<RemoteFileRef, GatewayError> {
        let boundary = format!("backup-{}", uuid::Uuid::new_v4().simple());
        let metadata = serde_json::json!({ "name": name, "mimeType": JSON_MIME });
        let body = multipart_related(&boundary, &metadata, &bytes);

        tracing::info!(file_name = %name, size = bytes.len(), "Uploading backup file");

        let response = client
            .post(&self.upload_url())
            .query(&[("uploadType", "multipart"), ("fields", FILE_FIELDS)])
            .header(
                "Content-Type",
                &format!("multipart/related; boundary={}", boundary),
            )
            .body(body)
            .send()
            .await?;

        let response = check_status(response, None).await?;
        let file: RemoteFileRef = response
            .json()
            .await
            .map_err(|e| GatewayError::Transport(format!("invalid upload response: {}", e)))?;

        tracing::info!(file_id = %file.id, file_name = %file.name, "Backup file uploaded");
        Ok(file)
    }

    async fn download(
        &self,
        client: &AuthorizedClient,
        file_id: &str,
    ) -> Result<Vec<u8>, GatewayError> {
        let url = self.file_url(file_id);
        let response = client
            .get(&url)
            .query(&[("alt", "media")])
            .send()
            .await?;

        let mut response = check_status(response, Some(file_id)).await?;
        let limit = self.max_download_bytes;

        if response
            .content_length()
            .is_some_and(|len| len > limit as u64)
        {
            return Err(GatewayError::TooLarge { limit });
        }

        let mut buffer = Vec::new();
        while let Some(chunk) = response.chunk().await? {
            if buffer.len() + chunk.len() > limit {
                return Err(GatewayError::TooLarge { limit });
            }
            buffer.extend_from_slice(&chunk);
        }

        if buffer.is_empty() {
            return Err(GatewayError::EmptyBody);
        }

        tracing::info!(file_id = %file_id, size = buffer.len(), "File downloaded");
        Ok(buffer)
    }

    async fn list_folder(
        &self,
        client: &AuthorizedClient,
        folder_id: &str,
        mime_type: &str,
    ) -> Result<Vec<RemoteFileRef>, GatewayError> {
        let query = format!(
            "mimeType='{}' and '{}' in parents and trashed = false",
            escape_query_literal(mime_type),
            escape_query_literal(folder_id)
        );
        let files = self.query_files(client, &query).await?;
        tracing::info!(folder_id = %folder_id, count = files.len(), "Listed folder");
        Ok(files)
    }
}

/// Map a non-success response to a [`GatewayError`], keeping the provider's
/// own message when it sends one.
async fn check_status(
    response: reqwest::Response,
    file_id: Option<&str>,
) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = %status, "Storage provider returned an error");

    match status.as_u16() {
        401 | 403 => Err(GatewayError::Unauthorized),
        404 => Err(GatewayError::NotFound(
            file_id.unwrap_or("requested resource").to_string(),
        )),
        code => {
            let message = serde_json::from_str::<ProviderErrorBody>(&body)
                .map(|b| b.error.message)
                .unwrap_or_else(|_| {
                    status
                        .canonical_reason()
                        .unwrap_or("unexpected response")
                        .to_string()
                });
            Err(GatewayError::Provider {
                status: code,
                message,
            })
        }
    }
}

fn multipart_related(boundary: &str, metadata: &serde_json::Value, media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(media.len() + 256);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: {mime}\r\n\r\n",
            b = boundary,
            m = metadata,
            mime = JSON_MIME
        )
        .as_bytes(),
    );
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{}--\r\n", boundary).as_bytes());
    body
}

/// Escape a value for use inside a single-quoted Drive query literal.
fn escape_query_literal(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
