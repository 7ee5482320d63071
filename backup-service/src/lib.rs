pub mod config;
pub mod handlers;
pub mod models;
pub mod services;
pub mod session;
pub mod snapshot;
pub mod startup;

use axum::extract::FromRef;
use axum_extra::extract::cookie::Key;
use config::BackupConfig;
use models::TransferLog;
use service_core::error::AppError;
use services::{BackupGateway, Clock, DriveGateway, GoogleOAuthClient, SystemClock, TokenManager};
use snapshot::ModuleRegistry;
use std::sync::Arc;
use std::time::Duration;

const PROVIDER_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<BackupConfig>,
    pub cookie_key: Key,
    pub oauth: Arc<GoogleOAuthClient>,
    pub tokens: Arc<TokenManager>,
    pub gateway: Arc<dyn BackupGateway>,
    pub modules: Arc<ModuleRegistry>,
    pub transfers: Arc<TransferLog>,
}

impl AppState {
    pub fn new(config: BackupConfig) -> Result<Self, AppError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: BackupConfig, clock: Arc<dyn Clock>) -> Result<Self, AppError> {
        let cookie_key = session::session_key(&config.session.secret)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        let http = reqwest::Client::builder()
            .timeout(PROVIDER_TIMEOUT)
            .build()
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!("HTTP client: {}", e)))?;

        let oauth = Arc::new(GoogleOAuthClient::new(http.clone(), config.google.clone()));
        let tokens = Arc::new(TokenManager::new(http, oauth.clone(), clock));
        let gateway = Arc::new(DriveGateway::new(
            &config.google.api_base_url,
            &config.backup.remote_file_prefix,
            config.backup.max_download_bytes,
        ));
        let modules = ModuleRegistry::from_names(config.backup.modules.iter().cloned())
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        Ok(Self {
            config: Arc::new(config),
            cookie_key,
            oauth,
            tokens,
            gateway,
            modules: Arc::new(modules),
            transfers: Arc::new(TransferLog::new()),
        })
    }
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.cookie_key.clone()
    }
}
