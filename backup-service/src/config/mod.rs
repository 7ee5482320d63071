use secrecy::{ExposeSecret, Secret};
use service_core::config::{self as core_config, get_env, get_env_parsed, Environment};
use service_core::error::AppError;

/// Placeholder shipped in sample `.env` files; never acceptable as a real secret.
const PLACEHOLDER_SECRET: &str = "replace_this_with_a_real_random_32_byte_hex_string";

/// Minimum session secret length in bytes.
pub const MIN_SESSION_SECRET_BYTES: usize = 32;

/// Modules registered when `BACKUP_MODULES` is not set.
pub const DEFAULT_MODULES: &[&str] = &[
    "financas",
    "alimentacao",
    "autoconhecimento",
    "hiperfocos",
    "painelDia",
    "perfil",
    "pomodoro",
    "prioridades",
    "registroEstudos",
    "sono",
    "atividades",
    "historicoSimulados",
    "appGlobal",
];

#[derive(Clone)]
pub struct BackupConfig {
    pub common: core_config::Config,
    pub environment: Environment,
    pub service_name: String,
    pub log_level: String,
    pub otlp_endpoint: Option<String>,
    pub session: SessionSettings,
    pub google: GoogleSettings,
    pub backup: SnapshotSettings,
}

#[derive(Clone)]
pub struct SessionSettings {
    pub secret: Secret<String>,
    pub cookie_name: String,
    pub max_age_days: i64,
    /// Emit `Secure` cookies; enabled in production.
    pub secure_cookies: bool,
}

#[derive(Clone)]
pub struct GoogleSettings {
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub redirect_uri: String,
    /// Consent page the user is redirected to on connect.
    pub auth_url: String,
    /// Token endpoint used for code exchange and refresh.
    pub token_url: String,
    /// Root of the Drive REST API (`/drive/v3`, `/upload/drive/v3` are appended).
    pub api_base_url: String,
    pub scopes: Vec<String>,
    /// Application origin that OAuth callbacks redirect back to.
    pub frontend_url: String,
}

#[derive(Clone, Debug)]
pub struct SnapshotSettings {
    pub max_download_bytes: usize,
    pub remote_file_prefix: String,
    pub export_base_name: String,
    pub modules: Vec<String>,
}

impl BackupConfig {
    pub fn load() -> Result<Self, AppError> {
        let common = core_config::Config::load()?;
        let environment = Environment::from_env()?;
        let is_prod = environment.is_prod();

        let config = BackupConfig {
            common,
            environment,
            service_name: get_env("SERVICE_NAME", Some("backup-service"), is_prod)?,
            log_level: get_env("LOG_LEVEL", Some("info"), is_prod)?,
            otlp_endpoint: optional_env("OTLP_ENDPOINT")?,
            session: SessionSettings {
                secret: Secret::new(get_env("SESSION_SECRET", None, is_prod)?),
                cookie_name: get_env("SESSION_COOKIE_NAME", Some("backup-session"), is_prod)?,
                max_age_days: get_env_parsed("SESSION_MAX_AGE_DAYS", Some("30"), is_prod)?,
                secure_cookies: is_prod,
            },
            google: GoogleSettings {
                client_id: get_env("GOOGLE_CLIENT_ID", None, is_prod)?,
                client_secret: Secret::new(get_env("GOOGLE_CLIENT_SECRET", None, is_prod)?),
                redirect_uri: get_env(
                    "GOOGLE_REDIRECT_URI",
                    Some("http://localhost:8080/api/auth/google/callback"),
                    is_prod,
                )?,
                auth_url: get_env(
                    "GOOGLE_AUTH_URL",
                    Some("https://accounts.google.com/o/oauth2/v2/auth"),
                    is_prod,
                )?,
                token_url: get_env(
                    "GOOGLE_TOKEN_URL",
                    Some("https://oauth2.googleapis.com/token"),
                    is_prod,
                )?,
                api_base_url: get_env(
                    "GOOGLE_API_BASE_URL",
                    Some("https://www.googleapis.com"),
                    is_prod,
                )?,
                scopes: default_scopes(),
                frontend_url: get_env("FRONTEND_URL", Some("http://localhost:3000"), is_prod)?,
            },
            backup: SnapshotSettings {
                max_download_bytes: get_env_parsed(
                    "BACKUP_MAX_DOWNLOAD_BYTES",
                    Some("10485760"),
                    is_prod,
                )?,
                remote_file_prefix: get_env("BACKUP_FILE_PREFIX", Some("app_backup"), is_prod)?,
                export_base_name: get_env(
                    "BACKUP_EXPORT_BASE_NAME",
                    Some("stayfocus_backup"),
                    is_prod,
                )?,
                modules: parse_module_list(&get_env(
                    "BACKUP_MODULES",
                    Some(&DEFAULT_MODULES.join(",")),
                    is_prod,
                )?),
            },
        };

        config.validate()?;
        Ok(config)
    }

    /// Startup checks that must fail loudly instead of degrading security.
    pub fn validate(&self) -> Result<(), AppError> {
        check_session_secret(&self.session.secret)
            .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

        if self.backup.modules.is_empty() {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "BACKUP_MODULES must name at least one module"
            )));
        }
        if self.backup.max_download_bytes == 0 {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "BACKUP_MAX_DOWNLOAD_BYTES must be greater than zero"
            )));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SessionSecretError {
    #[error("SESSION_SECRET must be at least {min} bytes (got {0})", min = MIN_SESSION_SECRET_BYTES)]
    TooShort(usize),

    #[error("SESSION_SECRET is still the sample placeholder; generate a random secret")]
    Placeholder,
}

pub fn check_session_secret(secret: &Secret<String>) -> Result<(), SessionSecretError> {
    let raw = secret.expose_secret();
    if raw == PLACEHOLDER_SECRET {
        return Err(SessionSecretError::Placeholder);
    }
    if raw.len() < MIN_SESSION_SECRET_BYTES {
        return Err(SessionSecretError::TooShort(raw.len()));
    }
    Ok(())
}

fn default_scopes() -> Vec<String> {
    vec![
        "https://www.googleapis.com/auth/userinfo.profile".to_string(),
        "https://www.googleapis.com/auth/userinfo.email".to_string(),
        "https://www.googleapis.com/auth/drive.file".to_string(),
    ]
}

fn parse_module_list(raw: &str) -> Vec<String> {
    let mut modules: Vec<String> = Vec::new();
    for name in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
        if !modules.iter().any(|m| m == name) {
            modules.push(name.to_string());
        }
    }
    modules
}

/// A setting that may be absent in every environment; empty counts as unset.
fn optional_env(key: &str) -> Result<Option<String>, AppError> {
    Ok(Some(get_env(key, Some(""), false)?).filter(|v| !v.is_empty()))
}
