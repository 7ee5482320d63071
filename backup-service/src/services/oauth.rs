//! Google OAuth2 client: consent URL construction, authorization-code
//! exchange and refresh-token grants.

use crate::config::GoogleSettings;
use crate::services::token_manager::TokenRefresher;
use async_trait::async_trait;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use reqwest::{Client, Url};
use secrecy::ExposeSecret;
use serde::Deserialize;
use service_core::observability::TracedClientExt;
use sha2::{Digest, Sha256};

/// Token endpoint response for both the code and refresh grants.
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct TokenGrant {
    pub access_token: Option<String>,
    /// Lifetime of the access token in seconds.
    pub expires_in: Option<i64>,
    pub refresh_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("expires_in", &self.expires_in)
            .field("has_refresh_token", &self.refresh_token.is_some())
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    error_description: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum OAuthError {
    #[error("token endpoint rejected the request: {0}")]
    Rejected(String),

    #[error("token endpoint unreachable: {0}")]
    Transport(String),

    #[error("token endpoint returned an unusable grant: {0}")]
    InvalidGrant(String),
}

/// PKCE verifier/challenge pair (RFC 7636, S256).
pub struct Pkce {
    pub verifier: String,
    pub challenge: String,
}

impl Pkce {
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = Self::challenge_for(&verifier);
        Self {
            verifier,
            challenge,
        }
    }

    pub fn challenge_for(verifier: &str) -> String {
        URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
    }
}

#[derive(Clone)]
pub struct GoogleOAuthClient {
    client: Client,
    settings: GoogleSettings,
}

impl GoogleOAuthClient {
    pub fn new(client: Client, settings: GoogleSettings) -> Self {
        Self { client, settings }
    }

    /// Consent URL requesting offline access so that a refresh token is issued.
    pub fn authorization_url(&self, state: &str, code_challenge: &str) -> Result<Url, OAuthError> {
        let scope = self.settings.scopes.join(" ");
        Url::parse_with_params(
            &self.settings.auth_url,
            &[
                ("client_id", self.settings.client_id.as_str()),
                ("redirect_uri", self.settings.redirect_uri.as_str()),
                ("response_type", "code"),
                ("access_type", "offline"),
                ("include_granted_scopes", "true"),
                ("scope", scope.as_str()),
                ("state", state),
                ("code_challenge", code_challenge),
                ("code_challenge_method", "S256"),
            ],
        )
        .map_err(|e| OAuthError::InvalidGrant(format!("invalid authorization URL: {}", e)))
    }

    /// Exchange an authorization code for tokens.
    pub async fn exchange_code(
        &self,
        code: &str,
        code_verifier: &str,
    ) -> Result<TokenGrant, OAuthError> {
        self.request_token(&[
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.expose_secret().as_str()),
            ("code", code),
            ("code_verifier", code_verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.settings.redirect_uri.as_str()),
        ])
        .await
    }

    async fn request_token(&self, form: &[(&str, &str)]) -> Result<TokenGrant, OAuthError> {
        let response = self
            .client
            .traced_post(&self.settings.token_url)
            .form(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "Failed to reach token endpoint");
                OAuthError::Transport(e.to_string())
            })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OAuthError::Transport(e.to_string()))?;

        if !status.is_success() {
            let reason = serde_json::from_str::<TokenErrorBody>(&body)
                .map(|e| match e.error_description {
                    Some(description) => format!("{}: {}", e.error, description),
                    None => e.error,
                })
                .unwrap_or_else(|_| format!("HTTP {}", status));
            tracing::warn!(status = %status, reason = %reason, "Token endpoint returned an error");
            return Err(OAuthError::Rejected(reason));
        }

        let grant: TokenGrant = serde_json::from_str(&body)
            .map_err(|e| OAuthError::InvalidGrant(e.to_string()))?;

        if grant.access_token.as_deref().map_or(true, str::is_empty) {
            return Err(OAuthError::InvalidGrant("missing access_token".to_string()));
        }
        if grant.expires_in.is_none() {
            return Err(OAuthError::InvalidGrant("missing expires_in".to_string()));
        }

        Ok(grant)
    }
}

#[async_trait]
impl TokenRefresher for GoogleOAuthClient {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, OAuthError> {
        self.request_token(&[
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.expose_secret().as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ])
        .await
    }
}
