//! Token lifecycle: turns a stored [`Credential`] into a live
//! [`AuthorizedClient`], refreshing the access token when it is within the
//! expiry buffer.
//!
//! Concurrent callers that need to refresh the same grant share one in-flight
//! refresh (single-flight). The refresh runs in its own task and removes its
//! in-flight entry when it finishes, so a caller that goes away cannot leave a
//! half-finished refresh behind. The task only produces the new token; each
//! caller writes the result into its own [`CredentialStore`], since every
//! request carries its own copy of the session cookie.

use crate::services::oauth::{OAuthError, TokenGrant};
use crate::session::{Credential, CredentialStore};
use async_trait::async_trait;
use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use metrics::counter;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};
use service_core::observability::{TracedClientExt, TracedRequest};
use sha2::{Digest, Sha256};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        Utc::now().timestamp_millis()
    }
}

/// Provider endpoint that trades a refresh token for a new access token.
#[async_trait]
pub trait TokenRefresher: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, OAuthError>;
}

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("no usable credential; the user must reconnect")]
    Unauthenticated,

    #[error("access token refresh failed: {0}")]
    RefreshFailed(String),
}

/// Credential-bearing handle for calling the provider API.
#[derive(Clone)]
pub struct AuthorizedClient {
    http: Client,
    access_token: Secret<String>,
}

impl AuthorizedClient {
    pub fn new(http: Client, access_token: String) -> Self {
        Self {
            http,
            access_token: Secret::new(access_token),
        }
    }

    pub fn get(&self, url: &str) -> TracedRequest {
        self.http
            .traced_get(url)
            .bearer_auth(self.access_token.expose_secret())
    }

    pub fn post(&self, url: &str) -> TracedRequest {
        self.http
            .traced_post(url)
            .bearer_auth(self.access_token.expose_secret())
    }
}

impl std::fmt::Debug for AuthorizedClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedClient").finish_non_exhaustive()
    }
}

/// Token material produced by one refresh, shared by every joined caller.
#[derive(Clone)]
struct RefreshedToken {
    access_token: String,
    refresh_token: Option<String>,
    expiry_epoch_millis: i64,
    token_type: Option<String>,
    scope: Option<String>,
}

impl RefreshedToken {
    fn from_grant(grant: TokenGrant, issued_at_millis: i64) -> Result<Self, TokenError> {
        let access_token = grant
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TokenError::RefreshFailed("grant has no access token".to_string()))?;
        let expires_in = grant
            .expires_in
            .ok_or_else(|| TokenError::RefreshFailed("grant has no expiry".to_string()))?;
        let expiry_epoch_millis = expires_in
            .checked_mul(1000)
            .and_then(|millis| issued_at_millis.checked_add(millis))
            .ok_or_else(|| {
                TokenError::RefreshFailed(format!("grant expiry out of range: {expires_in}s"))
            })?;

        Ok(Self {
            access_token,
            refresh_token: grant.refresh_token.filter(|t| !t.is_empty()),
            expiry_epoch_millis,
            token_type: grant.token_type,
            scope: grant.scope,
        })
    }

    /// Providers need not rotate the refresh token or echo the scope; keep
    /// the previous values when they are omitted.
    fn apply_to(&self, previous: &Credential) -> Credential {
        Credential {
            access_token: self.access_token.clone(),
            refresh_token: self
                .refresh_token
                .clone()
                .or_else(|| previous.refresh_token.clone()),
            expiry_epoch_millis: self.expiry_epoch_millis,
            token_type: self
                .token_type
                .clone()
                .unwrap_or_else(|| previous.token_type.clone()),
            scope: self.scope.clone().unwrap_or_else(|| previous.scope.clone()),
        }
    }
}

type RefreshFuture = Shared<BoxFuture<'static, Result<RefreshedToken, TokenError>>>;

/// Handle to a running refresh task. The id tells a finished task apart
/// from a newer refresh of the same grant.
struct InFlight {
    id: u64,
    refresh: RefreshFuture,
}

type InFlightMap = DashMap<String, InFlight>;

pub struct TokenManager {
    http: Client,
    refresher: Arc<dyn TokenRefresher>,
    clock: Arc<dyn Clock>,
    in_flight: Arc<InFlightMap>,
    next_id: AtomicU64,
}

impl TokenManager {
    pub fn new(http: Client, refresher: Arc<dyn TokenRefresher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            http,
            refresher,
            clock,
            in_flight: Arc::new(DashMap::new()),
            next_id: AtomicU64::new(0),
        }
    }

    pub fn now_millis(&self) -> i64 {
        self.clock.now_millis()
    }

    /// Build a credential from an authorization-code grant.
    pub fn credential_from_grant(&self, grant: TokenGrant) -> Result<Credential, TokenError> {
        let scope = grant.scope.clone().unwrap_or_default();
        let token_type = grant
            .token_type
            .clone()
            .unwrap_or_else(|| "Bearer".to_string());
        let refreshed = RefreshedToken::from_grant(grant, self.clock.now_millis())?;

        Ok(Credential {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token,
            expiry_epoch_millis: refreshed.expiry_epoch_millis,
            token_type,
            scope,
        })
    }

    /// Return a client authorized with a live access token.
    ///
    /// Makes no network call unless the stored token is within the expiry
    /// buffer. At most one refresh attempt is made per call; on failure the
    /// stored credential is left untouched so the user can retry.
    pub async fn get_live_client(
        &self,
        store: &dyn CredentialStore,
    ) -> Result<AuthorizedClient, TokenError> {
        let credential = store.load().ok_or(TokenError::Unauthenticated)?;

        if credential.access_token.is_empty() {
            return Err(TokenError::Unauthenticated);
        }

        if !credential.is_near_expiry(self.clock.now_millis()) {
            return Ok(self.authorize(&credential));
        }

        let Some(refresh_token) = credential.refresh_token.as_deref() else {
            tracing::warn!("Access token expired and no refresh token is available");
            return Err(TokenError::Unauthenticated);
        };

        let refreshed = self.refresh_single_flight(refresh_token).await?;
        let updated = refreshed.apply_to(&credential);
        store.save(updated.clone());

        Ok(self.authorize(&updated))
    }

    /// Number of refreshes currently in flight.
    pub fn in_flight_refreshes(&self) -> usize {
        self.in_flight.len()
    }

    fn authorize(&self, credential: &Credential) -> AuthorizedClient {
        AuthorizedClient::new(self.http.clone(), credential.access_token.clone())
    }

    async fn refresh_single_flight(&self, refresh_token: &str) -> Result<RefreshedToken, TokenError> {
        let key = fingerprint(refresh_token);

        let refresh = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(entry) => {
                tracing::debug!(grant = %key, "Joining in-flight token refresh");
                entry.get().refresh.clone()
            }
            Entry::Vacant(entry) => {
                tracing::info!(grant = %key, "Access token near expiry, refreshing");
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let refresh = self.start_refresh(refresh_token.to_string(), key, id);
                entry.insert(InFlight {
                    id,
                    refresh: refresh.clone(),
                });
                refresh
            }
        };

        refresh.await
    }

    /// Spawn the refresh and return a shared handle to its outcome.
    ///
    /// Called while the vacant map entry is held, so the task's own removal
    /// cannot run before its entry is inserted.
    fn start_refresh(&self, refresh_token: String, key: String, id: u64) -> RefreshFuture {
        let refresher = Arc::clone(&self.refresher);
        let clock = Arc::clone(&self.clock);
        let in_flight = Arc::clone(&self.in_flight);

        let task = tokio::spawn(async move {
            let issued_at = clock.now_millis();
            let outcome = match refresher.refresh(&refresh_token).await {
                Ok(grant) => RefreshedToken::from_grant(grant, issued_at),
                Err(e) => Err(TokenError::RefreshFailed(e.to_string())),
            };

            match &outcome {
                Ok(_) => {
                    tracing::info!(grant = %key, "Access token refreshed");
                    counter!("token_refresh_total", "outcome" => "success").increment(1);
                }
                Err(e) => {
                    tracing::error!(grant = %key, error = %e, "Access token refresh failed");
                    counter!("token_refresh_total", "outcome" => "failure").increment(1);
                }
            }

            in_flight.remove_if(&key, |_, current| current.id == id);
            outcome
        });

        async move {
            task.await.unwrap_or_else(|e| {
                Err(TokenError::RefreshFailed(format!("refresh task failed: {e}")))
            })
        }
        .boxed()
        .shared()
    }
}

/// Short, non-reversible identifier for a refresh token, safe to log.
fn fingerprint(token: &str) -> String {
    hex::encode(&Sha256::digest(token.as_bytes())[..8])
}
