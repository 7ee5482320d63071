//! Credential persistence.
//!
//! A [`Credential`] is the OAuth2 token set for the connected storage
//! provider. It lives behind a [`CredentialStore`]; handlers use the
//! encrypted-cookie store, tests use [`MemoryCredentialStore`].

pub mod cookie;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Mutex, PoisonError};

pub use cookie::{session_key, CookieCredentialStore};

/// Tokens expiring within this window are refreshed before use.
pub const EXPIRY_BUFFER_MILLIS: i64 = 5 * 60 * 1000;

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expiry_epoch_millis: i64,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    #[serde(default)]
    pub scope: String,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl Credential {
    /// True when the access token expires within [`EXPIRY_BUFFER_MILLIS`] of `now_millis`.
    pub fn is_near_expiry(&self, now_millis: i64) -> bool {
        self.expiry_epoch_millis <= now_millis + EXPIRY_BUFFER_MILLIS
    }

    /// A credential that is near expiry and cannot be refreshed is as good as absent.
    pub fn is_usable(&self, now_millis: i64) -> bool {
        !self.access_token.is_empty()
            && (!self.is_near_expiry(now_millis) || self.refresh_token.is_some())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expiry_epoch_millis", &self.expiry_epoch_millis)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

/// Owner of the current [`Credential`].
///
/// Writes replace the whole value; there are no partial-field updates.
pub trait CredentialStore: Send + Sync {
    fn load(&self) -> Option<Credential>;

    fn save(&self, credential: Credential);

    /// Remove all token material. Calling this on an empty store is a no-op.
    fn destroy(&self);
}

/// In-memory store, used by tests and tooling.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    credential: Mutex<Option<Credential>>,
}

impl MemoryCredentialStore {
    pub fn new(credential: Option<Credential>) -> Self {
        Self {
            credential: Mutex::new(credential),
        }
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self) -> Option<Credential> {
        self.credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn save(&self, credential: Credential) {
        *self
            .credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(credential);
    }

    fn destroy(&self) {
        self.credential
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
