//! Encrypted session cookie backing for [`CredentialStore`].
//!
//! The credential is serialized to JSON and stored in a private cookie:
//! AES-GCM authenticated encryption under a key derived from the session
//! secret, so the value is both unreadable and tamper-evident client-side.

use super::{Credential, CredentialStore};
use crate::config::{check_session_secret, SessionSecretError, SessionSettings};
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use secrecy::{ExposeSecret, Secret};
use std::sync::{Mutex, PoisonError};

/// Derive the cookie encryption key from the session secret.
///
/// Rejects secrets shorter than 32 bytes instead of deriving a weak key.
pub fn session_key(secret: &Secret<String>) -> Result<Key, SessionSecretError> {
    check_session_secret(secret)?;
    Ok(Key::derive_from(secret.expose_secret().as_bytes()))
}

pub struct CookieCredentialStore {
    jar: Mutex<PrivateCookieJar>,
    cookie_name: String,
    max_age_days: i64,
    secure: bool,
}

impl CookieCredentialStore {
    pub fn new(jar: PrivateCookieJar, settings: &SessionSettings) -> Self {
        Self {
            jar: Mutex::new(jar),
            cookie_name: settings.cookie_name.clone(),
            max_age_days: settings.max_age_days,
            secure: settings.secure_cookies,
        }
    }

    /// The jar including any pending `Set-Cookie` changes, for the response.
    pub fn into_jar(self) -> PrivateCookieJar {
        self.jar.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(PrivateCookieJar) -> PrivateCookieJar) {
        let mut guard = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        *guard = f(guard.clone());
    }
}

impl CredentialStore for CookieCredentialStore {
    fn load(&self) -> Option<Credential> {
        let jar = self.jar.lock().unwrap_or_else(PoisonError::into_inner);
        let cookie = jar.get(&self.cookie_name)?;

        match serde_json::from_str::<Credential>(cookie.value()) {
            Ok(credential) => Some(credential),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable session credential");
                None
            }
        }
    }

    fn save(&self, credential: Credential) {
        let value = match serde_json::to_string(&credential) {
            Ok(value) => value,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize credential for session");
                return;
            }
        };

        let cookie = Cookie::build((self.cookie_name.clone(), value))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .max_age(time::Duration::days(self.max_age_days))
            .build();

        self.update(|jar| jar.add(cookie));
    }

    fn destroy(&self) {
        let removal = Cookie::build((self.cookie_name.clone(), "")).path("/").build();
        self.update(|jar| jar.remove(removal));
    }
}
