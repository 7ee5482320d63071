//! Google account connection: consent redirect, OAuth callback, status and
//! disconnect.

use crate::models::{AuthStatusResponse, DisconnectResponse, OAuthCallbackQuery};
use crate::services::Pkce;
use crate::session::{CookieCredentialStore, CredentialStore};
use crate::AppState;
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar, SameSite};
use service_core::error::AppError;

const STATE_COOKIE: &str = "oauth_state";
const VERIFIER_COOKIE: &str = "oauth_code_verifier";
const FLOW_COOKIE_PATH: &str = "/api/auth/google";
const FLOW_COOKIE_MINUTES: i64 = 5;

/// `GET /api/drive/checkAuth`
pub async fn check_auth(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Json<AuthStatusResponse> {
    let store = CookieCredentialStore::new(jar, &state.config.session);
    let is_authenticated = store
        .load()
        .is_some_and(|c| c.is_usable(state.tokens.now_millis()));

    Json(AuthStatusResponse { is_authenticated })
}

/// `GET /api/auth/google/connect`
pub async fn connect(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), AppError> {
    let csrf_state = uuid::Uuid::new_v4().simple().to_string();
    let pkce = Pkce::generate();

    let url = state
        .oauth
        .authorization_url(&csrf_state, &pkce.challenge)
        .map_err(|e| AppError::ConfigError(anyhow::anyhow!(e)))?;

    let secure = state.config.session.secure_cookies;
    let jar = jar
        .add(flow_cookie(STATE_COOKIE, csrf_state, secure))
        .add(flow_cookie(VERIFIER_COOKIE, pkce.verifier, secure));

    tracing::info!("Redirecting to Google consent screen");
    Ok((jar, Redirect::to(url.as_str())))
}

/// `GET /api/auth/google/callback`
pub async fn callback(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(query): Query<OAuthCallbackQuery>,
) -> Response {
    let expected_state = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    let verifier = jar.get(VERIFIER_COOKIE).map(|c| c.value().to_string());
    let jar = jar
        .remove(Cookie::build(STATE_COOKIE).path(FLOW_COOKIE_PATH).build())
        .remove(Cookie::build(VERIFIER_COOKIE).path(FLOW_COOKIE_PATH).build());

    let frontend = state.config.google.frontend_url.trim_end_matches('/');
    let fail = |jar: PrivateCookieJar, reason: &str| {
        (jar, Redirect::to(&format!("{}/perfil?error={}", frontend, reason))).into_response()
    };

    if let Some(error) = query.error.as_deref() {
        tracing::warn!(error = %error, "Google authorization was not granted");
        return fail(jar, "google_auth_failed");
    }

    let Some(code) = query.code.as_deref().filter(|c| !c.is_empty()) else {
        tracing::warn!("OAuth callback without an authorization code");
        return fail(jar, "invalid_code");
    };

    let state_matches = matches!(
        (query.state.as_deref(), expected_state.as_deref()),
        (Some(received), Some(expected)) if received == expected
    );
    let Some(verifier) = verifier.filter(|_| state_matches) else {
        tracing::warn!("OAuth callback state mismatch");
        return fail(jar, "invalid_state");
    };

    let credential = match state.oauth.exchange_code(code, &verifier).await {
        Ok(grant) => match state.tokens.credential_from_grant(grant) {
            Ok(credential) => credential,
            Err(e) => {
                tracing::error!(error = %e, "Token exchange returned an unusable grant");
                return fail(jar, "token_exchange_failed");
            }
        },
        Err(e) => {
            tracing::error!(error = %e, "Authorization code exchange failed");
            return fail(jar, "token_exchange_failed");
        }
    };

    if credential.refresh_token.is_none() {
        tracing::warn!("No refresh token issued; the connection will lapse when the access token expires");
    }

    let store = CookieCredentialStore::new(jar, &state.config.session);
    store.save(credential);
    tracing::info!("Google Drive connected");

    (
        store.into_jar(),
        Redirect::to(&format!("{}/perfil?google_auth=success", frontend)),
    )
        .into_response()
}

/// `POST /api/auth/google/disconnect`
pub async fn disconnect(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, Json<DisconnectResponse>) {
    let store = CookieCredentialStore::new(jar, &state.config.session);
    store.destroy();
    tracing::info!("Google Drive disconnected");

    (
        store.into_jar(),
        Json(DisconnectResponse {
            success: true,
            message: "Disconnected from Google Drive".to_string(),
        }),
    )
}

fn flow_cookie(name: &'static str, value: String, secure: bool) -> Cookie<'static> {
    Cookie::build((name, value))
        .path(FLOW_COOKIE_PATH)
        .http_only(true)
        .secure(secure)
        .same_site(SameSite::Lax)
        .max_age(time::Duration::minutes(FLOW_COOKIE_MINUTES))
        .build()
}
