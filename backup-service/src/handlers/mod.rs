pub mod app;
pub mod auth;
pub mod backup;
pub mod drive;
pub mod metrics;
pub mod modules;

use crate::services::{AuthorizedClient, BackupError};
use crate::session::CookieCredentialStore;
use crate::AppState;
use axum::response::{IntoResponse, Response};
use axum_extra::extract::cookie::PrivateCookieJar;
use ::metrics::counter;
use service_core::error::AppError;
use std::future::Future;

/// Run `operation` with a live provider client for this request's session.
///
/// The cookie jar goes back on the response whether or not the operation
/// succeeds, so a token refreshed before a failing provider call is kept.
pub(crate) async fn with_live_client<F, Fut, T>(
    state: &AppState,
    jar: PrivateCookieJar,
    operation: &'static str,
    f: F,
) -> Response
where
    F: FnOnce(AuthorizedClient) -> Fut,
    Fut: Future<Output = Result<T, BackupError>>,
    T: IntoResponse,
{
    let store = CookieCredentialStore::new(jar, &state.config.session);
    let result = match state.tokens.get_live_client(&store).await {
        Ok(client) => f(client).await,
        Err(e) => Err(BackupError::from(e)),
    };

    record_outcome(operation, &result);
    (store.into_jar(), result.map_err(AppError::from)).into_response()
}

pub(crate) fn record_outcome<T>(operation: &'static str, result: &Result<T, BackupError>) {
    let outcome = match result {
        Ok(_) => "success",
        Err(BackupError::Unauthenticated | BackupError::RefreshFailed(_)) => "unauthenticated",
        Err(BackupError::ValidationFailed(_)) => "invalid",
        Err(_) => "error",
    };
    if let Err(e) = result {
        tracing::warn!(operation, error = %e, "Backup operation failed");
    }
    counter!("snapshot_operations_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
}

/// Response for an operation rejected before the provider was contacted.
pub(crate) fn reject(operation: &'static str, err: impl Into<BackupError>) -> Response {
    let result: Result<(), BackupError> = Err(err.into());
    record_outcome(operation, &result);
    result.map_err(AppError::from).into_response()
}
