use axum::extract::DefaultBodyLimit;
use axum::http::{header, HeaderValue, Method};
use axum::middleware::from_fn;
use axum::routing::{get, post};
use axum::Router;
use service_core::middleware::{
    metrics::metrics_middleware, security_headers::security_headers_middleware,
    tracing::request_id_middleware, tracing::REQUEST_ID_HEADER,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{app, auth, backup, drive, metrics, modules};
use crate::AppState;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.backup.max_download_bytes;

    let api = Router::new()
        .route("/api/drive/checkAuth", get(auth::check_auth))
        .route("/api/auth/google/connect", get(auth::connect))
        .route("/api/auth/google/callback", get(auth::callback))
        .route("/api/auth/google/disconnect", post(auth::disconnect))
        .route("/api/drive/save", post(drive::save))
        .route("/api/drive/backup", post(drive::backup))
        .route("/api/drive/list", get(drive::list))
        .route("/api/drive/load", get(drive::load))
        .route("/api/drive/restore", post(drive::restore))
        .route("/api/drive/materials", get(drive::list_materials))
        .route("/api/drive/materials/:file_id", get(drive::material_content))
        .route("/api/backup/export", get(backup::export))
        .route("/api/backup/import", post(backup::import))
        .route("/api/backup/status", get(backup::status))
        .route("/api/modules", get(modules::list_modules))
        .route(
            "/api/modules/:name",
            get(modules::get_module).put(modules::put_module),
        )
        .layer(DefaultBodyLimit::max(body_limit));

    let router = Router::new()
        .route("/health", get(app::health_check))
        .route("/metrics", get(metrics::metrics))
        .merge(api);

    let router = match cors_layer(&state.config.google.frontend_url) {
        Some(cors) => router.layer(cors),
        None => router,
    };

    router
        .layer(from_fn(security_headers_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|request: &axum::http::Request<_>| {
                let request_id = request
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|value| value.to_str().ok())
                    .unwrap_or("-");

                tracing::info_span!(
                    "http_request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri().path(),
                    version = ?request.version(),
                )
            }),
        )
        .layer(from_fn(request_id_middleware))
        .with_state(state)
}

/// The browser app calls the API with the session cookie from its own origin.
fn cors_layer(frontend_url: &str) -> Option<CorsLayer> {
    let origin = match HeaderValue::from_str(frontend_url.trim_end_matches('/')) {
        Ok(origin) => origin,
        Err(e) => {
            tracing::warn!(frontend_url = %frontend_url, error = %e, "Invalid FRONTEND_URL, CORS disabled");
            return None;
        }
    };

    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_credentials(true)
            .allow_methods([Method::GET, Method::POST, Method::PUT])
            .allow_headers([header::CONTENT_TYPE]),
    )
}
