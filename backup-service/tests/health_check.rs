mod common;

use axum::http::StatusCode;
use common::TestApp;

#[tokio::test]
async fn health_check_works() {
    let app = TestApp::spawn().await;

    let response = app.get("/health", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&body[..], b"OK");
}

#[tokio::test]
async fn responses_carry_request_id_and_security_headers() {
    let app = TestApp::spawn().await;

    let response = app.get("/health", None).await;
    let headers = response.headers();

    assert!(headers.contains_key("x-request-id"));
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
}

#[tokio::test]
async fn metrics_endpoint_renders_text() {
    let app = TestApp::spawn().await;

    let response = app.get("/metrics", None).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
}

#[tokio::test]
async fn weak_session_secret_fails_startup() {
    let mut config = common::test_config("http://127.0.0.1:1", &["financas"]);
    config.session.secret = secrecy::Secret::new("short".to_string());

    assert!(backup_service::AppState::new(config).is_err());
}
