mod common;

use axum::http::StatusCode;
use common::{cookie_pair, json_body, TestApp, SESSION_COOKIE};
use serde_json::json;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn snapshot_v11() -> serde_json::Value {
    json!({
        "versao": "1.1",
        "timestamp": "2025-03-01T12:00:00.000Z",
        "dados": {
            "financas": {"saldo": 100},
            "sono": {"horas": 7},
            "historicoSimulados": {"simulados": [{"nota": 8}]}
        }
    })
}

#[tokio::test]
async fn drive_operations_require_a_connection() {
    let app = TestApp::spawn().await;

    for (method, uri) in [
        ("GET", "/api/drive/list"),
        ("GET", "/api/drive/load?fileId=abc"),
        ("POST", "/api/drive/backup"),
    ] {
        let response = if method == "GET" {
            app.get(uri, None).await
        } else {
            app.post(uri, None).await
        };
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(
            json_body(response).await["error"],
            "Not connected to Google Drive. Please reconnect."
        );
    }
}

#[tokio::test]
async fn save_uploads_a_validated_snapshot() {
    let app = TestApp::spawn().await;
    let session = app.connect_drive(3600, Some("1//refresh")).await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(header("authorization", "Bearer ya29.initial"))
        .and(body_string_contains("\"versao\": \"1.1\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-1",
            "name": "app_backup_2025-03-01T12-00-00-000Z.json"
        })))
        .expect(1)
        .mount(&app.provider)
        .await;

    let response = app
        .post_json("/api/drive/save", Some(&session), &snapshot_v11())
        .await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["fileId"], "file-1");
    assert!(body["fileName"].as_str().unwrap().starts_with("app_backup_"));
}

#[tokio::test]
async fn save_rejects_unsupported_version_before_upload() {
    let app = TestApp::spawn().await;
    let session = app.connect_drive(3600, Some("1//refresh")).await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&app.provider)
        .await;

    let mut snapshot = snapshot_v11();
    snapshot["versao"] = json!("1.2");
    let response = app
        .post_json("/api/drive/save", Some(&session), &snapshot)
        .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        json_body(response).await["error"],
        "Unsupported backup version: 1.2"
    );
}

#[tokio::test]
async fn list_returns_backup_files() {
    let app = TestApp::spawn().await;
    let session = app.connect_drive(3600, Some("1//refresh")).await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param("orderBy", "modifiedTime desc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{
                "id": "file-1",
                "name": "app_backup_2025-03-01T12-00-00-000Z.json",
                "createdTime": "2025-03-01T12:00:01.000Z",
                "modifiedTime": "2025-03-01T12:00:01.000Z"
            }]
        })))
        .mount(&app.provider)
        .await;

    let response = app.get("/api/drive/list", Some(&session)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["files"][0]["id"], "file-1");
    assert_eq!(body["files"][0]["modifiedTime"], "2025-03-01T12:00:01.000Z");
}

#[tokio::test]
async fn load_returns_the_validated_snapshot() {
    let app = TestApp::spawn().await;
    let session = app.connect_drive(3600, Some("1//refresh")).await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/file-1"))
        .and(query_param("alt", "media"))
        .respond_with(ResponseTemplate::new(200).set_body_json(snapshot_v11()))
        .mount(&app.provider)
        .await;

    let response = app.get("/api/drive/load?fileId=file-1", Some(&session)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], snapshot_v11());
}

#[tokio::test]
async fn load_of_missing_file_is_not_found() {
    let app = TestApp::spawn().await;
    let session = app.connect_drive(3600, Some("1//refresh")).await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/gone"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&app.provider)
        .await;

    let response = app.get("/api/drive/load?fileId=gone", Some(&session)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn load_with_empty_file_id_is_invalid() {
    let app = TestApp::spawn().await;

    let response = app.get("/api/drive/load?fileId=", None).await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn restore_of_old_snapshot_keeps_newer_modules() {
    let app = TestApp::spawn().await;
    let session = app.connect_drive(3600, Some("1//refresh")).await;
    app.put_json(
        "/api/modules/historicoSimulados",
        &json!({"simulados": [{"nota": 9}]}),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/old"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "versao": "1.0",
            "timestamp": "2024-06-01T08:00:00.000Z",
            "dados": {"financas": {"saldo": 50}, "sono": {"horas": 6}}
        })))
        .mount(&app.provider)
        .await;

    let response = app.post("/api/drive/restore?fileId=old", Some(&session)).await;

    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["partial"], false);
    assert_eq!(body["version"], "1.0");
    assert_eq!(body["report"]["appliedModules"], json!(["financas", "sono"]));
    assert_eq!(
        body["report"]["skippedModules"],
        json!([{"module": "historicoSimulados", "reason": "absent"}])
    );

    let history = json_body(app.get("/api/modules/historicoSimulados", None).await).await;
    assert_eq!(history, json!({"simulados": [{"nota": 9}]}));
    let finances = json_body(app.get("/api/modules/financas", None).await).await;
    assert_eq!(finances, json!({"saldo": 50}));
}

#[tokio::test]
async fn near_expiry_token_is_refreshed_and_persisted() {
    let app = TestApp::spawn().await;
    // Expires in one minute: inside the refresh buffer.
    let session = app.connect_drive(60, Some("1//refresh")).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "ya29.refreshed",
            "expires_in": 3600,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&app.provider)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(header("authorization", "Bearer ya29.refreshed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": []})))
        .expect(2)
        .mount(&app.provider)
        .await;

    let response = app.get("/api/drive/list", Some(&session)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed = cookie_pair(&response, SESSION_COOKIE).expect("refreshed session not saved");

    // The refreshed cookie is used as-is, with no second refresh.
    let response = app.get("/api/drive/list", Some(&refreshed)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(cookie_pair(&response, SESSION_COOKIE).is_none());
}

#[tokio::test]
async fn concurrent_requests_share_one_refresh() {
    let app = TestApp::spawn().await;
    let session = app.connect_drive(60, Some("1//shared")).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "ya29.refreshed", "expires_in": 3600}))
                .set_delay(std::time::Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&app.provider)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"files": []})))
        .mount(&app.provider)
        .await;

    let (first, second, third) = tokio::join!(
        app.get("/api/drive/list", Some(&session)),
        app.get("/api/drive/list", Some(&session)),
        app.get("/api/drive/list", Some(&session)),
    );

    for response in [first, second, third] {
        assert_eq!(response.status(), StatusCode::OK);
        assert!(cookie_pair(&response, SESSION_COOKIE).is_some());
    }
}

#[tokio::test]
async fn failed_refresh_keeps_the_session_for_a_retry() {
    let app = TestApp::spawn().await;
    let session = app.connect_drive(60, Some("1//revoked")).await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "Token has been expired or revoked."
        })))
        .mount(&app.provider)
        .await;

    let response = app.get("/api/drive/list", Some(&session)).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(cookie_pair(&response, SESSION_COOKIE).is_none());
    assert!(!common::cookie_removed(&response, SESSION_COOKIE));
    assert_eq!(
        json_body(response).await["error"],
        "Session expired and could not be refreshed. Please reconnect."
    );

    // The credential is still there; the UI can offer a reconnect.
    let status = app.get("/api/drive/checkAuth", Some(&session)).await;
    assert_eq!(json_body(status).await["isAuthenticated"], true);
}

#[tokio::test]
async fn provider_failure_is_surfaced_as_bad_gateway() {
    let app = TestApp::spawn().await;
    let session = app.connect_drive(3600, Some("1//refresh")).await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"code": 500, "message": "Backend Error"}
        })))
        .mount(&app.provider)
        .await;

    let response = app.get("/api/drive/list", Some(&session)).await;

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let error = json_body(response).await["error"].as_str().unwrap().to_string();
    assert!(error.contains("Backend Error"), "{}", error);
}

#[tokio::test]
async fn backup_uploads_server_side_state() {
    let app = TestApp::spawn().await;
    let session = app.connect_drive(3600, Some("1//refresh")).await;
    app.put_json("/api/modules/financas", &json!({"saldo": 321}))
        .await;
    Mock::given(method("POST"))
        .and(path("/upload/drive/v3/files"))
        .and(body_string_contains("\"saldo\": 321"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "file-9",
            "name": "app_backup_now.json"
        })))
        .expect(1)
        .mount(&app.provider)
        .await;

    let response = app.post("/api/drive/backup", Some(&session)).await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["fileId"], "file-9");
}

#[tokio::test]
async fn materials_are_listed_and_read_as_text() {
    let app = TestApp::spawn().await;
    let session = app.connect_drive(3600, Some("1//refresh")).await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files"))
        .and(query_param(
            "q",
            "mimeType='text/markdown' and 'folder-1' in parents and trashed = false",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "files": [{"id": "md-1", "name": "constitucional.md"}]
        })))
        .mount(&app.provider)
        .await;
    Mock::given(method("GET"))
        .and(path("/drive/v3/files/md-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("# Direito Constitucional"))
        .mount(&app.provider)
        .await;

    let list = app
        .get("/api/drive/materials?folderId=folder-1", Some(&session))
        .await;
    assert_eq!(json_body(list).await["files"][0]["name"], "constitucional.md");

    let content = app.get("/api/drive/materials/md-1", Some(&session)).await;
    assert_eq!(
        json_body(content).await["content"],
        "# Direito Constitucional"
    );
}
