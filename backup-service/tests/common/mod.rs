#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use axum::Router;
use backup_service::config::{
    BackupConfig, GoogleSettings, SessionSettings, SnapshotSettings,
};
use backup_service::startup::build_router;
use backup_service::AppState;
use secrecy::Secret;
use service_core::config::{Config, Environment};
use tower::ServiceExt;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const SESSION_COOKIE: &str = "backup-session";
pub const TEST_SECRET: &str = "test-session-secret-0123456789abcdef";
pub const FRONTEND_URL: &str = "http://localhost:3000";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub provider: MockServer,
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_modules(&["financas", "sono", "historicoSimulados"]).await
    }

    pub async fn spawn_with_modules(modules: &[&str]) -> Self {
        let provider = MockServer::start().await;
        let config = test_config(&provider.uri(), modules);
        let state = AppState::new(config).expect("Failed to build test state");
        let router = build_router(state.clone());

        Self {
            router,
            state,
            provider,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to execute request")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(build_request("GET", uri, cookie, Body::empty(), None))
            .await
    }

    pub async fn post(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(build_request("POST", uri, cookie, Body::empty(), None))
            .await
    }

    pub async fn post_json(
        &self,
        uri: &str,
        cookie: Option<&str>,
        body: &serde_json::Value,
    ) -> Response<Body> {
        self.send(build_request(
            "POST",
            uri,
            cookie,
            Body::from(body.to_string()),
            Some("application/json"),
        ))
        .await
    }

    pub async fn put_json(&self, uri: &str, body: &serde_json::Value) -> Response<Body> {
        self.send(build_request(
            "PUT",
            uri,
            None,
            Body::from(body.to_string()),
            Some("application/json"),
        ))
        .await
    }

    /// Mount a token endpoint answering the authorization-code grant.
    pub async fn mock_code_exchange(&self, grant: serde_json::Value) {
        Mock::given(method("POST"))
            .and(path("/token"))
            .and(body_string_contains("grant_type=authorization_code"))
            .respond_with(ResponseTemplate::new(200).set_body_json(grant))
            .mount(&self.provider)
            .await;
    }

    /// Run connect and callback, returning the session cookie pair.
    pub async fn connect_drive(&self, expires_in: i64, refresh_token: Option<&str>) -> String {
        let mut grant = serde_json::json!({
            "access_token": "ya29.initial",
            "expires_in": expires_in,
            "token_type": "Bearer",
            "scope": "https://www.googleapis.com/auth/drive.file"
        });
        if let Some(refresh_token) = refresh_token {
            grant["refresh_token"] = serde_json::json!(refresh_token);
        }
        self.mock_code_exchange(grant).await;

        let (state, flow_cookies) = self.start_connect().await;
        let response = self
            .get(
                &format!("/api/auth/google/callback?code=auth-code&state={}", state),
                Some(&flow_cookies),
            )
            .await;

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            location(&response),
            format!("{}/perfil?google_auth=success", FRONTEND_URL)
        );
        cookie_pair(&response, SESSION_COOKIE).expect("callback did not set a session cookie")
    }

    /// Hit connect; returns the `state` sent to the provider and the flow
    /// cookies as a `Cookie` header value.
    pub async fn start_connect(&self) -> (String, String) {
        let response = self.get("/api/auth/google/connect", None).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);

        let url = reqwest::Url::parse(&location(&response)).expect("invalid consent URL");
        let state = url
            .query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .expect("consent URL has no state");

        let cookies = ["oauth_state", "oauth_code_verifier"]
            .iter()
            .filter_map(|name| cookie_pair(&response, name))
            .collect::<Vec<_>>()
            .join("; ");

        (state, cookies)
    }
}

pub fn test_config(provider_uri: &str, modules: &[&str]) -> BackupConfig {
    BackupConfig {
        common: Config {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        environment: Environment::Dev,
        service_name: "backup-service-test".to_string(),
        log_level: "debug".to_string(),
        otlp_endpoint: None,
        session: SessionSettings {
            secret: Secret::new(TEST_SECRET.to_string()),
            cookie_name: SESSION_COOKIE.to_string(),
            max_age_days: 30,
            secure_cookies: false,
        },
        google: GoogleSettings {
            client_id: "test-client".to_string(),
            client_secret: Secret::new("test-client-secret".to_string()),
            redirect_uri: "http://localhost:8080/api/auth/google/callback".to_string(),
            auth_url: format!("{}/o/oauth2/v2/auth", provider_uri),
            token_url: format!("{}/token", provider_uri),
            api_base_url: provider_uri.to_string(),
            scopes: vec!["https://www.googleapis.com/auth/drive.file".to_string()],
            frontend_url: FRONTEND_URL.to_string(),
        },
        backup: SnapshotSettings {
            max_download_bytes: 64 * 1024,
            remote_file_prefix: "app_backup".to_string(),
            export_base_name: "stayfocus_backup".to_string(),
            modules: modules.iter().map(|m| m.to_string()).collect(),
        },
    }
}

fn build_request(
    method: &str,
    uri: &str,
    cookie: Option<&str>,
    body: Body,
    content_type: Option<&str>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    builder.body(body).expect("Failed to build request")
}

/// `name=value` of a non-empty cookie set by the response.
pub fn cookie_pair(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| {
            pair.split_once('=')
                .is_some_and(|(n, value)| n == name && !value.is_empty())
        })
        .map(str::to_string)
}

/// True if the response expires the named cookie.
pub fn cookie_removed(response: &Response<Body>, name: &str) -> bool {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .any(|v| v.starts_with(&format!("{}=", name)) && v.contains("Max-Age=0"))
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("response has no Location header")
        .to_string()
}

pub async fn json_body(response: Response<Body>) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Body is not JSON")
}
