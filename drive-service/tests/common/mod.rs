#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, Request, Response, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Form, Json, Router,
};
use drive_service::config::{
    DriveSettings, GoogleSettings, ServerSettings, Settings, TelemetrySettings,
    DRIVE_READONLY_SCOPE,
};
use drive_service::startup::build_router;
use drive_service::AppState;
use http_body_util::BodyExt;
use secrecy::Secret;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

pub const GOOD_CODE: &str = "good-code";
pub const FIRST_ACCESS_TOKEN: &str = "access-1";
pub const REFRESHED_ACCESS_TOKEN: &str = "access-2";
pub const GOOGLE_DOC: &str = "application/vnd.google-apps.document";
pub const FOLDER: &str = "application/vnd.google-apps.folder";

/// What the fake Google endpoints serve and what they have been asked.
pub struct MockState {
    /// Folder id -> pages of child entries.
    pub folders: HashMap<String, Vec<Vec<Value>>>,
    pub contents: HashMap<String, Vec<u8>>,
    pub exports: HashMap<String, Vec<u8>>,
    /// Exact `q` -> search hits.
    pub search: HashMap<String, Vec<Value>>,
    pub valid_token: String,
    pub expires_in: i64,
    pub refresh_revoked: bool,
    /// Answer refresh grants with 503.
    pub refresh_unavailable: bool,
    pub token_grants: Vec<String>,
    pub drive_calls: Vec<String>,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            folders: HashMap::new(),
            contents: HashMap::new(),
            exports: HashMap::new(),
            search: HashMap::new(),
            valid_token: FIRST_ACCESS_TOKEN.to_string(),
            expires_in: 3600,
            refresh_revoked: false,
            refresh_unavailable: false,
            token_grants: Vec::new(),
            drive_calls: Vec::new(),
        }
    }
}

type Shared = Arc<Mutex<MockState>>;

pub struct MockGoogle {
    pub base_url: String,
    pub state: Shared,
}

impl MockGoogle {
    pub async fn start() -> Self {
        let state: Shared = Arc::new(Mutex::new(MockState::default()));

        let router = Router::new()
            .route("/token", post(token))
            .route("/drive/v3/files", get(list_files))
            .route("/drive/v3/files/:id", get(download))
            .route("/drive/v3/files/:id/export", get(export))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind mock Google listener");
        let address = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.ok();
        });

        Self {
            base_url: format!("http://{}", address),
            state,
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn drive_calls(&self) -> Vec<String> {
        self.with(|s| s.drive_calls.clone())
    }

    pub fn token_grants(&self) -> Vec<String> {
        self.with(|s| s.token_grants.clone())
    }
}

pub fn entry(id: &str, name: &str, mime_type: &str) -> Value {
    json!({ "id": id, "name": name, "mimeType": mime_type })
}

async fn token(State(mock): State<Shared>, Form(form): Form<HashMap<String, String>>) -> Response<Body> {
    grant(&mut mock.lock().unwrap(), &form)
}

fn grant(state: &mut MockState, form: &HashMap<String, String>) -> Response<Body> {
    let grant_type = form.get("grant_type").cloned().unwrap_or_default();
    state.token_grants.push(grant_type.clone());

    let invalid_grant = || {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant" })),
        )
            .into_response()
    };

    if form.get("client_id").map(String::as_str) != Some("test-client") {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid_client" })),
        )
            .into_response();
    }

    match grant_type.as_str() {
        "authorization_code" if form.get("code").map(String::as_str) == Some(GOOD_CODE) => {
            state.valid_token = FIRST_ACCESS_TOKEN.to_string();
            Json(json!({
                "access_token": FIRST_ACCESS_TOKEN,
                "refresh_token": "refresh-1",
                "expires_in": state.expires_in,
                "token_type": "Bearer",
                "scope": DRIVE_READONLY_SCOPE,
            }))
            .into_response()
        }
        "refresh_token" if state.refresh_unavailable => {
            (StatusCode::SERVICE_UNAVAILABLE, "backendError").into_response()
        }
        "refresh_token" if !state.refresh_revoked => {
            state.valid_token = REFRESHED_ACCESS_TOKEN.to_string();
            Json(json!({
                "access_token": REFRESHED_ACCESS_TOKEN,
                "expires_in": 3600,
                "token_type": "Bearer",
            }))
            .into_response()
        }
        _ => invalid_grant(),
    }
}

fn authorized(state: &MockState, headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {}", state.valid_token);
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        == Some(expected.as_str())
}

async fn list_files(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response<Body> {
    list(&mut mock.lock().unwrap(), &headers, &params)
}

fn list(state: &mut MockState, headers: &HeaderMap, params: &HashMap<String, String>) -> Response<Body> {
    if !authorized(state, headers) {
        return (StatusCode::UNAUTHORIZED, "Invalid Credentials").into_response();
    }
    if params.get("corpora").map(String::as_str) != Some("allDrives") {
        return (StatusCode::BAD_REQUEST, "corpora must be allDrives").into_response();
    }

    let q = params.get("q").cloned().unwrap_or_default();
    let page_token = params.get("pageToken").cloned();
    state.drive_calls.push(match &page_token {
        Some(token) => format!("list {} [{}]", q, token),
        None => format!("list {}", q),
    });

    let folder_id = q
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix("' in parents and trashed=false"));
    if let Some(folder_id) = folder_id {
        let pages = state.folders.get(folder_id).cloned().unwrap_or_default();
        let index = page_token
            .as_deref()
            .and_then(|token| token.strip_prefix("page-"))
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);

        let mut body = json!({ "files": pages.get(index).cloned().unwrap_or_default() });
        if index + 1 < pages.len() {
            body["nextPageToken"] = json!(format!("page-{}", index + 1));
        }
        return Json(body).into_response();
    }

    if q.contains("explode") {
        return (StatusCode::INTERNAL_SERVER_ERROR, "backendError").into_response();
    }

    let files = state.search.get(&q).cloned().unwrap_or_default();
    Json(json!({ "files": files })).into_response()
}

async fn download(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response<Body> {
    let mut state = mock.lock().unwrap();
    if !authorized(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, "Invalid Credentials").into_response();
    }
    state.drive_calls.push(format!("download {}", id));
    if params.get("alt").map(String::as_str) != Some("media") {
        return (StatusCode::BAD_REQUEST, "expected alt=media").into_response();
    }
    match state.contents.get(&id) {
        Some(bytes) => bytes.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "File not found").into_response(),
    }
}

async fn export(
    State(mock): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response<Body> {
    let mut state = mock.lock().unwrap();
    if !authorized(&state, &headers) {
        return (StatusCode::UNAUTHORIZED, "Invalid Credentials").into_response();
    }
    state.drive_calls.push(format!("export {}", id));
    if params.get("mimeType").map(String::as_str) != Some("application/pdf") {
        return (StatusCode::BAD_REQUEST, "unsupported export type").into_response();
    }
    match state.exports.get(&id) {
        Some(bytes) => bytes.clone().into_response(),
        None => (StatusCode::NOT_FOUND, "File not found").into_response(),
    }
}

pub fn test_settings(google_base: &str, download_dir: &std::path::Path) -> Settings {
    Settings {
        server: ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            secure_cookies: false,
            session_ttl_hours: 1,
        },
        google: GoogleSettings {
            client_id: "test-client".to_string(),
            client_secret: Secret::new("test-secret".to_string()),
            api_key: Secret::new("test-api-key".to_string()),
            redirect_uri: "http://localhost:8000/oauth2callback".to_string(),
            auth_uri: format!("{}/auth", google_base),
            token_uri: Some(format!("{}/token", google_base)),
            scopes: vec![DRIVE_READONLY_SCOPE.to_string()],
        },
        drive: DriveSettings {
            api_base: format!("{}/drive/v3", google_base),
            download_dir: download_dir.to_path_buf(),
            allowed_mime_types: vec!["text/plain".to_string(), "application/pdf".to_string()],
            export_mime_types: vec![GOOGLE_DOC.to_string()],
            search_page_size: 50,
            request_timeout_secs: 5,
        },
        telemetry: TelemetrySettings::default(),
    }
}

/// The service under test plus a cookie jar holding one browser session.
pub struct TestApp {
    pub router: Router,
    pub google: MockGoogle,
    pub download_dir: TempDir,
    cookie: Option<String>,
}

impl TestApp {
    pub async fn spawn() -> Self {
        let google = MockGoogle::start().await;
        let download_dir = TempDir::new().expect("Failed to create download dir");
        let settings = test_settings(&google.base_url, download_dir.path());
        let state = AppState::new(settings).expect("Failed to build app state");

        Self {
            router: build_router(state),
            google,
            download_dir,
            cookie: None,
        }
    }

    /// Runs login and callback against the mock provider.
    pub async fn spawn_signed_in() -> Self {
        let mut app = Self::spawn().await;
        app.sign_in().await;
        app
    }

    pub async fn send(&mut self, mut request: Request<Body>) -> Response<Body> {
        if let Some(cookie) = &self.cookie {
            request
                .headers_mut()
                .insert(header::COOKIE, cookie.parse().unwrap());
        }

        let response = self.router.clone().oneshot(request).await.unwrap();

        if let Some(set_cookie) = response
            .headers()
            .get(header::SET_COOKIE)
            .and_then(|value| value.to_str().ok())
        {
            let pair = set_cookie.split(';').next().unwrap_or_default().to_string();
            self.cookie = Some(pair);
        }

        response
    }

    pub async fn get(&mut self, uri: &str) -> Response<Body> {
        self.send(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&mut self, uri: &str, body: impl Into<String>) -> Response<Body> {
        self.send(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.into()))
                .unwrap(),
        )
        .await
    }

    /// Follows `/login` and returns the `state` it handed to the provider.
    pub async fn begin_login(&mut self) -> String {
        let response = self.get("/login").await;
        assert!(response.status().is_redirection());
        let location = location(&response);
        reqwest::Url::parse(&location)
            .unwrap()
            .query_pairs()
            .find(|(key, _)| key == "state")
            .map(|(_, value)| value.into_owned())
            .expect("login redirect carries a state parameter")
    }

    pub async fn sign_in(&mut self) {
        let state = self.begin_login().await;
        let response = self
            .get(&format!("/oauth2callback?code={}&state={}", GOOD_CODE, state))
            .await;
        assert!(response.status().is_redirection());
        assert_eq!(location(&response), "/");
    }
}

pub fn location(response: &Response<Body>) -> String {
    response
        .headers()
        .get(header::LOCATION)
        .expect("redirect has a location")
        .to_str()
        .unwrap()
        .to_string()
}

pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
