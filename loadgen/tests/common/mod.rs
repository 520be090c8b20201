//! Common Test Utilities for Integration Tests
//!
//! Runs an in-process mock of the API gateway on an ephemeral port and
//! records every request it receives.

#![allow(dead_code)]

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use gateway_loadgen::GatewayClient;
use serde_json::{Value, json};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// One request observed by the mock gateway
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Option<Value>,
}

/// Canned responses of the mock gateway
#[derive(Debug, Clone)]
pub struct MockBehavior {
    pub login_status: StatusCode,
    pub login_body: Value,
    pub refresh_body: Value,
    pub logout_status: StatusCode,
}

impl Default for MockBehavior {
    fn default() -> Self {
        Self {
            login_status: StatusCode::OK,
            login_body: json!({"access_token": "A", "refresh_token": "R", "token_type": "bearer"}),
            refresh_body: json!({"access_token": "A2", "refresh_token": "R2"}),
            logout_status: StatusCode::OK,
        }
    }
}

impl MockBehavior {
    pub fn rejecting_login() -> Self {
        Self {
            login_status: StatusCode::UNAUTHORIZED,
            login_body: json!({"detail": "Invalid credentials"}),
            ..Default::default()
        }
    }
}

#[derive(Default)]
struct Recorder {
    calls: Vec<RecordedCall>,
    registered: HashSet<String>,
}

#[derive(Clone)]
struct MockState {
    behavior: Arc<MockBehavior>,
    recorder: Arc<Mutex<Recorder>>,
}

/// Handle to a running mock gateway
pub struct MockGateway {
    pub base_url: String,
    recorder: Arc<Mutex<Recorder>>,
}

impl MockGateway {
    pub async fn start() -> Self {
        Self::start_with(MockBehavior::default()).await
    }

    pub async fn start_with(behavior: MockBehavior) -> Self {
        let recorder = Arc::new(Mutex::new(Recorder::default()));
        let state = MockState {
            behavior: Arc::new(behavior),
            recorder: recorder.clone(),
        };
        let app = Router::new().fallback(handle).with_state(state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            recorder,
        }
    }

    pub fn client(&self) -> GatewayClient {
        GatewayClient::new(&self.base_url, Duration::from_secs(5)).unwrap()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.recorder.lock().unwrap().calls.clone()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.method == method && c.path == path)
            .collect()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.calls_to(method, path).len()
    }
}

async fn handle(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_string();
    let body: Option<Value> = serde_json::from_slice(&body).ok();
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let mut recorder = state.recorder.lock().unwrap();
    recorder.calls.push(RecordedCall {
        method: method.clone(),
        path: path.clone(),
        authorization,
        body: body.clone(),
    });

    let behavior = &state.behavior;
    match (method.as_str(), path.as_str()) {
        ("POST", "/api/v1/auth/register") => {
            let username = body
                .as_ref()
                .and_then(|b| b["username"].as_str())
                .unwrap_or_default()
                .to_string();
            if recorder.registered.insert(username) {
                (StatusCode::CREATED, Json(json!({"status": "created"}))).into_response()
            } else {
                (
                    StatusCode::CONFLICT,
                    Json(json!({"detail": "Username already registered"})),
                )
                    .into_response()
            }
        }
        ("POST", "/api/v1/auth/login") => {
            (behavior.login_status, Json(behavior.login_body.clone())).into_response()
        }
        ("POST", "/api/v1/auth/refresh") => {
            (StatusCode::OK, Json(behavior.refresh_body.clone())).into_response()
        }
        ("POST", "/api/v1/auth/logout") => {
            (behavior.logout_status, Json(json!({"status": "logged out"}))).into_response()
        }
        ("GET", "/health")
        | ("PATCH", "/api/v1/users/")
        | ("POST", "/api/v1/users/change_password")
        | ("GET", "/api/v1/users/testrabbit") => {
            (StatusCode::OK, Json(json!({"status": "ok"}))).into_response()
        }
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}
