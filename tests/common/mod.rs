// Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use http_body_util::BodyExt;
use serde_json::Value;

use service_mcp_gateway::auth::{AuthError, TokenProvider};
use service_mcp_gateway::config::Settings;
use service_mcp_gateway::state::AppState;

pub const TEST_TOKEN: &str = "test-access-token";

/// Token source that hands out a fixed token, or always fails.
pub struct StaticTokenProvider {
    token: Option<String>,
    calls: AtomicUsize,
}

impl StaticTokenProvider {
    pub fn ok() -> Arc<Self> {
        Arc::new(Self { token: Some(TEST_TOKEN.to_string()), calls: AtomicUsize::new(0) })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { token: None, calls: AtomicUsize::new(0) })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn get_token(&self, _scopes: Option<&[String]>) -> Result<String, AuthError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token
            .clone()
            .ok_or_else(|| AuthError::Configuration("no credential available".to_string()))
    }
}

pub fn settings(backend_url: &str) -> Settings {
    let mut settings = Settings::default();
    settings.server.backend_api_url = backend_url.trim_end_matches('/').to_string();
    settings.server.backend_api_timeout = 2;
    settings
}

pub fn state_with(settings: Settings, provider: Arc<dyn TokenProvider>) -> AppState {
    AppState::with_token_provider(settings, provider).unwrap()
}

pub fn state(backend_url: &str) -> AppState {
    state_with(settings(backend_url), StaticTokenProvider::ok())
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

pub fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

/// Collect a response body into a `serde_json::Value`.
pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}
