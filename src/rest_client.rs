//! Authenticated pass-through client for the downstream REST backend.
//!
//! Every request carries a bearer token from the shared [`TokenProvider`];
//! transport and status failures are folded into [`GatewayError`] so tool
//! handlers can propagate them with `?`.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde_json::{Value, json};

use crate::auth::TokenProvider;
use crate::config::ServerSettings;
use crate::error::GatewayError;

pub const USER_AGENT: &str = "mcp-server/1.0";

pub struct RestClient {
    base_url: String,
    timeout: Duration,
    http: Client,
    tokens: Arc<dyn TokenProvider>,
}

impl RestClient {
    pub fn new(
        settings: &ServerSettings,
        tokens: Arc<dyn TokenProvider>,
    ) -> Result<Self, reqwest::Error> {
        let timeout = settings.backend_timeout();
        let http = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: settings.backend_api_url.trim_end_matches('/').to_string(),
            timeout,
            http,
            tokens,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// `GET {base_url}{path}` with the given query pairs.
    pub async fn get(&self, path: &str, query: &[(&str, String)]) -> Result<Value, GatewayError> {
        let request = self.http.get(self.url(path)).query(query);
        self.send(path, request).await
    }

    /// `POST {base_url}{path}` with a JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, GatewayError> {
        let request = self.http.post(self.url(path)).json(body);
        self.send(path, request).await
    }

    /// Probe `GET /health`. Any failure counts as unhealthy.
    pub async fn health_check(&self) -> bool {
        match self.get("/health", &[]).await {
            Ok(body) => {
                let healthy = body.get("status").and_then(|s| s.as_str()) == Some("healthy");
                if !healthy {
                    tracing::warn!(body = %body, "backend health check: unexpected status");
                }
                healthy
            }
            Err(e) => {
                tracing::warn!(error = %e, "backend health check failed");
                false
            }
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Value, GatewayError> {
        let token = self.tokens.get_token(None).await?;

        let response = request.bearer_auth(token).send().await.map_err(|e| {
            if e.is_timeout() {
                tracing::error!(path, "backend request timed out");
                GatewayError::timeout(format!("Request to {path} timed out"))
            } else {
                tracing::error!(path, error = %e, "backend request failed");
                GatewayError::service(format!("Request failed: {e}"))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(path, status = status.as_u16(), "backend returned error status");
            return Err(GatewayError::service(format!("Service error: {}", status.as_u16()))
                .with_details(json!({ "status_code": status.as_u16(), "path": path })));
        }

        response.json::<Value>().await.map_err(|e| {
            if e.is_timeout() {
                GatewayError::timeout(format!("Request to {path} timed out"))
            } else {
                GatewayError::service(format!("Request failed: {e}"))
            }
        })
    }
}

/// Percent-encode one path segment taken from tool arguments.
///
/// `.` and `..` are rejected outright: URL parsing collapses dot segments
/// even when they are percent-encoded.
pub fn path_segment(field: &str, value: &str) -> Result<String, GatewayError> {
    if matches!(value, "." | "..") {
        return Err(GatewayError::validation(format!(
            "Invalid {field}: '{value}' is not allowed as a path segment"
        ))
        .with_details(json!({ "field": field })));
    }
    Ok(urlencoding::encode(value).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_path_segment_encoding() {
        assert_eq!(path_segment("user_id", "user-123").unwrap(), "user-123");
        assert_eq!(path_segment("user_id", "a b/c").unwrap(), "a%20b%2Fc");
        assert_eq!(path_segment("user_id", "../admin").unwrap(), "..%2Fadmin");
        assert_eq!(path_segment("user_id", "zoë").unwrap(), "zo%C3%AB");
        assert_eq!(path_segment("user_id", "...").unwrap(), "...");
    }

    #[test]
    fn test_path_segment_rejects_dot_segments() {
        for value in [".", ".."] {
            let err = path_segment("dataset", value).unwrap_err();
            assert_eq!(err.code(), "VALIDATION_ERROR");
            assert_eq!(err.details()["field"], "dataset");
        }
    }
}
