// src/logging.rs
// Tracing subscriber setup and per-request span helpers.

use axum::http::Request;
use tracing::Span;
use tracing_subscriber::EnvFilter;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Output format for the fmt subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    /// `LOG_FORMAT=json` or `RUST_LOG_FORMAT=json` select JSON lines.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let wants_json = ["LOG_FORMAT", "RUST_LOG_FORMAT"]
            .iter()
            .filter_map(|key| lookup(key))
            .any(|v| v.trim().eq_ignore_ascii_case("json"));
        if wants_json { Self::Json } else { Self::Text }
    }
}

/// `RUST_LOG` wins; otherwise the configured level (e.g. `INFO`) applies.
pub fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level.trim().to_ascii_lowercase()))
}

/// Install the global subscriber. Safe to call twice; the second call is a no-op.
pub fn init_tracing(default_level: &str) {
    let env_filter = env_filter(default_level);
    let format = LogFormat::from_lookup(|key| std::env::var(key).ok());
    let installed = match format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .try_init(),
        LogFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .try_init(),
    };
    if installed.is_ok() {
        tracing::debug!(?format, "tracing initialized");
    }
}

/// Span for one HTTP request, tagged with the `X-Request-Id` set upstream.
pub fn request_span<B>(request: &Request<B>) -> Span {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");
    tracing::info_span!(
        "http_request",
        method = %request.method(),
        uri = %request.uri(),
        request_id = %request_id,
    )
}
