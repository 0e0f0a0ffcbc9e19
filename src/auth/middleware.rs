// auth/middleware.rs
// Optional bearer guard for the tool surfaces.
// If AUTH_SECRET is set, `/mcp` and `/api/tools*` require
// `Authorization: Bearer <secret>`. If not set, the guard is a pass-through.

use axum::Json;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use subtle::ConstantTimeEq;

use crate::state::AppState;

/// Middleware that enforces bearer auth when `AUTH_SECRET` is configured.
/// Health probes and the OpenAPI document are mounted without it.
pub async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some(secret) = state.settings.server.auth_secret.as_deref() else {
        return next.run(request).await;
    };

    let auth_header = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) if token_matches(token, secret) => next.run(request).await,
        Some(_) => {
            tracing::warn!(path = %request.uri().path(), "auth failed: invalid token");
            unauthorized("Invalid bearer token")
        }
        None => {
            tracing::warn!(path = %request.uri().path(), "auth failed: missing or malformed Authorization header");
            unauthorized("Missing bearer token")
        }
    }
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "error": "AUTHENTICATION_ERROR", "message": message, "details": {} })),
    )
        .into_response()
}

fn token_matches(candidate: &str, secret: &str) -> bool {
    candidate.as_bytes().ct_eq(secret.as_bytes()).into()
}
