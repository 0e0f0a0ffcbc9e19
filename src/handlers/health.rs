// ---------------------------------------------------------------------------
// handlers/health.rs: root banner, liveness and readiness probes
// ---------------------------------------------------------------------------

use std::collections::BTreeMap;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use serde_json::{Value, json};

use crate::models::{HealthResponse, ServiceInfo};
use crate::state::AppState;

pub const SERVICE_NAME: &str = "mcp-server";

const HEALTHY: &str = "healthy";
const UNHEALTHY: &str = "unhealthy";

#[utoipa::path(get, path = "/", tag = "health",
    responses((status = 200, description = "Service banner", body = ServiceInfo))
)]
pub async fn root() -> Json<ServiceInfo> {
    Json(ServiceInfo {
        service: SERVICE_NAME.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
    })
}

/// GET /health: plain probe for load balancers.
#[utoipa::path(get, path = "/health", tag = "health",
    responses((status = 200, description = "Process is up", body = Value))
)]
pub async fn health() -> Json<Value> {
    Json(json!({ "status": HEALTHY }))
}

#[utoipa::path(get, path = "/health/live", tag = "health",
    responses((status = 200, description = "Liveness probe", body = HealthResponse))
)]
pub async fn liveness(State(state): State<AppState>) -> Json<HealthResponse> {
    tracing::debug!(uptime_secs = state.uptime_secs(), "liveness probe");
    Json(HealthResponse {
        status: "alive".to_string(),
        timestamp: Utc::now(),
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        dependencies: BTreeMap::new(),
    })
}

/// GET /health/ready: verifies Azure auth and, when enabled, the backend.
#[utoipa::path(get, path = "/health/ready", tag = "health",
    responses(
        (status = 200, description = "All dependencies healthy", body = HealthResponse),
        (status = 503, description = "At least one dependency unhealthy", body = HealthResponse)
    )
)]
pub async fn readiness(State(state): State<AppState>) -> Response {
    let check_backend = state.settings.server.readiness_check_backend;

    let (auth_ok, backend_ok) = tokio::join!(state.token_provider.validate_authentication(), async {
        if check_backend {
            Some(state.rest.health_check().await)
        } else {
            None
        }
    });

    let mut dependencies = BTreeMap::new();
    dependencies.insert("azure_auth".to_string(), status_label(auth_ok));
    if let Some(ok) = backend_ok {
        dependencies.insert("backend".to_string(), status_label(ok));
    }

    let ready = dependencies.values().all(|s| s == HEALTHY);
    if !ready {
        tracing::warn!(?dependencies, "readiness check failed");
    }

    let body = HealthResponse {
        status: if ready { "ready" } else { "not_ready" }.to_string(),
        timestamp: Utc::now(),
        service_version: env!("CARGO_PKG_VERSION").to_string(),
        dependencies,
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

fn status_label(ok: bool) -> String {
    if ok { HEALTHY } else { UNHEALTHY }.to_string()
}
