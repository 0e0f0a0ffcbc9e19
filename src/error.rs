// ---------------------------------------------------------------------------
// error.rs: gateway error model shared by the REST and MCP surfaces
// ---------------------------------------------------------------------------

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::auth::AuthError;

/// Errors raised while translating a tool call into a backend request.
///
/// Every variant carries a human-readable message plus optional structured
/// details. The same value renders as an HTTP response (REST surface) or as
/// an `isError` tool result (MCP surface), always with this body:
/// ```json
/// { "error": "SERVICE_ERROR", "message": "Service error: 503", "details": { ... } }
/// ```
#[derive(Debug, Clone, thiserror::Error)]
pub enum GatewayError {
    #[error("{message}")]
    Validation { message: String, details: Map<String, Value> },

    #[error("{message}")]
    Authentication { message: String, details: Map<String, Value> },

    #[error("{message}")]
    Service { message: String, details: Map<String, Value> },

    #[error("{message}")]
    Timeout { message: String, details: Map<String, Value> },

    #[error("{message}")]
    NotFound { message: String, details: Map<String, Value> },

    #[error("{message}")]
    Internal { message: String, details: Map<String, Value> },
}

/// Wire shape of a gateway error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorBody {
    /// Machine-readable error code, e.g. `VALIDATION_ERROR`.
    pub error: String,
    pub message: String,
    #[serde(default)]
    #[schema(value_type = Object)]
    pub details: Map<String, Value>,
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into(), details: Map::new() }
    }

    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication { message: message.into(), details: Map::new() }
    }

    pub fn service(message: impl Into<String>) -> Self {
        Self::Service { message: message.into(), details: Map::new() }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout { message: message.into(), details: Map::new() }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound { message: message.into(), details: Map::new() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal { message: message.into(), details: Map::new() }
    }

    /// Attach structured details. Non-object values are stored under `"value"`.
    pub fn with_details(mut self, details: Value) -> Self {
        let map = match details {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let mut map = Map::new();
                map.insert("value".to_string(), other);
                map
            }
        };
        match &mut self {
            Self::Validation { details, .. }
            | Self::Authentication { details, .. }
            | Self::Service { details, .. }
            | Self::Timeout { details, .. }
            | Self::NotFound { details, .. }
            | Self::Internal { details, .. } => *details = map,
        }
        self
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Authentication { .. } => "AUTHENTICATION_ERROR",
            Self::Service { .. } => "SERVICE_ERROR",
            Self::Timeout { .. } => "TIMEOUT_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation { .. } => StatusCode::BAD_REQUEST,
            Self::Authentication { .. } => StatusCode::UNAUTHORIZED,
            Self::Service { .. } => StatusCode::BAD_GATEWAY,
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::Validation { message, .. }
            | Self::Authentication { message, .. }
            | Self::Service { message, .. }
            | Self::Timeout { message, .. }
            | Self::NotFound { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }

    pub fn details(&self) -> &Map<String, Value> {
        match self {
            Self::Validation { details, .. }
            | Self::Authentication { details, .. }
            | Self::Service { details, .. }
            | Self::Timeout { details, .. }
            | Self::NotFound { details, .. }
            | Self::Internal { details, .. } => details,
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            error: self.code().to_string(),
            message: self.message().to_string(),
            details: self.details().clone(),
        }
    }
}

impl From<AuthError> for GatewayError {
    fn from(error: AuthError) -> Self {
        GatewayError::authentication(format!("Authentication failed: {error}"))
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), "gateway error ({}): {}", status.as_u16(), self);
        } else {
            tracing::warn!(code = self.code(), "gateway error ({}): {}", status.as_u16(), self);
        }
        (status, Json(json!(self.to_body()))).into_response()
    }
}
