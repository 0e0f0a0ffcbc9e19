use thiserror::Error;

/// Failures while resolving a credential or acquiring a token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("No scopes provided for token acquisition")]
    NoScopes,
    #[error("Credential configuration error: {0}")]
    Configuration(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("Token request rejected (HTTP {status}): {message}")]
    TokenRequest { status: u16, message: String },
    #[error("Invalid token response: {0}")]
    InvalidResponse(String),
    #[error("Azure CLI failed: {0}")]
    CliFailed(String),
    #[error("No credential in the default chain succeeded: {}", .0.join("; "))]
    Unavailable(Vec<String>),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(error: serde_json::Error) -> Self {
        Self::InvalidResponse(error.to_string())
    }
}
