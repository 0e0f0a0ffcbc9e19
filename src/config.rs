//! Environment-driven settings for the gateway and the client.
//!
//! Values come from the process environment (after `dotenvy` has loaded an
//! optional `.env`). Every loader is written against a lookup function so
//! tests can feed a plain map instead of mutating the real environment.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, bail};

pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";
pub const DEFAULT_FEDERATED_TOKEN_FILE: &str = "/var/run/secrets/azure/tokens/token";
pub const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";
pub const DEFAULT_SCOPE: &str = "https://management.azure.com/.default";

// ── Azure ───────────────────────────────────────────────────────────────────

/// Azure identity settings (`AZURE_*` plus the managed identity variables).
#[derive(Debug, Clone)]
pub struct AzureSettings {
    pub tenant_id: String,
    pub client_id: String,
    pub authority_host: String,
    pub federated_token_file: PathBuf,
    /// Only for local development / CI.
    pub client_secret: Option<String>,
    /// App Service / Container Apps managed identity endpoint.
    pub identity_endpoint: Option<String>,
    pub identity_header: Option<String>,
    pub imds_endpoint: String,
}

impl Default for AzureSettings {
    fn default() -> Self {
        Self {
            tenant_id: String::new(),
            client_id: String::new(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            federated_token_file: PathBuf::from(DEFAULT_FEDERATED_TOKEN_FILE),
            client_secret: None,
            identity_endpoint: None,
            identity_header: None,
            imds_endpoint: DEFAULT_IMDS_ENDPOINT.to_string(),
        }
    }
}

impl AzureSettings {
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            tenant_id: non_empty(&lookup, "AZURE_TENANT_ID").unwrap_or_default(),
            client_id: non_empty(&lookup, "AZURE_CLIENT_ID").unwrap_or_default(),
            authority_host: non_empty(&lookup, "AZURE_AUTHORITY_HOST")
                .map(|h| h.trim_end_matches('/').to_string())
                .unwrap_or(defaults.authority_host),
            federated_token_file: non_empty(&lookup, "AZURE_FEDERATED_TOKEN_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.federated_token_file),
            client_secret: non_empty(&lookup, "AZURE_CLIENT_SECRET"),
            identity_endpoint: non_empty(&lookup, "IDENTITY_ENDPOINT"),
            identity_header: non_empty(&lookup, "IDENTITY_HEADER"),
            imds_endpoint: non_empty(&lookup, "AZURE_IMDS_ENDPOINT")
                .unwrap_or(defaults.imds_endpoint),
        }
    }
}

// ── Server ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub debug: bool,
    pub log_level: String,
    pub backend_api_url: String,
    /// Seconds.
    pub backend_api_timeout: u64,
    /// OAuth scopes requested for downstream calls.
    pub azure_scopes: Vec<String>,
    pub readiness_check_backend: bool,
    pub cors_allowed_origins: Vec<String>,
    /// When set, `/mcp` and `/api/tools*` require `Authorization: Bearer <secret>`.
    pub auth_secret: Option<String>,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            debug: false,
            log_level: "INFO".to_string(),
            backend_api_url: "https://api.example.com".to_string(),
            backend_api_timeout: 10,
            azure_scopes: vec![DEFAULT_SCOPE.to_string()],
            readiness_check_backend: true,
            cors_allowed_origins: Vec::new(),
            auth_secret: None,
        }
    }
}

impl ServerSettings {
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            host: non_empty(&lookup, "HOST").unwrap_or(defaults.host),
            port: parse_or(&lookup, "PORT", defaults.port)?,
            debug: bool_or(&lookup, "DEBUG", defaults.debug)?,
            log_level: non_empty(&lookup, "LOG_LEVEL").unwrap_or(defaults.log_level),
            backend_api_url: http_url_or(&lookup, "BACKEND_API_URL", defaults.backend_api_url)?,
            backend_api_timeout: parse_or(&lookup, "BACKEND_API_TIMEOUT", defaults.backend_api_timeout)?,
            azure_scopes: match non_empty(&lookup, "AZURE_SCOPES") {
                Some(raw) => parse_list(&raw).context("AZURE_SCOPES")?,
                None => defaults.azure_scopes,
            },
            readiness_check_backend: bool_or(
                &lookup,
                "READINESS_CHECK_BACKEND",
                defaults.readiness_check_backend,
            )?,
            cors_allowed_origins: match non_empty(&lookup, "CORS_ALLOWED_ORIGINS") {
                Some(raw) => parse_list(&raw).context("CORS_ALLOWED_ORIGINS")?,
                None => defaults.cors_allowed_origins,
            },
            auth_secret: non_empty(&lookup, "AUTH_SECRET"),
        })
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_api_timeout)
    }
}

// ── Root ────────────────────────────────────────────────────────────────────

/// Gateway settings: Azure identity + server.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    pub azure: AzureSettings,
    pub server: ServerSettings,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            azure: AzureSettings::from_lookup(&lookup),
            server: ServerSettings::from_lookup(&lookup)?,
        })
    }
}

// ── Client ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub mcp_server_url: String,
    pub log_level: String,
    /// Seconds.
    pub request_timeout: u64,
    /// Seconds.
    pub discovery_timeout: u64,
    /// Static bearer token for gateways deployed behind auth.
    pub auth_token: Option<String>,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            mcp_server_url: "http://mcp-server:8000".to_string(),
            log_level: "INFO".to_string(),
            request_timeout: 30,
            discovery_timeout: 10,
            auth_token: None,
        }
    }
}

impl ClientSettings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Ok(Self {
            mcp_server_url: http_url_or(&lookup, "MCP_SERVER_URL", defaults.mcp_server_url)?,
            log_level: non_empty(&lookup, "LOG_LEVEL").unwrap_or(defaults.log_level),
            request_timeout: parse_or(&lookup, "REQUEST_TIMEOUT", defaults.request_timeout)?,
            discovery_timeout: parse_or(&lookup, "DISCOVERY_TIMEOUT", defaults.discovery_timeout)?,
            auth_token: non_empty(&lookup, "MCP_AUTH_TOKEN"),
        })
    }
}

// ── Parsing helpers ─────────────────────────────────────────────────────────

fn non_empty<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(lookup, key) {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {key}: '{raw}'")),
        None => Ok(default),
    }
}

fn bool_or<F>(lookup: &F, key: &str, default: bool) -> anyhow::Result<bool>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = non_empty(lookup, key) else {
        return Ok(default);
    };
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => bail!("invalid boolean for {key}: '{raw}'"),
    }
}

/// An absolute http(s) URL without the trailing slash.
fn http_url_or<F>(lookup: &F, key: &str, default: String) -> anyhow::Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = non_empty(lookup, key) else {
        return Ok(default);
    };
    let parsed = url::Url::parse(&raw).with_context(|| format!("invalid URL for {key}: '{raw}'"))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("{key} must be an http(s) URL, got '{raw}'");
    }
    Ok(raw.trim_end_matches('/').to_string())
}

/// Accepts a JSON array (`["a","b"]`) or a comma / whitespace separated list.
fn parse_list(raw: &str) -> anyhow::Result<Vec<String>> {
    if raw.starts_with('[') {
        let list: Vec<String> = serde_json::from_str(raw).context("expected a JSON list of strings")?;
        return Ok(list);
    }
    Ok(raw
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}
