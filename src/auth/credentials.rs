// ---------------------------------------------------------------------------
// auth/credentials.rs: Azure AD token strategies
// ---------------------------------------------------------------------------
//
// Workload Identity and Service Principal both exchange a client credential
// at the AAD v2 token endpoint. The default chain falls back to managed
// identity and then to a logged-in Azure CLI.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use reqwest::Client;
use serde_json::Value;

use super::{AccessToken, AuthError, TokenCredential};
use crate::config::AzureSettings;

const JWT_BEARER_ASSERTION: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";
const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const IMDS_TIMEOUT: Duration = Duration::from_secs(3);
const CLI_TIMEOUT: Duration = Duration::from_secs(10);
const IMDS_API_VERSION: &str = "2018-02-01";
const APP_SERVICE_API_VERSION: &str = "2019-08-01";

pub(crate) fn token_endpoint(settings: &AzureSettings) -> String {
    format!(
        "{}/{}/oauth2/v2.0/token",
        settings.authority_host.trim_end_matches('/'),
        settings.tenant_id
    )
}

/// `https://management.azure.com/.default` -> `https://management.azure.com`.
pub(crate) fn scope_to_resource(scope: &str) -> String {
    scope
        .strip_suffix("/.default")
        .unwrap_or(scope)
        .to_string()
}

// ── Workload Identity ───────────────────────────────────────────────────────

/// AKS Workload Identity: the federated token projected into the pod is
/// exchanged for an AAD token via a JWT-bearer client assertion.
pub struct WorkloadIdentityCredential {
    http: Client,
    token_endpoint: String,
    client_id: String,
    token_file: PathBuf,
}

impl WorkloadIdentityCredential {
    pub fn new(http: Client, settings: &AzureSettings) -> Self {
        Self {
            http,
            token_endpoint: token_endpoint(settings),
            client_id: settings.client_id.clone(),
            token_file: settings.federated_token_file.clone(),
        }
    }
}

#[async_trait]
impl TokenCredential for WorkloadIdentityCredential {
    fn name(&self) -> &'static str {
        "WorkloadIdentityCredential"
    }

    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, AuthError> {
        // Re-read on every exchange: the projected token is rotated in place.
        let assertion = tokio::fs::read_to_string(&self.token_file)
            .await
            .map_err(|e| {
                AuthError::Configuration(format!(
                    "cannot read federated token file {}: {e}",
                    self.token_file.display()
                ))
            })?;
        let scope = scopes.join(" ");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_assertion_type", JWT_BEARER_ASSERTION),
            ("client_assertion", assertion.trim()),
            ("scope", scope.as_str()),
        ];
        request_aad_token(&self.http, &self.token_endpoint, &form).await
    }
}

// ── Service Principal ───────────────────────────────────────────────────────

/// Client secret grant, used for local development and CI.
pub struct ClientSecretCredential {
    http: Client,
    token_endpoint: String,
    client_id: String,
    client_secret: String,
}

impl ClientSecretCredential {
    pub fn new(http: Client, settings: &AzureSettings) -> Self {
        Self {
            http,
            token_endpoint: token_endpoint(settings),
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone().unwrap_or_default(),
        }
    }
}

#[async_trait]
impl TokenCredential for ClientSecretCredential {
    fn name(&self) -> &'static str {
        "ClientSecretCredential"
    }

    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, AuthError> {
        let scope = scopes.join(" ");
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.client_id.as_str()),
            ("client_secret", self.client_secret.as_str()),
            ("scope", scope.as_str()),
        ];
        request_aad_token(&self.http, &self.token_endpoint, &form).await
    }
}

/// POST a form to the AAD token endpoint and parse the answer.
async fn request_aad_token(
    http: &Client,
    endpoint: &str,
    form: &[(&str, &str)],
) -> Result<AccessToken, AuthError> {
    let response = http
        .post(endpoint)
        .form(form)
        .timeout(TOKEN_REQUEST_TIMEOUT)
        .send()
        .await?;

    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        let message = body
            .get("error_description")
            .or_else(|| body.get("error"))
            .and_then(|v| v.as_str())
            .unwrap_or("no error description")
            .to_string();
        return Err(AuthError::TokenRequest { status: status.as_u16(), message });
    }

    parse_token_response(&body, "access_token")
}

// ── Managed Identity ────────────────────────────────────────────────────────

enum ManagedIdentitySource {
    /// App Service / Container Apps (`IDENTITY_ENDPOINT` + `IDENTITY_HEADER`).
    AppService { endpoint: String, header: String },
    /// VM / VMSS instance metadata service.
    Imds { endpoint: String },
}

pub struct ManagedIdentityCredential {
    http: Client,
    client_id: Option<String>,
    source: ManagedIdentitySource,
}

impl ManagedIdentityCredential {
    pub fn new(http: Client, settings: &AzureSettings) -> Self {
        let source = match (&settings.identity_endpoint, &settings.identity_header) {
            (Some(endpoint), Some(header)) => ManagedIdentitySource::AppService {
                endpoint: endpoint.clone(),
                header: header.clone(),
            },
            _ => ManagedIdentitySource::Imds { endpoint: settings.imds_endpoint.clone() },
        };
        Self {
            http,
            client_id: Some(settings.client_id.clone()).filter(|id| !id.is_empty()),
            source,
        }
    }
}

#[async_trait]
impl TokenCredential for ManagedIdentityCredential {
    fn name(&self) -> &'static str {
        "ManagedIdentityCredential"
    }

    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, AuthError> {
        let scope = scopes.first().ok_or(AuthError::NoScopes)?;
        let resource = scope_to_resource(scope);

        let mut query: Vec<(&str, &str)> = vec![("resource", resource.as_str())];
        if let Some(client_id) = &self.client_id {
            query.push(("client_id", client_id.as_str()));
        }

        let request = match &self.source {
            ManagedIdentitySource::AppService { endpoint, header } => {
                query.push(("api-version", APP_SERVICE_API_VERSION));
                self.http
                    .get(endpoint)
                    .header("X-IDENTITY-HEADER", header)
                    .timeout(TOKEN_REQUEST_TIMEOUT)
            }
            ManagedIdentitySource::Imds { endpoint } => {
                query.push(("api-version", IMDS_API_VERSION));
                self.http
                    .get(endpoint)
                    .header("Metadata", "true")
                    .timeout(IMDS_TIMEOUT)
            }
        };

        let response = request.query(&query).send().await?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(AuthError::TokenRequest { status: status.as_u16(), message: text });
        }
        let body: Value = response.json().await?;
        parse_token_response(&body, "access_token")
    }
}

// ── Azure CLI ───────────────────────────────────────────────────────────────

pub struct AzureCliCredential {
    tenant_id: Option<String>,
}

impl AzureCliCredential {
    pub fn new(settings: &AzureSettings) -> Self {
        Self {
            tenant_id: Some(settings.tenant_id.clone()).filter(|t| !t.is_empty()),
        }
    }
}

#[async_trait]
impl TokenCredential for AzureCliCredential {
    fn name(&self) -> &'static str {
        "AzureCliCredential"
    }

    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, AuthError> {
        let scope = scopes.first().ok_or(AuthError::NoScopes)?;
        let resource = scope_to_resource(scope);

        let program = if cfg!(windows) { "az.cmd" } else { "az" };
        let mut command = tokio::process::Command::new(program);
        command.args(["account", "get-access-token", "--output", "json", "--resource", resource.as_str()]);
        if let Some(tenant) = &self.tenant_id {
            command.args(["--tenant", tenant.as_str()]);
        }
        command.kill_on_drop(true);

        let output = tokio::time::timeout(CLI_TIMEOUT, command.output())
            .await
            .map_err(|_| AuthError::CliFailed(format!("timed out after {}s", CLI_TIMEOUT.as_secs())))?
            .map_err(|e| AuthError::CliFailed(format!("could not run '{program}': {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AuthError::CliFailed(stderr.trim().to_string()));
        }

        let body: Value = serde_json::from_slice(&output.stdout)?;
        parse_cli_output(&body)
    }
}

/// `az account get-access-token` output. Newer CLIs add an `expires_on`
/// unix timestamp; older ones only give a local-time `expiresOn`.
pub(crate) fn parse_cli_output(body: &Value) -> Result<AccessToken, AuthError> {
    let token = body
        .get("accessToken")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AuthError::InvalidResponse("missing accessToken".into()))?
        .to_string();

    if let Some(ts) = body.get("expires_on").and_then(as_i64)
        && let Some(expires_on) = DateTime::from_timestamp(ts, 0)
    {
        return Ok(AccessToken { token, expires_on });
    }

    let raw = body
        .get("expiresOn")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AuthError::InvalidResponse("missing expiresOn".into()))?;
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .map_err(|e| AuthError::InvalidResponse(format!("bad expiresOn '{raw}': {e}")))?;
    let expires_on = Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .ok_or_else(|| AuthError::InvalidResponse(format!("ambiguous expiresOn '{raw}'")))?;

    Ok(AccessToken { token, expires_on })
}

// ── Default chain ───────────────────────────────────────────────────────────

/// Tries each credential in order; the first success wins.
pub struct DefaultAzureCredential {
    chain: Vec<Arc<dyn TokenCredential>>,
}

impl DefaultAzureCredential {
    pub fn new(http: Client, settings: &AzureSettings) -> Self {
        let chain: Vec<Arc<dyn TokenCredential>> = vec![
            Arc::new(ManagedIdentityCredential::new(http, settings)),
            Arc::new(AzureCliCredential::new(settings)),
        ];
        Self::from_chain(chain)
    }

    pub fn from_chain(chain: Vec<Arc<dyn TokenCredential>>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl TokenCredential for DefaultAzureCredential {
    fn name(&self) -> &'static str {
        "DefaultAzureCredential"
    }

    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, AuthError> {
        let mut failures = Vec::with_capacity(self.chain.len());
        for credential in &self.chain {
            match credential.get_token(scopes).await {
                Ok(token) => {
                    tracing::debug!("default chain: token acquired via {}", credential.name());
                    return Ok(token);
                }
                Err(e) => {
                    tracing::debug!("default chain: {} unavailable: {}", credential.name(), e);
                    failures.push(format!("{}: {}", credential.name(), e));
                }
            }
        }
        Err(AuthError::Unavailable(failures))
    }
}

// ── Token response parsing ──────────────────────────────────────────────────

/// Parse an AAD / managed identity token body. `expires_on` (unix seconds)
/// wins over `expires_in` (seconds from now). Either may be a number or a
/// numeric string. Without either the token is treated as already expiring.
pub(crate) fn parse_token_response(body: &Value, token_field: &str) -> Result<AccessToken, AuthError> {
    let token = body
        .get(token_field)
        .and_then(|v| v.as_str())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AuthError::InvalidResponse(format!("missing {token_field}")))?
        .to_string();

    let now = Utc::now();
    let expires_on = body
        .get("expires_on")
        .and_then(as_i64)
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .or_else(|| {
            body.get("expires_in")
                .and_then(as_i64)
                .map(|secs| now + chrono::Duration::seconds(secs))
        })
        .unwrap_or(now);

    Ok(AccessToken { token, expires_on })
}

fn as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scope_to_resource() {
        assert_eq!(
            scope_to_resource("https://management.azure.com/.default"),
            "https://management.azure.com"
        );
        assert_eq!(scope_to_resource("api://backend"), "api://backend");
    }

    #[test]
    fn test_token_endpoint() {
        let settings = AzureSettings {
            tenant_id: "tenant-1".into(),
            authority_host: "https://login.example.com/".into(),
            ..Default::default()
        };
        assert_eq!(
            token_endpoint(&settings),
            "https://login.example.com/tenant-1/oauth2/v2.0/token"
        );
    }

    #[test]
    fn test_parse_token_response_expires_in() {
        let before = Utc::now();
        let token = parse_token_response(
            &json!({ "access_token": "abc", "expires_in": 3600, "token_type": "Bearer" }),
            "access_token",
        )
        .unwrap();
        assert_eq!(token.token, "abc");
        assert!(token.expires_on >= before + chrono::Duration::seconds(3599));
    }

    #[test]
    fn test_parse_token_response_expires_on_string() {
        let token = parse_token_response(
            &json!({ "access_token": "abc", "expires_on": "1700000000", "expires_in": "86399" }),
            "access_token",
        )
        .unwrap();
        assert_eq!(token.expires_on.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_token_response_requires_token() {
        let err = parse_token_response(&json!({ "expires_in": 10 }), "access_token").unwrap_err();
        assert!(matches!(err, AuthError::InvalidResponse(_)));
    }

    #[test]
    fn test_parse_cli_output_prefers_unix_timestamp() {
        let token = parse_cli_output(&json!({
            "accessToken": "cli-token",
            "expiresOn": "2024-01-01 10:00:00.000000",
            "expires_on": 1_704_103_200,
        }))
        .unwrap();
        assert_eq!(token.token, "cli-token");
        assert_eq!(token.expires_on.timestamp(), 1_704_103_200);
    }

    #[test]
    fn test_parse_cli_output_local_time() {
        let token = parse_cli_output(&json!({
            "accessToken": "cli-token",
            "expiresOn": "2030-06-01 12:30:00.123456",
        }))
        .unwrap();
        assert_eq!(token.expires_on.date_naive().format("%Y").to_string(), "2030");
    }
}
