//! Azure credential resolution.
//!
//! `CredentialManager` picks one strategy by probing the environment, in
//! priority order:
//!
//! 1. **Workload Identity**: federated token file present + tenant/client ids (AKS).
//! 2. **Service Principal**: tenant id, client id and client secret (local dev / CI).
//! 3. **Default chain**: managed identity, then the Azure CLI.
//!
//! The strategy is resolved lazily on first use and kept for the life of the
//! manager. Tokens are cached per scope set until they get close to expiry.

mod credentials;
mod error;
pub mod middleware;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use tokio::sync::{OnceCell, RwLock};

pub use credentials::{
    AzureCliCredential, ClientSecretCredential, DefaultAzureCredential, ManagedIdentityCredential,
    WorkloadIdentityCredential,
};
pub use error::AuthError;

use crate::config::AzureSettings;

/// Cached tokens are refreshed once they are this close to expiry.
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 300;

#[derive(Debug, Clone)]
pub struct AccessToken {
    pub token: String,
    pub expires_on: DateTime<Utc>,
}

impl AccessToken {
    pub fn expires_within(&self, margin: chrono::Duration) -> bool {
        Utc::now() + margin >= self.expires_on
    }
}

/// One way of obtaining an Azure AD token.
#[async_trait]
pub trait TokenCredential: Send + Sync {
    fn name(&self) -> &'static str;

    async fn get_token(&self, scopes: &[String]) -> Result<AccessToken, AuthError>;
}

/// What the REST client and the readiness probe need from the auth layer.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Bearer token for `scopes`, or for the configured default scopes when `None`.
    async fn get_token(&self, scopes: Option<&[String]>) -> Result<String, AuthError>;

    async fn validate_authentication(&self) -> bool {
        match self.get_token(None).await {
            Ok(_) => true,
            Err(e) => {
                tracing::error!("Authentication validation failed: {}", e);
                false
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialKind {
    WorkloadIdentity,
    ServicePrincipal,
    Default,
}

impl std::fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            CredentialKind::WorkloadIdentity => "workload_identity",
            CredentialKind::ServicePrincipal => "service_principal",
            CredentialKind::Default => "default",
        })
    }
}

// ── Environment probing ─────────────────────────────────────────────────────

pub fn is_workload_identity_available(settings: &AzureSettings) -> bool {
    if !settings.federated_token_file.exists() {
        tracing::debug!(
            "Federated token file not found: {}",
            settings.federated_token_file.display()
        );
        return false;
    }
    if settings.tenant_id.is_empty() || settings.client_id.is_empty() {
        tracing::debug!("AZURE_TENANT_ID or AZURE_CLIENT_ID not set");
        return false;
    }
    tracing::debug!("Workload Identity is available");
    true
}

pub fn is_service_principal_available(settings: &AzureSettings) -> bool {
    let has_secret = settings
        .client_secret
        .as_deref()
        .is_some_and(|s| !s.is_empty());
    if settings.tenant_id.is_empty() || settings.client_id.is_empty() || !has_secret {
        tracing::debug!("Service Principal credentials incomplete");
        return false;
    }
    tracing::debug!("Service Principal credentials are available");
    true
}

pub fn select_credential_kind(settings: &AzureSettings) -> CredentialKind {
    if is_workload_identity_available(settings) {
        CredentialKind::WorkloadIdentity
    } else if is_service_principal_available(settings) {
        CredentialKind::ServicePrincipal
    } else {
        CredentialKind::Default
    }
}

fn build_credential(settings: &AzureSettings, http: Client) -> Arc<dyn TokenCredential> {
    match select_credential_kind(settings) {
        CredentialKind::WorkloadIdentity => {
            tracing::info!("Using WorkloadIdentityCredential for Azure auth");
            Arc::new(WorkloadIdentityCredential::new(http, settings))
        }
        CredentialKind::ServicePrincipal => {
            tracing::info!("Using ClientSecretCredential (Service Principal) for Azure auth");
            Arc::new(ClientSecretCredential::new(http, settings))
        }
        CredentialKind::Default => {
            tracing::info!("Using DefaultAzureCredential for Azure auth");
            Arc::new(DefaultAzureCredential::new(http, settings))
        }
    }
}

// ── Credential manager ──────────────────────────────────────────────────────

pub struct CredentialManager {
    settings: AzureSettings,
    scopes: Vec<String>,
    http: Client,
    credential: OnceCell<Arc<dyn TokenCredential>>,
    /// Keyed by the space-joined scope list.
    cache: RwLock<HashMap<String, AccessToken>>,
}

impl CredentialManager {
    pub fn new(settings: AzureSettings, scopes: Vec<String>, http: Client) -> Self {
        Self {
            settings,
            scopes,
            http,
            credential: OnceCell::new(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Skip environment probing and always use `credential`.
    pub fn with_credential(credential: Arc<dyn TokenCredential>, scopes: Vec<String>) -> Self {
        Self {
            settings: AzureSettings::default(),
            scopes,
            http: Client::new(),
            credential: OnceCell::new_with(Some(credential)),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn scopes(&self) -> &[String] {
        &self.scopes
    }

    /// Name of the active strategy, resolving it if needed.
    pub async fn credential_name(&self) -> &'static str {
        self.credential().await.name()
    }

    async fn credential(&self) -> Arc<dyn TokenCredential> {
        self.credential
            .get_or_init(|| async { build_credential(&self.settings, self.http.clone()) })
            .await
            .clone()
    }

    async fn acquire(&self, scopes: Option<&[String]>) -> Result<String, AuthError> {
        let target: &[String] = match scopes {
            Some(requested) if !requested.is_empty() => requested,
            _ => &self.scopes,
        };
        if target.is_empty() {
            return Err(AuthError::NoScopes);
        }

        let key = target.join(" ");
        let margin = chrono::Duration::seconds(TOKEN_REFRESH_MARGIN_SECS);
        if let Some(cached) = self.cache.read().await.get(&key)
            && !cached.expires_within(margin)
        {
            return Ok(cached.token.clone());
        }

        let credential = self.credential().await;
        tracing::debug!(scopes = %key, credential = credential.name(), "Acquiring token");
        let token = credential.get_token(target).await?;
        tracing::debug!(expires_on = %token.expires_on, "Token acquired successfully");

        let value = token.token.clone();
        self.cache.write().await.insert(key, token);
        Ok(value)
    }
}

#[async_trait]
impl TokenProvider for CredentialManager {
    async fn get_token(&self, scopes: Option<&[String]>) -> Result<String, AuthError> {
        let result = self.acquire(scopes).await;
        if let Err(e) = &result {
            tracing::error!("Failed to acquire Azure AD token: {}", e);
        }
        result
    }
}
