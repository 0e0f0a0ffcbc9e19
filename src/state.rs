// src/state.rs
// Shared application state

use std::sync::Arc;
use std::time::Instant;

use reqwest::Client;

use crate::auth::{CredentialManager, TokenProvider};
use crate::config::Settings;
use crate::rest_client::RestClient;

/// Cheap-to-clone handle injected into every axum handler.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    /// Bearer tokens for backend calls; also probed by `/health/ready`.
    pub token_provider: Arc<dyn TokenProvider>,
    pub rest: Arc<RestClient>,
    pub start_time: Instant,
}

impl AppState {
    /// Production wiring: Azure credential manager over a shared HTTP client.
    pub fn new(settings: Settings) -> Result<Self, reqwest::Error> {
        let http = Client::builder().build()?;
        let manager = CredentialManager::new(
            settings.azure.clone(),
            settings.server.azure_scopes.clone(),
            http,
        );
        tracing::info!(scopes = ?manager.scopes(), "Azure token scopes configured");
        Self::with_token_provider(settings, Arc::new(manager))
    }

    /// Wire the state around any token source (tests inject static tokens).
    pub fn with_token_provider(
        settings: Settings,
        token_provider: Arc<dyn TokenProvider>,
    ) -> Result<Self, reqwest::Error> {
        let rest = RestClient::new(&settings.server, token_provider.clone())?;
        tracing::info!(
            backend = %rest.base_url(),
            timeout_secs = rest.timeout().as_secs(),
            "backend REST client configured"
        );
        Ok(Self {
            settings: Arc::new(settings),
            token_provider,
            rest: Arc::new(rest),
            start_time: Instant::now(),
        })
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
