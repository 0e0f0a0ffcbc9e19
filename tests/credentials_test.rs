//! Azure AD credential strategies against a mock identity provider.

use std::sync::Arc;

use serde_json::json;
use service_mcp_gateway::auth::{
    AuthError, ClientSecretCredential, CredentialKind, CredentialManager, DefaultAzureCredential,
    ManagedIdentityCredential, TokenCredential, TokenProvider, WorkloadIdentityCredential,
    select_credential_kind,
};
use service_mcp_gateway::config::{AzureSettings, DEFAULT_SCOPE};
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TENANT: &str = "tenant-1";
const TOKEN_PATH: &str = "/tenant-1/oauth2/v2.0/token";

fn scopes() -> Vec<String> {
    vec![DEFAULT_SCOPE.to_string()]
}

fn aad_settings(authority: &str) -> AzureSettings {
    AzureSettings {
        tenant_id: TENANT.into(),
        client_id: "client-id".into(),
        authority_host: authority.into(),
        federated_token_file: "/nonexistent/azure/token".into(),
        ..Default::default()
    }
}

fn token_reply(token: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "token_type": "Bearer",
        "access_token": token,
        "expires_in": 3600
    }))
}

#[tokio::test]
async fn test_workload_identity_exchanges_federated_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=client-id"))
        .and(body_string_contains("client_assertion=federated-jwt"))
        .and(body_string_contains("scope=https%3A%2F%2Fmanagement.azure.com%2F.default"))
        .respond_with(token_reply("wi-token"))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let token_file = dir.path().join("token");
    std::fs::write(&token_file, "federated-jwt\n").unwrap();

    let settings = AzureSettings {
        federated_token_file: token_file,
        ..aad_settings(&server.uri())
    };
    assert_eq!(select_credential_kind(&settings), CredentialKind::WorkloadIdentity);

    let credential = WorkloadIdentityCredential::new(reqwest::Client::new(), &settings);
    let token = credential.get_token(&scopes()).await.unwrap();
    assert_eq!(token.token, "wi-token");
    assert!(token.expires_on > chrono::Utc::now());
}

#[tokio::test]
async fn test_workload_identity_missing_file_is_configuration_error() {
    let server = MockServer::start().await;
    let credential = WorkloadIdentityCredential::new(reqwest::Client::new(), &aad_settings(&server.uri()));

    let err = credential.get_token(&scopes()).await.unwrap_err();
    assert!(matches!(err, AuthError::Configuration(_)), "got {err:?}");
}

#[tokio::test]
async fn test_client_secret_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(body_string_contains("client_secret=sp-secret"))
        .respond_with(token_reply("sp-token"))
        .expect(1)
        .mount(&server)
        .await;

    let settings = AzureSettings {
        client_secret: Some("sp-secret".into()),
        ..aad_settings(&server.uri())
    };
    assert_eq!(select_credential_kind(&settings), CredentialKind::ServicePrincipal);

    let credential = ClientSecretCredential::new(reqwest::Client::new(), &settings);
    let token = credential.get_token(&scopes()).await.unwrap();
    assert_eq!(token.token, "sp-token");
}

#[tokio::test]
async fn test_token_endpoint_rejection_carries_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .mount(&server)
        .await;

    let settings = AzureSettings {
        client_secret: Some("wrong".into()),
        ..aad_settings(&server.uri())
    };
    let credential = ClientSecretCredential::new(reqwest::Client::new(), &settings);

    match credential.get_token(&scopes()).await.unwrap_err() {
        AuthError::TokenRequest { status, message } => {
            assert_eq!(status, 400);
            assert!(message.starts_with("AADSTS7000215"), "got {message}");
        }
        other => panic!("expected TokenRequest, got {other:?}"),
    }
}

#[tokio::test]
async fn test_managed_identity_imds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metadata/identity/oauth2/token"))
        .and(header("Metadata", "true"))
        .and(query_param("api-version", "2018-02-01"))
        .and(query_param("resource", "https://management.azure.com"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "imds-token",
            "expires_in": "3599",
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let settings = AzureSettings {
        imds_endpoint: format!("{}/metadata/identity/oauth2/token", server.uri()),
        ..Default::default()
    };
    let credential = ManagedIdentityCredential::new(reqwest::Client::new(), &settings);
    let token = credential.get_token(&scopes()).await.unwrap();
    assert_eq!(token.token, "imds-token");
    assert!(token.expires_on > chrono::Utc::now());
}

#[tokio::test]
async fn test_managed_identity_app_service() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/msi/token"))
        .and(header("X-IDENTITY-HEADER", "identity-secret"))
        .and(query_param("api-version", "2019-08-01"))
        .and(query_param("client_id", "client-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "app-service-token",
            "expires_on": "4102444800"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let settings = AzureSettings {
        client_id: "client-id".into(),
        identity_endpoint: Some(format!("{}/msi/token", server.uri())),
        identity_header: Some("identity-secret".into()),
        ..Default::default()
    };
    let credential = ManagedIdentityCredential::new(reqwest::Client::new(), &settings);
    let token = credential.get_token(&scopes()).await.unwrap();
    assert_eq!(token.token, "app-service-token");
    assert_eq!(token.expires_on.timestamp(), 4_102_444_800);
}

#[tokio::test]
async fn test_default_chain_uses_first_success() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string("no identity"))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/working"))
        .respond_with(token_reply("chain-token"))
        .mount(&server)
        .await;

    let broken = AzureSettings {
        imds_endpoint: format!("{}/broken", server.uri()),
        ..Default::default()
    };
    let working = AzureSettings {
        imds_endpoint: format!("{}/working", server.uri()),
        ..Default::default()
    };
    let chain: Vec<Arc<dyn TokenCredential>> = vec![
        Arc::new(ManagedIdentityCredential::new(reqwest::Client::new(), &broken)),
        Arc::new(ManagedIdentityCredential::new(reqwest::Client::new(), &working)),
    ];
    let credential = DefaultAzureCredential::from_chain(chain);
    assert_eq!(credential.name(), "DefaultAzureCredential");

    let token = credential.get_token(&scopes()).await.unwrap();
    assert_eq!(token.token, "chain-token");
}

#[tokio::test]
async fn test_manager_caches_until_refresh_margin() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(token_reply("cached-token"))
        .expect(1)
        .mount(&server)
        .await;

    let settings = AzureSettings {
        client_secret: Some("sp-secret".into()),
        ..aad_settings(&server.uri())
    };
    let manager = CredentialManager::new(settings, scopes(), reqwest::Client::new());
    assert_eq!(manager.scopes(), scopes().as_slice());
    assert_eq!(manager.credential_name().await, "ClientSecretCredential");

    assert_eq!(manager.get_token(None).await.unwrap(), "cached-token");
    assert_eq!(manager.get_token(None).await.unwrap(), "cached-token");
    assert!(manager.validate_authentication().await);
}
