use anyhow::Context;

use service_mcp_gateway::auth::select_credential_kind;
use service_mcp_gateway::config::Settings;
use service_mcp_gateway::logging;
use service_mcp_gateway::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env().context("invalid configuration")?;
    logging::init_tracing(&settings.server.log_level);

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        backend = %settings.server.backend_api_url,
        scopes = ?settings.server.azure_scopes,
        credential = %select_credential_kind(&settings.azure),
        debug = settings.server.debug,
        "starting MCP gateway"
    );
    if settings.server.auth_secret.is_some() {
        tracing::info!("AUTH_SECRET configured: tool endpoints require a bearer token");
    } else {
        tracing::info!("AUTH_SECRET not set: tool endpoints are open");
    }

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let state = AppState::new(settings).context("failed to build HTTP clients")?;
    let app = service_mcp_gateway::build_app(state);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("MCP gateway listening on http://{}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("MCP gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };
    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => {},
                    _ = sigterm.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("failed to install SIGTERM handler: {}", e);
                ctrl_c.await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await;
    }
    tracing::info!("Shutdown signal received, starting graceful shutdown");
}
