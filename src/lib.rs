pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod mcp;
pub mod models;
pub mod rest_client;
pub mod state;
pub mod tools;

use axum::Json;
use axum::Router;
use axum::middleware;
use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::routing::{get, post};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;

use config::ServerSettings;
use state::AppState;

pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Service MCP Gateway",
        description = "MCP tools over an Azure-authenticated REST backend"
    ),
    paths(
        handlers::health::root,
        handlers::health::health,
        handlers::health::liveness,
        handlers::health::readiness,
        handlers::tools::list_tools,
        handlers::tools::invoke_tool,
        mcp::server::mcp_handler,
    ),
    components(schemas(
        models::HealthResponse,
        models::ServiceInfo,
        models::UserProfile,
        models::ListUsersResponse,
        models::TicketResponse,
        models::ListTicketsResponse,
        models::QueryDataResponse,
        models::GetUserProfileRequest,
        models::ListUsersRequest,
        models::CreateTicketRequest,
        models::ListTicketsRequest,
        models::QueryDataRequest,
        models::TicketPriority,
        tools::ToolDefinition,
        error::ErrorBody,
    )),
    tags(
        (name = "health", description = "Liveness and readiness probes"),
        (name = "tools", description = "Direct REST access to the tools"),
        (name = "mcp", description = "Model Context Protocol endpoint")
    )
)]
pub struct ApiDoc;

/// Build the application router with the given state.
/// Extracted from `main()` so integration tests can construct the app
/// without binding to a network port.
pub fn create_router(state: AppState) -> Router {
    // Tool surfaces sit behind the optional AUTH_SECRET guard.
    let protected = Router::new()
        .route("/api/tools", get(handlers::list_tools))
        .route("/api/tools/{name}", post(handlers::invoke_tool))
        .route("/mcp", post(mcp::server::mcp_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::require_auth,
        ));

    Router::new()
        // Health
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route("/health/live", get(handlers::liveness))
        .route("/health/ready", get(handlers::readiness))
        // OpenAPI
        .route("/api-docs/openapi.json", get(openapi_json))
        // Tools + MCP
        .merge(protected)
        .with_state(state)
}

/// `create_router` plus the production middleware stack.
pub fn build_app(state: AppState) -> Router {
    let settings = state.settings.server.clone();
    let request_id = HeaderName::from_static(logging::REQUEST_ID_HEADER);

    let app = create_router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| logging::request_span(request)),
        )
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid));

    match cors_layer(&settings) {
        Some(cors) => app.layer(cors),
        None => app,
    }
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// CORS from `CORS_ALLOWED_ORIGINS`; `None` when the list is empty.
fn cors_layer(settings: &ServerSettings) -> Option<CorsLayer> {
    if settings.cors_allowed_origins.is_empty() {
        return None;
    }

    let origin = if settings.cors_allowed_origins.iter().any(|o| o == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = settings
            .cors_allowed_origins
            .iter()
            .filter_map(|o| match o.parse::<HeaderValue>() {
                Ok(v) => Some(v),
                Err(_) => {
                    tracing::warn!(origin = %o, "ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    let session = HeaderName::from_static(mcp::server::SESSION_HEADER);
    let request_id = HeaderName::from_static(logging::REQUEST_ID_HEADER);
    Some(
        CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, session.clone()])
            .expose_headers([session, request_id])
            .max_age(std::time::Duration::from_secs(86_400)),
    )
}
