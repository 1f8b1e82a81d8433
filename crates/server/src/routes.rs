//! Request pipeline assembly and host-level endpoints.
//!
//! The middleware stack reads top-down in registration order: CORS first,
//! then the telemetry layers, then the versioned routes and the OpenAPI
//! endpoints.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{middleware, Router};
use serde::Serialize;
use tokio::sync::watch;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use utoipa::ToSchema;

use crate::config::Settings;
use crate::documentation;
use crate::response::Pretty;
use crate::versioning::{self, ApiVersion};

/// Shared application state. The connection string is passed in explicitly
/// at startup and stays fixed even when settings reload.
#[derive(Clone)]
pub struct AppState {
    pub environment: String,
    pub database_url: String,
    pub settings: watch::Receiver<Settings>,
}

/// Assemble the full request pipeline.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .route("/health", get(health))
        .route("/status", get(status))
        .route_layer(middleware::from_fn(versioning::resolve))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .merge(documentation::swagger_ui())
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new())
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(cors_policy()),
        )
}

/// Allow-all CORS with credentials. The literal wildcard cannot be combined
/// with `Access-Control-Allow-Credentials`, so the policy mirrors whatever
/// the request asks for.
pub fn cors_policy() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_methods(AllowMethods::mirror_request())
        .allow_headers(AllowHeaders::mirror_request())
        .allow_credentials(true)
}

/// Liveness payload.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
    pub api_version: String,
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/api/health",
    tag = "health",
    params(
        ("api-version" = Option<String>, Header, description = "API version to process the request under")
    ),
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
        (status = 400, description = "Unsupported API version", body = crate::versioning::VersionError)
    )
)]
pub(crate) async fn health(version: ApiVersion) -> impl IntoResponse {
    Pretty(HealthResponse {
        status: String::from("ok"),
        service: String::from(env!("CARGO_PKG_NAME")),
        version: String::from(env!("CARGO_PKG_VERSION")),
        api_version: version.to_string(),
    })
}

/// Host status payload, reflecting the current settings snapshot.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatusResponse {
    pub environment: String,
    pub log_level: String,
    pub database_configured: bool,
    pub api_version: String,
}

/// Host status endpoint
#[utoipa::path(
    get,
    path = "/api/status",
    tag = "status",
    responses(
        (status = 200, description = "Current host status", body = StatusResponse),
        (status = 400, description = "Unsupported API version", body = crate::versioning::VersionError)
    )
)]
pub(crate) async fn status(
    version: ApiVersion,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let log_level = state.settings.borrow().logging.level.clone();
    Pretty(StatusResponse {
        environment: state.environment.clone(),
        log_level,
        database_configured: !state.database_url.is_empty(),
        api_version: version.to_string(),
    })
}
