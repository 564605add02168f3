//! # kgraph HTTP API Module
//!
//! This module implements the HTTP REST API server using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /status` - Graph statistics
//! - `POST /query` - Answer a natural-language query
//! - `GET /entity/{name}` - Resolve a mention and describe the entity
//! - `POST /subgraph` - Neighbourhood of one or more mentions
//! - `GET /export` - JSON snapshot of the graph
//! - `POST /build` - Rebuild from an extraction result
//! - `POST /import` - Replace the graph with a JSON snapshot
//!
//! ## Configuration (Environment Variables)
//!
//! - `KGRAPH_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)

mod handlers;
mod types;

// Re-export handlers and types for integration tests (via `kgraph::api::*`)
#[allow(unused_imports)]
pub use handlers::{
    build_handler, entity_handler, export_handler, health_handler, import_handler, query_handler,
    status_handler, subgraph_handler,
};
#[allow(unused_imports)]
pub use types::{
    BuildResponse, EntityResponse, ErrorResponse, HealthResponse, MAX_SUBGRAPH_DEPTH,
    MAX_SUBGRAPH_SEEDS, QueryRequest, StatusResponse, SubgraphRequest, SubgraphResponse,
};

use axum::{
    Router,
    http::{HeaderValue, Method, header},
    routing::{get, post},
};
use kgraph_core::{KgError, Session};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Default maximum request body (2 MiB).
pub const DEFAULT_BODY_LIMIT: usize = 2 * 1024 * 1024;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state containing the graph session.
#[derive(Clone)]
pub struct AppState {
    /// The current session. Writers rebuild under the write lock.
    pub session: Arc<RwLock<Session>>,
}

impl AppState {
    /// Create new app state with a session.
    #[must_use]
    pub fn new(session: Session) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
        }
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from `KGRAPH_CORS_ORIGINS`.
///
/// - `*`: allows all origins
/// - unset: localhost only
/// - otherwise: comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("KGRAPH_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!("CORS: Allowing ALL origins (KGRAPH_CORS_ORIGINS=*)");
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in KGRAPH_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE])
            }
        }
        None => {
            tracing::debug!("CORS: No KGRAPH_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:8080",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:8080",
    ]
    .into_iter()
    .filter_map(|o| o.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the router with the default body limit.
pub fn create_router(state: AppState) -> Router {
    create_router_with_limit(state, DEFAULT_BODY_LIMIT)
}

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner): tracing, CORS, body limit.
pub fn create_router_with_limit(state: AppState, body_limit: usize) -> Router {
    Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/status", get(handlers::status_handler))
        .route("/query", post(handlers::query_handler))
        .route("/entity/{name}", get(handlers::entity_handler))
        .route("/subgraph", post(handlers::subgraph_handler))
        .route("/export", get(handlers::export_handler))
        .route("/build", post(handlers::build_handler))
        .route("/import", post(handlers::import_handler))
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(build_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, session: Session, body_limit: usize) -> Result<(), KgError> {
    let router = create_router_with_limit(AppState::new(session), body_limit);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| KgError::Io(format!("Bind failed: {}", e)))?;

    tracing::info!("kgraph HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .await
        .map_err(|e| KgError::Io(format!("Server error: {}", e)))
}
