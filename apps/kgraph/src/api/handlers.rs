//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Write endpoints (`/build`, `/import`) hold the session's write lock for
//! the whole rebuild: construction, metrics and embedding generation. Every
//! other endpoint takes the read lock.

use super::{
    AppState,
    types::{
        BuildResponse, EntityResponse, ErrorResponse, HealthResponse, QueryRequest,
        StatusResponse, SubgraphRequest, SubgraphResponse,
    },
};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use kgraph_core::{ExtractionResult, GraphSnapshot, KgError, QueryResult};

/// Handler result: JSON on success, an `ErrorResponse` with a status otherwise.
type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ErrorResponse>)>;

/// Map an engine error to an HTTP status and body.
fn api_error(context: &str, e: &KgError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match e {
        KgError::EntityNotFound(_) => StatusCode::NOT_FOUND,
        KgError::Deserialization(_) | KgError::Config(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    tracing::warn!(error = %e, "{} failed", context);
    (status, Json(ErrorResponse::new(format!("{}: {}", context, e))))
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Get graph statistics.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;

    let response = StatusResponse {
        statistics: session.statistics(),
        embeddings: session.embeddings().len(),
    };

    (StatusCode::OK, Json(response))
}

// =============================================================================
// QUERY HANDLER
// =============================================================================

/// Answer a natural-language query.
pub async fn query_handler(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<QueryResult> {
    let session = state.session.read().await;
    session
        .query(&request.query)
        .map(Json)
        .map_err(|e| api_error("Query", &e))
}

// =============================================================================
// ENTITY HANDLER
// =============================================================================

/// Resolve a mention and describe the entity.
pub async fn entity_handler(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let session = state.session.read().await;
    match session.entity_info(&name) {
        Ok(Some(info)) => (StatusCode::OK, Json(EntityResponse::found(name, info))).into_response(),
        Ok(None) => (StatusCode::NOT_FOUND, Json(EntityResponse::not_found(name))).into_response(),
        Err(e) => api_error("Entity lookup", &e).into_response(),
    }
}

// =============================================================================
// SUBGRAPH HANDLER
// =============================================================================

/// Extract the neighbourhood of one or more mentions.
pub async fn subgraph_handler(
    State(state): State<AppState>,
    Json(request): Json<SubgraphRequest>,
) -> ApiResult<SubgraphResponse> {
    request
        .validate()
        .map_err(|msg| (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(msg))))?;

    let session = state.session.read().await;
    let mut resolved = Vec::new();
    let mut unresolved = Vec::new();
    for mention in &request.entities {
        match session.resolve(mention).map_err(|e| api_error("Subgraph", &e))? {
            Some(id) if !resolved.contains(&id) => resolved.push(id),
            Some(_) => {}
            None => unresolved.push(mention.clone()),
        }
    }

    let graph = session.graph().subgraph(&resolved, request.depth).view();
    Ok(Json(SubgraphResponse {
        resolved,
        unresolved,
        graph,
    }))
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Export the graph as a JSON snapshot.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.session.read().await;
    Json(session.export_snapshot())
}

// =============================================================================
// BUILD HANDLER
// =============================================================================

/// Replace the graph with one built from an extraction result.
pub async fn build_handler(
    State(state): State<AppState>,
    Json(extraction): Json<ExtractionResult>,
) -> ApiResult<BuildResponse> {
    let mut session = state.session.write().await;
    let report = session.build(&extraction);
    let embeddings = session
        .generate_embeddings()
        .map_err(|e| api_error("Embedding generation", &e))?;

    tracing::info!(
        nodes = report.nodes,
        edges = report.edges,
        embeddings,
        "Graph rebuilt via API"
    );
    Ok(Json(BuildResponse::from_report(&report, embeddings)))
}

// =============================================================================
// IMPORT HANDLER
// =============================================================================

/// Replace the graph with a JSON snapshot.
pub async fn import_handler(
    State(state): State<AppState>,
    Json(snapshot): Json<GraphSnapshot>,
) -> ApiResult<BuildResponse> {
    let mut session = state.session.write().await;
    session.import_snapshot(snapshot);
    let embeddings = session
        .generate_embeddings()
        .map_err(|e| api_error("Embedding generation", &e))?;

    let graph = session.graph();
    let metrics_computed = !graph.is_empty() && graph.nodes().all(|n| n.attributes.has_metrics());
    tracing::info!(
        nodes = graph.node_count(),
        edges = graph.edge_count(),
        embeddings,
        "Snapshot imported via API"
    );
    Ok(Json(BuildResponse::imported(
        graph.node_count(),
        graph.edge_count(),
        metrics_computed,
        embeddings,
    )))
}
