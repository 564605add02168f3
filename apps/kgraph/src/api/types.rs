//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.
//!
//! `POST /build` accepts an `ExtractionResult`, `POST /import` a
//! `GraphSnapshot`, and `POST /query` answers with a `QueryResult`; those
//! types live in the core and are used as-is.

use kgraph_core::{BuildReport, EntityId, EntityInfo, GraphStatistics, GraphView, MetricsOutcome};
use serde::{Deserialize, Serialize};

/// Deepest neighbourhood a `/subgraph` request may ask for.
pub const MAX_SUBGRAPH_DEPTH: usize = 5;

/// Most mentions a single `/subgraph` request may name.
pub const MAX_SUBGRAPH_SEEDS: usize = 100;

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// STATUS RESPONSE
// =============================================================================

/// Graph status response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    pub statistics: GraphStatistics,
    /// Nodes with an embedding vector.
    pub embeddings: usize,
}

// =============================================================================
// ERROR RESPONSE
// =============================================================================

/// Body of every non-2xx answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            error: msg.into(),
        }
    }
}

// =============================================================================
// QUERY REQUEST
// =============================================================================

/// Natural-language query request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

// =============================================================================
// ENTITY RESPONSE
// =============================================================================

/// Resolved entity lookup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityResponse {
    pub found: bool,
    /// The mention as sent.
    pub query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityInfo>,
}

impl EntityResponse {
    pub fn found(query: impl Into<String>, info: EntityInfo) -> Self {
        Self {
            found: true,
            query: query.into(),
            entity: Some(info),
        }
    }

    pub fn not_found(query: impl Into<String>) -> Self {
        Self {
            found: false,
            query: query.into(),
            entity: None,
        }
    }
}

// =============================================================================
// SUBGRAPH REQUEST/RESPONSE
// =============================================================================

fn default_depth() -> usize {
    1
}

/// Neighbourhood extraction around a set of mentions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgraphRequest {
    pub entities: Vec<String>,
    #[serde(default = "default_depth")]
    pub depth: usize,
}

impl SubgraphRequest {
    /// Reject oversized requests before any graph work.
    pub fn validate(&self) -> Result<(), String> {
        if self.entities.is_empty() {
            return Err("At least one entity is required".to_string());
        }
        if self.entities.len() > MAX_SUBGRAPH_SEEDS {
            return Err(format!(
                "Entity count {} exceeds maximum {}",
                self.entities.len(),
                MAX_SUBGRAPH_SEEDS
            ));
        }
        if self.depth > MAX_SUBGRAPH_DEPTH {
            return Err(format!(
                "Depth {} exceeds maximum {}",
                self.depth, MAX_SUBGRAPH_DEPTH
            ));
        }
        Ok(())
    }
}

/// Subgraph listing plus the resolution outcome of each mention.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubgraphResponse {
    pub resolved: Vec<EntityId>,
    pub unresolved: Vec<String>,
    pub graph: GraphView,
}

// =============================================================================
// BUILD / IMPORT RESPONSE
// =============================================================================

/// Outcome of a write operation (`/build`, `/import`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildResponse {
    pub success: bool,
    pub nodes: usize,
    pub edges: usize,
    #[serde(default)]
    pub skipped_relationships: usize,
    #[serde(default)]
    pub skipped_entities: usize,
    /// Whether centrality metrics are stored on the nodes.
    pub metrics_computed: bool,
    pub embeddings: usize,
}

impl BuildResponse {
    pub fn from_report(report: &BuildReport, embeddings: usize) -> Self {
        Self {
            success: true,
            nodes: report.nodes,
            edges: report.edges,
            skipped_relationships: report.skipped_relationships,
            skipped_entities: report.skipped_entities,
            metrics_computed: matches!(report.metrics, MetricsOutcome::Computed { .. }),
            embeddings,
        }
    }

    pub fn imported(nodes: usize, edges: usize, metrics_computed: bool, embeddings: usize) -> Self {
        Self {
            success: true,
            nodes,
            edges,
            metrics_computed,
            embeddings,
            ..Self::default()
        }
    }
}
