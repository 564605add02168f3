//! # kgraph-core
//!
//! The knowledge-graph engine for kgraph.
//!
//! This crate turns an extraction result (typed entities plus relationship
//! triples) into a queryable knowledge graph:
//!
//! - `graph`: typed directed multigraph with a type index
//! - `metrics`: degree centrality, PageRank, gated betweenness
//! - `embedding`: embedder trait, hashing embedder, similarity index
//! - `resolver`: exact / substring / embedding entity resolution
//! - `query`: ordered intent table, handlers, semantic fallback
//! - `communities`: greedy modularity partitioning
//! - `export` / `formats`: JSON snapshots and the binary database format
//! - `session`: the explicit handle bundling all of the above
//!
//! ## Architectural Constraints
//!
//! - Synchronous, NO async, NO network dependencies
//! - Deterministic: `BTreeMap`/`BTreeSet` everywhere, explicit tie-breaks
//! - No process-wide mutable state; callers own a `Session`

// =============================================================================
// MODULES
// =============================================================================

pub mod communities;
pub mod embedding;
pub mod export;
pub mod formats;
pub mod graph;
pub mod metrics;
pub mod primitives;
pub mod query;
pub mod resolver;
pub mod session;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Edge, EntityContext, EntityId, EntityType, ExtractionResult, KgError, Node, NodeAttributes,
    RelationshipRecord,
};

// =============================================================================
// RE-EXPORTS: Engine
// =============================================================================

pub use communities::{CommunityPartition, greedy_modularity_communities};
#[cfg(feature = "hashing-embedder")]
pub use embedding::HashingEmbedder;
pub use embedding::{Embedder, EmbeddingIndex, cosine_similarity};
pub use export::GraphSnapshot;
pub use graph::{BuildReport, EntityInfo, Graph, GraphStatistics, GraphView, SerializableGraph};
pub use metrics::{MetricsEngine, MetricsOutcome};
pub use query::{QueryData, QueryEngine, QueryResult, VisualizationHint};
pub use resolver::EntityResolver;
pub use session::Session;

// =============================================================================
// RE-EXPORTS: Formats (from formats module)
// =============================================================================

pub use formats::{PersistenceHeader, graph_from_bytes, graph_to_bytes};
