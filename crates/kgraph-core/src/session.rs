//! # Session Module
//!
//! An explicit handle over one knowledge graph.
//!
//! A `Session` owns the graph, its embedding index and the embedder used to
//! fill it. There is no process-wide state: callers that share a session
//! across threads wrap it in their own lock, taking it exclusively for
//! `build`/`import_snapshot`/`generate_embeddings` and shared for queries.
//!
//! ## Embedding contract
//!
//! Embeddings are generated explicitly. `build` and `import_snapshot` clear
//! the index; similarity queries, fuzzy resolution and semantic search see
//! an empty index until `generate_embeddings` is called again.

use crate::embedding::{Embedder, EmbeddingIndex};
use crate::export::GraphSnapshot;
use crate::formats::{graph_from_bytes, graph_to_bytes};
use crate::graph::{BuildReport, EntityInfo, Graph, GraphStatistics};
use crate::query::{QueryEngine, QueryResult};
use crate::resolver::EntityResolver;
use crate::{EntityId, ExtractionResult, KgError};
use std::fmt;
use std::sync::Arc;

/// A knowledge graph with its embedding index and embedder.
pub struct Session {
    graph: Graph,
    embeddings: EmbeddingIndex,
    embedder: Arc<dyn Embedder>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("nodes", &self.graph.node_count())
            .field("edges", &self.graph.edge_count())
            .field("embeddings", &self.embeddings.len())
            .field("dimensions", &self.embedder.dimensions())
            .finish()
    }
}

#[cfg(feature = "hashing-embedder")]
impl Default for Session {
    fn default() -> Self {
        Self::new(Arc::new(crate::embedding::HashingEmbedder::default()))
    }
}

impl Session {
    /// Create an empty session.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>) -> Self {
        Self::with_graph(Graph::new(), embedder)
    }

    /// Create a session over an existing graph. No embeddings are generated.
    #[must_use]
    pub fn with_graph(graph: Graph, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            graph,
            embeddings: EmbeddingIndex::new(),
            embedder,
        }
    }

    /// Restore a session from a binary database.
    pub fn from_bytes(bytes: &[u8], embedder: Arc<dyn Embedder>) -> Result<Self, KgError> {
        Ok(Self::with_graph(graph_from_bytes(bytes)?, embedder))
    }

    /// Serialize the graph to the binary database format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, KgError> {
        graph_to_bytes(&self.graph)
    }

    // =========================================================================
    // ACCESSORS
    // =========================================================================

    #[must_use]
    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    #[must_use]
    pub fn embeddings(&self) -> &EmbeddingIndex {
        &self.embeddings
    }

    #[must_use]
    pub fn embedder(&self) -> &dyn Embedder {
        self.embedder.as_ref()
    }

    /// Whether the embedding index covers the current graph.
    #[must_use]
    pub fn has_embeddings(&self) -> bool {
        !self.embeddings.is_empty() || self.graph.is_empty()
    }

    // =========================================================================
    // MUTATION (exclusive access)
    // =========================================================================

    /// Rebuild the graph from an extraction result and run the metrics pass.
    ///
    /// The embedding index is cleared.
    pub fn build(&mut self, extraction: &ExtractionResult) -> BuildReport {
        self.embeddings.clear();
        self.graph.build(extraction)
    }

    /// Embed every node, replacing the index.
    pub fn generate_embeddings(&mut self) -> Result<usize, KgError> {
        self.embeddings.generate(&self.graph, self.embedder.as_ref())
    }

    /// Replace the graph with a snapshot. The embedding index is cleared.
    pub fn import_snapshot(&mut self, snapshot: GraphSnapshot) {
        self.embeddings.clear();
        self.graph = snapshot.into_graph();
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.embeddings.clear();
        self.graph.clear();
    }

    // =========================================================================
    // QUERIES (shared access)
    // =========================================================================

    /// Snapshot the graph as JSON-ready data.
    #[must_use]
    pub fn export_snapshot(&self) -> GraphSnapshot {
        GraphSnapshot::from_graph(&self.graph)
    }

    /// Answer a natural-language query.
    pub fn query(&self, text: &str) -> Result<QueryResult, KgError> {
        QueryEngine::new(&self.graph, &self.embeddings, self.embedder.as_ref()).process(text)
    }

    /// Resolve a mention to an entity id.
    pub fn resolve(&self, text: &str) -> Result<Option<EntityId>, KgError> {
        EntityResolver::new(&self.graph, &self.embeddings, self.embedder.as_ref()).resolve(text)
    }

    /// Resolve a mention and describe the entity.
    pub fn entity_info(&self, text: &str) -> Result<Option<EntityInfo>, KgError> {
        Ok(self
            .resolve(text)?
            .map(|id| self.graph.get_entity_info(&id)))
    }

    /// Resolve two mentions and find the directed shortest path.
    ///
    /// `Err(EntityNotFound)` names the first mention that did not resolve.
    pub fn shortest_path(&self, from: &str, to: &str) -> Result<Option<Vec<EntityId>>, KgError> {
        let start = self
            .resolve(from)?
            .ok_or_else(|| KgError::EntityNotFound(EntityId::new(from)))?;
        let end = self
            .resolve(to)?
            .ok_or_else(|| KgError::EntityNotFound(EntityId::new(to)))?;
        Ok(self.graph.shortest_path(&start, &end))
    }

    /// Whole-graph statistics.
    #[must_use]
    pub fn statistics(&self) -> GraphStatistics {
        self.graph.statistics()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(all(test, feature = "hashing-embedder"))]
mod tests {
    use super::*;
    use crate::query::{QueryData, VisualizationHint};

    fn scenario() -> ExtractionResult {
        ExtractionResult::new()
            .with_entities("PERSON", &["Alice", "Bob"])
            .with_entities("ORG", &["Acme"])
            .with_relationship("Alice", "works_at", "Acme")
            .with_relationship("Bob", "works_at", "Acme")
    }

    #[test]
    fn build_clears_embeddings() {
        let mut session = Session::default();
        session.build(&scenario());
        session.generate_embeddings().expect("generate");
        assert_eq!(session.embeddings().len(), 3);

        session.build(&scenario());
        assert!(session.embeddings().is_empty());
        assert!(!session.has_embeddings());
    }

    #[test]
    fn import_replaces_graph() {
        let mut source = Session::default();
        source.build(&scenario());
        let snapshot = source.export_snapshot();

        let mut target = Session::default();
        target.build(&ExtractionResult::new().with_relationship("X", "r", "Y"));
        target.import_snapshot(snapshot);

        assert_eq!(target.graph().node_count(), 3);
        assert!(target.resolve("X").expect("resolve").is_none());
    }

    #[test]
    fn binary_roundtrip() {
        let mut session = Session::default();
        session.build(&scenario());
        let bytes = session.to_bytes().expect("serialize");

        let restored = Session::from_bytes(&bytes, Arc::new(crate::embedding::HashingEmbedder::default()))
            .expect("deserialize");
        assert_eq!(restored.statistics(), session.statistics());
    }

    #[test]
    fn shortest_path_resolves_mentions() {
        let mut session = Session::default();
        session.build(&scenario());

        let path = session.shortest_path("alice", "acme").expect("path");
        assert_eq!(path.map(|p| p.len()), Some(2));
        assert!(matches!(
            session.shortest_path("alice", "zzz"),
            Err(KgError::EntityNotFound(_))
        ));
    }

    #[test]
    fn query_runs_over_session_state() {
        let mut session = Session::default();
        session.build(&scenario());
        session.generate_embeddings().expect("generate");

        let result = session.query("similar to bob").expect("query");
        assert_eq!(result.visualization_hint, Some(VisualizationHint::Similar));
        assert!(matches!(result.data, QueryData::Similar(_)));
    }
}
