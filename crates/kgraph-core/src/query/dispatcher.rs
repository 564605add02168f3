//! Stateless query dispatch.
//!
//! `QueryEngine` borrows a graph, its embedding index and an embedder for
//! the duration of a call. Each `process` classifies the query against the
//! intent table and runs the matching handler, or falls back to semantic
//! search when nothing matches.

use super::handlers;
use super::patterns::{Intent, IntentMatch, classify};
use super::types::{QueryData, QueryResult, VisualizationHint};
use crate::embedding::{Embedder, EmbeddingIndex};
use crate::graph::Graph;
use crate::resolver::EntityResolver;
use crate::{EntityId, KgError};

/// Signature shared by every intent handler.
pub type Handler = fn(&QueryEngine<'_>, &IntentMatch) -> Result<QueryResult, KgError>;

/// Handler registered for an intent.
#[must_use]
pub fn handler_for(intent: Intent) -> Handler {
    match intent {
        Intent::MainTopics => handlers::main_topics,
        Intent::Relationship => handlers::relationship,
        Intent::Path => handlers::path,
        Intent::TypeFilter => handlers::type_filter,
        Intent::Importance => handlers::importance,
        Intent::Neighbors => handlers::neighbors,
        Intent::Similarity => handlers::similarity,
        Intent::Statistics => handlers::statistics,
        Intent::Communities => handlers::communities,
        Intent::EntityInfo => handlers::entity_info,
    }
}

/// Answers natural-language queries over a read-only graph.
pub struct QueryEngine<'a> {
    graph: &'a Graph,
    index: &'a EmbeddingIndex,
    embedder: &'a dyn Embedder,
}

impl<'a> QueryEngine<'a> {
    /// Create an engine over borrowed state.
    #[must_use]
    pub fn new(graph: &'a Graph, index: &'a EmbeddingIndex, embedder: &'a dyn Embedder) -> Self {
        Self {
            graph,
            index,
            embedder,
        }
    }

    #[must_use]
    pub fn graph(&self) -> &'a Graph {
        self.graph
    }

    #[must_use]
    pub fn index(&self) -> &'a EmbeddingIndex {
        self.index
    }

    #[must_use]
    pub fn embedder(&self) -> &'a dyn Embedder {
        self.embedder
    }

    /// Resolve a mention with the three-tier cascade.
    pub fn resolve(&self, text: &str) -> Result<Option<EntityId>, KgError> {
        EntityResolver::new(self.graph, self.index, self.embedder).resolve(text)
    }

    /// Answer a query.
    ///
    /// Only embedding backend failures are returned as `Err`; every other
    /// outcome, including unknown entities, is a structured answer.
    pub fn process(&self, query: &str) -> Result<QueryResult, KgError> {
        let classified = classify(query);

        if self.graph.is_empty() {
            let hint = classified
                .as_ref()
                .map_or(VisualizationHint::SearchResults, |m| m.intent.hint());
            return Ok(QueryResult::new(
                "The knowledge graph is empty.",
                QueryData::Empty {},
                hint,
            ));
        }

        match classified {
            Some(intent_match) => {
                tracing::debug!(intent = ?intent_match.intent, spans = ?intent_match.spans, "query dispatched");
                handler_for(intent_match.intent)(self, &intent_match)
            }
            None => {
                tracing::debug!("no intent matched, using semantic search");
                handlers::semantic_search(self, query)
            }
        }
    }
}
