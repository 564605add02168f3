//! # Entity Resolver
//!
//! Maps a free-text mention to a graph node through three tiers, each
//! trading recall for precision:
//!
//! 1. **Exact**: case-insensitive equality with a node id
//! 2. **Substring**: the text contains the id or the id contains the text
//! 3. **Embedding**: nearest indexed vector, accepted above a threshold
//!
//! Ties inside a tier are broken explicitly so that resolution never
//! depends on storage order. `Ok(None)` means "not found" and is not an
//! error; only embedding backend failures surface as `Err`.

use crate::embedding::{Embedder, EmbeddingIndex};
use crate::graph::Graph;
use crate::primitives::RESOLVE_SIMILARITY_THRESHOLD;
use crate::{EntityId, KgError};

/// Which tier produced a resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchTier {
    Exact,
    Substring,
    Embedding,
}

/// A resolved mention.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub entity: EntityId,
    pub tier: MatchTier,
    /// Cosine similarity, only for the embedding tier.
    pub similarity: Option<f32>,
}

/// Resolves mentions against a graph and its embedding index.
pub struct EntityResolver<'a> {
    graph: &'a Graph,
    index: &'a EmbeddingIndex,
    embedder: &'a dyn Embedder,
    threshold: f32,
}

impl<'a> EntityResolver<'a> {
    /// Create a resolver with the default similarity threshold.
    #[must_use]
    pub fn new(graph: &'a Graph, index: &'a EmbeddingIndex, embedder: &'a dyn Embedder) -> Self {
        Self {
            graph,
            index,
            embedder,
            threshold: RESOLVE_SIMILARITY_THRESHOLD,
        }
    }

    /// Resolve a mention to an entity id.
    pub fn resolve(&self, text: &str) -> Result<Option<EntityId>, KgError> {
        Ok(self.resolve_detailed(text)?.map(|r| r.entity))
    }

    /// Resolve a mention, reporting which tier matched.
    pub fn resolve_detailed(&self, text: &str) -> Result<Option<Resolution>, KgError> {
        let needle = text.trim();
        if needle.is_empty() {
            return Ok(None);
        }
        let lowered = needle.to_lowercase();

        if let Some(entity) = self.exact(needle, &lowered) {
            return Ok(Some(Resolution {
                entity,
                tier: MatchTier::Exact,
                similarity: None,
            }));
        }

        if let Some(entity) = self.substring(&lowered) {
            return Ok(Some(Resolution {
                entity,
                tier: MatchTier::Substring,
                similarity: None,
            }));
        }

        if self.index.is_empty() {
            tracing::debug!(text = needle, "embedding index empty, skipping fuzzy tier");
            return Ok(None);
        }

        let query = self.embedder.embed(needle)?;
        Ok(self
            .index
            .best_match(&query, self.threshold)
            .map(|hit| Resolution {
                entity: hit.entity,
                tier: MatchTier::Embedding,
                similarity: Some(hit.similarity),
            }))
    }

    /// A case-sensitive hit wins; otherwise the first case-insensitive hit
    /// in id order.
    fn exact(&self, needle: &str, lowered: &str) -> Option<EntityId> {
        let direct = EntityId::new(needle);
        if self.graph.contains(&direct) {
            return Some(direct);
        }
        self.graph
            .node_ids()
            .find(|id| id.as_str().to_lowercase() == lowered)
            .cloned()
    }

    /// Shortest matching id first, then id order.
    fn substring(&self, lowered: &str) -> Option<EntityId> {
        self.graph
            .node_ids()
            .filter(|id| {
                let candidate = id.as_str().to_lowercase();
                !candidate.is_empty()
                    && (candidate.contains(lowered) || lowered.contains(candidate.as_str()))
            })
            .min_by(|a, b| {
                a.as_str()
                    .chars()
                    .count()
                    .cmp(&b.as_str().chars().count())
                    .then_with(|| a.cmp(b))
            })
            .cloned()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Edge, EntityType};

    /// Embeds by first letter so similarity is easy to reason about.
    struct InitialEmbedder;

    impl Embedder for InitialEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, KgError> {
            let mut v = vec![0.0; 26];
            if let Some(c) = text.to_lowercase().chars().find(char::is_ascii_lowercase) {
                v[(c as u8 - b'a') as usize] = 1.0;
            }
            Ok(v)
        }

        fn dimensions(&self) -> usize {
            26
        }
    }

    struct FailingEmbedder;

    impl Embedder for FailingEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, KgError> {
            Err(KgError::Embedding("backend down".to_string()))
        }

        fn dimensions(&self) -> usize {
            1
        }
    }

    fn graph() -> Graph {
        let mut graph = Graph::new();
        graph.add_node(EntityId::new("Apple"), EntityType::new("ORG"));
        graph.add_node(EntityId::new("Apple Inc"), EntityType::new("ORG"));
        graph.add_edge(Edge::new("Tim Cook", "Apple Inc", "leads", ""));
        graph
    }

    #[test]
    fn exact_beats_substring() {
        let graph = graph();
        let index = EmbeddingIndex::new();
        let resolver = EntityResolver::new(&graph, &index, &InitialEmbedder);

        let hit = resolver.resolve_detailed("apple").expect("resolve").expect("hit");
        assert_eq!(hit.entity, EntityId::new("Apple"));
        assert_eq!(hit.tier, MatchTier::Exact);
    }

    #[test]
    fn substring_prefers_shortest() {
        let graph = graph();
        let index = EmbeddingIndex::new();
        let resolver = EntityResolver::new(&graph, &index, &InitialEmbedder);

        // Both "Apple" and "Apple Inc" are contained in the mention.
        let hit = resolver
            .resolve_detailed("the apple inc company")
            .expect("resolve")
            .expect("hit");
        assert_eq!(hit.entity, EntityId::new("Apple"));
        assert_eq!(hit.tier, MatchTier::Substring);
    }

    #[test]
    fn substring_matches_id_containing_text() {
        let graph = graph();
        let index = EmbeddingIndex::new();
        let resolver = EntityResolver::new(&graph, &index, &InitialEmbedder);

        assert_eq!(
            resolver.resolve("cook").expect("resolve"),
            Some(EntityId::new("Tim Cook"))
        );
    }

    #[test]
    fn embedding_tier_needs_generated_index() {
        let graph = graph();
        let empty = EmbeddingIndex::new();
        let resolver = EntityResolver::new(&graph, &empty, &InitialEmbedder);
        assert_eq!(resolver.resolve("timothy").expect("resolve"), None);

        let mut index = EmbeddingIndex::new();
        index.generate(&graph, &InitialEmbedder).expect("generate");
        let resolver = EntityResolver::new(&graph, &index, &InitialEmbedder);
        let hit = resolver
            .resolve_detailed("timothy")
            .expect("resolve")
            .expect("hit");
        assert_eq!(hit.entity, EntityId::new("Tim Cook"));
        assert_eq!(hit.tier, MatchTier::Embedding);
    }

    #[test]
    fn embedding_tier_respects_threshold() {
        let graph = graph();
        let mut index = EmbeddingIndex::new();
        index.generate(&graph, &InitialEmbedder).expect("generate");
        let resolver = EntityResolver::new(&graph, &index, &InitialEmbedder);

        assert_eq!(resolver.resolve("zebra").expect("resolve"), None);
    }

    #[test]
    fn backend_failure_propagates() {
        let graph = graph();
        let mut index = EmbeddingIndex::new();
        index.insert(EntityId::new("Apple"), vec![1.0]);
        let resolver = EntityResolver::new(&graph, &index, &FailingEmbedder);

        assert!(matches!(
            resolver.resolve("zebra"),
            Err(KgError::Embedding(_))
        ));
    }

    #[test]
    fn blank_mention_is_not_found() {
        let graph = graph();
        let index = EmbeddingIndex::new();
        let resolver = EntityResolver::new(&graph, &index, &InitialEmbedder);
        assert_eq!(resolver.resolve("   ").expect("resolve"), None);
    }
}
