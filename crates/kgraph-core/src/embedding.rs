//! # Embedding Index
//!
//! Dense vectors for entity names, used for similarity queries, the last
//! tier of entity resolution and the semantic-search fallback.
//!
//! The embedding model is injected through the `Embedder` trait. With the
//! `hashing-embedder` feature a deterministic, dependency-light model is
//! available as `HashingEmbedder`.

use crate::graph::Graph;
use crate::{EntityId, KgError};
use std::collections::BTreeMap;

// =============================================================================
// EMBEDDER TRAIT
// =============================================================================

/// Maps text to a fixed-length vector.
///
/// Implementations must be deterministic for a given model: the same text
/// always yields the same vector.
pub trait Embedder: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>, KgError>;

    /// Embed several texts. The default calls `embed` for each one.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, KgError> {
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Length of every vector this embedder produces.
    fn dimensions(&self) -> usize;
}

// =============================================================================
// HASHING EMBEDDER
// =============================================================================

/// Feature-hashing embedder.
///
/// Lowercased words and their character trigrams are hashed with BLAKE3
/// into signed buckets and the result is L2-normalized. Surface forms that
/// share words or spelling end up close; unrelated strings land near zero.
#[cfg(feature = "hashing-embedder")]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HashingEmbedder {
    dimensions: usize,
}

#[cfg(feature = "hashing-embedder")]
impl HashingEmbedder {
    /// Default vector length.
    pub const DEFAULT_DIMENSIONS: usize = 256;

    const WORD_WEIGHT: f32 = 1.0;
    const TRIGRAM_WEIGHT: f32 = 0.5;

    /// Create an embedder with the given vector length (at least 1).
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    fn add_feature(&self, vector: &mut [f32], feature: &str, weight: f32) {
        let hash = blake3::hash(feature.as_bytes());
        let bytes = hash.as_bytes();
        let mut bucket_bytes = [0u8; 8];
        bucket_bytes.copy_from_slice(&bytes[..8]);
        let bucket = (u64::from_le_bytes(bucket_bytes) % self.dimensions as u64) as usize;
        let sign = if bytes[8] & 1 == 0 { 1.0 } else { -1.0 };
        if let Some(slot) = vector.get_mut(bucket) {
            *slot += sign * weight;
        }
    }
}

#[cfg(feature = "hashing-embedder")]
impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(Self::DEFAULT_DIMENSIONS)
    }
}

#[cfg(feature = "hashing-embedder")]
impl Embedder for HashingEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, KgError> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();

        for word in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            self.add_feature(&mut vector, word, Self::WORD_WEIGHT);

            let padded: Vec<char> = format!("#{word}#").chars().collect();
            for window in padded.windows(3) {
                let trigram: String = window.iter().collect();
                self.add_feature(&mut vector, &trigram, Self::TRIGRAM_WEIGHT);
            }
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        Ok(vector)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

// =============================================================================
// SIMILARITY
// =============================================================================

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when the lengths differ or either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

// =============================================================================
// INDEX
// =============================================================================

/// A similarity hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Similar {
    pub entity: EntityId,
    pub similarity: f32,
}

/// Entity id -> embedding of its name.
#[derive(Debug, Clone, Default)]
pub struct EmbeddingIndex {
    vectors: BTreeMap<EntityId, Vec<f32>>,
}

impl EmbeddingIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Embed every node name of the graph, replacing the previous index.
    ///
    /// On error the previous index is kept.
    pub fn generate(&mut self, graph: &Graph, embedder: &dyn Embedder) -> Result<usize, KgError> {
        let ids: Vec<EntityId> = graph.node_ids().cloned().collect();
        let texts: Vec<&str> = ids.iter().map(EntityId::as_str).collect();
        let vectors = embedder.embed_batch(&texts)?;

        if vectors.len() != ids.len() {
            return Err(KgError::Embedding(format!(
                "expected {} vectors, got {}",
                ids.len(),
                vectors.len()
            )));
        }
        let expected = embedder.dimensions();
        if let Some(bad) = vectors.iter().find(|v| v.len() != expected) {
            return Err(KgError::DimensionMismatch {
                expected,
                actual: bad.len(),
            });
        }

        self.vectors = ids.into_iter().zip(vectors).collect();
        tracing::info!(entities = self.vectors.len(), "entity embeddings generated");
        Ok(self.vectors.len())
    }

    /// Store a single vector.
    pub fn insert(&mut self, id: EntityId, vector: Vec<f32>) {
        self.vectors.insert(id, vector);
    }

    /// The vector of an entity.
    #[must_use]
    pub fn get(&self, id: &EntityId) -> Option<&[f32]> {
        self.vectors.get(id).map(Vec::as_slice)
    }

    /// Whether an entity has a vector.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.vectors.contains_key(id)
    }

    /// Number of indexed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    /// Whether nothing is indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Drop every vector.
    pub fn clear(&mut self) {
        self.vectors.clear();
    }

    /// The `k` entities most similar to `id`, excluding itself.
    ///
    /// Empty if `id` has no vector.
    #[must_use]
    pub fn find_similar(&self, id: &EntityId, k: usize) -> Vec<Similar> {
        let Some(query) = self.vectors.get(id) else {
            return Vec::new();
        };
        self.rank_filtered(query, k, |other| other != id)
    }

    /// The `k` entities most similar to an arbitrary vector.
    #[must_use]
    pub fn rank(&self, query: &[f32], k: usize) -> Vec<Similar> {
        self.rank_filtered(query, k, |_| true)
    }

    /// The single best entity whose similarity strictly exceeds `threshold`.
    #[must_use]
    pub fn best_match(&self, query: &[f32], threshold: f32) -> Option<Similar> {
        self.rank(query, 1)
            .into_iter()
            .next()
            .filter(|hit| hit.similarity > threshold)
    }

    fn rank_filtered<F>(&self, query: &[f32], k: usize, keep: F) -> Vec<Similar>
    where
        F: Fn(&EntityId) -> bool,
    {
        let mut hits: Vec<Similar> = self
            .vectors
            .iter()
            .filter(|(id, _)| keep(id))
            .map(|(id, v)| Similar {
                entity: id.clone(),
                similarity: cosine_similarity(query, v),
            })
            .collect();
        // Stable sort over id-ordered input: ties keep id order.
        hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        hits.truncate(k);
        hits
    }
}

// =============================================================================
// TESTS
// =============================================================================
