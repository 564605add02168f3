//! # Engine Primitives
//!
//! Compiled-in constants for the kgraph engine.
//!
//! These values are fixed at build time. Every algorithm that could run
//! unbounded on a large graph is capped by one of them.

// =============================================================================
// GRAPH CONSTRUCTION
// =============================================================================

/// Type assigned to nodes that first appear as a relationship endpoint.
pub const DEFAULT_ENTITY_TYPE: &str = "ENTITY";

/// Relation label used when an imported edge carries none.
pub const DEFAULT_RELATION: &str = "related_to";

/// Maximum number of characters kept from a relationship's source sentence.
pub const MAX_CONTEXT_LENGTH: usize = 200;

// =============================================================================
// METRICS
// =============================================================================

/// PageRank damping factor.
pub const PAGERANK_DAMPING: f64 = 0.85;

/// PageRank iteration cap. The last iterate is used when it is reached.
pub const PAGERANK_MAX_ITERATIONS: usize = 100;

/// Per-node PageRank convergence tolerance (scaled by node count).
pub const PAGERANK_TOLERANCE: f64 = 1.0e-6;

/// Betweenness centrality is only computed below this node count.
///
/// Brandes' algorithm is O(V·E); above this size construction would no
/// longer be interactive.
pub const BETWEENNESS_NODE_LIMIT: usize = 1000;

// =============================================================================
// ENTITY RESOLUTION
// =============================================================================

/// Minimum cosine similarity for the embedding tier to accept a match.
pub const RESOLVE_SIMILARITY_THRESHOLD: f32 = 0.5;

// =============================================================================
// RESULT LIMITS
// =============================================================================

/// Number of entities listed in graph statistics.
pub const TOP_ENTITIES_LIMIT: usize = 10;

/// Number of PageRank leaders considered by the main-topics handler.
pub const MAIN_TOPICS_LIMIT: usize = 20;

/// Topics printed per type in the main-topics answer.
pub const TOPICS_PER_TYPE: usize = 5;

/// Neighbours returned by a similarity query.
pub const SIMILAR_LIMIT: usize = 10;

/// Entities returned by the semantic-search fallback.
pub const SEARCH_LIMIT: usize = 10;

/// Entries in each ranking of the importance handler.
pub const IMPORTANCE_LIMIT: usize = 5;

/// Communities reported by the community handler.
pub const COMMUNITY_LIMIT: usize = 5;

/// Example members reported per community.
pub const COMMUNITY_MEMBER_LIMIT: usize = 5;

/// Entities listed per type by the type-filter handler.
pub const TYPE_FILTER_LIMIT: usize = 20;

/// Items printed per list in textual answers before "... and N more".
pub const ANSWER_LIST_LIMIT: usize = 10;

/// Sample edges printed by the entity-info handler.
pub const SAMPLE_EDGE_LIMIT: usize = 3;

// =============================================================================
// BINARY FORMAT
// =============================================================================

/// Magic bytes for the binary snapshot header.
pub const MAGIC_BYTES: &[u8; 4] = b"KGRF";

/// Current binary snapshot format version.
///
/// Increment this when making breaking changes to the serialization format.
pub const FORMAT_VERSION: u8 = 1;
