//! Query result types.
//!
//! `QueryResult` is what every dispatch returns. Its `data` is one of the
//! typed payloads of `QueryData`, serialized without a tag so the JSON
//! carries only the payload's own fields.

use crate::graph::{EntityInfo, GraphStatistics, GraphView};
use crate::{EntityId, EntityType};
use serde::Serialize;
use std::collections::BTreeMap;

// =============================================================================
// RESULT
// =============================================================================

/// Advisory rendering hint attached to a query result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VisualizationHint {
    MainTopics,
    Relationship,
    EntityInfo,
    EntityType,
    Path,
    Similar,
    Neighbors,
    Statistics,
    ImportantEntities,
    Communities,
    SearchResults,
}

/// The answer to one natural-language query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Human-readable answer. Never empty.
    pub answer: String,
    pub data: QueryData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visualization_hint: Option<VisualizationHint>,
}

impl QueryResult {
    /// Create a result with a rendering hint.
    #[must_use]
    pub fn new(answer: impl Into<String>, data: QueryData, hint: VisualizationHint) -> Self {
        Self {
            answer: answer.into(),
            data,
            visualization_hint: Some(hint),
        }
    }

    /// A "not found" result: no hint, the searched-for spans as data.
    #[must_use]
    pub fn not_found(answer: impl Into<String>, searched_for: Vec<String>) -> Self {
        Self {
            answer: answer.into(),
            data: QueryData::NotFound { searched_for },
            visualization_hint: None,
        }
    }
}

// =============================================================================
// PAYLOADS
// =============================================================================

/// Structured payload of a query result.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QueryData {
    Topics(TopicsData),
    Relationship(Box<RelationshipData>),
    EntityInfo(Box<EntityInfo>),
    /// Entity type -> up to `TYPE_FILTER_LIMIT` members.
    EntityTypes(BTreeMap<String, Vec<EntityId>>),
    UnknownType {
        requested_type: String,
        available_types: Vec<String>,
    },
    Path(PathData),
    Similar(SimilarData),
    Neighbors(NeighborsData),
    Statistics(Box<GraphStatistics>),
    Importance(ImportanceData),
    Communities(CommunitiesData),
    Search(SearchData),
    NotFound {
        searched_for: Vec<String>,
    },
    /// Serializes as `{}`.
    Empty {},
}

/// One topic of the main-topics answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Topic {
    pub name: EntityId,
    pub importance: f64,
    pub connections: usize,
}

/// Topics of one entity type, in ranking order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicGroup {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub topics: Vec<Topic>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicsData {
    /// Groups ordered by their best-ranked member.
    pub topics: Vec<TopicGroup>,
    pub total_topics: usize,
}

/// How two resolved entities are connected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Connection {
    /// Both mentions resolved to the same entity.
    SameEntity,
    /// A single hop in either direction.
    Direct,
    /// Two or more hops.
    Indirect,
    /// No path, even ignoring direction.
    None,
}

/// Direction of a path hop relative to its edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HopDirection {
    Forward,
    Reverse,
}

/// One step of a relationship path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hop {
    pub source: EntityId,
    pub relation: String,
    pub target: EntityId,
    pub direction: HopDirection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelationshipData {
    pub entity1: EntityId,
    pub entity2: EntityId,
    /// Labels of direct edges; reverse edges carry a ` (reverse)` suffix.
    pub direct_relations: Vec<String>,
    pub connection: Connection,
    pub path: Option<Vec<EntityId>>,
    pub hops: Vec<Hop>,
    /// Neighbourhood of the path, for renderers.
    pub context: GraphView,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PathData {
    pub from: EntityId,
    pub to: EntityId,
    pub path: Option<Vec<EntityId>>,
    /// Hop count.
    pub length: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarEntity {
    pub entity: EntityId,
    pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarData {
    pub entity: EntityId,
    pub similar: Vec<SimilarEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NeighborsData {
    pub entity: EntityId,
    pub predecessors: Vec<EntityId>,
    pub successors: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedEntity {
    pub entity: EntityId,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectedEntity {
    pub entity: EntityId,
    pub connections: usize,
}

/// Two independent rankings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportanceData {
    pub pagerank: Vec<RankedEntity>,
    pub degree: Vec<ConnectedEntity>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommunitySummary {
    pub size: usize,
    /// Example members, in id order.
    pub members: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommunitiesData {
    pub num_communities: usize,
    pub communities: Vec<CommunitySummary>,
    pub modularity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub entity: EntityId,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub relevance: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchData {
    pub query: String,
    pub results: Vec<SearchHit>,
}
