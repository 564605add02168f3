//! # Core Type Definitions
//!
//! This module contains the shared vocabulary of the engine:
//! - Identifiers (`EntityId`, `EntityType`)
//! - Graph elements (`Node`, `NodeAttributes`, `Edge`, `EntityContext`)
//! - The extraction boundary (`ExtractionResult`, `RelationshipRecord`)
//! - Error types (`KgError`)
//!
//! ## Determinism Guarantees
//!
//! Every identifier implements `Ord` so that graph containers can be
//! `BTreeMap`/`BTreeSet`. Iteration order, and therefore every query answer,
//! is reproducible for a given input.

use crate::primitives::{DEFAULT_ENTITY_TYPE, DEFAULT_RELATION};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Canonical identity of an entity node.
///
/// The id is the normalized surface form produced by the extractor and
/// doubles as the display label.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(pub String);

impl EntityId {
    /// Create a new entity id.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Type tag of an entity (PERSON, ORG, CONCEPT, ...).
///
/// Open vocabulary: any string is a valid type.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityType(pub String);

impl EntityType {
    /// Create a new entity type.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the type as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for EntityType {
    fn default() -> Self {
        Self::new(DEFAULT_ENTITY_TYPE)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// NODE
// =============================================================================

/// Provenance of an entity mention: the source document and its kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityContext {
    /// Title of the source document.
    pub source: String,
    /// Mention kind recorded by the extractor.
    #[serde(rename = "type")]
    pub kind: String,
}

/// Derived attributes of a node.
///
/// The three metrics are written together by the metrics engine: a node
/// either carries all computed metrics or none of them.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct NodeAttributes {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub degree_centrality: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagerank: Option<f64>,

    /// Only present when the graph was small enough to compute it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub betweenness_centrality: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contexts: Option<Vec<EntityContext>>,
}

impl NodeAttributes {
    /// Whether the metrics pass has written this node.
    #[must_use]
    pub fn has_metrics(&self) -> bool {
        self.degree_centrality.is_some() && self.pagerank.is_some()
    }
}

/// An entity node of the knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: EntityId,
    pub entity_type: EntityType,
    pub attributes: NodeAttributes,
}

impl Node {
    /// Create a node with empty attributes.
    #[must_use]
    pub fn new(id: EntityId, entity_type: EntityType) -> Self {
        Self {
            id,
            entity_type,
            attributes: NodeAttributes::default(),
        }
    }
}

// =============================================================================
// EDGE
// =============================================================================

/// A directed, labeled relationship edge.
///
/// Several edges may connect the same ordered pair; the graph is a multigraph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: EntityId,
    pub target: EntityId,
    pub relation: String,
    #[serde(default)]
    pub context: String,
}

impl Edge {
    /// Create a new edge.
    #[must_use]
    pub fn new(
        source: impl Into<EntityId>,
        target: impl Into<EntityId>,
        relation: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation: relation.into(),
            context: context.into(),
        }
    }
}

impl From<String> for EntityId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// EXTRACTION BOUNDARY
// =============================================================================

/// One relationship record as emitted by the extractor.
///
/// Fields are optional so that malformed records survive deserialization
/// and can be skipped one by one instead of failing the whole batch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelationshipRecord {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub relation: Option<String>,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub context: Option<String>,
}

impl RelationshipRecord {
    /// Create a complete record.
    #[must_use]
    pub fn new(source: &str, relation: &str, target: &str, context: &str) -> Self {
        Self {
            source: Some(source.to_string()),
            relation: Some(relation.to_string()),
            target: Some(target.to_string()),
            context: Some(context.to_string()),
        }
    }

    /// Convert to an edge, or `None` if a required key is missing or blank.
    #[must_use]
    pub fn to_edge(&self) -> Option<Edge> {
        let source = self.source.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let target = self.target.as_deref().map(str::trim).filter(|s| !s.is_empty())?;
        let relation = self
            .relation
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())?;
        Some(Edge::new(
            source,
            target,
            relation,
            self.context.clone().unwrap_or_default(),
        ))
    }
}

/// The extraction result consumed by graph construction.
///
/// Deserialization is lenient below the top level: a wrongly typed record
/// or entity name becomes a blank entry that `Graph::build` skips and counts.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ExtractionResult {
    /// Type tag -> entity surface forms.
    #[serde(default, deserialize_with = "lenient_entities")]
    pub entities: BTreeMap<String, Vec<String>>,

    #[serde(default, deserialize_with = "lenient_relationships")]
    pub relationships: Vec<RelationshipRecord>,

    /// Entity -> provenance records.
    #[serde(
        default,
        deserialize_with = "lenient_contexts",
        skip_serializing_if = "Option::is_none"
    )]
    pub entity_contexts: Option<BTreeMap<String, Vec<EntityContext>>>,
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Non-string names become blank and are skipped at build time.
fn lenient_entities<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    let buckets = Option::<BTreeMap<String, Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(buckets
        .into_iter()
        .map(|(entity_type, names)| {
            let names = match names {
                Value::Array(items) => items
                    .into_iter()
                    .map(|item| match item {
                        Value::String(name) => name,
                        _ => String::new(),
                    })
                    .collect(),
                Value::String(name) => vec![name],
                _ => vec![String::new()],
            };
            (entity_type, names)
        })
        .collect())
}

/// Each element is read field by field; anything but a string counts as missing.
fn lenient_relationships<'de, D>(deserializer: D) -> Result<Vec<RelationshipRecord>, D::Error>
where
    D: Deserializer<'de>,
{
    let items = Option::<Vec<Value>>::deserialize(deserializer)?.unwrap_or_default();
    Ok(items
        .iter()
        .map(|item| RelationshipRecord {
            source: string_field(item, "source"),
            relation: string_field(item, "relation"),
            target: string_field(item, "target"),
            context: string_field(item, "context"),
        })
        .collect())
}

/// Malformed provenance records are dropped.
#[allow(clippy::type_complexity)]
fn lenient_contexts<'de, D>(
    deserializer: D,
) -> Result<Option<BTreeMap<String, Vec<EntityContext>>>, D::Error>
where
    D: Deserializer<'de>,
{
    let Some(entries) = Option::<BTreeMap<String, Value>>::deserialize(deserializer)? else {
        return Ok(None);
    };
    let contexts = entries
        .into_iter()
        .filter_map(|(name, records)| match records {
            Value::Array(items) => Some((
                name,
                items
                    .into_iter()
                    .filter_map(|item| EntityContext::deserialize(item).ok())
                    .collect(),
            )),
            _ => None,
        })
        .collect();
    Ok(Some(contexts))
}

impl ExtractionResult {
    /// Create an empty extraction result.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add entities under a type bucket.
    #[must_use]
    pub fn with_entities(mut self, entity_type: &str, names: &[&str]) -> Self {
        self.entities
            .entry(entity_type.to_string())
            .or_default()
            .extend(names.iter().map(|n| (*n).to_string()));
        self
    }

    /// Add a relationship record.
    #[must_use]
    pub fn with_relationship(mut self, source: &str, relation: &str, target: &str) -> Self {
        self.relationships
            .push(RelationshipRecord::new(source, relation, target, ""));
        self
    }
}

/// Default relation label for edges that arrive without one.
#[must_use]
pub fn default_relation() -> String {
    DEFAULT_RELATION.to_string()
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the engine.
///
/// Record-level problems (bad relationship triples) never become errors;
/// they are skipped during construction. Unknown entities in queries are
/// answered as data. What remains here are degenerate states, embedding
/// backend failures and I/O at the boundaries.
#[derive(Debug, Error)]
pub enum KgError {
    /// An algorithm was run on a graph with no nodes.
    #[error("Graph is empty")]
    EmptyGraph,

    /// The requested entity is not in the graph.
    #[error("Entity not found: {0}")]
    EntityNotFound(EntityId),

    /// The embedding backend failed.
    #[error("Embedding backend error: {0}")]
    Embedding(String),

    /// Two vectors of different length were compared or stored.
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(String),

    /// Configuration could not be loaded.
    #[error("Configuration error: {0}")]
    Config(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relationship_record_missing_key_is_rejected() {
        let record = RelationshipRecord {
            source: Some("Alice".to_string()),
            relation: None,
            target: Some("Bob".to_string()),
            context: None,
        };
        assert!(record.to_edge().is_none());
    }

    #[test]
    fn relationship_record_blank_source_is_rejected() {
        let record = RelationshipRecord::new("  ", "knows", "Bob", "");
        assert!(record.to_edge().is_none());
    }

    #[test]
    fn relationship_record_converts_to_edge() {
        let record = RelationshipRecord::new("Alice", "knows", "Bob", "Alice knows Bob.");
        let edge = record.to_edge().expect("edge");
        assert_eq!(edge.source.as_str(), "Alice");
        assert_eq!(edge.target.as_str(), "Bob");
        assert_eq!(edge.relation, "knows");
        assert_eq!(edge.context, "Alice knows Bob.");
    }

    #[test]
    fn extraction_result_tolerates_partial_records() {
        let json = r#"{
            "entities": {"PERSON": ["Alice"]},
            "relationships": [
                {"source": "Alice", "relation": "knows"},
                {"source": "Alice", "relation": "knows", "target": "Bob", "context": "x"}
            ]
        }"#;
        let parsed: ExtractionResult = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed.relationships.len(), 2);
        assert!(parsed.relationships[0].to_edge().is_none());
        assert!(parsed.relationships[1].to_edge().is_some());
        assert!(parsed.entity_contexts.is_none());
    }

    #[test]
    fn extraction_result_keeps_batch_with_wrongly_typed_records() {
        let json = r#"{
            "entities": {"PERSON": ["Alice", null, 7], "ORG": "Acme"},
            "relationships": [
                {"source": "Alice", "relation": "works_at", "target": "Acme"},
                {"source": 42, "relation": "knows", "target": "Bob"},
                "Alice knows Bob",
                null,
                {"source": "Bob", "relation": "knows", "target": "Alice", "context": 3}
            ],
            "entity_contexts": {
                "Alice": [{"source": "doc.txt", "type": "PERSON"}, {"source": 1}],
                "Bob": "doc.txt"
            }
        }"#;
        let parsed: ExtractionResult = serde_json::from_str(json).expect("parse");

        assert_eq!(
            parsed.entities.get("PERSON"),
            Some(&vec!["Alice".to_string(), String::new(), String::new()])
        );
        assert_eq!(parsed.entities.get("ORG"), Some(&vec!["Acme".to_string()]));

        assert_eq!(parsed.relationships.len(), 5);
        let edges: Vec<_> = parsed
            .relationships
            .iter()
            .filter_map(RelationshipRecord::to_edge)
            .collect();
        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].source.as_str(), "Alice");
        assert_eq!(edges[1].context, "");

        let contexts = parsed.entity_contexts.expect("contexts");
        assert_eq!(contexts.get("Alice").map(Vec::len), Some(1));
        assert!(!contexts.contains_key("Bob"));
    }

    #[test]
    fn extraction_result_accepts_null_sections() {
        let json = r#"{"entities": null, "relationships": null, "entity_contexts": null}"#;
        let parsed: ExtractionResult = serde_json::from_str(json).expect("parse");
        assert_eq!(parsed, ExtractionResult::default());
    }

    #[test]
    fn node_attributes_skip_absent_metrics() {
        let attrs = NodeAttributes {
            pagerank: Some(0.5),
            ..NodeAttributes::default()
        };
        let json = serde_json::to_string(&attrs).expect("serialize");
        assert_eq!(json, r#"{"pagerank":0.5}"#);
    }

    #[test]
    fn entity_context_uses_type_key() {
        let ctx = EntityContext {
            source: "doc.txt".to_string(),
            kind: "PERSON".to_string(),
        };
        let json = serde_json::to_string(&ctx).expect("serialize");
        assert!(json.contains("\"type\":\"PERSON\""));
    }

    #[test]
    fn entity_type_defaults_to_entity() {
        assert_eq!(EntityType::default().as_str(), "ENTITY");
    }
}
