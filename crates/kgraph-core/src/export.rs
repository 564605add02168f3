//! # Snapshot Export
//!
//! JSON snapshot of a knowledge graph: every node with its attributes
//! flattened, every edge, and a statistics block.
//!
//! ```json
//! {
//!   "nodes": [{"id": "Acme", "label": "Acme", "type": "ORG", "pagerank": 0.48}],
//!   "edges": [{"source": "Alice", "target": "Acme", "relation": "works_at", "context": ""}],
//!   "statistics": {"num_nodes": 3, "num_edges": 2}
//! }
//! ```
//!
//! Import is a full replace: the snapshot becomes the whole graph.

use crate::graph::{Graph, GraphStatistics};
use crate::metrics::MetricsEngine;
use crate::types::default_relation;
use crate::{Edge, EntityId, EntityType, KgError, NodeAttributes};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// SNAPSHOT FORMAT
// =============================================================================

/// A node in the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub id: EntityId,

    /// Display label. Equal to `id` on export; ignored on import.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(rename = "type", default)]
    pub entity_type: EntityType,

    #[serde(flatten)]
    pub attributes: NodeAttributes,

    /// Any attribute outside the fixed set.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// An edge in the snapshot. Missing relations default to `related_to`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotEdge {
    pub source: EntityId,
    pub target: EntityId,
    #[serde(default = "default_relation")]
    pub relation: String,
    #[serde(default)]
    pub context: String,
}

impl From<&Edge> for SnapshotEdge {
    fn from(edge: &Edge) -> Self {
        Self {
            source: edge.source.clone(),
            target: edge.target.clone(),
            relation: edge.relation.clone(),
            context: edge.context.clone(),
        }
    }
}

impl From<SnapshotEdge> for Edge {
    fn from(edge: SnapshotEdge) -> Self {
        Edge::new(edge.source, edge.target, edge.relation, edge.context)
    }
}

/// A complete JSON snapshot of the graph.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default)]
    pub nodes: Vec<SnapshotNode>,
    #[serde(default)]
    pub edges: Vec<SnapshotEdge>,
    #[serde(default)]
    pub statistics: GraphStatistics,
}

impl GraphSnapshot {
    /// Snapshot the current graph.
    #[must_use]
    pub fn from_graph(graph: &Graph) -> Self {
        let nodes = graph
            .nodes()
            .map(|node| SnapshotNode {
                id: node.id.clone(),
                label: Some(node.id.to_string()),
                entity_type: node.entity_type.clone(),
                attributes: node.attributes.clone(),
                extra: graph.extra_attributes(&node.id).cloned().unwrap_or_default(),
            })
            .collect();

        Self {
            nodes,
            edges: graph.edges().map(SnapshotEdge::from).collect(),
            statistics: graph.statistics(),
        }
    }

    /// Rebuild a graph from this snapshot.
    ///
    /// Node types and attributes are restored as-is; edges may introduce
    /// endpoints of the default type. If any node lacks PageRank the
    /// metrics pass is rerun over the whole graph.
    #[must_use]
    pub fn into_graph(self) -> Graph {
        let mut graph = Graph::new();

        for node in self.nodes {
            graph.add_node(node.id.clone(), node.entity_type);
            graph.set_attributes(&node.id, node.attributes);
            for (key, value) in node.extra {
                graph.set_extra_attribute(&node.id, key, value);
            }
        }

        for edge in self.edges {
            graph.add_edge(edge.into());
        }

        if graph.nodes().any(|n| n.attributes.pagerank.is_none()) {
            tracing::debug!("snapshot lacks metrics, recomputing");
            MetricsEngine::compute(&mut graph);
        }

        tracing::info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "snapshot imported"
        );
        graph
    }

    /// Serialize to pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, KgError> {
        serde_json::to_string_pretty(self).map_err(|e| KgError::Serialization(e.to_string()))
    }

    /// Parse from JSON.
    pub fn from_json(text: &str) -> Result<Self, KgError> {
        serde_json::from_str(text).map_err(|e| KgError::Deserialization(e.to_string()))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExtractionResult;

    fn scenario() -> Graph {
        let extraction = ExtractionResult::new()
            .with_entities("PERSON", &["Alice", "Bob"])
            .with_entities("ORG", &["Acme"])
            .with_relationship("Alice", "works_at", "Acme")
            .with_relationship("Bob", "works_at", "Acme");
        let mut graph = Graph::new();
        graph.build(&extraction);
        graph
    }

    #[test]
    fn node_attributes_are_flattened() {
        let snapshot = GraphSnapshot::from_graph(&scenario());
        let value = serde_json::to_value(&snapshot).expect("json");

        let node = &value["nodes"][0];
        assert_eq!(node["id"], "Acme");
        assert_eq!(node["label"], "Acme");
        assert_eq!(node["type"], "ORG");
        assert!(node["pagerank"].is_f64());
        assert!(node.get("attributes").is_none());
        assert_eq!(value["statistics"]["num_nodes"], 3);
    }

    #[test]
    fn json_roundtrip_preserves_graph() {
        let graph = scenario();
        let text = GraphSnapshot::from_graph(&graph).to_json().expect("to json");
        let restored = GraphSnapshot::from_json(&text).expect("parse").into_graph();

        assert_eq!(restored.node_count(), 3);
        assert_eq!(restored.edge_count(), 2);
        assert_eq!(
            restored.node(&EntityId::new("Alice")).map(|n| n.entity_type.as_str()),
            Some("PERSON")
        );
        assert_eq!(
            restored.node(&EntityId::new("Acme")).and_then(|n| n.attributes.pagerank),
            graph.node(&EntityId::new("Acme")).and_then(|n| n.attributes.pagerank)
        );
    }

    #[test]
    fn import_applies_defaults_and_recomputes_metrics() {
        let text = r#"{
            "nodes": [{"id": "A", "type": "CONCEPT"}],
            "edges": [{"source": "A", "target": "B"}]
        }"#;
        let graph = GraphSnapshot::from_json(text).expect("parse").into_graph();

        let edge = graph.edges().next().expect("edge");
        assert_eq!(edge.relation, "related_to");
        assert_eq!(edge.context, "");
        assert_eq!(
            graph.node(&EntityId::new("B")).map(|n| n.entity_type.as_str()),
            Some("ENTITY")
        );
        assert!(graph.nodes().all(|n| n.attributes.has_metrics()));
    }

    #[test]
    fn extra_attributes_survive_roundtrip() {
        let text = r#"{
            "nodes": [{"id": "A", "type": "CONCEPT", "pagerank": 1.0, "color": "red"}],
            "edges": []
        }"#;
        let graph = GraphSnapshot::from_json(text).expect("parse").into_graph();
        assert_eq!(
            graph
                .extra_attributes(&EntityId::new("A"))
                .and_then(|m| m.get("color")),
            Some(&serde_json::json!("red"))
        );

        let value = serde_json::to_value(GraphSnapshot::from_graph(&graph)).expect("json");
        assert_eq!(value["nodes"][0]["color"], "red");
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            GraphSnapshot::from_json("{not json"),
            Err(KgError::Deserialization(_))
        ));
    }
}
