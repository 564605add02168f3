//! # Graph Store
//!
//! The typed multigraph of the kgraph engine.
//!
//! - Nodes are keyed by their canonical `EntityId`
//! - Edges are directed, labeled, and may repeat between the same pair
//! - A type index maps every `EntityType` to the ids currently carrying it
//!
//! All maps are `BTreeMap`s so that traversal order is deterministic.

use crate::metrics::{self, MetricsEngine, MetricsOutcome};
use crate::primitives::{MAX_CONTEXT_LENGTH, TOP_ENTITIES_LIMIT};
use crate::{Edge, EntityContext, EntityId, EntityType, ExtractionResult, Node, NodeAttributes};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

// =============================================================================
// REPORTS & VIEWS
// =============================================================================

/// Summary of one `Graph::build` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
    /// Nodes in the graph after construction.
    pub nodes: usize,
    /// Edges in the graph after construction.
    pub edges: usize,
    /// Relationship records dropped because a required key was missing.
    pub skipped_relationships: usize,
    /// Entity names dropped because they were blank.
    pub skipped_entities: usize,
    /// Nodes that received provenance contexts.
    pub contexts_attached: usize,
    /// Result of the metrics pass that follows construction.
    pub metrics: MetricsOutcome,
}

/// An incoming edge as seen from its target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingEdge {
    pub source: EntityId,
    pub relation: String,
}

/// An outgoing edge as seen from its source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingEdge {
    pub target: EntityId,
    pub relation: String,
}

/// Detailed information about a single entity.
///
/// `EntityInfo::default()` is the "absent" sentinel.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EntityInfo {
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<EntityType>,
    pub attributes: NodeAttributes,
    pub incoming_edges: Vec<IncomingEdge>,
    pub outgoing_edges: Vec<OutgoingEdge>,
    pub neighbors: Vec<EntityId>,
}

impl EntityInfo {
    /// Whether this is the "absent" sentinel.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

/// An entity with a score (PageRank, similarity, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredEntity {
    pub entity: EntityId,
    pub score: f64,
}

/// Whole-graph statistics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphStatistics {
    pub num_nodes: usize,
    pub num_edges: usize,
    /// `edges / (nodes * (nodes - 1))`; zero below two nodes.
    pub density: f64,
    /// Weak connectivity. An empty graph is reported as not connected.
    pub is_connected: bool,
    pub num_components: usize,
    pub entity_types: BTreeMap<String, usize>,
    #[serde(default)]
    pub top_entities: Vec<ScoredEntity>,
}

/// A node as listed for renderers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeView {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub degree: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagerank: Option<f64>,
}

/// A node/edge listing of a graph, consumed by visualizers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphView {
    pub nodes: Vec<NodeView>,
    pub edges: Vec<Edge>,
}

// =============================================================================
// GRAPH IMPLEMENTATION
// =============================================================================

/// The knowledge graph: a directed multigraph of typed entities.
#[derive(Debug, Clone, Default)]
pub struct Graph {
    /// Node storage: EntityId -> Node
    nodes: BTreeMap<EntityId, Node>,

    /// Edge storage in insertion order.
    edges: Vec<Edge>,

    /// Adjacency: source -> indices into `edges`
    outgoing: BTreeMap<EntityId, Vec<usize>>,

    /// Reverse adjacency: target -> indices into `edges`
    incoming: BTreeMap<EntityId, Vec<usize>>,

    /// Type index: EntityType -> ids. Each id appears under exactly one type.
    type_index: BTreeMap<EntityType, BTreeSet<EntityId>>,

    /// Side table for node attributes outside the fixed `NodeAttributes` set.
    extra_attributes: BTreeMap<EntityId, BTreeMap<String, serde_json::Value>>,
}

impl Graph {
    /// Create a new empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every node, edge and index entry.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.edges.clear();
        self.outgoing.clear();
        self.incoming.clear();
        self.type_index.clear();
        self.extra_attributes.clear();
    }

    // =========================================================================
    // CONSTRUCTION
    // =========================================================================

    /// Rebuild the graph from an extraction result, then run the metrics pass.
    ///
    /// This is a full replace: any previous content is cleared first, so
    /// building the same input twice yields the same graph.
    ///
    /// Malformed relationship records and blank entity names are skipped.
    pub fn build(&mut self, extraction: &ExtractionResult) -> BuildReport {
        self.clear();

        let mut skipped_entities = 0usize;
        for (entity_type, names) in &extraction.entities {
            let entity_type = EntityType::new(entity_type.as_str());
            for name in names {
                let name = name.trim();
                if name.is_empty() {
                    skipped_entities += 1;
                    continue;
                }
                self.add_node(EntityId::new(name), entity_type.clone());
            }
        }

        let mut skipped_relationships = 0usize;
        for record in &extraction.relationships {
            match record.to_edge() {
                Some(edge) => self.add_edge(edge),
                None => {
                    tracing::debug!(?record, "skipping malformed relationship record");
                    skipped_relationships += 1;
                }
            }
        }

        let contexts_attached = extraction
            .entity_contexts
            .as_ref()
            .map(|contexts| self.attach_contexts(contexts))
            .unwrap_or(0);

        let metrics = MetricsEngine::compute(self);

        tracing::info!(
            nodes = self.node_count(),
            edges = self.edge_count(),
            skipped_relationships,
            "knowledge graph built"
        );

        BuildReport {
            nodes: self.node_count(),
            edges: self.edge_count(),
            skipped_relationships,
            skipped_entities,
            contexts_attached,
            metrics,
        }
    }

    /// Insert a node, or retag an existing one.
    ///
    /// The most recent type wins, both on the node and in the type index.
    /// Returns `true` if the node was newly created.
    pub fn add_node(&mut self, id: EntityId, entity_type: EntityType) -> bool {
        if let Some(node) = self.nodes.get_mut(&id) {
            if node.entity_type != entity_type {
                let previous = std::mem::replace(&mut node.entity_type, entity_type.clone());
                self.unindex_type(&previous, &id);
                self.type_index.entry(entity_type).or_default().insert(id);
            }
            return false;
        }

        self.type_index
            .entry(entity_type.clone())
            .or_default()
            .insert(id.clone());
        self.nodes.insert(id.clone(), Node::new(id, entity_type));
        true
    }

    /// Insert a node of the default type if it does not exist yet.
    fn ensure_node(&mut self, id: &EntityId) {
        if !self.nodes.contains_key(id) {
            self.add_node(id.clone(), EntityType::default());
        }
    }

    fn unindex_type(&mut self, entity_type: &EntityType, id: &EntityId) {
        if let Some(ids) = self.type_index.get_mut(entity_type) {
            ids.remove(id);
            if ids.is_empty() {
                self.type_index.remove(entity_type);
            }
        }
    }

    /// Append an edge. Missing endpoints are created with the default type.
    ///
    /// No deduplication happens here: identical edges are kept.
    pub fn add_edge(&mut self, mut edge: Edge) {
        if edge.context.chars().count() > MAX_CONTEXT_LENGTH {
            edge.context = edge.context.chars().take(MAX_CONTEXT_LENGTH).collect();
        }

        self.ensure_node(&edge.source);
        self.ensure_node(&edge.target);

        let index = self.edges.len();
        self.outgoing
            .entry(edge.source.clone())
            .or_default()
            .push(index);
        self.incoming
            .entry(edge.target.clone())
            .or_default()
            .push(index);
        self.edges.push(edge);
    }

    /// Attach provenance contexts to existing nodes. Unknown names are ignored.
    ///
    /// Names are trimmed the same way `build` trims entity names.
    /// Returns the number of nodes updated.
    pub fn attach_contexts(&mut self, contexts: &BTreeMap<String, Vec<EntityContext>>) -> usize {
        let mut attached = 0usize;
        for (name, records) in contexts {
            let name = name.trim();
            if name.is_empty() {
                continue;
            }
            if let Some(node) = self.nodes.get_mut(&EntityId::new(name)) {
                node.attributes.contexts = Some(records.clone());
                attached += 1;
            }
        }
        attached
    }

    /// Store an attribute outside the fixed attribute set.
    ///
    /// Ignored if the node does not exist.
    pub fn set_extra_attribute(&mut self, id: &EntityId, key: String, value: serde_json::Value) {
        if self.nodes.contains_key(id) {
            self.extra_attributes
                .entry(id.clone())
                .or_default()
                .insert(key, value);
        }
    }

    /// Attributes outside the fixed set for a node.
    #[must_use]
    pub fn extra_attributes(&self, id: &EntityId) -> Option<&BTreeMap<String, serde_json::Value>> {
        self.extra_attributes.get(id)
    }

    /// Replace the attributes of a node. Ignored if the node does not exist.
    pub fn set_attributes(&mut self, id: &EntityId, attributes: NodeAttributes) {
        if let Some(node) = self.nodes.get_mut(id) {
            node.attributes = attributes;
        }
    }

    pub(crate) fn nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes.values_mut()
    }

    // =========================================================================
    // LOOKUP
    // =========================================================================

    /// Get a node by id.
    #[must_use]
    pub fn node(&self, id: &EntityId) -> Option<&Node> {
        self.nodes.get(id)
    }

    /// Check if the graph contains a node.
    #[must_use]
    pub fn contains(&self, id: &EntityId) -> bool {
        self.nodes.contains_key(id)
    }

    /// All nodes in id order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// All node ids in order.
    pub fn node_ids(&self) -> impl Iterator<Item = &EntityId> {
        self.nodes.keys()
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter()
    }

    /// Total number of nodes.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total number of edges, counting parallel edges separately.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The type index.
    #[must_use]
    pub fn entity_types(&self) -> &BTreeMap<EntityType, BTreeSet<EntityId>> {
        &self.type_index
    }

    /// Ids currently carrying the given type.
    #[must_use]
    pub fn entities_of_type(&self, entity_type: &EntityType) -> Option<&BTreeSet<EntityId>> {
        self.type_index.get(entity_type)
    }

    /// Edges leaving a node, in insertion order.
    pub fn out_edges(&self, id: &EntityId) -> impl Iterator<Item = &Edge> + '_ {
        self.outgoing
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|&i| self.edges.get(i))
    }

    /// Edges entering a node, in insertion order.
    pub fn in_edges(&self, id: &EntityId) -> impl Iterator<Item = &Edge> + '_ {
        self.incoming
            .get(id)
            .into_iter()
            .flatten()
            .filter_map(|&i| self.edges.get(i))
    }

    /// Distinct direct successors, in id order.
    #[must_use]
    pub fn successors(&self, id: &EntityId) -> BTreeSet<EntityId> {
        self.out_edges(id).map(|e| e.target.clone()).collect()
    }

    /// Distinct direct predecessors, in id order.
    #[must_use]
    pub fn predecessors(&self, id: &EntityId) -> BTreeSet<EntityId> {
        self.in_edges(id).map(|e| e.source.clone()).collect()
    }

    /// Distinct neighbours ignoring direction, excluding the node itself.
    #[must_use]
    pub fn neighbors(&self, id: &EntityId) -> BTreeSet<EntityId> {
        let mut all = self.successors(id);
        all.extend(self.predecessors(id));
        all.remove(id);
        all
    }

    /// Raw degree: incoming plus outgoing edges, parallel edges counted.
    #[must_use]
    pub fn degree(&self, id: &EntityId) -> usize {
        let out = self.outgoing.get(id).map_or(0, Vec::len);
        let inc = self.incoming.get(id).map_or(0, Vec::len);
        out + inc
    }

    /// Relation labels of every edge `source -> target`, in insertion order.
    #[must_use]
    pub fn relations_between(&self, source: &EntityId, target: &EntityId) -> Vec<&str> {
        self.out_edges(source)
            .filter(|e| &e.target == target)
            .map(|e| e.relation.as_str())
            .collect()
    }

    /// Check if at least one edge `source -> target` exists.
    #[must_use]
    pub fn has_edge(&self, source: &EntityId, target: &EntityId) -> bool {
        self.out_edges(source).any(|e| &e.target == target)
    }

    /// Type, attributes, distinct in/out edges and neighbours of an entity.
    ///
    /// Returns the empty sentinel if the id is absent.
    #[must_use]
    pub fn get_entity_info(&self, id: &EntityId) -> EntityInfo {
        let Some(node) = self.nodes.get(id) else {
            return EntityInfo::default();
        };

        let mut seen_in = BTreeSet::new();
        let incoming_edges = self
            .in_edges(id)
            .filter(|e| seen_in.insert((e.source.clone(), e.relation.clone())))
            .map(|e| IncomingEdge {
                source: e.source.clone(),
                relation: e.relation.clone(),
            })
            .collect();

        let mut seen_out = BTreeSet::new();
        let outgoing_edges = self
            .out_edges(id)
            .filter(|e| seen_out.insert((e.target.clone(), e.relation.clone())))
            .map(|e| OutgoingEdge {
                target: e.target.clone(),
                relation: e.relation.clone(),
            })
            .collect();

        EntityInfo {
            name: id.to_string(),
            entity_type: Some(node.entity_type.clone()),
            attributes: node.attributes.clone(),
            incoming_edges,
            outgoing_edges,
            neighbors: self.neighbors(id).into_iter().collect(),
        }
    }

    // =========================================================================
    // TRAVERSAL
    // =========================================================================

    /// Unweighted shortest path following edge direction.
    ///
    /// Returns `None` if either id is unknown or no path exists.
    #[must_use]
    pub fn shortest_path(&self, start: &EntityId, end: &EntityId) -> Option<Vec<EntityId>> {
        self.bfs_path(start, end, |id| self.successors(id))
    }

    /// Unweighted shortest path ignoring edge direction.
    #[must_use]
    pub fn shortest_path_undirected(
        &self,
        start: &EntityId,
        end: &EntityId,
    ) -> Option<Vec<EntityId>> {
        self.bfs_path(start, end, |id| self.neighbors(id))
    }

    fn bfs_path<F>(&self, start: &EntityId, end: &EntityId, next: F) -> Option<Vec<EntityId>>
    where
        F: Fn(&EntityId) -> BTreeSet<EntityId>,
    {
        if !self.contains(start) || !self.contains(end) {
            return None;
        }
        if start == end {
            return Some(vec![start.clone()]);
        }

        let mut prev: BTreeMap<EntityId, EntityId> = BTreeMap::new();
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();

        visited.insert(start.clone());
        queue.push_back(start.clone());

        while let Some(current) = queue.pop_front() {
            for neighbor in next(&current) {
                if !visited.insert(neighbor.clone()) {
                    continue;
                }
                prev.insert(neighbor.clone(), current.clone());
                if &neighbor == end {
                    let mut path = vec![neighbor];
                    let mut cursor = end;
                    while let Some(p) = prev.get(cursor) {
                        path.push(p.clone());
                        cursor = p;
                    }
                    path.reverse();
                    return Some(path);
                }
                queue.push_back(neighbor);
            }
        }

        None
    }

    /// Induced subgraph around a seed set.
    ///
    /// The seeds are expanded `depth` times by predecessors and successors;
    /// unknown seeds are ignored. Nodes keep their attributes.
    #[must_use]
    pub fn subgraph(&self, seeds: &[EntityId], depth: usize) -> Graph {
        let mut members: BTreeSet<EntityId> =
            seeds.iter().filter(|id| self.contains(id)).cloned().collect();

        for _ in 0..depth {
            let frontier: Vec<EntityId> = members
                .iter()
                .flat_map(|id| self.neighbors(id))
                .filter(|id| !members.contains(id))
                .collect();
            if frontier.is_empty() {
                break;
            }
            members.extend(frontier);
        }

        let mut sub = Graph::new();
        for id in &members {
            if let Some(node) = self.nodes.get(id) {
                sub.add_node(id.clone(), node.entity_type.clone());
                sub.set_attributes(id, node.attributes.clone());
                if let Some(extra) = self.extra_attributes.get(id) {
                    sub.extra_attributes.insert(id.clone(), extra.clone());
                }
            }
        }
        for edge in &self.edges {
            if members.contains(&edge.source) && members.contains(&edge.target) {
                sub.add_edge(edge.clone());
            }
        }
        sub
    }

    /// Weakly connected components, each sorted, in order of first member.
    #[must_use]
    pub fn weakly_connected_components(&self) -> Vec<BTreeSet<EntityId>> {
        let mut visited: BTreeSet<&EntityId> = BTreeSet::new();
        let mut components = Vec::new();

        for start in self.nodes.keys() {
            if visited.contains(start) {
                continue;
            }
            let mut component = BTreeSet::new();
            let mut queue = VecDeque::from([start.clone()]);
            visited.insert(start);

            while let Some(current) = queue.pop_front() {
                for neighbor in self.neighbors(&current) {
                    if let Some((key, _)) = self.nodes.get_key_value(&neighbor) {
                        if visited.insert(key) {
                            queue.push_back(neighbor);
                        }
                    }
                }
                component.insert(current);
            }
            components.push(component);
        }

        components
    }

    // =========================================================================
    // STATISTICS & VIEWS
    // =========================================================================

    /// Whole-graph statistics, including the top entities by PageRank.
    #[must_use]
    pub fn statistics(&self) -> GraphStatistics {
        let n = self.node_count();
        let m = self.edge_count();

        let density = if n > 1 {
            m as f64 / (n as f64 * (n as f64 - 1.0))
        } else {
            0.0
        };

        let num_components = self.weakly_connected_components().len();

        let entity_types = self
            .type_index
            .iter()
            .map(|(t, ids)| (t.to_string(), ids.len()))
            .collect();

        let top_entities = match metrics::pagerank(self) {
            Ok(scores) => metrics::top_n(&scores, TOP_ENTITIES_LIMIT)
                .into_iter()
                .map(|(entity, score)| ScoredEntity { entity, score })
                .collect(),
            Err(_) => Vec::new(),
        };

        GraphStatistics {
            num_nodes: n,
            num_edges: m,
            density,
            is_connected: num_components == 1,
            num_components,
            entity_types,
            top_entities,
        }
    }

    /// Node/edge listing for renderers.
    #[must_use]
    pub fn view(&self) -> GraphView {
        GraphView {
            nodes: self
                .nodes
                .values()
                .map(|node| NodeView {
                    id: node.id.clone(),
                    entity_type: node.entity_type.clone(),
                    degree: self.degree(&node.id),
                    pagerank: node.attributes.pagerank,
                })
                .collect(),
            edges: self.edges.clone(),
        }
    }
}

// =============================================================================
// SERIALIZATION SUPPORT
// =============================================================================

/// A node as stored in the binary format.
///
/// Every field is always written: postcard is not self-describing, so the
/// optional-field skipping used for JSON cannot apply here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredNode {
    pub id: EntityId,
    pub entity_type: EntityType,
    pub degree_centrality: Option<f64>,
    pub pagerank: Option<f64>,
    pub betweenness_centrality: Option<f64>,
    pub contexts: Option<Vec<EntityContext>>,
}

impl From<&Node> for StoredNode {
    fn from(node: &Node) -> Self {
        Self {
            id: node.id.clone(),
            entity_type: node.entity_type.clone(),
            degree_centrality: node.attributes.degree_centrality,
            pagerank: node.attributes.pagerank,
            betweenness_centrality: node.attributes.betweenness_centrality,
            contexts: node.attributes.contexts.clone(),
        }
    }
}

/// Serializable representation of the graph for binary persistence.
///
/// Extra attributes are stored as `(id, key, json text)` triples for the
/// same reason.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializableGraph {
    pub nodes: Vec<StoredNode>,
    pub edges: Vec<Edge>,
    pub extra_attributes: Vec<(String, String, String)>,
}

impl From<&Graph> for SerializableGraph {
    fn from(graph: &Graph) -> Self {
        let mut extra_attributes = Vec::new();
        for (id, attrs) in &graph.extra_attributes {
            for (key, value) in attrs {
                extra_attributes.push((id.to_string(), key.clone(), value.to_string()));
            }
        }
        Self {
            nodes: graph.nodes.values().map(StoredNode::from).collect(),
            edges: graph.edges.clone(),
            extra_attributes,
        }
    }
}

impl From<SerializableGraph> for Graph {
    fn from(sg: SerializableGraph) -> Self {
        let mut graph = Graph::new();

        for node in sg.nodes {
            graph.add_node(node.id.clone(), node.entity_type);
            graph.set_attributes(
                &node.id,
                NodeAttributes {
                    degree_centrality: node.degree_centrality,
                    pagerank: node.pagerank,
                    betweenness_centrality: node.betweenness_centrality,
                    contexts: node.contexts,
                },
            );
        }

        for edge in sg.edges {
            graph.add_edge(edge);
        }

        for (id, key, text) in sg.extra_attributes {
            let value = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));
            graph.set_extra_attribute(&EntityId::new(id), key, value);
        }

        graph
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RelationshipRecord;

    fn id(s: &str) -> EntityId {
        EntityId::new(s)
    }

    fn chain() -> Graph {
        let mut graph = Graph::new();
        graph.add_edge(Edge::new("A", "B", "knows", ""));
        graph.add_edge(Edge::new("B", "C", "knows", ""));
        graph
    }

    #[test]
    fn add_node_is_idempotent() {
        let mut graph = Graph::new();
        assert!(graph.add_node(id("Alice"), EntityType::new("PERSON")));
        assert!(!graph.add_node(id("Alice"), EntityType::new("PERSON")));
        assert_eq!(graph.node_count(), 1);
    }

    #[test]
    fn later_type_wins_in_type_index() {
        let mut graph = Graph::new();
        graph.add_node(id("Apple"), EntityType::new("ORG"));
        graph.add_node(id("Apple"), EntityType::new("CONCEPT"));

        assert_eq!(
            graph.node(&id("Apple")).map(|n| n.entity_type.as_str()),
            Some("CONCEPT")
        );
        assert!(graph.entities_of_type(&EntityType::new("ORG")).is_none());
        assert!(
            graph
                .entities_of_type(&EntityType::new("CONCEPT"))
                .is_some_and(|ids| ids.contains(&id("Apple")))
        );
    }

    #[test]
    fn edge_endpoints_are_auto_created_as_entity() {
        let mut graph = Graph::new();
        graph.add_edge(Edge::new("X", "Y", "related_to", ""));

        assert_eq!(graph.node_count(), 2);
        assert_eq!(
            graph.node(&id("X")).map(|n| n.entity_type.as_str()),
            Some("ENTITY")
        );
    }

    #[test]
    fn edge_endpoint_does_not_retag_existing_node() {
        let mut graph = Graph::new();
        graph.add_node(id("Alice"), EntityType::new("PERSON"));
        graph.add_edge(Edge::new("Alice", "Acme", "works_at", ""));

        assert_eq!(
            graph.node(&id("Alice")).map(|n| n.entity_type.as_str()),
            Some("PERSON")
        );
    }

    #[test]
    fn parallel_edges_are_preserved() {
        let mut graph = Graph::new();
        graph.add_edge(Edge::new("A", "B", "likes", ""));
        graph.add_edge(Edge::new("A", "B", "dislikes", ""));
        graph.add_edge(Edge::new("A", "B", "likes", ""));

        assert_eq!(graph.edge_count(), 3);
        assert_eq!(
            graph.relations_between(&id("A"), &id("B")),
            vec!["likes", "dislikes", "likes"]
        );
        assert_eq!(graph.degree(&id("A")), 3);
    }

    #[test]
    fn context_is_truncated() {
        let mut graph = Graph::new();
        let long = "x".repeat(MAX_CONTEXT_LENGTH + 50);
        graph.add_edge(Edge::new("A", "B", "r", long));

        let edge = graph.edges().next().expect("edge");
        assert_eq!(edge.context.chars().count(), MAX_CONTEXT_LENGTH);
    }

    #[test]
    fn entity_info_lists_distinct_edges() {
        let mut graph = Graph::new();
        graph.add_edge(Edge::new("A", "B", "likes", "first"));
        graph.add_edge(Edge::new("A", "B", "likes", "second"));
        graph.add_edge(Edge::new("C", "A", "knows", ""));

        let info = graph.get_entity_info(&id("A"));
        assert_eq!(info.outgoing_edges.len(), 1);
        assert_eq!(info.incoming_edges.len(), 1);
        assert_eq!(info.neighbors, vec![id("B"), id("C")]);
    }

    #[test]
    fn entity_info_absent_is_sentinel() {
        let graph = Graph::new();
        assert!(graph.get_entity_info(&id("nobody")).is_empty());
    }

    #[test]
    fn shortest_path_follows_direction() {
        let graph = chain();
        assert_eq!(
            graph.shortest_path(&id("A"), &id("C")),
            Some(vec![id("A"), id("B"), id("C")])
        );
        assert_eq!(graph.shortest_path(&id("C"), &id("A")), None);
        assert_eq!(
            graph.shortest_path_undirected(&id("C"), &id("A")),
            Some(vec![id("C"), id("B"), id("A")])
        );
    }

    #[test]
    fn shortest_path_to_self_and_unknown() {
        let graph = chain();
        assert_eq!(graph.shortest_path(&id("A"), &id("A")), Some(vec![id("A")]));
        assert_eq!(graph.shortest_path(&id("A"), &id("Z")), None);
    }

    #[test]
    fn subgraph_expands_both_directions() {
        let graph = chain();
        let sub = graph.subgraph(&[id("B")], 1);
        assert_eq!(sub.node_count(), 3);
        assert_eq!(sub.edge_count(), 2);

        let seed_only = graph.subgraph(&[id("A")], 0);
        assert_eq!(seed_only.node_count(), 1);
        assert_eq!(seed_only.edge_count(), 0);
    }

    #[test]
    fn subgraph_ignores_unknown_seeds() {
        let graph = chain();
        let sub = graph.subgraph(&[id("nope")], 3);
        assert!(sub.is_empty());
    }

    #[test]
    fn statistics_on_empty_graph() {
        let stats = Graph::new().statistics();
        assert_eq!(stats.num_nodes, 0);
        assert_eq!(stats.num_components, 0);
        assert!(!stats.is_connected);
        assert_eq!(stats.density, 0.0);
        assert!(stats.top_entities.is_empty());
    }

    #[test]
    fn statistics_counts_components() {
        let mut graph = chain();
        graph.add_node(id("Lonely"), EntityType::new("CONCEPT"));

        let stats = graph.statistics();
        assert_eq!(stats.num_nodes, 4);
        assert_eq!(stats.num_edges, 2);
        assert_eq!(stats.num_components, 2);
        assert!(!stats.is_connected);
        assert!((stats.density - 2.0 / 12.0).abs() < 1e-12);
        assert_eq!(stats.entity_types.get("ENTITY"), Some(&3));
        assert_eq!(stats.entity_types.get("CONCEPT"), Some(&1));
    }

    #[test]
    fn build_replaces_previous_content() {
        let extraction = ExtractionResult::new()
            .with_entities("PERSON", &["Alice"])
            .with_relationship("Alice", "knows", "Bob");

        let mut graph = Graph::new();
        graph.add_edge(Edge::new("Old", "Stuff", "r", ""));
        let report = graph.build(&extraction);

        assert_eq!(report.nodes, 2);
        assert_eq!(report.edges, 1);
        assert!(!graph.contains(&id("Old")));
    }

    #[test]
    fn build_skips_malformed_records() {
        let mut extraction = ExtractionResult::new().with_relationship("A", "r", "B");
        extraction.relationships.push(RelationshipRecord {
            source: Some("A".to_string()),
            ..RelationshipRecord::default()
        });
        extraction
            .entities
            .insert("PERSON".to_string(), vec!["  ".to_string()]);

        let report = Graph::new().build(&extraction);
        assert_eq!(report.edges, 1);
        assert_eq!(report.skipped_relationships, 1);
        assert_eq!(report.skipped_entities, 1);
    }

    #[test]
    fn build_attaches_contexts_to_known_entities() {
        let mut contexts = BTreeMap::new();
        contexts.insert(
            "Alice".to_string(),
            vec![EntityContext {
                source: "notes.md".to_string(),
                kind: "PERSON".to_string(),
            }],
        );
        contexts.insert("Ghost".to_string(), Vec::new());

        let mut extraction = ExtractionResult::new().with_entities("PERSON", &["Alice"]);
        extraction.entity_contexts = Some(contexts);

        let mut graph = Graph::new();
        let report = graph.build(&extraction);
        assert_eq!(report.contexts_attached, 1);
        assert!(!graph.contains(&id("Ghost")));
        let attached = graph
            .node(&id("Alice"))
            .and_then(|n| n.attributes.contexts.as_ref())
            .map(Vec::len);
        assert_eq!(attached, Some(1));
    }

    #[test]
    fn build_attaches_contexts_under_padded_names() {
        let mut contexts = BTreeMap::new();
        contexts.insert(
            " Alice ".to_string(),
            vec![EntityContext {
                source: "notes.md".to_string(),
                kind: "PERSON".to_string(),
            }],
        );
        contexts.insert("   ".to_string(), Vec::new());

        let mut extraction = ExtractionResult::new().with_entities("PERSON", &[" Alice"]);
        extraction.entity_contexts = Some(contexts);

        let mut graph = Graph::new();
        let report = graph.build(&extraction);
        assert_eq!(report.contexts_attached, 1);
        assert!(
            graph
                .node(&id("Alice"))
                .and_then(|n| n.attributes.contexts.as_ref())
                .is_some()
        );
    }

    #[test]
    fn build_keeps_valid_records_from_mixed_json_batch() {
        let json = r#"{
            "entities": {"PERSON": ["Alice", null], "ORG": ["Acme"]},
            "relationships": [
                {"source": "Alice", "relation": "works_at", "target": "Acme"},
                {"source": 42, "relation": "works_at", "target": "Acme"},
                "Bob works at Acme"
            ]
        }"#;
        let extraction: ExtractionResult = serde_json::from_str(json).expect("parse");

        let mut graph = Graph::new();
        let report = graph.build(&extraction);
        assert_eq!(report.nodes, 2);
        assert_eq!(report.edges, 1);
        assert_eq!(report.skipped_relationships, 2);
        assert_eq!(report.skipped_entities, 1);
        assert_eq!(graph.edges().next().map(|e| e.relation.as_str()), Some("works_at"));
    }

    #[test]
    fn serializable_graph_roundtrip() {
        let mut graph = chain();
        graph.add_node(id("A"), EntityType::new("PERSON"));
        graph.set_extra_attribute(&id("A"), "color".to_string(), serde_json::json!("red"));

        let restored = Graph::from(SerializableGraph::from(&graph));

        assert_eq!(restored.node_count(), graph.node_count());
        assert_eq!(restored.edge_count(), graph.edge_count());
        assert_eq!(
            restored.node(&id("A")).map(|n| n.entity_type.as_str()),
            Some("PERSON")
        );
        assert_eq!(
            restored
                .extra_attributes(&id("A"))
                .and_then(|m| m.get("color")),
            Some(&serde_json::json!("red"))
        );
    }

    #[test]
    fn view_lists_nodes_with_degree() {
        let graph = chain();
        let view = graph.view();
        assert_eq!(view.nodes.len(), 3);
        assert_eq!(view.edges.len(), 2);
        let b = view.nodes.iter().find(|n| n.id == id("B")).expect("B");
        assert_eq!(b.degree, 2);
    }
}
