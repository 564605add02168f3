//! # Metrics Engine
//!
//! Structural importance scores for every node:
//!
//! - **Degree centrality**: distinct neighbours (direction ignored) over `n - 1`
//! - **PageRank**: power iteration, parallel edges act as weights
//! - **Betweenness**: Brandes' algorithm, only below `BETWEENNESS_NODE_LIMIT`
//!
//! The scoring functions are pure. `MetricsEngine::compute` computes every
//! score first and only then writes them back, so a failed pass leaves the
//! graph unchanged.

use crate::graph::Graph;
use crate::primitives::{
    BETWEENNESS_NODE_LIMIT, PAGERANK_DAMPING, PAGERANK_MAX_ITERATIONS, PAGERANK_TOLERANCE,
};
use crate::{EntityId, KgError};
use std::collections::{BTreeMap, VecDeque};

/// Per-node scores keyed by entity.
pub type Scores = BTreeMap<EntityId, f64>;

/// What a metrics pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricsOutcome {
    /// Metrics were written to every node.
    Computed {
        /// Whether betweenness was computed (graph under the size gate).
        betweenness: bool,
        /// Whether PageRank met its tolerance before the iteration cap.
        pagerank_converged: bool,
    },
    /// The graph had no nodes; nothing was written.
    Skipped,
}

// =============================================================================
// DEGREE CENTRALITY
// =============================================================================

/// Distinct undirected neighbours divided by `n - 1`.
///
/// A single-node graph scores its node 1.0.
pub fn degree_centrality(graph: &Graph) -> Result<Scores, KgError> {
    let n = graph.node_count();
    if n == 0 {
        return Err(KgError::EmptyGraph);
    }
    if n == 1 {
        return Ok(graph.node_ids().map(|id| (id.clone(), 1.0)).collect());
    }

    let scale = 1.0 / (n as f64 - 1.0);
    Ok(graph
        .node_ids()
        .map(|id| (id.clone(), graph.neighbors(id).len() as f64 * scale))
        .collect())
}

// =============================================================================
// PAGERANK
// =============================================================================

/// Result of a PageRank run.
#[derive(Debug, Clone, PartialEq)]
pub struct PageRank {
    pub scores: Scores,
    pub iterations: usize,
    pub converged: bool,
}

/// PageRank with the default damping, cap and tolerance.
pub fn pagerank(graph: &Graph) -> Result<Scores, KgError> {
    pagerank_with(
        graph,
        PAGERANK_DAMPING,
        PAGERANK_MAX_ITERATIONS,
        PAGERANK_TOLERANCE,
    )
    .map(|pr| pr.scores)
}

/// Power-iteration PageRank.
///
/// Each parallel edge adds one unit of weight to its link. Rank held by
/// dangling nodes is spread uniformly. Iteration stops once the L1 change
/// drops below `n * tolerance`; if `max_iterations` is reached first the
/// last iterate is returned with `converged = false`.
pub fn pagerank_with(
    graph: &Graph,
    damping: f64,
    max_iterations: usize,
    tolerance: f64,
) -> Result<PageRank, KgError> {
    let n = graph.node_count();
    if n == 0 {
        return Err(KgError::EmptyGraph);
    }

    let ids: Vec<EntityId> = graph.node_ids().cloned().collect();
    let index: BTreeMap<&EntityId, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

    // links[i] = (j, w) with w = edges(i -> j) / out_edges(i)
    let mut links: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
    for (i, id) in ids.iter().enumerate() {
        let mut counts: BTreeMap<usize, usize> = BTreeMap::new();
        let mut total = 0usize;
        for edge in graph.out_edges(id) {
            if let Some(&j) = index.get(&edge.target) {
                *counts.entry(j).or_insert(0) += 1;
                total += 1;
            }
        }
        if total > 0 {
            links[i] = counts
                .into_iter()
                .map(|(j, c)| (j, c as f64 / total as f64))
                .collect();
        }
    }

    let uniform = 1.0 / n as f64;
    let mut x = vec![uniform; n];

    for iteration in 1..=max_iterations {
        let last = x;
        x = vec![0.0; n];

        let dangling_sum: f64 = damping
            * links
                .iter()
                .zip(&last)
                .filter(|(l, _)| l.is_empty())
                .map(|(_, v)| v)
                .sum::<f64>();

        for (i, out) in links.iter().enumerate() {
            for &(j, w) in out {
                x[j] += damping * last[i] * w;
            }
        }
        for value in &mut x {
            *value += dangling_sum * uniform + (1.0 - damping) * uniform;
        }

        let err: f64 = x.iter().zip(&last).map(|(a, b)| (a - b).abs()).sum();
        if err < n as f64 * tolerance {
            return Ok(PageRank {
                scores: ids.into_iter().zip(x).collect(),
                iterations: iteration,
                converged: true,
            });
        }
    }

    tracing::warn!(
        max_iterations,
        "PageRank did not converge, using last iterate"
    );
    Ok(PageRank {
        scores: ids.into_iter().zip(x).collect(),
        iterations: max_iterations,
        converged: false,
    })
}

// =============================================================================
// BETWEENNESS CENTRALITY
// =============================================================================

/// Normalized betweenness centrality (Brandes).
///
/// Paths follow edge direction over distinct successors. Scores are scaled
/// by `1 / ((n - 1)(n - 2))`; graphs with two nodes or fewer score zero.
pub fn betweenness_centrality(graph: &Graph) -> Result<Scores, KgError> {
    let n = graph.node_count();
    if n == 0 {
        return Err(KgError::EmptyGraph);
    }

    let ids: Vec<EntityId> = graph.node_ids().cloned().collect();
    let index: BTreeMap<&EntityId, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();
    let adjacency: Vec<Vec<usize>> = ids
        .iter()
        .map(|id| {
            graph
                .successors(id)
                .iter()
                .filter_map(|s| index.get(s).copied())
                .collect()
        })
        .collect();

    let mut centrality = vec![0.0f64; n];

    for s in 0..n {
        let mut stack: Vec<usize> = Vec::with_capacity(n);
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0f64; n];
        let mut dist: Vec<Option<usize>> = vec![None; n];
        sigma[s] = 1.0;
        dist[s] = Some(0);

        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            let dv = dist[v].unwrap_or(0);
            for &w in &adjacency[v] {
                if dist[w].is_none() {
                    dist[w] = Some(dv + 1);
                    queue.push_back(w);
                }
                if dist[w] == Some(dv + 1) {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0f64; n];
        while let Some(w) = stack.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    let scale = if n > 2 {
        1.0 / ((n as f64 - 1.0) * (n as f64 - 2.0))
    } else {
        0.0
    };

    Ok(ids
        .into_iter()
        .zip(centrality)
        .map(|(id, c)| (id, c * scale))
        .collect())
}

// =============================================================================
// RANKING HELPERS
// =============================================================================

/// The `limit` highest scores, descending; ties broken by id.
#[must_use]
pub fn top_n(scores: &Scores, limit: usize) -> Vec<(EntityId, f64)> {
    let mut ranked: Vec<(EntityId, f64)> =
        scores.iter().map(|(id, s)| (id.clone(), *s)).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    ranked.truncate(limit);
    ranked
}

// =============================================================================
// ENGINE
// =============================================================================

/// Writes the metric attributes of every node.
pub struct MetricsEngine;

impl MetricsEngine {
    /// Compute all metrics and write them to the graph.
    ///
    /// Fails with `EmptyGraph` on a graph without nodes. On failure nothing
    /// is written.
    pub fn try_compute(graph: &mut Graph) -> Result<MetricsOutcome, KgError> {
        let degree = degree_centrality(graph)?;
        let pagerank = pagerank_with(
            graph,
            PAGERANK_DAMPING,
            PAGERANK_MAX_ITERATIONS,
            PAGERANK_TOLERANCE,
        )?;
        let betweenness = if graph.node_count() < BETWEENNESS_NODE_LIMIT {
            Some(betweenness_centrality(graph)?)
        } else {
            tracing::info!(
                nodes = graph.node_count(),
                limit = BETWEENNESS_NODE_LIMIT,
                "graph too large, skipping betweenness centrality"
            );
            None
        };

        for node in graph.nodes_mut() {
            let attrs = &mut node.attributes;
            attrs.degree_centrality = degree.get(&node.id).copied();
            attrs.pagerank = pagerank.scores.get(&node.id).copied();
            attrs.betweenness_centrality = betweenness
                .as_ref()
                .and_then(|b| b.get(&node.id).copied());
        }

        Ok(MetricsOutcome::Computed {
            betweenness: betweenness.is_some(),
            pagerank_converged: pagerank.converged,
        })
    }

    /// Like `try_compute`, but an empty graph is logged and skipped.
    pub fn compute(graph: &mut Graph) -> MetricsOutcome {
        match Self::try_compute(graph) {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::warn!(error = %e, "skipping metrics computation");
                MetricsOutcome::Skipped
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Edge, EntityType};

    fn id(s: &str) -> EntityId {
        EntityId::new(s)
    }

    fn graph_of(edges: &[(&str, &str)]) -> Graph {
        let mut graph = Graph::new();
        for (s, t) in edges {
            graph.add_edge(Edge::new(*s, *t, "r", ""));
        }
        graph
    }

    #[test]
    fn empty_graph_is_an_error() {
        let graph = Graph::new();
        assert!(matches!(degree_centrality(&graph), Err(KgError::EmptyGraph)));
        assert!(matches!(pagerank(&graph), Err(KgError::EmptyGraph)));
        assert!(matches!(
            betweenness_centrality(&graph),
            Err(KgError::EmptyGraph)
        ));
    }

    #[test]
    fn compute_on_empty_graph_is_skipped() {
        let mut graph = Graph::new();
        assert_eq!(MetricsEngine::compute(&mut graph), MetricsOutcome::Skipped);
    }

    #[test]
    fn single_node_degree_centrality_is_one() {
        let mut graph = Graph::new();
        graph.add_node(id("solo"), EntityType::default());
        let scores = degree_centrality(&graph).expect("scores");
        assert_eq!(scores.get(&id("solo")), Some(&1.0));
    }

    #[test]
    fn degree_centrality_ignores_parallel_edges() {
        let graph = graph_of(&[("A", "B"), ("A", "B"), ("C", "A")]);
        let scores = degree_centrality(&graph).expect("scores");
        assert_eq!(scores.get(&id("A")), Some(&1.0));
        assert_eq!(scores.get(&id("B")), Some(&0.5));
    }

    #[test]
    fn pagerank_sums_to_one() {
        let graph = graph_of(&[("A", "B"), ("B", "C"), ("C", "A"), ("C", "D")]);
        let scores = pagerank(&graph).expect("scores");
        let total: f64 = scores.values().sum();
        assert!((total - 1.0).abs() < 1e-6, "sum was {total}");
    }

    #[test]
    fn pagerank_symmetric_cycle_is_uniform() {
        let graph = graph_of(&[("A", "B"), ("B", "C"), ("C", "A")]);
        let scores = pagerank(&graph).expect("scores");
        for score in scores.values() {
            assert!((score - 1.0 / 3.0).abs() < 1e-6);
        }
    }

    #[test]
    fn pagerank_favors_sinks_of_many_links() {
        let graph = graph_of(&[("A", "Hub"), ("B", "Hub"), ("C", "Hub")]);
        let scores = pagerank(&graph).expect("scores");
        let top = top_n(&scores, 1);
        assert_eq!(top[0].0, id("Hub"));
    }

    #[test]
    fn pagerank_parallel_edges_act_as_weights() {
        let graph = graph_of(&[("A", "B"), ("A", "B"), ("A", "C")]);
        let scores = pagerank(&graph).expect("scores");
        let b = scores.get(&id("B")).copied().unwrap_or_default();
        let c = scores.get(&id("C")).copied().unwrap_or_default();
        assert!(b > c);
    }

    #[test]
    fn pagerank_cap_returns_last_iterate() {
        let graph = graph_of(&[("A", "B"), ("B", "C")]);
        let result = pagerank_with(&graph, 0.85, 1, 0.0).expect("result");
        assert!(!result.converged);
        assert_eq!(result.iterations, 1);
        assert_eq!(result.scores.len(), 3);
    }

    #[test]
    fn betweenness_of_chain_middle() {
        let graph = graph_of(&[("A", "B"), ("B", "C")]);
        let scores = betweenness_centrality(&graph).expect("scores");
        // One pair (A, C) of 2 ordered pairs through B: 1 / (2 * 1).
        assert!((scores[&id("B")] - 0.5).abs() < 1e-12);
        assert_eq!(scores[&id("A")], 0.0);
        assert_eq!(scores[&id("C")], 0.0);
    }

    #[test]
    fn betweenness_splits_over_equal_paths() {
        let graph = graph_of(&[("S", "X"), ("S", "Y"), ("X", "T"), ("Y", "T")]);
        let scores = betweenness_centrality(&graph).expect("scores");
        assert!((scores[&id("X")] - scores[&id("Y")]).abs() < 1e-12);
        assert!(scores[&id("X")] > 0.0);
    }

    #[test]
    fn betweenness_two_nodes_is_zero() {
        let graph = graph_of(&[("A", "B")]);
        let scores = betweenness_centrality(&graph).expect("scores");
        assert!(scores.values().all(|v| *v == 0.0));
    }

    #[test]
    fn compute_writes_all_metrics() {
        let mut graph = graph_of(&[("A", "B"), ("B", "C")]);
        let outcome = MetricsEngine::compute(&mut graph);
        assert!(matches!(
            outcome,
            MetricsOutcome::Computed {
                betweenness: true,
                ..
            }
        ));
        for node in graph.nodes() {
            assert!(node.attributes.has_metrics());
            assert!(node.attributes.betweenness_centrality.is_some());
        }
    }

    fn chain_of(len: usize) -> Graph {
        let mut graph = Graph::new();
        for i in 1..len {
            graph.add_edge(Edge::new(format!("n{}", i - 1), format!("n{i}"), "next", ""));
        }
        graph
    }

    #[test]
    fn betweenness_skipped_at_node_limit() {
        let mut graph = chain_of(BETWEENNESS_NODE_LIMIT);
        assert_eq!(graph.node_count(), BETWEENNESS_NODE_LIMIT);

        let outcome = MetricsEngine::compute(&mut graph);
        assert!(matches!(
            outcome,
            MetricsOutcome::Computed {
                betweenness: false,
                ..
            }
        ));
        for node in graph.nodes() {
            assert!(node.attributes.has_metrics());
            assert!(node.attributes.betweenness_centrality.is_none());
        }
    }

    #[test]
    fn betweenness_computed_just_below_node_limit() {
        let mut graph = chain_of(BETWEENNESS_NODE_LIMIT - 1);
        assert_eq!(graph.node_count(), BETWEENNESS_NODE_LIMIT - 1);

        let outcome = MetricsEngine::compute(&mut graph);
        assert!(matches!(
            outcome,
            MetricsOutcome::Computed {
                betweenness: true,
                ..
            }
        ));
        assert!(
            graph
                .nodes()
                .all(|n| n.attributes.betweenness_centrality.is_some())
        );
        // Interior chain nodes sit on shortest paths, the ends do not.
        let middle = graph
            .node(&id("n500"))
            .and_then(|n| n.attributes.betweenness_centrality)
            .unwrap_or_default();
        assert!(middle > 0.0);
        assert_eq!(
            graph
                .node(&id("n0"))
                .and_then(|n| n.attributes.betweenness_centrality),
            Some(0.0)
        );
    }

    #[test]
    fn top_n_breaks_ties_by_id() {
        let mut scores = Scores::new();
        scores.insert(id("b"), 0.5);
        scores.insert(id("a"), 0.5);
        scores.insert(id("c"), 0.9);
        let ranked = top_n(&scores, 2);
        assert_eq!(ranked[0].0, id("c"));
        assert_eq!(ranked[1].0, id("a"));
    }
}
