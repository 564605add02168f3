//! # Community Detection
//!
//! Greedy modularity maximization in the Clauset-Newman-Moore style.
//!
//! The directed multigraph is first projected to an undirected simple graph:
//! parallel edges and opposite directions collapse into one link, and
//! self-loops are dropped. Every node starts in its own community; the pair
//! of adjacent communities with the largest modularity gain is merged until
//! no merge improves modularity.

use crate::graph::Graph;
use crate::EntityId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A partition of the graph into communities.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CommunityPartition {
    /// Communities sorted by size (largest first), then by first member.
    /// Members are in id order.
    pub communities: Vec<Vec<EntityId>>,
    /// Newman modularity of the partition.
    pub modularity: f64,
}

impl CommunityPartition {
    /// Number of communities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.communities.len()
    }

    /// Whether there are no communities (empty graph).
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.communities.is_empty()
    }
}

/// Undirected simple projection: node ids and their index-level adjacency.
struct Projection {
    ids: Vec<EntityId>,
    adjacency: Vec<BTreeSet<usize>>,
    edge_count: usize,
}

fn project(graph: &Graph) -> Projection {
    let ids: Vec<EntityId> = graph.node_ids().cloned().collect();
    let index: BTreeMap<&EntityId, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

    let mut adjacency = vec![BTreeSet::new(); ids.len()];
    let mut edge_count = 0usize;
    for edge in graph.edges() {
        let (Some(&a), Some(&b)) = (index.get(&edge.source), index.get(&edge.target)) else {
            continue;
        };
        if a == b {
            continue;
        }
        if adjacency[a].insert(b) {
            adjacency[b].insert(a);
            edge_count += 1;
        }
    }

    Projection {
        ids,
        adjacency,
        edge_count,
    }
}

/// Partition the graph by greedy modularity maximization.
///
/// A graph without links yields one singleton community per node.
#[must_use]
pub fn greedy_modularity_communities(graph: &Graph) -> CommunityPartition {
    let Projection {
        ids,
        adjacency,
        edge_count,
    } = project(graph);

    if ids.is_empty() {
        return CommunityPartition::default();
    }

    let mut members: BTreeMap<usize, BTreeSet<usize>> =
        (0..ids.len()).map(|i| (i, BTreeSet::from([i]))).collect();

    if edge_count > 0 {
        let m = edge_count as f64;

        // Sum of member degrees per community.
        let mut degree: BTreeMap<usize, f64> = adjacency
            .iter()
            .enumerate()
            .map(|(i, nbrs)| (i, nbrs.len() as f64))
            .collect();

        // Link counts between communities.
        let mut links: BTreeMap<usize, BTreeMap<usize, f64>> = adjacency
            .iter()
            .enumerate()
            .map(|(i, nbrs)| (i, nbrs.iter().map(|&j| (j, 1.0)).collect()))
            .collect();

        loop {
            let mut best: Option<(f64, usize, usize)> = None;
            for (&i, row) in &links {
                for (&j, &w) in row {
                    if j <= i {
                        continue;
                    }
                    let ki = degree.get(&i).copied().unwrap_or(0.0);
                    let kj = degree.get(&j).copied().unwrap_or(0.0);
                    let gain = w / m - ki * kj / (2.0 * m * m);
                    // Iteration is in (i, j) order, so a strict comparison
                    // keeps the smallest pair on ties.
                    if best.is_none_or(|(g, _, _)| gain > g) {
                        best = Some((gain, i, j));
                    }
                }
            }

            let Some((gain, keep, absorb)) = best else {
                break;
            };
            if gain <= 0.0 {
                break;
            }

            // Merge `absorb` into `keep`.
            if let Some(moved) = members.remove(&absorb) {
                members.entry(keep).or_default().extend(moved);
            }
            let absorbed_degree = degree.remove(&absorb).unwrap_or(0.0);
            *degree.entry(keep).or_insert(0.0) += absorbed_degree;

            let absorbed_links = links.remove(&absorb).unwrap_or_default();
            for (other, w) in absorbed_links {
                if other == keep {
                    continue;
                }
                *links.entry(keep).or_default().entry(other).or_insert(0.0) += w;
                if let Some(row) = links.get_mut(&other) {
                    row.remove(&absorb);
                    *row.entry(keep).or_insert(0.0) += w;
                }
            }
            if let Some(row) = links.get_mut(&keep) {
                row.remove(&absorb);
            }
        }
    }

    let mut communities: Vec<Vec<EntityId>> = members
        .into_values()
        .map(|set| set.into_iter().map(|i| ids[i].clone()).collect())
        .collect();
    communities.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.first().cmp(&b.first())));

    let modularity = modularity_of(&ids, &adjacency, edge_count, &communities);

    tracing::debug!(
        communities = communities.len(),
        modularity,
        "community detection finished"
    );

    CommunityPartition {
        communities,
        modularity,
    }
}

/// `Q = sum_c [ L_c / m - (d_c / 2m)^2 ]` over the simple projection.
fn modularity_of(
    ids: &[EntityId],
    adjacency: &[BTreeSet<usize>],
    edge_count: usize,
    communities: &[Vec<EntityId>],
) -> f64 {
    if edge_count == 0 {
        return 0.0;
    }
    let m = edge_count as f64;
    let index: BTreeMap<&EntityId, usize> = ids.iter().enumerate().map(|(i, id)| (id, i)).collect();

    communities
        .iter()
        .map(|community| {
            let set: BTreeSet<usize> = community
                .iter()
                .filter_map(|id| index.get(id).copied())
                .collect();
            let mut internal = 0usize;
            let mut degree_sum = 0usize;
            for &i in &set {
                degree_sum += adjacency[i].len();
                internal += adjacency[i].iter().filter(|j| set.contains(j)).count();
            }
            let internal = internal as f64 / 2.0;
            let fraction = degree_sum as f64 / (2.0 * m);
            internal / m - fraction * fraction
        })
        .sum()
}

// =============================================================================
// TESTS
// =============================================================================
