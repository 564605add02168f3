//! Intent handlers.
//!
//! One function per intent. Handlers never fail on bad input: unresolvable
//! mentions become "not found" answers. The only `Err` they return is an
//! embedding backend failure.

use super::dispatcher::QueryEngine;
use super::patterns::IntentMatch;
use super::types::{
    CommunitiesData, CommunitySummary, ConnectedEntity, Connection, Hop, HopDirection,
    ImportanceData, NeighborsData, PathData, QueryData, QueryResult, RankedEntity,
    RelationshipData, SearchData, SearchHit, SimilarData, SimilarEntity, Topic, TopicGroup,
    TopicsData, VisualizationHint,
};
use crate::communities::greedy_modularity_communities;
use crate::graph::Graph;
use crate::metrics::{self, Scores};
use crate::primitives::{
    ANSWER_LIST_LIMIT, COMMUNITY_LIMIT, COMMUNITY_MEMBER_LIMIT, IMPORTANCE_LIMIT,
    MAIN_TOPICS_LIMIT, SAMPLE_EDGE_LIMIT, SEARCH_LIMIT, SIMILAR_LIMIT, TOPICS_PER_TYPE,
    TYPE_FILTER_LIMIT,
};
use crate::{EntityId, EntityType, KgError};
use std::collections::BTreeMap;
use std::fmt::Write as _;

// =============================================================================
// HELPERS
// =============================================================================

fn entity_type_of(graph: &Graph, id: &EntityId) -> EntityType {
    graph
        .node(id)
        .map(|n| n.entity_type.clone())
        .unwrap_or_default()
}

/// PageRank from node attributes, computed afresh if any node lacks it.
fn pagerank_scores(graph: &Graph) -> Scores {
    let stored: Option<Scores> = graph
        .nodes()
        .map(|n| n.attributes.pagerank.map(|p| (n.id.clone(), p)))
        .collect();
    stored.unwrap_or_else(|| metrics::pagerank(graph).unwrap_or_default())
}

/// Append up to `ANSWER_LIST_LIMIT` bullet lines, then an "and N more" line.
fn push_list<'i, I>(answer: &mut String, items: I, total: usize)
where
    I: IntoIterator<Item = &'i EntityId>,
{
    for item in items.into_iter().take(ANSWER_LIST_LIMIT) {
        let _ = write!(answer, "\n  - {item}");
    }
    if total > ANSWER_LIST_LIMIT {
        let _ = write!(answer, "\n  ... and {} more", total - ANSWER_LIST_LIMIT);
    }
}

fn entity_not_found(span: &str) -> QueryResult {
    QueryResult::not_found(
        format!("Could not find '{span}' in the knowledge graph."),
        vec![span.to_string()],
    )
}

fn pair_not_found(first: &str, second: &str) -> QueryResult {
    QueryResult::not_found(
        "Could not find one or both entities in the graph.",
        vec![first.to_string(), second.to_string()],
    )
}

// =============================================================================
// HANDLERS
// =============================================================================

/// Top entities by PageRank, grouped by type.
pub fn main_topics(engine: &QueryEngine<'_>, _m: &IntentMatch) -> Result<QueryResult, KgError> {
    let graph = engine.graph();
    let ranked = metrics::top_n(&pagerank_scores(graph), MAIN_TOPICS_LIMIT);

    let mut groups: Vec<TopicGroup> = Vec::new();
    for (id, score) in &ranked {
        let entity_type = entity_type_of(graph, id);
        let topic = Topic {
            name: id.clone(),
            importance: *score,
            connections: graph.degree(id),
        };
        match groups.iter_mut().find(|g| g.entity_type == entity_type) {
            Some(group) => group.topics.push(topic),
            None => groups.push(TopicGroup {
                entity_type,
                topics: vec![topic],
            }),
        }
    }

    let mut answer = String::from("The main topics and concepts in the knowledge graph are:");
    for group in &groups {
        let _ = write!(answer, "\n\n{}:", group.entity_type);
        for topic in group.topics.iter().take(TOPICS_PER_TYPE) {
            let _ = write!(
                answer,
                "\n  - {} (importance: {:.4}, connections: {})",
                topic.name, topic.importance, topic.connections
            );
        }
    }

    Ok(QueryResult::new(
        answer,
        QueryData::Topics(TopicsData {
            topics: groups,
            total_topics: ranked.len(),
        }),
        VisualizationHint::MainTopics,
    ))
}

/// How two entities are related: direct edges both ways plus a path.
pub fn relationship(engine: &QueryEngine<'_>, m: &IntentMatch) -> Result<QueryResult, KgError> {
    let graph = engine.graph();
    let (first, second) = (m.span(0), m.span(1));

    let (Some(a), Some(b)) = (engine.resolve(first)?, engine.resolve(second)?) else {
        return Ok(pair_not_found(first, second));
    };

    let mut direct_relations: Vec<String> = graph
        .relations_between(&a, &b)
        .into_iter()
        .map(str::to_string)
        .collect();
    direct_relations.extend(
        graph
            .relations_between(&b, &a)
            .into_iter()
            .map(|r| format!("{r} (reverse)")),
    );

    let path = graph
        .shortest_path(&a, &b)
        .or_else(|| graph.shortest_path_undirected(&a, &b));

    let connection = match path.as_ref().map(Vec::len) {
        _ if a == b => Connection::SameEntity,
        Some(2) => Connection::Direct,
        Some(n) if n > 2 => Connection::Indirect,
        _ => Connection::None,
    };

    let hops: Vec<Hop> = path
        .as_deref()
        .unwrap_or_default()
        .windows(2)
        .filter_map(|pair| {
            let (u, v) = (&pair[0], &pair[1]);
            if let Some(relation) = graph.relations_between(u, v).first() {
                return Some(Hop {
                    source: u.clone(),
                    relation: (*relation).to_string(),
                    target: v.clone(),
                    direction: HopDirection::Forward,
                });
            }
            graph.relations_between(v, u).first().map(|relation| Hop {
                source: u.clone(),
                relation: (*relation).to_string(),
                target: v.clone(),
                direction: HopDirection::Reverse,
            })
        })
        .collect();

    let mut answer = format!("Relationship between '{a}' and '{b}':");
    if direct_relations.is_empty() {
        answer.push_str("\n\nNo direct relationship found.");
    } else {
        let _ = write!(
            answer,
            "\n\nDirect relationships: {}",
            direct_relations.join(", ")
        );
    }
    match connection {
        Connection::SameEntity => answer.push_str("\n\nBoth names refer to the same entity."),
        Connection::Direct => answer.push_str("\n\nThey are directly connected."),
        Connection::Indirect => {
            let _ = write!(answer, "\n\nIndirect connection path ({} steps):", hops.len());
            for hop in &hops {
                let _ = match hop.direction {
                    HopDirection::Forward => write!(
                        answer,
                        "\n  {} --[{}]--> {}",
                        hop.source, hop.relation, hop.target
                    ),
                    HopDirection::Reverse => write!(
                        answer,
                        "\n  {} <--[{}]-- {}",
                        hop.source, hop.relation, hop.target
                    ),
                };
            }
        }
        Connection::None => {
            answer.push_str("\n\nNo connection path found between these entities.");
        }
    }

    let seeds = path.clone().unwrap_or_else(|| vec![a.clone(), b.clone()]);
    let context = graph.subgraph(&seeds, 1).view();

    Ok(QueryResult::new(
        answer,
        QueryData::Relationship(Box::new(RelationshipData {
            entity1: a,
            entity2: b,
            direct_relations,
            connection,
            path,
            hops,
            context,
        })),
        VisualizationHint::Relationship,
    ))
}

/// Type, importance and sample edges of one entity.
pub fn entity_info(engine: &QueryEngine<'_>, m: &IntentMatch) -> Result<QueryResult, KgError> {
    let span = m.span(0);
    let Some(entity) = engine.resolve(span)? else {
        return Ok(entity_not_found(span));
    };

    let info = engine.graph().get_entity_info(&entity);

    let mut answer = format!("Information about '{entity}':");
    if let Some(entity_type) = &info.entity_type {
        let _ = write!(answer, "\n\nType: {entity_type}");
    }
    if let Some(pagerank) = info.attributes.pagerank {
        let _ = write!(answer, "\nImportance score: {pagerank:.4}");
    }
    let _ = write!(
        answer,
        "\n\nConnections:\n  - Incoming: {} relationships\n  - Outgoing: {} relationships",
        info.incoming_edges.len(),
        info.outgoing_edges.len()
    );
    if !info.incoming_edges.is_empty() {
        answer.push_str("\n\nSample incoming relationships:");
        for edge in info.incoming_edges.iter().take(SAMPLE_EDGE_LIMIT) {
            let _ = write!(
                answer,
                "\n  - {} --[{}]--> {entity}",
                edge.source, edge.relation
            );
        }
    }
    if !info.outgoing_edges.is_empty() {
        answer.push_str("\n\nSample outgoing relationships:");
        for edge in info.outgoing_edges.iter().take(SAMPLE_EDGE_LIMIT) {
            let _ = write!(
                answer,
                "\n  - {entity} --[{}]--> {}",
                edge.relation, edge.target
            );
        }
    }

    Ok(QueryResult::new(
        answer,
        QueryData::EntityInfo(Box::new(info)),
        VisualizationHint::EntityInfo,
    ))
}

/// Entities of every type whose name contains, or is contained in, the
/// requested type.
pub fn type_filter(engine: &QueryEngine<'_>, m: &IntentMatch) -> Result<QueryResult, KgError> {
    let graph = engine.graph();
    let requested = m.span(0).to_uppercase().replace(' ', "_");

    let matching: Vec<(&EntityType, usize)> = graph
        .entity_types()
        .iter()
        .filter(|(t, _)| {
            let name = t.as_str().to_uppercase();
            !requested.is_empty() && (name.contains(&requested) || requested.contains(&name))
        })
        .map(|(t, ids)| (t, ids.len()))
        .collect();

    if matching.is_empty() {
        return Ok(QueryResult {
            answer: format!("No entities of type '{requested}' found."),
            data: QueryData::UnknownType {
                requested_type: requested,
                available_types: graph.entity_types().keys().map(ToString::to_string).collect(),
            },
            visualization_hint: None,
        });
    }

    let names: Vec<String> = matching.iter().map(|(t, _)| t.to_string()).collect();
    let mut answer = format!("Found entities of type(s) {}:", names.join(", "));
    let mut results: BTreeMap<String, Vec<EntityId>> = BTreeMap::new();

    for (entity_type, total) in matching {
        let members: Vec<EntityId> = graph
            .entities_of_type(entity_type)
            .into_iter()
            .flatten()
            .take(TYPE_FILTER_LIMIT)
            .cloned()
            .collect();
        let _ = write!(answer, "\n\n{entity_type} ({total} total):");
        push_list(&mut answer, &members, total);
        results.insert(entity_type.to_string(), members);
    }

    Ok(QueryResult::new(
        answer,
        QueryData::EntityTypes(results),
        VisualizationHint::EntityType,
    ))
}

/// Directed shortest path between two entities.
pub fn path(engine: &QueryEngine<'_>, m: &IntentMatch) -> Result<QueryResult, KgError> {
    let (first, second) = (m.span(0), m.span(1));
    let (Some(from), Some(to)) = (engine.resolve(first)?, engine.resolve(second)?) else {
        return Ok(pair_not_found(first, second));
    };

    let path = engine.graph().shortest_path(&from, &to);
    let answer = match &path {
        Some(steps) => {
            let mut answer = format!(
                "Shortest path from '{from}' to '{to}' ({} steps):",
                steps.len() - 1
            );
            for (i, pair) in steps.windows(2).enumerate() {
                let _ = write!(answer, "\n  Step {}: {} -> {}", i + 1, pair[0], pair[1]);
            }
            answer
        }
        None => format!("No path found between '{from}' and '{to}'."),
    };

    let length = path.as_ref().map(|p| p.len() - 1);
    Ok(QueryResult::new(
        answer,
        QueryData::Path(PathData {
            from,
            to,
            path,
            length,
        }),
        VisualizationHint::Path,
    ))
}

/// Nearest entities in embedding space.
pub fn similarity(engine: &QueryEngine<'_>, m: &IntentMatch) -> Result<QueryResult, KgError> {
    let span = m.span(0);
    let Some(entity) = engine.resolve(span)? else {
        return Ok(entity_not_found(span));
    };

    if engine.index().is_empty() {
        return Ok(QueryResult::new(
            format!("Embeddings have not been generated; cannot find entities similar to '{entity}'."),
            QueryData::Similar(SimilarData {
                entity,
                similar: Vec::new(),
            }),
            VisualizationHint::Similar,
        ));
    }

    let similar: Vec<SimilarEntity> = engine
        .index()
        .find_similar(&entity, SIMILAR_LIMIT)
        .into_iter()
        .map(|hit| SimilarEntity {
            entity: hit.entity,
            similarity: hit.similarity,
        })
        .collect();

    let mut answer = format!("Entities similar to '{entity}':");
    for hit in &similar {
        let _ = write!(answer, "\n  - {} (similarity: {:.3})", hit.entity, hit.similarity);
    }

    Ok(QueryResult::new(
        answer,
        QueryData::Similar(SimilarData { entity, similar }),
        VisualizationHint::Similar,
    ))
}

/// Direct predecessors and successors of an entity.
pub fn neighbors(engine: &QueryEngine<'_>, m: &IntentMatch) -> Result<QueryResult, KgError> {
    let graph = engine.graph();
    let span = m.span(0);
    let Some(entity) = engine.resolve(span)? else {
        return Ok(entity_not_found(span));
    };

    let predecessors: Vec<EntityId> = graph.predecessors(&entity).into_iter().collect();
    let successors: Vec<EntityId> = graph.successors(&entity).into_iter().collect();

    let mut answer = format!("Connections of '{entity}':");
    if !predecessors.is_empty() {
        let _ = write!(answer, "\n\nIncoming connections ({}):", predecessors.len());
        push_list(&mut answer, &predecessors, predecessors.len());
    }
    if !successors.is_empty() {
        let _ = write!(answer, "\n\nOutgoing connections ({}):", successors.len());
        push_list(&mut answer, &successors, successors.len());
    }
    if predecessors.is_empty() && successors.is_empty() {
        answer.push_str("\n\nThis entity has no connections.");
    }

    Ok(QueryResult::new(
        answer,
        QueryData::Neighbors(NeighborsData {
            entity,
            predecessors,
            successors,
        }),
        VisualizationHint::Neighbors,
    ))
}

/// Whole-graph statistics.
pub fn statistics(engine: &QueryEngine<'_>, _m: &IntentMatch) -> Result<QueryResult, KgError> {
    let stats = engine.graph().statistics();

    let mut answer = String::from("Knowledge Graph Statistics:");
    let _ = write!(
        answer,
        "\n\n- Total nodes: {}\n- Total edges: {}\n- Graph density: {:.4}\n- Connected: {}\n- Number of components: {}",
        stats.num_nodes,
        stats.num_edges,
        stats.density,
        if stats.is_connected { "Yes" } else { "No" },
        stats.num_components
    );
    if !stats.entity_types.is_empty() {
        answer.push_str("\n\nEntity types:");
        for (entity_type, count) in &stats.entity_types {
            let _ = write!(answer, "\n  - {entity_type}: {count}");
        }
    }
    if !stats.top_entities.is_empty() {
        answer.push_str("\n\nMost important entities:");
        for (rank, scored) in stats.top_entities.iter().take(IMPORTANCE_LIMIT).enumerate() {
            let _ = write!(
                answer,
                "\n  {}. {} (score: {:.4})",
                rank + 1,
                scored.entity,
                scored.score
            );
        }
    }

    Ok(QueryResult::new(
        answer,
        QueryData::Statistics(Box::new(stats)),
        VisualizationHint::Statistics,
    ))
}

/// Top entities by PageRank and, separately, by raw degree.
pub fn importance(engine: &QueryEngine<'_>, _m: &IntentMatch) -> Result<QueryResult, KgError> {
    let graph = engine.graph();

    let pagerank: Vec<RankedEntity> = metrics::top_n(&pagerank_scores(graph), IMPORTANCE_LIMIT)
        .into_iter()
        .map(|(entity, score)| RankedEntity {
            entity_type: entity_type_of(graph, &entity),
            entity,
            score,
        })
        .collect();

    let mut by_degree: Vec<ConnectedEntity> = graph
        .node_ids()
        .map(|id| ConnectedEntity {
            entity: id.clone(),
            connections: graph.degree(id),
        })
        .collect();
    by_degree.sort_by(|a, b| {
        b.connections
            .cmp(&a.connections)
            .then_with(|| a.entity.cmp(&b.entity))
    });
    by_degree.truncate(IMPORTANCE_LIMIT);

    let mut answer = String::from("Most important entities in the knowledge graph:");
    answer.push_str("\n\nBy PageRank (overall importance):");
    for ranked in &pagerank {
        let _ = write!(
            answer,
            "\n  - {} ({}) - score: {:.4}",
            ranked.entity, ranked.entity_type, ranked.score
        );
    }
    answer.push_str("\n\nBy degree (most connected):");
    for connected in &by_degree {
        let _ = write!(
            answer,
            "\n  - {} - {} connections",
            connected.entity, connected.connections
        );
    }

    Ok(QueryResult::new(
        answer,
        QueryData::Importance(ImportanceData {
            pagerank,
            degree: by_degree,
        }),
        VisualizationHint::ImportantEntities,
    ))
}

/// Greedy-modularity communities.
pub fn communities(engine: &QueryEngine<'_>, _m: &IntentMatch) -> Result<QueryResult, KgError> {
    let partition = greedy_modularity_communities(engine.graph());

    let mut answer = format!(
        "Found {} communities in the knowledge graph (modularity {:.4}):",
        partition.len(),
        partition.modularity
    );
    let summaries: Vec<CommunitySummary> = partition
        .communities
        .iter()
        .take(COMMUNITY_LIMIT)
        .map(|members| CommunitySummary {
            size: members.len(),
            members: members.iter().take(COMMUNITY_MEMBER_LIMIT).cloned().collect(),
        })
        .collect();

    for (i, summary) in summaries.iter().enumerate() {
        let _ = write!(answer, "\n\nCommunity {} ({} members):", i + 1, summary.size);
        for member in &summary.members {
            let _ = write!(answer, "\n  - {member}");
        }
        if summary.size > COMMUNITY_MEMBER_LIMIT {
            let _ = write!(
                answer,
                "\n  ... and {} more",
                summary.size - COMMUNITY_MEMBER_LIMIT
            );
        }
    }
    if partition.len() > COMMUNITY_LIMIT {
        let _ = write!(
            answer,
            "\n\n... and {} more communities",
            partition.len() - COMMUNITY_LIMIT
        );
    }

    Ok(QueryResult::new(
        answer,
        QueryData::Communities(CommunitiesData {
            num_communities: partition.len(),
            communities: summaries,
            modularity: partition.modularity,
        }),
        VisualizationHint::Communities,
    ))
}

/// Fallback: rank indexed entities by similarity to the raw query.
pub fn semantic_search(engine: &QueryEngine<'_>, query: &str) -> Result<QueryResult, KgError> {
    let graph = engine.graph();
    let query = query.trim();

    if engine.index().is_empty() {
        return Ok(QueryResult::new(
            format!(
                "No query pattern matched '{query}' and embeddings have not been generated, so semantic search is unavailable."
            ),
            QueryData::Search(SearchData {
                query: query.to_string(),
                results: Vec::new(),
            }),
            VisualizationHint::SearchResults,
        ));
    }

    let vector = engine.embedder().embed(query)?;
    let results: Vec<SearchHit> = engine
        .index()
        .rank(&vector, SEARCH_LIMIT)
        .into_iter()
        .map(|hit| SearchHit {
            entity_type: entity_type_of(graph, &hit.entity),
            entity: hit.entity,
            relevance: hit.similarity,
        })
        .collect();

    let mut answer = format!("Most relevant entities for '{query}':");
    for hit in &results {
        let _ = write!(
            answer,
            "\n  - {} ({}) - relevance: {:.3}",
            hit.entity, hit.entity_type, hit.relevance
        );
    }

    Ok(QueryResult::new(
        answer,
        QueryData::Search(SearchData {
            query: query.to_string(),
            results,
        }),
        VisualizationHint::SearchResults,
    ))
}

// =============================================================================
// TESTS
// =============================================================================
