//! # Graph Benchmarks
//!
//! Performance benchmarks for kgraph-core construction, metrics and queries.
//!
//! Run with: `cargo bench -p kgraph-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use kgraph_core::metrics::{betweenness_centrality, pagerank};
use kgraph_core::{ExtractionResult, Graph, Session, greedy_modularity_communities};
use std::hint::black_box;

/// Extraction with N entities in a chain plus a hub every tenth node.
fn create_extraction(size: usize) -> ExtractionResult {
    let names: Vec<String> = (0..size).map(|i| format!("entity_{i}")).collect();
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    let mut extraction = ExtractionResult::new().with_entities("CONCEPT", &refs);

    for pair in names.windows(2) {
        extraction = extraction.with_relationship(&pair[0], "next", &pair[1]);
    }
    for name in names.iter().step_by(10) {
        extraction = extraction.with_relationship(name, "part_of", "hub");
    }
    extraction
}

fn create_graph(size: usize) -> Graph {
    let mut graph = Graph::new();
    graph.build(&create_extraction(size));
    graph
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("build");

    for size in [100, 500, 2000] {
        let extraction = create_extraction(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &extraction, |b, ext| {
            b.iter(|| {
                let mut graph = Graph::new();
                black_box(graph.build(ext))
            });
        });
    }

    group.finish();
}

fn bench_pagerank(c: &mut Criterion) {
    let mut group = c.benchmark_group("pagerank");

    for size in [100, 1000, 5000] {
        let graph = create_graph(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, g| {
            b.iter(|| black_box(pagerank(g)));
        });
    }

    group.finish();
}

fn bench_betweenness(c: &mut Criterion) {
    let mut group = c.benchmark_group("betweenness");

    for size in [100, 500, 999] {
        let graph = create_graph(size);
        group.bench_with_input(BenchmarkId::from_parameter(size), &graph, |b, g| {
            b.iter(|| black_box(betweenness_centrality(g)));
        });
    }

    group.finish();
}

fn bench_communities(c: &mut Criterion) {
    let graph = create_graph(300);
    c.bench_function("communities_300", |b| {
        b.iter(|| black_box(greedy_modularity_communities(&graph)));
    });
}

fn bench_query(c: &mut Criterion) {
    let mut session = Session::default();
    session.build(&create_extraction(1000));
    let _ = session.generate_embeddings();

    c.bench_function("query_relationship", |b| {
        b.iter(|| black_box(session.query("how is entity_3 related to entity_700")));
    });
    c.bench_function("query_semantic_fallback", |b| {
        b.iter(|| black_box(session.query("zzz random gibberish query")));
    });
}

criterion_group!(
    benches,
    bench_build,
    bench_pagerank,
    bench_betweenness,
    bench_communities,
    bench_query
);
criterion_main!(benches);
