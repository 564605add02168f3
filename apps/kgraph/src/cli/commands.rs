//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.
//!
//! Every command loads the database file, does its work on a `Session`
//! and, for write commands, saves the binary snapshot back. Commands that
//! resolve mentions generate embeddings after loading, since the index is
//! not persisted. An embedder failure only disables the fuzzy tier: exact
//! and substring resolution keep working.

use crate::api;
use crate::config::ServerConfig;
use kgraph_core::formats::MAX_PERSISTENCE_PAYLOAD_SIZE;
use kgraph_core::{
    Embedder, ExtractionResult, GraphSnapshot, HashingEmbedder, KgError, MetricsOutcome, Session,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum extraction file size (100 MB).
const MAX_EXTRACTION_FILE_SIZE: u64 = 100 * 1024 * 1024;

/// Maximum snapshot file size (500 MB).
const MAX_SNAPSHOT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), KgError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| KgError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(KgError::Io(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize an input path and require a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, KgError> {
    let canonical = path
        .canonicalize()
        .map_err(|e| KgError::Io(format!("Invalid file path '{}': {}", path.display(), e)))?;

    if !canonical.is_file() {
        return Err(KgError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Canonicalize the parent of an output path and require a directory.
fn validate_output_path(path: &Path) -> Result<PathBuf, KgError> {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };

    let canonical_parent = parent.canonicalize().map_err(|e| {
        KgError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(KgError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| KgError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

/// Read a validated input file.
fn read_input(path: &Path, max_size: u64) -> Result<Vec<u8>, KgError> {
    let validated = validate_file_path(path)?;
    validate_file_size(&validated, max_size)?;
    std::fs::read(&validated).map_err(|e| KgError::Io(format!("Read file: {}", e)))
}

fn print_json(value: &impl serde::Serialize) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

// =============================================================================
// DATABASE FILE
// =============================================================================

/// The binary database file plus the embedder used with it.
#[derive(Clone)]
pub struct Database {
    path: PathBuf,
    embedder: Arc<dyn Embedder>,
}

impl Database {
    /// A database embedding entity names with the hashing embedder.
    #[must_use]
    pub fn new(path: &Path, dimensions: usize) -> Self {
        Self::with_embedder(path, Arc::new(HashingEmbedder::new(dimensions)))
    }

    #[must_use]
    pub fn with_embedder(path: &Path, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            path: path.to_path_buf(),
            embedder,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    fn fresh_session(&self) -> Session {
        Session::new(Arc::clone(&self.embedder))
    }

    /// Load the session, or an empty one when the file does not exist.
    pub fn load(&self) -> Result<Session, KgError> {
        if !self.exists() {
            return Ok(self.fresh_session());
        }

        validate_file_size(&self.path, MAX_PERSISTENCE_PAYLOAD_SIZE as u64)?;
        let data =
            std::fs::read(&self.path).map_err(|e| KgError::Io(format!("Read db: {}", e)))?;
        Session::from_bytes(&data, Arc::clone(&self.embedder))
    }

    /// Load the session and fill its embedding index.
    ///
    /// If the embedder fails the index stays empty and the error is logged.
    pub fn load_with_embeddings(&self) -> Result<Session, KgError> {
        let mut session = self.load()?;
        match session.generate_embeddings() {
            Ok(count) => tracing::debug!(embeddings = count, "Embedding index generated"),
            Err(e) => tracing::warn!(
                error = %e,
                "Embedding generation failed, fuzzy entity matching disabled"
            ),
        }
        Ok(session)
    }

    /// Write the session's graph to the database file.
    pub fn save(&self, session: &Session) -> Result<(), KgError> {
        let data = session.to_bytes()?;
        std::fs::write(&self.path, &data).map_err(|e| KgError::Io(format!("Write db: {}", e)))
    }
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new empty database.
pub fn cmd_init(db: &Database, force: bool) -> Result<(), KgError> {
    if db.exists() && !force {
        return Err(KgError::Io(
            "Database already exists. Use --force to overwrite.".to_string(),
        ));
    }

    db.save(&db.fresh_session())?;
    println!("Initialized new database at {:?}", db.path());
    Ok(())
}

// =============================================================================
// BUILD COMMAND
// =============================================================================

/// Build the graph from an extraction result file.
pub fn cmd_build(db: &Database, json_mode: bool, file: &Path) -> Result<(), KgError> {
    tracing::info!("Building graph from {:?}", file);

    let contents = read_input(file, MAX_EXTRACTION_FILE_SIZE)?;
    let extraction: ExtractionResult = serde_json::from_slice(&contents)
        .map_err(|e| KgError::Deserialization(format!("Invalid extraction result: {}", e)))?;

    let mut session = db.load()?;
    let report = session.build(&extraction);
    db.save(&session)?;

    let metrics = match report.metrics {
        MetricsOutcome::Computed { betweenness, .. } => {
            if betweenness {
                "degree, pagerank, betweenness"
            } else {
                "degree, pagerank"
            }
        }
        MetricsOutcome::Skipped => "none",
    };

    if json_mode {
        print_json(&serde_json::json!({
            "nodes": report.nodes,
            "edges": report.edges,
            "skipped_relationships": report.skipped_relationships,
            "skipped_entities": report.skipped_entities,
            "contexts_attached": report.contexts_attached,
            "metrics": metrics,
        }));
        return Ok(());
    }

    println!(
        "Built graph: {} nodes, {} edges",
        report.nodes, report.edges
    );
    if report.skipped_relationships > 0 {
        println!("Skipped {} malformed relationships", report.skipped_relationships);
    }
    println!("Metrics: {}", metrics);
    Ok(())
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show graph statistics.
pub fn cmd_status(db: &Database, json_mode: bool) -> Result<(), KgError> {
    let session = db.load()?;
    let stats = session.statistics();

    if json_mode {
        print_json(&serde_json::json!({
            "database": db.path().to_string_lossy(),
            "statistics": stats,
        }));
        return Ok(());
    }

    println!("kgraph Status");
    println!("=============");
    println!("Database:   {:?}", db.path());
    println!();
    println!("Nodes:      {}", stats.num_nodes);
    println!("Edges:      {}", stats.num_edges);
    println!("Density:    {:.4}", stats.density);
    println!("Components: {}", stats.num_components);
    if !stats.entity_types.is_empty() {
        println!();
        println!("Entity types:");
        for (entity_type, count) in &stats.entity_types {
            println!("  {:<16} {}", entity_type, count);
        }
    }
    if !stats.top_entities.is_empty() {
        println!();
        println!("Top entities (PageRank):");
        for scored in &stats.top_entities {
            println!("  {:<24} {:.4}", scored.entity.as_str(), scored.score);
        }
    }

    Ok(())
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Answer a natural-language query.
pub fn cmd_query(db: &Database, json_mode: bool, text: &str) -> Result<(), KgError> {
    let session = db.load_with_embeddings()?;
    let result = session.query(text)?;

    if json_mode {
        print_json(&result);
    } else {
        println!("{}", result.answer);
    }
    Ok(())
}

// =============================================================================
// ENTITY COMMAND
// =============================================================================

/// Resolve a mention and describe the entity.
pub fn cmd_entity(db: &Database, json_mode: bool, name: &str) -> Result<(), KgError> {
    let session = db.load_with_embeddings()?;
    let info = session.entity_info(name)?;

    if json_mode {
        print_json(&serde_json::json!({ "query": name, "entity": info }));
        return Ok(());
    }

    let Some(info) = info else {
        println!("Entity '{}' not found", name);
        return Ok(());
    };

    let entity_type = info
        .entity_type
        .as_ref()
        .map(|t| t.as_str())
        .unwrap_or("ENTITY");
    println!("{} ({})", info.name, entity_type);
    if let Some(pr) = info.attributes.pagerank {
        println!("  PageRank:    {:.4}", pr);
    }
    if let Some(dc) = info.attributes.degree_centrality {
        println!("  Degree:      {:.4}", dc);
    }
    if let Some(bc) = info.attributes.betweenness_centrality {
        println!("  Betweenness: {:.4}", bc);
    }
    for edge in &info.outgoing_edges {
        println!("  -> {} {}", edge.relation, edge.target.as_str());
    }
    for edge in &info.incoming_edges {
        println!("  <- {} {}", edge.relation, edge.source.as_str());
    }
    Ok(())
}

// =============================================================================
// PATH COMMAND
// =============================================================================

/// Shortest directed path between two mentions.
pub fn cmd_path(db: &Database, json_mode: bool, from: &str, to: &str) -> Result<(), KgError> {
    let session = db.load_with_embeddings()?;
    let path = session.shortest_path(from, to)?;

    if json_mode {
        print_json(&serde_json::json!({ "from": from, "to": to, "path": path }));
        return Ok(());
    }

    match path {
        Some(path) => {
            let names: Vec<&str> = path.iter().map(|id| id.as_str()).collect();
            println!("Path ({} hops): {}", path.len() - 1, names.join(" -> "));
        }
        None => println!("No path found from '{}' to '{}'", from, to),
    }
    Ok(())
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export the graph as a JSON snapshot.
pub fn cmd_export(db: &Database, output: &Path) -> Result<(), KgError> {
    let validated_output = validate_output_path(output)?;

    let session = db.load()?;
    let text = session.export_snapshot().to_json()?;

    std::fs::write(&validated_output, &text)
        .map_err(|e| KgError::Io(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", text.len(), validated_output);
    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Replace the graph with a JSON snapshot.
pub fn cmd_import(db: &Database, json_mode: bool, input: &Path) -> Result<(), KgError> {
    let contents = read_input(input, MAX_SNAPSHOT_FILE_SIZE)?;
    let text = String::from_utf8(contents)
        .map_err(|e| KgError::Deserialization(format!("Snapshot is not UTF-8: {}", e)))?;
    let snapshot = GraphSnapshot::from_json(&text)?;

    let mut session = db.load()?;
    session.import_snapshot(snapshot);
    db.save(&session)?;

    let graph = session.graph();
    if json_mode {
        print_json(&serde_json::json!({
            "nodes": graph.node_count(),
            "edges": graph.edge_count(),
        }));
    } else {
        println!(
            "Imported graph: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
    }
    Ok(())
}

// =============================================================================
// SERVER COMMAND
// =============================================================================

/// Start the HTTP server over the database's graph.
pub async fn cmd_server(db: &Database, server: &ServerConfig) -> Result<(), KgError> {
    let session = db.load_with_embeddings()?;
    let addr = server.addr();

    println!("kgraph server starting...");
    println!();
    println!("Configuration:");
    println!("  Address:  {}", addr);
    println!("  Database: {:?}", db.path());
    println!("  Nodes:    {}", session.graph().node_count());
    println!();
    println!("Endpoints:");
    println!("  GET  /health        - Health check");
    println!("  GET  /status        - Graph statistics");
    println!("  POST /query         - Natural-language query");
    println!("  GET  /entity/{{name}} - Entity information");
    println!("  POST /subgraph      - Neighbourhood extraction");
    println!("  GET  /export        - JSON snapshot");
    println!("  POST /build         - Rebuild from extraction result");
    println!("  POST /import        - Replace graph with snapshot");
    println!();
    println!("Press Ctrl+C to stop");
    println!();

    api::run_server(&addr, session, server.body_limit_bytes).await
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn write_extraction(dir: &Path) -> PathBuf {
        let path = dir.join("extraction.json");
        let json = r#"{
            "entities": {"PERSON": ["Alice", "Bob"], "ORG": ["Acme"]},
            "relationships": [
                {"source": "Alice", "relation": "works_at", "target": "Acme"},
                {"source": "Bob", "relation": "works_at", "target": "Acme"},
                {"source": "Bob", "relation": "knows"}
            ]
        }"#;
        std::fs::write(&path, json).expect("write extraction");
        path
    }

    #[test]
    fn missing_database_loads_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("absent.db"), 32);
        let session = db.load().expect("load");
        assert!(session.graph().is_empty());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("kg.db"), 32);

        cmd_init(&db, false).expect("init");
        assert!(db.exists());
        assert!(cmd_init(&db, false).is_err());
        cmd_init(&db, true).expect("forced init");
    }

    #[test]
    fn build_persists_graph() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("kg.db"), 32);
        let file = write_extraction(dir.path());

        cmd_build(&db, true, &file).expect("build");

        let session = db.load().expect("reload");
        assert_eq!(session.graph().node_count(), 3);
        assert_eq!(session.graph().edge_count(), 2);
        assert!(session.graph().nodes().all(|n| n.attributes.has_metrics()));
    }

    #[test]
    fn build_rejects_invalid_json() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("kg.db"), 32);
        let file = dir.path().join("bad.json");
        std::fs::write(&file, "not json").expect("write");

        assert!(matches!(
            cmd_build(&db, false, &file),
            Err(KgError::Deserialization(_))
        ));
    }

    #[test]
    fn corrupt_database_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("kg.db");
        std::fs::write(&path, b"garbage").expect("write");

        assert!(Database::new(&path, 32).load().is_err());
    }

    #[test]
    fn export_then_import_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let source = Database::new(&dir.path().join("a.db"), 32);
        let target = Database::new(&dir.path().join("b.db"), 32);
        let file = write_extraction(dir.path());
        let snapshot = dir.path().join("snapshot.json");

        cmd_build(&source, true, &file).expect("build");
        cmd_export(&source, &snapshot).expect("export");
        cmd_import(&target, true, &snapshot).expect("import");

        let a = source.load().expect("load a");
        let b = target.load().expect("load b");
        assert_eq!(a.statistics(), b.statistics());
    }

    #[test]
    fn path_to_unknown_mention_is_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(
            &dir.path().join("kg.db"),
            HashingEmbedder::DEFAULT_DIMENSIONS,
        );
        let file = write_extraction(dir.path());
        cmd_build(&db, true, &file).expect("build");

        cmd_path(&db, true, "alice", "acme").expect("path");
        assert!(matches!(
            cmd_path(&db, true, "alice", "zzz"),
            Err(KgError::EntityNotFound(_))
        ));
    }

    struct OfflineEmbedder;

    impl Embedder for OfflineEmbedder {
        fn embed(&self, _text: &str) -> Result<Vec<f32>, KgError> {
            Err(KgError::Embedding("backend offline".to_string()))
        }

        fn dimensions(&self) -> usize {
            8
        }
    }

    #[test]
    fn lookups_survive_embedder_failure() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::with_embedder(&dir.path().join("kg.db"), Arc::new(OfflineEmbedder));
        let file = write_extraction(dir.path());
        cmd_build(&db, true, &file).expect("build");

        let session = db.load_with_embeddings().expect("load");
        assert!(session.embeddings().is_empty());

        cmd_entity(&db, true, "acme").expect("entity");
        cmd_entity(&db, true, "zzz").expect("unknown entity is answered");
        cmd_path(&db, true, "Alice", "acm").expect("path");
        cmd_query(&db, true, "neighbors of Alice").expect("query");
        assert!(matches!(
            cmd_path(&db, true, "alice", "zzz"),
            Err(KgError::EntityNotFound(_))
        ));
    }

    #[test]
    fn build_keeps_valid_records_when_some_are_wrongly_typed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db = Database::new(&dir.path().join("kg.db"), 32);
        let file = dir.path().join("mixed.json");
        let json = r#"{
            "entities": {"PERSON": ["Alice", null], "ORG": ["Acme"]},
            "relationships": [
                {"source": "Alice", "relation": "works_at", "target": "Acme"},
                {"source": 42, "relation": "works_at", "target": "Acme"},
                "Bob works at Acme"
            ]
        }"#;
        std::fs::write(&file, json).expect("write");

        cmd_build(&db, true, &file).expect("build");

        let session = db.load().expect("reload");
        assert_eq!(session.graph().node_count(), 2);
        assert_eq!(session.graph().edge_count(), 1);
    }

    #[test]
    fn output_path_requires_existing_directory() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(validate_output_path(&dir.path().join("out.json")).is_ok());
        assert!(validate_output_path(&dir.path().join("missing/out.json")).is_err());
    }
}
