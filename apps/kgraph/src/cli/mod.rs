//! # kgraph CLI Module
//!
//! This module implements the CLI interface for kgraph.
//!
//! ## Available Commands
//!
//! - `init` - Initialize a new empty database
//! - `build` - Build the graph from an extraction result (JSON)
//! - `status` - Show graph statistics
//! - `query` - Answer a natural-language query
//! - `entity` - Resolve a mention and describe the entity
//! - `path` - Shortest path between two mentions
//! - `export` - Export the graph as a JSON snapshot
//! - `import` - Replace the graph with a JSON snapshot
//! - `server` - Start the HTTP server

mod commands;

use crate::config::AppConfig;
use clap::{Parser, Subcommand};
use kgraph_core::KgError;
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// kgraph - knowledge-graph builder and query engine
///
/// Builds a typed multigraph from extracted entities and relationships,
/// ranks its entities and answers natural-language questions about it.
#[derive(Parser, Debug)]
#[command(name = "kgraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the graph database
    #[arg(short = 'D', long, global = true, default_value = "kgraph.db")]
    pub database: PathBuf,

    /// Path to a TOML configuration file (default: $KGRAPH_CONFIG)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new empty database
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Build the graph from an extraction result
    Build {
        /// Path to the extraction JSON (entities, relationships, entity_contexts)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show graph statistics
    Status,

    /// Answer a natural-language query
    Query {
        /// The question, e.g. "how is Alice related to Bob"
        text: String,
    },

    /// Resolve a mention and describe the entity
    Entity {
        /// Entity name or mention
        name: String,
    },

    /// Shortest directed path between two mentions
    Path {
        #[arg(long)]
        from: String,

        #[arg(long)]
        to: String,
    },

    /// Export the graph as a JSON snapshot
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace the graph with a JSON snapshot
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Start HTTP server
    Server {
        /// Host to bind to (overrides config)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides config)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli, config: &AppConfig) -> Result<(), KgError> {
    let db = Database::new(&cli.database, config.embedding.dimensions);
    let json_mode = cli.json_mode;

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&db, force),
        Some(Commands::Build { file }) => cmd_build(&db, json_mode, &file),
        Some(Commands::Status) | None => cmd_status(&db, json_mode),
        Some(Commands::Query { text }) => cmd_query(&db, json_mode, &text),
        Some(Commands::Entity { name }) => cmd_entity(&db, json_mode, &name),
        Some(Commands::Path { from, to }) => cmd_path(&db, json_mode, &from, &to),
        Some(Commands::Export { output }) => cmd_export(&db, &output),
        Some(Commands::Import { input }) => cmd_import(&db, json_mode, &input),
        Some(Commands::Server { host, port }) => {
            let mut server = config.server.clone();
            if let Some(host) = host {
                server.host = host;
            }
            if let Some(port) = port {
                server.port = port;
            }
            cmd_server(&db, &server).await
        }
    }
}
