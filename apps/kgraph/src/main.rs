//! # kgraph
//!
//! The main binary for the kgraph knowledge-graph engine.
//!
//! This application provides:
//! - HTTP REST API server (axum-based)
//! - CLI interface for building and querying the graph
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────┐
//! │                 apps/kgraph (THE BINARY)          │
//! │                                                   │
//! │   ┌─────────────┐          ┌─────────────┐        │
//! │   │   CLI       │          │   HTTP API  │        │
//! │   │  (clap)     │          │   (axum)    │        │
//! │   └──────┬──────┘          └──────┬──────┘        │
//! │          └──────────┬─────────────┘               │
//! │                     ▼                             │
//! │             ┌───────────────┐                     │
//! │             │  kgraph-core  │                     │
//! │             │ (THE ENGINE)  │                     │
//! │             └───────────────┘                     │
//! └───────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! kgraph build -f extraction.json
//! kgraph query "how is Alice related to Bob"
//! kgraph server --port 8080
//! ```

use clap::Parser;
use kgraph::cli;
use kgraph::config::{AppConfig, LogConfig, LogFormat};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    let cli = cli::Cli::parse();

    let config = match AppConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log);

    if let Err(e) = cli::execute(cli, &config).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Initialize tracing. `RUST_LOG` takes precedence over the configured filter.
fn init_tracing(log: &LogConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log.filter));

    match log.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
