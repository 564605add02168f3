//! # kgraph
//!
//! Front end for the kgraph knowledge-graph engine.
//!
//! - `api`: axum HTTP API over a shared, lock-protected session
//! - `cli`: clap commands operating on a binary database file
//! - `config`: TOML configuration with environment overrides

pub mod api;
pub mod cli;
pub mod config;
