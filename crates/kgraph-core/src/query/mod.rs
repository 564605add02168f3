//! # Query Module
//!
//! Natural-language queries over the knowledge graph.
//!
//! - `patterns`: the ordered intent table (first match wins)
//! - `dispatcher`: `QueryEngine`, classification and routing
//! - `handlers`: one handler per intent plus the semantic-search fallback
//! - `types`: `QueryResult` and its typed payloads

pub mod dispatcher;
pub mod handlers;
pub mod patterns;
pub mod types;

pub use dispatcher::{Handler, QueryEngine, handler_for};
pub use patterns::{Intent, IntentMatch, classify, patterns};
pub use types::{Connection, HopDirection, QueryData, QueryResult, VisualizationHint};
