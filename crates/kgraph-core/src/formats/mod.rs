//! # Formats
//!
//! Binary persistence of the knowledge graph. JSON snapshots live in
//! `export`; this module owns the compact on-disk database format.

pub mod persistence;

pub use persistence::{
    MAX_PERSISTENCE_PAYLOAD_SIZE, PersistenceHeader, graph_from_bytes, graph_to_bytes,
};
