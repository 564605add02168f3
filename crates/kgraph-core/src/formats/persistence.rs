//! # Persistence Format
//!
//! Binary serialization for kgraph databases.
//!
//! File I/O happens in the app layer; this module only maps graphs to bytes
//! and back.
//!
//! Format: Header (5 bytes) + postcard-serialized graph data.
//! - 4 bytes: Magic ("KGRF")
//! - 1 byte: Version
//!
//! Size and header are validated before the payload is decoded, so a
//! corrupted or hostile file fails fast instead of allocating.

use crate::graph::{Graph, SerializableGraph};
use crate::{KgError, primitives};

// =============================================================================
// LIMITS
// =============================================================================

/// Maximum accepted size of a persisted database.
pub const MAX_PERSISTENCE_PAYLOAD_SIZE: usize = 500 * 1024 * 1024;

const HEADER_SIZE: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The persistence header precedes all graph data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersistenceHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl PersistenceHeader {
    /// Create a header with the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Check magic bytes and version.
    pub fn validate(&self) -> Result<(), KgError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(KgError::Deserialization(
                "Invalid magic bytes: not a kgraph database".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(KgError::Deserialization(format!(
                "Unsupported format version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..4].copy_from_slice(&self.magic);
        bytes[4] = self.version;
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KgError> {
        let Some(header) = bytes.get(..HEADER_SIZE) else {
            return Err(KgError::Deserialization("Header too short".to_string()));
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&header[..4]);
        Ok(Self {
            magic,
            version: header[4],
        })
    }
}

impl Default for PersistenceHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SERIALIZATION FUNCTIONS
// =============================================================================

/// Serialize a graph to bytes (header + payload).
pub fn graph_to_bytes(graph: &Graph) -> Result<Vec<u8>, KgError> {
    let payload = postcard::to_stdvec(&SerializableGraph::from(graph))
        .map_err(|e| KgError::Serialization(e.to_string()))?;

    let mut bytes = Vec::with_capacity(HEADER_SIZE + payload.len());
    bytes.extend_from_slice(&PersistenceHeader::new().to_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// Deserialize a graph from bytes.
///
/// Stored metrics are restored as they were written; no metrics pass runs.
pub fn graph_from_bytes(bytes: &[u8]) -> Result<Graph, KgError> {
    if bytes.len() < HEADER_SIZE {
        return Err(KgError::Deserialization(format!(
            "Data too short: minimum {HEADER_SIZE} bytes required"
        )));
    }
    if bytes.len() > MAX_PERSISTENCE_PAYLOAD_SIZE {
        return Err(KgError::Deserialization(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_PERSISTENCE_PAYLOAD_SIZE
        )));
    }

    PersistenceHeader::from_bytes(bytes)?.validate()?;

    let serializable: SerializableGraph = postcard::from_bytes(&bytes[HEADER_SIZE..])
        .map_err(|e| KgError::Deserialization(format!("Failed to decode graph data: {e}")))?;

    Ok(Graph::from(serializable))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{EntityId, ExtractionResult};

    fn sample() -> Graph {
        let extraction = ExtractionResult::new()
            .with_entities("PERSON", &["Alice"])
            .with_relationship("Alice", "works_at", "Acme")
            .with_relationship("Alice", "works_at", "Acme");
        let mut graph = Graph::new();
        graph.build(&extraction);
        graph
    }

    #[test]
    fn header_roundtrip() {
        let bytes = PersistenceHeader::new().to_bytes();
        let restored = PersistenceHeader::from_bytes(&bytes).expect("parse header");
        assert_eq!(restored, PersistenceHeader::new());
    }

    #[test]
    fn save_load_save_is_bit_exact() {
        let bytes1 = graph_to_bytes(&sample()).expect("serialize");
        let restored = graph_from_bytes(&bytes1).expect("deserialize");
        let bytes2 = graph_to_bytes(&restored).expect("serialize again");
        assert_eq!(bytes1, bytes2);
    }

    #[test]
    fn restored_graph_keeps_parallel_edges_and_metrics() {
        let restored = graph_from_bytes(&graph_to_bytes(&sample()).expect("serialize"))
            .expect("deserialize");
        assert_eq!(restored.edge_count(), 2);
        assert!(
            restored
                .node(&EntityId::new("Acme"))
                .is_some_and(|n| n.attributes.has_metrics())
        );
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = vec![0u8; 10];
        bytes[..4].copy_from_slice(b"XXXX");
        assert!(graph_from_bytes(&bytes).is_err());
    }

    #[test]
    fn wrong_version_rejected() {
        let mut bytes = graph_to_bytes(&sample()).expect("serialize");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(matches!(
            graph_from_bytes(&bytes),
            Err(KgError::Deserialization(_))
        ));
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(graph_from_bytes(b"KGR").is_err());
    }
}
