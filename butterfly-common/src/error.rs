//! Error types for the butterfly-osm routing core
//!
//! Library code returns these typed errors. Binaries wrap them with `anyhow`
//! context at the application boundary.

use crate::ids::{EdgeId, VertexId};

/// Main error type for network storage and routing operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Tile or network stream is truncated, fails its checksum or holds
    /// out-of-range pointers. The whole stream is rejected.
    #[error("corrupt stream: {0}")]
    Corrupt(String),

    /// Stream was written by an unknown format version
    #[error("unsupported format version {found} (expected {expected})")]
    UnsupportedVersion { found: u64, expected: u64 },

    /// Caller referenced a vertex that does not exist
    #[error("vertex {0} does not exist")]
    VertexNotFound(VertexId),

    /// Caller referenced an edge that does not exist
    #[error("edge {0} does not exist")]
    EdgeNotFound(EdgeId),

    /// More distinct turn orders requested at one vertex than can be encoded
    #[error("vertex {vertex} needs {requested} turn orders, at most {max} are supported")]
    TurnOrderCapacity {
        vertex: VertexId,
        requested: usize,
        max: usize,
    },

    /// A turn order that was already assigned was set again
    #[error("turn order of edge {edge} at vertex {vertex} is already set to {existing}")]
    TurnOrderReassigned {
        edge: EdgeId,
        vertex: VertexId,
        existing: u8,
    },

    /// Another edge at the vertex already holds the requested turn order
    #[error("turn order {order} at vertex {vertex} is already held by edge {holder}")]
    TurnOrderTaken {
        order: u8,
        vertex: VertexId,
        holder: EdgeId,
    },

    /// Invalid parameters supplied by the caller
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Configuration could not be parsed
    #[error("invalid configuration: {0}")]
    Config(String),

    /// File I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// True for errors caused by malformed persisted data rather than by the caller
    pub fn is_corruption(&self) -> bool {
        matches!(self, Error::Corrupt(_) | Error::UnsupportedVersion { .. })
    }
}

/// Convenience result type for butterfly-osm operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_error_names_the_vertex() {
        let err = Error::TurnOrderCapacity {
            vertex: VertexId::new(7, 3),
            requested: 9,
            max: 8,
        };
        assert_eq!(
            err.to_string(),
            "vertex 7/3 needs 9 turn orders, at most 8 are supported"
        );
        assert!(!err.is_corruption());
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn version_mismatch_is_corruption() {
        let err = Error::UnsupportedVersion {
            found: 9,
            expected: 1,
        };
        assert!(err.is_corruption());
    }
}
