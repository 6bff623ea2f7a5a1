//! Common building blocks for the butterfly-osm toolkit
//!
//! Identifiers, tile addressing and the variable-length integer codec shared
//! by the network storage engine and the routing searches.

pub mod error;
pub mod ids;
pub mod tiles;
pub mod varint;

pub use error::{Error, Result};
pub use ids::{EdgeId, VertexId};
pub use tiles::{TileBounds, TileId, DEFAULT_ZOOM};
