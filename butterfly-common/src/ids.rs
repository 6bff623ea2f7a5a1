//! Composite vertex and edge identifiers
//!
//! Both identifiers pair the tile id with a tile-local id. For vertices the
//! local id is a sequence number; for edges it is the byte offset of the
//! edge record inside the tile's edge arena, so it is only stable within one
//! tile generation.

use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Identifies a vertex: tile id plus sequential local id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct VertexId {
    pub tile_id: u32,
    pub local_id: u32,
}

impl VertexId {
    pub const fn new(tile_id: u32, local_id: u32) -> Self {
        Self { tile_id, local_id }
    }
}

/// Identifies an edge: tile id plus byte offset of its record in the tile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdgeId {
    pub tile_id: u32,
    pub local_id: u32,
}

impl EdgeId {
    pub const fn new(tile_id: u32, local_id: u32) -> Self {
        Self { tile_id, local_id }
    }
}

impl fmt::Display for VertexId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tile_id, self.local_id)
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.tile_id, self.local_id)
    }
}

/// Error returned when parsing a `tile/local` identifier fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("expected an identifier formatted as 'tile/local', got '{0}'")]
pub struct ParseIdError(String);

fn parse_pair(s: &str) -> Result<(u32, u32), ParseIdError> {
    let (tile, local) = s
        .trim()
        .split_once('/')
        .ok_or_else(|| ParseIdError(s.to_string()))?;
    let tile = tile.parse().map_err(|_| ParseIdError(s.to_string()))?;
    let local = local.parse().map_err(|_| ParseIdError(s.to_string()))?;
    Ok((tile, local))
}

impl FromStr for VertexId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tile_id, local_id) = parse_pair(s)?;
        Ok(Self { tile_id, local_id })
    }
}

impl FromStr for EdgeId {
    type Err = ParseIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tile_id, local_id) = parse_pair(s)?;
        Ok(Self { tile_id, local_id })
    }
}
