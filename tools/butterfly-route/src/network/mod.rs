//! Routing network - an immutable snapshot of tiles
//!
//! Tiles are shared between snapshots through `Arc`; a mutation session
//! copies a tile only when it first writes to it.

pub mod enumerator;
pub mod io;
pub mod tile;
pub mod turn_costs;

use std::collections::BTreeMap;
use std::sync::Arc;

use butterfly_common::{EdgeId, Error, Result, VertexId};

pub use enumerator::{NetworkTileEnumerator, RoutingNetworkEdgeEnumerator};
pub use tile::{Attributes, NetworkTile, Shape};
pub use turn_costs::{TurnCosts, MAX_TURN_ORDERS};

#[derive(Debug, Clone, Default)]
pub struct RoutingNetwork {
    zoom: u8,
    tiles: BTreeMap<u32, Arc<NetworkTile>>,
}

impl RoutingNetwork {
    pub fn new(zoom: u8) -> Self {
        Self {
            zoom,
            tiles: BTreeMap::new(),
        }
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn tile(&self, tile_id: u32) -> Option<&NetworkTile> {
        self.tiles.get(&tile_id).map(Arc::as_ref)
    }

    /// Tiles in ascending tile-id order
    pub fn tiles(&self) -> impl Iterator<Item = &NetworkTile> {
        self.tiles.values().map(Arc::as_ref)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn vertex_count(&self) -> usize {
        self.tiles().map(|t| t.vertex_count() as usize).sum()
    }

    /// Number of logical edges; cross-tile copies are counted once
    pub fn edge_count(&self) -> usize {
        let mut count = 0;
        for tile in self.tiles() {
            let mut offset = 0u32;
            while offset < tile.edge_arena_len() {
                let record = tile.edge(offset);
                if !record.flipped() {
                    count += 1;
                }
                offset = record.end;
            }
        }
        count
    }

    pub fn has_vertex(&self, vertex: VertexId) -> bool {
        self.tile(vertex.tile_id).is_some_and(|t| t.has_vertex(vertex))
    }

    pub fn has_edge(&self, edge: EdgeId) -> bool {
        self.tile(edge.tile_id)
            .and_then(|t| t.locate_edge(edge.local_id))
            .is_some()
    }

    /// Location of a vertex as (lon, lat)
    pub fn vertex_location(&self, vertex: VertexId) -> Option<(f64, f64)> {
        self.tile(vertex.tile_id)?.vertex_location(vertex)
    }

    /// A fresh cursor over this snapshot
    pub fn edge_enumerator(&self) -> RoutingNetworkEdgeEnumerator<'_> {
        RoutingNetworkEdgeEnumerator::new(self)
    }

    /// Non-zero turn costs at `vertex` between two turn orders
    pub fn turn_costs(&self, vertex: VertexId, from_order: u8, to_order: u8) -> TurnCosts<'_> {
        match self.tile(vertex.tile_id) {
            Some(tile) => tile.turn_costs(vertex, from_order, to_order),
            None => TurnCosts::empty(),
        }
    }

    /// Writable tile, created when missing and copied if a snapshot still shares it
    pub(crate) fn tile_mut(&mut self, tile_id: u32) -> &mut NetworkTile {
        let zoom = self.zoom;
        let tile = self
            .tiles
            .entry(tile_id)
            .or_insert_with(|| Arc::new(NetworkTile::new(tile_id, zoom)));
        Arc::make_mut(tile)
    }

    /// Writable tile holding `vertex`
    pub(crate) fn vertex_tile_mut(&mut self, vertex: VertexId) -> Result<&mut NetworkTile> {
        if !self.has_vertex(vertex) {
            return Err(Error::VertexNotFound(vertex));
        }
        Ok(self.tile_mut(vertex.tile_id))
    }

    /// Add or replace a whole tile
    pub(crate) fn insert_tile(&mut self, tile: Arc<NetworkTile>) -> Result<()> {
        if tile.zoom() != self.zoom {
            return Err(Error::InvalidInput(format!(
                "tile {} has zoom {}, network zoom is {}",
                tile.tile_id(),
                tile.zoom(),
                self.zoom
            )));
        }
        self.tiles.insert(tile.tile_id(), tile);
        Ok(())
    }

    /// True when `other` shares the storage of tile `tile_id` with this snapshot
    pub fn shares_tile(&self, other: &RoutingNetwork, tile_id: u32) -> bool {
        match (self.tiles.get(&tile_id), other.tiles.get(&tile_id)) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_mut_copies_shared_tiles_only() {
        let mut network = RoutingNetwork::new(14);
        network.tile_mut(7).add_vertex(0.0, 0.0);
        let snapshot = network.clone();
        assert!(network.shares_tile(&snapshot, 7));

        network.tile_mut(7).add_vertex(0.1, 0.0);
        assert!(!network.shares_tile(&snapshot, 7));
        assert_eq!(snapshot.tile(7).map(|t| t.vertex_count()), Some(1));
        assert_eq!(network.tile(7).map(|t| t.vertex_count()), Some(2));
    }

    #[test]
    fn missing_tiles_have_no_vertices() {
        let network = RoutingNetwork::new(14);
        let vertex = VertexId::new(3, 0);
        assert!(!network.has_vertex(vertex));
        assert!(network.vertex_location(vertex).is_none());
        assert_eq!(network.turn_costs(vertex, 0, 1).count(), 0);
        assert!(!network.edge_enumerator().move_to_vertex(vertex));
    }

    #[test]
    fn zoom_mismatch_is_rejected() {
        let mut network = RoutingNetwork::new(14);
        let tile = Arc::new(NetworkTile::new(1, 12));
        assert!(matches!(
            network.insert_tile(tile),
            Err(Error::InvalidInput(_))
        ));
    }
}
