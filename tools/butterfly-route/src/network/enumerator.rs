//! Edge enumerators - reusable cursors over tile adjacency chains
//!
//! `NetworkTileEnumerator` walks one tile. `RoutingNetworkEdgeEnumerator`
//! rebinds it as the search moves between tiles and resolves the parts of a
//! cross-tile edge that live in the other tile (turn orders and turn costs
//! at the foreign endpoint).
//!
//! A cursor holds mutable position state; use one per thread.

use butterfly_common::{EdgeId, VertexId};

use super::tile::{Attributes, EdgeRecord, NetworkTile};
use super::turn_costs::TurnCosts;
use super::RoutingNetwork;

/// Cursor over the edges of one tile
#[derive(Debug, Clone, Default)]
pub struct NetworkTileEnumerator<'t> {
    tile: Option<&'t NetworkTile>,
    anchor: Option<VertexId>,
    next: Option<u32>,
    current: Option<EdgeRecord>,
    /// Anchor is the record's vertex1 (record orientation)
    raw_forward: bool,
}

impl<'t> NetworkTileEnumerator<'t> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the cursor to `tile`; the position is cleared
    pub fn bind(&mut self, tile: &'t NetworkTile) {
        self.tile = Some(tile);
        self.anchor = None;
        self.next = None;
        self.current = None;
    }

    pub fn tile(&self) -> Option<&'t NetworkTile> {
        self.tile
    }

    /// Position before the first edge of `vertex`
    ///
    /// Returns false when the vertex is not in the bound tile.
    pub fn move_to_vertex(&mut self, vertex: VertexId) -> bool {
        self.current = None;
        let Some(tile) = self.tile.filter(|t| t.has_vertex(vertex)) else {
            self.anchor = None;
            self.next = None;
            return false;
        };
        self.anchor = Some(vertex);
        self.next = tile.first_edge(vertex.local_id);
        true
    }

    /// Advance to the next edge incident to the anchor vertex
    pub fn move_next(&mut self) -> bool {
        let (Some(tile), Some(anchor)) = (self.tile, self.anchor) else {
            return false;
        };
        let Some(ptr) = self.next else {
            self.current = None;
            return false;
        };
        let record = tile.edge(ptr);
        self.raw_forward = record.vertex1 == anchor;
        self.next = record.next_for(anchor);
        self.current = Some(record);
        true
    }

    /// Jump to `edge` as if traversed in `forward` direction
    ///
    /// `edge` may be the canonical id or the address of the local copy.
    /// Returns false when no such record exists in the bound tile.
    pub fn move_to_edge(&mut self, edge: EdgeId, forward: bool) -> bool {
        self.current = None;
        self.next = None;
        let Some(tile) = self.tile.filter(|t| t.tile_id() == edge.tile_id) else {
            return false;
        };
        let Some(record) = tile.locate_edge(edge.local_id) else {
            return false;
        };
        self.raw_forward = forward ^ record.flipped();
        self.anchor = Some(if self.raw_forward {
            record.vertex1
        } else {
            record.vertex2
        });
        self.current = Some(record);
        true
    }

    /// Rewind to before the first edge of the anchor vertex
    pub fn reset(&mut self) {
        self.current = None;
        self.next = match (self.tile, self.anchor) {
            (Some(tile), Some(anchor)) if tile.has_vertex(anchor) => tile.first_edge(anchor.local_id),
            _ => None,
        };
    }

    /// True when positioned on an edge
    pub fn is_positioned(&self) -> bool {
        self.current.is_some()
    }

    fn record(&self) -> &EdgeRecord {
        match &self.current {
            Some(record) => record,
            None => panic!("enumerator is not positioned on an edge"),
        }
    }

    fn bound_tile(&self) -> &'t NetworkTile {
        match self.tile {
            Some(tile) => tile,
            None => panic!("enumerator is not bound to a tile"),
        }
    }

    /// Logical (canonical) id of the current edge
    pub fn edge_id(&self) -> EdgeId {
        self.record().edge_id(self.bound_tile().tile_id())
    }

    /// Traversal direction relative to the canonical orientation
    pub fn forward(&self) -> bool {
        self.raw_forward ^ self.record().flipped()
    }

    /// Vertex the current traversal starts at
    pub fn from(&self) -> VertexId {
        let record = self.record();
        if self.raw_forward {
            record.vertex1
        } else {
            record.vertex2
        }
    }

    /// Vertex the current traversal ends at
    pub fn to(&self) -> VertexId {
        let record = self.record();
        if self.raw_forward {
            record.vertex2
        } else {
            record.vertex1
        }
    }

    pub fn edge_type_id(&self) -> u32 {
        self.record().edge_type_id
    }

    pub fn length_cm(&self) -> u32 {
        self.record().length_cm
    }

    /// Intermediate shape points in traversal direction
    pub fn shape(&self) -> Vec<(f64, f64)> {
        let mut points: Vec<_> = self.bound_tile().shape(self.record().shape).collect();
        if !self.raw_forward {
            points.reverse();
        }
        points
    }

    pub fn attributes(&self) -> Attributes<'t> {
        self.bound_tile().attributes(self.record().attributes)
    }

    /// Value of attribute `key`, if present
    pub fn attribute(&self, key: &str) -> Option<&'t str> {
        self.attributes().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    /// Turn order at the `from` vertex, when that vertex is in this tile
    pub fn tail_order(&self) -> Option<u8> {
        let record = self.record();
        let from = self.from();
        if from.tile_id == self.bound_tile().tile_id() {
            record.order_at(from)
        } else {
            None
        }
    }

    /// Turn order at the `to` vertex, when that vertex is in this tile
    pub fn head_order(&self) -> Option<u8> {
        let record = self.record();
        let to = self.to();
        if to.tile_id == self.bound_tile().tile_id() {
            record.order_at(to)
        } else {
            None
        }
    }

    /// Costs of turning at `from` out of the edge with `from_order` into this edge
    pub fn turn_cost_to_tail(&self, from_order: u8) -> TurnCosts<'t> {
        match self.tail_order() {
            Some(order) => self.bound_tile().turn_costs(self.from(), from_order, order),
            None => TurnCosts::empty(),
        }
    }

    /// Costs of turning at `to` out of this edge into the edge with `to_order`
    pub fn turn_cost_from_head(&self, to_order: u8) -> TurnCosts<'t> {
        match self.head_order() {
            Some(order) => self.bound_tile().turn_costs(self.to(), order, to_order),
            None => TurnCosts::empty(),
        }
    }

    pub fn from_location(&self) -> Option<(f64, f64)> {
        self.bound_tile().vertex_location(self.from())
    }

    pub fn to_location(&self) -> Option<(f64, f64)> {
        self.bound_tile().vertex_location(self.to())
    }
}

/// Cursor over the edges of a whole network snapshot
#[derive(Debug, Clone)]
pub struct RoutingNetworkEdgeEnumerator<'n> {
    network: &'n RoutingNetwork,
    inner: NetworkTileEnumerator<'n>,
}

impl<'n> RoutingNetworkEdgeEnumerator<'n> {
    pub fn new(network: &'n RoutingNetwork) -> Self {
        Self {
            network,
            inner: NetworkTileEnumerator::new(),
        }
    }

    pub fn network(&self) -> &'n RoutingNetwork {
        self.network
    }

    fn bind(&mut self, tile_id: u32) -> bool {
        if self.inner.tile().is_some_and(|t| t.tile_id() == tile_id) {
            return true;
        }
        match self.network.tile(tile_id) {
            Some(tile) => {
                self.inner.bind(tile);
                true
            }
            None => false,
        }
    }

    /// Position before the first edge of `vertex`, loading its tile
    pub fn move_to_vertex(&mut self, vertex: VertexId) -> bool {
        self.bind(vertex.tile_id) && self.inner.move_to_vertex(vertex)
    }

    pub fn move_next(&mut self) -> bool {
        self.inner.move_next()
    }

    /// Jump to the logical edge `edge` traversed in `forward` direction
    pub fn move_to_edge(&mut self, edge: EdgeId, forward: bool) -> bool {
        self.bind(edge.tile_id) && self.inner.move_to_edge(edge, forward)
    }

    pub fn reset(&mut self) {
        self.inner.reset();
    }

    pub fn is_positioned(&self) -> bool {
        self.inner.is_positioned()
    }

    pub fn edge_id(&self) -> EdgeId {
        self.inner.edge_id()
    }

    pub fn forward(&self) -> bool {
        self.inner.forward()
    }

    pub fn from(&self) -> VertexId {
        self.inner.from()
    }

    pub fn to(&self) -> VertexId {
        self.inner.to()
    }

    pub fn edge_type_id(&self) -> u32 {
        self.inner.edge_type_id()
    }

    pub fn length_cm(&self) -> u32 {
        self.inner.length_cm()
    }

    pub fn shape(&self) -> Vec<(f64, f64)> {
        self.inner.shape()
    }

    pub fn attributes(&self) -> Attributes<'n> {
        self.inner.attributes()
    }

    pub fn attribute(&self, key: &str) -> Option<&'n str> {
        self.inner.attribute(key)
    }

    /// Order of the current edge at `vertex`, read from the copy stored in `vertex`'s tile
    fn order_at(&self, vertex: VertexId) -> Option<u8> {
        let record = self.inner.record();
        let tile = self.inner.bound_tile();
        if vertex.tile_id == tile.tile_id() {
            return record.order_at(vertex);
        }
        let (partner, _) = record.partner?;
        self.network
            .tile(partner.tile_id)?
            .locate_edge(partner.local_id)?
            .order_at(vertex)
    }

    pub fn tail_order(&self) -> Option<u8> {
        self.order_at(self.from())
    }

    pub fn head_order(&self) -> Option<u8> {
        self.order_at(self.to())
    }

    /// Costs of turning at `from` out of the edge with `from_order` into this edge
    pub fn turn_cost_to_tail(&self, from_order: u8) -> TurnCosts<'n> {
        match self.tail_order() {
            Some(order) => self.network.turn_costs(self.from(), from_order, order),
            None => TurnCosts::empty(),
        }
    }

    /// Costs of turning at `to` out of this edge into the edge with `to_order`
    pub fn turn_cost_from_head(&self, to_order: u8) -> TurnCosts<'n> {
        match self.head_order() {
            Some(order) => self.network.turn_costs(self.to(), order, to_order),
            None => TurnCosts::empty(),
        }
    }

    pub fn from_location(&self) -> Option<(f64, f64)> {
        self.network.vertex_location(self.from())
    }

    pub fn to_location(&self) -> Option<(f64, f64)> {
        self.network.vertex_location(self.to())
    }
}
