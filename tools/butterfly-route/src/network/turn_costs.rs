//! Turn-cost table - per-vertex cost matrices indexed by turn order
//!
//! Each incident edge that takes part in a turn-cost record gets a small
//! per-vertex order, stored in the edge record's fixed order byte. Records
//! are appended to the turn-cost arena and chained per vertex:
//!
//! ```text
//! turn_cost_type | n (u8) | n×n costs | previous
//! ```
//!
//! A zero cost means "unrestricted" and is never reported.

use butterfly_common::varint::{self, VarintError};
use butterfly_common::{EdgeId, Error, Result, VertexId};

use super::tile::{read_pointer, write_pointer, EdgeRecord, NetworkTile};

/// Maximum number of distinct turn orders at one vertex
pub const MAX_TURN_ORDERS: usize = 8;

#[derive(Debug, Clone, Copy)]
pub(crate) struct RecordHeader {
    pub turn_cost_type: u32,
    pub n: u8,
    pub cells_at: usize,
    pub previous: Option<u32>,
}

pub(crate) fn try_record_header(data: &[u8], ptr: u32) -> std::result::Result<RecordHeader, VarintError> {
    let mut off = ptr as usize;
    let turn_cost_type = varint::try_read_u32(data, &mut off)?;
    let n = *data.get(off).ok_or(VarintError::Truncated(off))?;
    off += 1;
    let cells_at = off;
    for _ in 0..usize::from(n) * usize::from(n) {
        varint::try_read_u32(data, &mut off)?;
    }
    let previous = read_pointer(data, &mut off)?;
    Ok(RecordHeader {
        turn_cost_type,
        n,
        cells_at,
        previous,
    })
}

fn record_header(data: &[u8], ptr: u32) -> RecordHeader {
    match try_record_header(data, ptr) {
        Ok(header) => header,
        Err(e) => panic!("turn-cost record at {ptr} is corrupt: {e}"),
    }
}

impl NetworkTile {
    /// Record of `edge` as seen from its endpoint `vertex` in this tile
    fn find_incident(&self, vertex: VertexId, edge: EdgeId) -> Result<EdgeRecord> {
        if !self.has_vertex(vertex) {
            return Err(Error::VertexNotFound(vertex));
        }
        let mut next = self.first_edge(vertex.local_id);
        while let Some(ptr) = next {
            let record = self.edge(ptr);
            if record.matches(self.tile_id, edge) {
                return Ok(record);
            }
            next = record.next_for(vertex);
        }
        Err(Error::EdgeNotFound(edge))
    }

    /// Edge at `vertex` that already holds `order`
    fn order_holder(&self, vertex: VertexId, order: u8) -> Option<EdgeRecord> {
        let mut next = self.first_edge(vertex.local_id);
        while let Some(ptr) = next {
            let record = self.edge(ptr);
            if record.order_at(vertex) == Some(order) {
                return Some(record);
            }
            next = record.next_for(vertex);
        }
        None
    }

    /// Turn order of `edge` at `vertex`, if one was assigned
    pub fn turn_order(&self, vertex: VertexId, edge: EdgeId) -> Result<Option<u8>> {
        Ok(self.find_incident(vertex, edge)?.order_at(vertex))
    }

    /// Assign the turn order of `edge` at `vertex`
    ///
    /// Orders are permanent: setting one that already exists is an
    /// invariant violation, even when the value is unchanged.
    pub fn set_turn_order(&mut self, vertex: VertexId, edge: EdgeId, order: u8) -> Result<()> {
        if usize::from(order) >= MAX_TURN_ORDERS {
            return Err(Error::TurnOrderCapacity {
                vertex,
                requested: usize::from(order) + 1,
                max: MAX_TURN_ORDERS,
            });
        }
        let record = self.find_incident(vertex, edge)?;
        if let Some(existing) = record.order_at(vertex) {
            return Err(Error::TurnOrderReassigned {
                edge,
                vertex,
                existing,
            });
        }
        if let Some(holder) = self.order_holder(vertex, order) {
            return Err(Error::TurnOrderTaken {
                order,
                vertex,
                holder: holder.edge_id(self.tile_id),
            });
        }
        self.patch_order(&record, record.vertex1 == vertex, order);
        Ok(())
    }

    /// Add a turn-cost matrix at `vertex`
    ///
    /// `costs` is row-major and indexed by the position of the edges in
    /// `edges`: `costs[i * edges.len() + j]` is the cost of turning from
    /// `edges[i]` into `edges[j]`. Edges without an order at this vertex get
    /// the lowest free one; edges that already have one keep it.
    pub fn add_turn_costs(
        &mut self,
        vertex: VertexId,
        turn_cost_type: u32,
        edges: &[EdgeId],
        costs: &[u32],
    ) -> Result<()> {
        if edges.is_empty() || costs.len() != edges.len() * edges.len() {
            return Err(Error::InvalidInput(format!(
                "turn costs at {vertex}: expected {} costs for {} edges, got {}",
                edges.len() * edges.len(),
                edges.len(),
                costs.len()
            )));
        }
        if !self.has_vertex(vertex) {
            return Err(Error::VertexNotFound(vertex));
        }

        let mut used = 0u32;
        let mut next = self.first_edge(vertex.local_id);
        while let Some(ptr) = next {
            let record = self.edge(ptr);
            if let Some(order) = record.order_at(vertex).filter(|&o| o < 32) {
                used |= 1 << order;
            }
            next = record.next_for(vertex);
        }

        let mut records: Vec<EdgeRecord> = Vec::with_capacity(edges.len());
        for &edge in edges {
            let record = self.find_incident(vertex, edge)?;
            // a canonical id and its local copy address name the same record
            if records.iter().any(|r| r.offset == record.offset) {
                return Err(Error::InvalidInput(format!(
                    "turn costs at {vertex}: edge {edge} is listed twice"
                )));
            }
            records.push(record);
        }
        let unassigned = records
            .iter()
            .filter(|r| r.order_at(vertex).is_none())
            .count();
        let requested = used.count_ones() as usize + unassigned;
        if requested > MAX_TURN_ORDERS {
            return Err(Error::TurnOrderCapacity {
                vertex,
                requested,
                max: MAX_TURN_ORDERS,
            });
        }

        let mut orders = Vec::with_capacity(edges.len());
        for record in &records {
            let order = match record.order_at(vertex) {
                Some(order) => order,
                None => {
                    let order = (0..MAX_TURN_ORDERS as u8)
                        .find(|o| used & (1 << o) == 0)
                        .ok_or(Error::TurnOrderCapacity {
                            vertex,
                            requested,
                            max: MAX_TURN_ORDERS,
                        })?;
                    used |= 1 << order;
                    self.patch_order(record, record.vertex1 == vertex, order);
                    order
                }
            };
            orders.push(usize::from(order));
        }

        let n = orders.iter().max().map_or(0, |&o| o + 1);
        let mut matrix = vec![0u32; n * n];
        for (i, &from) in orders.iter().enumerate() {
            for (j, &to) in orders.iter().enumerate() {
                matrix[from * n + to] = costs[i * edges.len() + j];
            }
        }

        let ptr = self.turn_costs.len() as u32;
        let previous = self.first_turn_cost(vertex.local_id);
        varint::write_u32(&mut self.turn_costs, turn_cost_type);
        self.turn_costs.push(n as u8);
        for cost in matrix {
            varint::write_u32(&mut self.turn_costs, cost);
        }
        write_pointer(&mut self.turn_costs, previous);
        self.turn_cost_pointers[vertex.local_id as usize] = ptr;

        tracing::trace!(%vertex, turn_cost_type, n, "turn costs added");
        Ok(())
    }

    /// Non-zero turn costs at `vertex` from the edge with `from_order` into the edge with `to_order`
    pub fn turn_costs(&self, vertex: VertexId, from_order: u8, to_order: u8) -> TurnCosts<'_> {
        let next = if self.has_vertex(vertex) {
            self.first_turn_cost(vertex.local_id)
        } else {
            None
        };
        TurnCosts {
            data: &self.turn_costs,
            next,
            from_order,
            to_order,
        }
    }

    /// Number of turn-cost records chained at `vertex`
    pub fn turn_cost_record_count(&self, vertex: VertexId) -> usize {
        let mut count = 0;
        let mut next = if self.has_vertex(vertex) {
            self.first_turn_cost(vertex.local_id)
        } else {
            None
        };
        while let Some(ptr) = next {
            next = record_header(&self.turn_costs, ptr).previous;
            count += 1;
        }
        count
    }
}

/// Lazily walks the turn-cost chain of one vertex, yielding `(turn_cost_type, cost)`
#[derive(Debug, Clone)]
pub struct TurnCosts<'a> {
    data: &'a [u8],
    next: Option<u32>,
    from_order: u8,
    to_order: u8,
}

impl TurnCosts<'_> {
    pub(crate) fn empty() -> Self {
        TurnCosts {
            data: &[],
            next: None,
            from_order: 0,
            to_order: 0,
        }
    }
}

impl Iterator for TurnCosts<'_> {
    type Item = (u32, u32);

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(ptr) = self.next {
            let header = record_header(self.data, ptr);
            self.next = header.previous;
            if self.from_order >= header.n || self.to_order >= header.n {
                continue;
            }
            let cell = usize::from(self.from_order) * usize::from(header.n) + usize::from(self.to_order);
            let mut off = header.cells_at;
            for _ in 0..cell {
                varint::read_u32(self.data, &mut off);
            }
            let cost = varint::read_u32(self.data, &mut off);
            if cost != 0 {
                return Some((header.turn_cost_type, cost));
            }
        }
        None
    }
}
