//! NetworkTile - one tile's vertices, edges, shapes, attributes and turn costs
//!
//! Every table is a growable byte arena. Edge records are written
//! sequentially and addressed by byte offset (the `local_id` of an
//! `EdgeId`):
//!
//! ```text
//! vertex1 | vertex2 | next1 | next2 | [partner] | edge_type | length_cm | shape | attributes | tail_order | head_order
//! ```
//!
//! * vertex: `dyn(local << 1 | foreign)`, then `dyn(tile)` when foreign
//! * next1/next2, shape, attributes: `dyn(pointer + 1)`, 0 = none
//! * partner, only for edges between tiles: `dyn(tile)`, `dyn(local << 1 | flipped)`
//! * tail_order/head_order: one fixed byte each, `NO_ORDER` when unset
//!
//! Adjacency is not stored separately. Each vertex points at its first
//! incident edge and every record continues the chains of both endpoints.

use butterfly_common::varint::{self, VarintError};
use butterfly_common::{EdgeId, Error, Result, VertexId};

/// Bytes per vertex in the vertex arena (lon, lat as i32 1e-7 degrees)
pub(crate) const VERTEX_SIZE: usize = 8;

/// Sentinel in the per-vertex pointer tables
pub(crate) const NO_POINTER: u32 = u32::MAX;

/// Value of an unset turn-order byte
pub(crate) const NO_ORDER: u8 = u8::MAX;

const FIXED_PRECISION: f64 = 1e7;

pub(crate) fn to_fixed(degrees: f64) -> i32 {
    (degrees * FIXED_PRECISION).round() as i32
}

pub(crate) fn from_fixed(fixed: i64) -> f64 {
    fixed as f64 / FIXED_PRECISION
}

fn pointer(raw: u32) -> Option<u32> {
    (raw != NO_POINTER).then_some(raw)
}

pub(crate) fn write_pointer(out: &mut Vec<u8>, ptr: Option<u32>) {
    varint::write_u64(out, ptr.map_or(0, |p| u64::from(p) + 1));
}

pub(crate) fn read_pointer(data: &[u8], off: &mut usize) -> std::result::Result<Option<u32>, VarintError> {
    let start = *off;
    match varint::try_read_u64(data, off)? {
        0 => Ok(None),
        v => u32::try_from(v - 1)
            .map(Some)
            .map_err(|_| VarintError::Overflow(start)),
    }
}

/// Decoded edge record
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EdgeRecord {
    pub offset: u32,
    pub vertex1: VertexId,
    pub vertex2: VertexId,
    pub next1: Option<u32>,
    pub next2: Option<u32>,
    /// Address of the copy in the other tile, and whether this copy is stored reversed
    pub partner: Option<(EdgeId, bool)>,
    pub edge_type_id: u32,
    pub length_cm: u32,
    pub shape: Option<u32>,
    pub attributes: Option<u32>,
    pub tail_order: Option<u8>,
    pub head_order: Option<u8>,
    /// Offset just past the record; the two order bytes sit right before it
    pub end: u32,
}

impl EdgeRecord {
    /// Logical id: the canonical copy's address
    pub fn edge_id(&self, tile_id: u32) -> EdgeId {
        match self.partner {
            Some((canonical, true)) => canonical,
            _ => EdgeId::new(tile_id, self.offset),
        }
    }

    /// True when this copy is stored in reverse of the canonical direction
    pub fn flipped(&self) -> bool {
        matches!(self.partner, Some((_, true)))
    }

    /// Turn order of this edge at `vertex`, which must be one of its endpoints
    pub fn order_at(&self, vertex: VertexId) -> Option<u8> {
        if self.vertex1 == vertex {
            self.tail_order
        } else {
            self.head_order
        }
    }

    /// Next edge in the chain of `vertex`
    pub fn next_for(&self, vertex: VertexId) -> Option<u32> {
        if self.vertex1 == vertex {
            self.next1
        } else {
            self.next2
        }
    }

    pub fn matches(&self, tile_id: u32, edge: EdgeId) -> bool {
        self.edge_id(tile_id) == edge || EdgeId::new(tile_id, self.offset) == edge
    }
}

/// Values written into a new edge record
#[derive(Debug, Clone, Copy)]
pub(crate) struct EdgeWrite<'a> {
    pub vertex1: VertexId,
    pub vertex2: VertexId,
    pub partner: Option<(EdgeId, bool)>,
    pub edge_type_id: u32,
    pub length_cm: u32,
    pub shape: &'a [(f64, f64)],
    pub attributes: &'a [(String, String)],
}

/// A single tile of the routing network
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkTile {
    pub(crate) tile_id: u32,
    pub(crate) zoom: u8,
    pub(crate) vertices: Vec<u8>,
    pub(crate) edge_pointers: Vec<u32>,
    pub(crate) edges: Vec<u8>,
    pub(crate) shapes: Vec<u8>,
    pub(crate) attributes: Vec<u8>,
    pub(crate) turn_cost_pointers: Vec<u32>,
    pub(crate) turn_costs: Vec<u8>,
}

impl NetworkTile {
    /// Create an empty tile
    pub fn new(tile_id: u32, zoom: u8) -> Self {
        Self {
            tile_id,
            zoom,
            vertices: Vec::new(),
            edge_pointers: Vec::new(),
            edges: Vec::new(),
            shapes: Vec::new(),
            attributes: Vec::new(),
            turn_cost_pointers: Vec::new(),
            turn_costs: Vec::new(),
        }
    }

    pub fn tile_id(&self) -> u32 {
        self.tile_id
    }

    pub fn zoom(&self) -> u8 {
        self.zoom
    }

    pub fn vertex_count(&self) -> u32 {
        self.edge_pointers.len() as u32
    }

    /// Size of the edge arena; the next edge record is written at this offset
    pub fn edge_arena_len(&self) -> u32 {
        self.edges.len() as u32
    }

    /// Number of edge records stored in this tile (cross-tile copies included)
    pub fn edge_count(&self) -> usize {
        let mut count = 0;
        let mut offset = 0u32;
        while (offset as usize) < self.edges.len() {
            offset = self.edge(offset).end;
            count += 1;
        }
        count
    }

    pub fn has_vertex(&self, vertex: VertexId) -> bool {
        vertex.tile_id == self.tile_id && vertex.local_id < self.vertex_count()
    }

    /// Append a vertex; the caller guarantees the location falls in this tile
    pub fn add_vertex(&mut self, lon: f64, lat: f64) -> VertexId {
        let local_id = self.vertex_count();
        self.vertices.extend_from_slice(&to_fixed(lon).to_le_bytes());
        self.vertices.extend_from_slice(&to_fixed(lat).to_le_bytes());
        self.edge_pointers.push(NO_POINTER);
        self.turn_cost_pointers.push(NO_POINTER);
        VertexId::new(self.tile_id, local_id)
    }

    /// Location of a vertex as (lon, lat)
    pub fn vertex_location(&self, vertex: VertexId) -> Option<(f64, f64)> {
        if !self.has_vertex(vertex) {
            return None;
        }
        let start = vertex.local_id as usize * VERTEX_SIZE;
        let raw = &self.vertices[start..start + VERTEX_SIZE];
        let lon = i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]);
        let lat = i32::from_le_bytes([raw[4], raw[5], raw[6], raw[7]]);
        Some((from_fixed(i64::from(lon)), from_fixed(i64::from(lat))))
    }

    /// First edge in the chain of a local vertex
    pub(crate) fn first_edge(&self, local_id: u32) -> Option<u32> {
        self.edge_pointers
            .get(local_id as usize)
            .copied()
            .and_then(pointer)
    }

    pub(crate) fn first_turn_cost(&self, local_id: u32) -> Option<u32> {
        self.turn_cost_pointers
            .get(local_id as usize)
            .copied()
            .and_then(pointer)
    }

    /// Write a new edge record and splice it onto the chains of its local endpoints
    pub(crate) fn write_edge(&mut self, edge: EdgeWrite<'_>) -> Result<EdgeId> {
        let local1 = edge.vertex1.tile_id == self.tile_id;
        let local2 = edge.vertex2.tile_id == self.tile_id;
        if !local1 && !local2 {
            return Err(Error::InvalidInput(format!(
                "edge {} -> {} has no endpoint in tile {}",
                edge.vertex1, edge.vertex2, self.tile_id
            )));
        }
        if edge.vertex1 == edge.vertex2 {
            return Err(Error::InvalidInput(format!(
                "self-loop at vertex {} is not supported",
                edge.vertex1
            )));
        }
        for (vertex, local) in [(edge.vertex1, local1), (edge.vertex2, local2)] {
            if local && !self.has_vertex(vertex) {
                return Err(Error::VertexNotFound(vertex));
            }
        }
        let crosses = edge.vertex1.tile_id != edge.vertex2.tile_id;
        if crosses != edge.partner.is_some() {
            return Err(Error::InvalidInput(format!(
                "edge {} -> {}: a partner copy is required exactly when endpoints are in different tiles",
                edge.vertex1, edge.vertex2
            )));
        }
        let offset = u32::try_from(self.edges.len())
            .ok()
            .filter(|&o| o != NO_POINTER)
            .ok_or_else(|| {
                Error::InvalidInput(format!("edge arena of tile {} is full", self.tile_id))
            })?;

        let next1 = if local1 { self.first_edge(edge.vertex1.local_id) } else { None };
        let next2 = if local2 { self.first_edge(edge.vertex2.local_id) } else { None };
        let shape = self.write_shape(edge.shape);
        let attributes = self.write_attributes(edge.attributes);

        let out = &mut self.edges;
        write_vertex(out, self.tile_id, edge.vertex1);
        write_vertex(out, self.tile_id, edge.vertex2);
        write_pointer(out, next1);
        write_pointer(out, next2);
        if let Some((partner, flipped)) = edge.partner {
            varint::write_u32(out, partner.tile_id);
            varint::write_u64(out, (u64::from(partner.local_id) << 1) | u64::from(flipped));
        }
        varint::write_u32(out, edge.edge_type_id);
        varint::write_u32(out, edge.length_cm);
        write_pointer(out, shape);
        write_pointer(out, attributes);
        out.push(NO_ORDER);
        out.push(NO_ORDER);

        if local1 {
            self.edge_pointers[edge.vertex1.local_id as usize] = offset;
        }
        if local2 {
            self.edge_pointers[edge.vertex2.local_id as usize] = offset;
        }
        Ok(EdgeId::new(self.tile_id, offset))
    }

    fn write_shape(&mut self, shape: &[(f64, f64)]) -> Option<u32> {
        if shape.is_empty() {
            return None;
        }
        let ptr = self.shapes.len() as u32;
        varint::write_u64(&mut self.shapes, shape.len() as u64);
        let (mut prev_lon, mut prev_lat) = (0i64, 0i64);
        for &(lon, lat) in shape {
            let (lon, lat) = (i64::from(to_fixed(lon)), i64::from(to_fixed(lat)));
            varint::write_i64(&mut self.shapes, lon - prev_lon);
            varint::write_i64(&mut self.shapes, lat - prev_lat);
            prev_lon = lon;
            prev_lat = lat;
        }
        Some(ptr)
    }

    fn write_attributes(&mut self, attributes: &[(String, String)]) -> Option<u32> {
        if attributes.is_empty() {
            return None;
        }
        let ptr = self.attributes.len() as u32;
        varint::write_u64(&mut self.attributes, attributes.len() as u64);
        for (key, value) in attributes {
            for s in [key, value] {
                varint::write_u64(&mut self.attributes, s.len() as u64);
                self.attributes.extend_from_slice(s.as_bytes());
            }
        }
        Some(ptr)
    }

    /// Decode the edge record at `offset`
    ///
    /// # Panics
    /// If `offset` is not the start of a record in a validated arena.
    pub(crate) fn edge(&self, offset: u32) -> EdgeRecord {
        match self.try_edge(offset) {
            Ok(record) => record,
            Err(e) => panic!("edge record at {}/{offset} is corrupt: {e}", self.tile_id),
        }
    }

    pub(crate) fn try_edge(&self, offset: u32) -> std::result::Result<EdgeRecord, VarintError> {
        let data = &self.edges;
        let mut off = offset as usize;
        let vertex1 = read_vertex(data, &mut off, self.tile_id)?;
        let vertex2 = read_vertex(data, &mut off, self.tile_id)?;
        let next1 = read_pointer(data, &mut off)?;
        let next2 = read_pointer(data, &mut off)?;
        let partner = if vertex1.tile_id != vertex2.tile_id {
            let tile = varint::try_read_u32(data, &mut off)?;
            let start = off;
            let packed = varint::try_read_u64(data, &mut off)?;
            let local = u32::try_from(packed >> 1).map_err(|_| VarintError::Overflow(start))?;
            Some((EdgeId::new(tile, local), packed & 1 == 1))
        } else {
            None
        };
        let edge_type_id = varint::try_read_u32(data, &mut off)?;
        let length_cm = varint::try_read_u32(data, &mut off)?;
        let shape = read_pointer(data, &mut off)?;
        let attributes = read_pointer(data, &mut off)?;
        let orders = data
            .get(off..off + 2)
            .ok_or(VarintError::Truncated(off))?;
        let tail_order = (orders[0] != NO_ORDER).then_some(orders[0]);
        let head_order = (orders[1] != NO_ORDER).then_some(orders[1]);

        Ok(EdgeRecord {
            offset,
            vertex1,
            vertex2,
            next1,
            next2,
            partner,
            edge_type_id,
            length_cm,
            shape,
            attributes,
            tail_order,
            head_order,
            end: (off + 2) as u32,
        })
    }

    /// Record starting at `offset`, if there is one
    ///
    /// Ids come from callers, so the offset is confirmed by walking the chain
    /// of the record's first vertex (always local) before it is trusted.
    /// The walk is O(degree of that vertex); no index of record starts is kept.
    pub(crate) fn locate_edge(&self, offset: u32) -> Option<EdgeRecord> {
        let record = self.try_edge(offset).ok()?;
        if !self.has_vertex(record.vertex1) {
            return None;
        }
        let mut next = self.first_edge(record.vertex1.local_id);
        while let Some(ptr) = next {
            if ptr == offset {
                return Some(record);
            }
            next = self.edge(ptr).next_for(record.vertex1);
        }
        None
    }

    /// Patch one of the fixed-width order bytes of an existing record
    pub(crate) fn patch_order(&mut self, record: &EdgeRecord, at_vertex1: bool, order: u8) {
        let slot = record.end as usize - if at_vertex1 { 2 } else { 1 };
        self.edges[slot] = order;
    }

    /// Shape points stored at `ptr`, in record orientation
    pub(crate) fn shape(&self, ptr: Option<u32>) -> Shape<'_> {
        match ptr {
            Some(ptr) => {
                let mut off = ptr as usize;
                let remaining = varint::read_u64(&self.shapes, &mut off) as usize;
                Shape {
                    data: &self.shapes,
                    off,
                    remaining,
                    lon: 0,
                    lat: 0,
                }
            }
            None => Shape::empty(),
        }
    }

    /// Attribute pairs stored at `ptr`
    pub(crate) fn attributes(&self, ptr: Option<u32>) -> Attributes<'_> {
        match ptr {
            Some(ptr) => {
                let mut off = ptr as usize;
                let remaining = varint::read_u64(&self.attributes, &mut off) as usize;
                Attributes {
                    data: &self.attributes,
                    off,
                    remaining,
                }
            }
            None => Attributes {
                data: &[],
                off: 0,
                remaining: 0,
            },
        }
    }

    /// Check every pointer and record so later lazy decoding cannot fail
    pub(crate) fn validate(&self) -> std::result::Result<(), String> {
        if self.vertices.len() != self.edge_pointers.len() * VERTEX_SIZE {
            return Err(format!(
                "vertex arena holds {} bytes for {} vertices",
                self.vertices.len(),
                self.edge_pointers.len()
            ));
        }
        if self.turn_cost_pointers.len() != self.edge_pointers.len() {
            return Err("turn-cost pointer table does not match vertex count".to_string());
        }

        let mut starts = rustc_hash::FxHashMap::default();
        let mut records = Vec::new();
        let mut offset = 0u32;
        while (offset as usize) < self.edges.len() {
            let record = self
                .try_edge(offset)
                .map_err(|e| format!("edge record at {offset}: {e}"))?;
            starts.insert(offset, records.len());
            offset = record.end;
            records.push(record);
        }

        let is_start = |ptr: Option<u32>| ptr.is_none_or(|p| starts.contains_key(&p));
        for &raw in &self.edge_pointers {
            if !is_start(pointer(raw)) {
                return Err(format!("first-edge pointer {raw} is not a record"));
            }
        }
        for record in &records {
            for vertex in [record.vertex1, record.vertex2] {
                if vertex.tile_id == self.tile_id && !self.has_vertex(vertex) {
                    return Err(format!("edge {} references missing vertex {vertex}", record.offset));
                }
            }
            if record.vertex1 == record.vertex2 {
                return Err(format!("edge {} is a self-loop", record.offset));
            }
            if !is_start(record.next1) || !is_start(record.next2) {
                return Err(format!("edge {} has a dangling next pointer", record.offset));
            }
            if let Some(ptr) = record.shape {
                self.try_shape(ptr)
                    .map_err(|e| format!("shape of edge {}: {e}", record.offset))?;
            }
            if let Some(ptr) = record.attributes {
                self.try_attributes(ptr)
                    .map_err(|e| format!("attributes of edge {}: {e}", record.offset))?;
            }
        }

        // every chain must end and only hold edges incident to its vertex
        for local_id in 0..self.vertex_count() {
            let vertex = VertexId::new(self.tile_id, local_id);
            let mut next = pointer(self.edge_pointers[local_id as usize]);
            let mut hops = 0usize;
            while let Some(ptr) = next {
                let record = &records[starts[&ptr]];
                if record.vertex1 != vertex && record.vertex2 != vertex {
                    return Err(format!("edge {ptr} is chained at {vertex} but not incident to it"));
                }
                hops += 1;
                if hops > records.len() {
                    return Err(format!("edge chain of {vertex} does not terminate"));
                }
                next = record.next_for(vertex);
            }
        }

        for &raw in &self.turn_cost_pointers {
            let mut next = pointer(raw);
            let mut hops = 0usize;
            while let Some(ptr) = next {
                next = crate::network::turn_costs::try_record_header(&self.turn_costs, ptr)
                    .map_err(|e| format!("turn-cost record at {ptr}: {e}"))?
                    .previous;
                hops += 1;
                if hops > self.turn_costs.len() {
                    return Err("turn-cost chain does not terminate".to_string());
                }
            }
        }
        Ok(())
    }

    fn try_shape(&self, ptr: u32) -> std::result::Result<(), String> {
        let mut off = ptr as usize;
        let count = varint::try_read_u64(&self.shapes, &mut off).map_err(|e| e.to_string())?;
        for _ in 0..count.saturating_mul(2) {
            varint::try_read_i64(&self.shapes, &mut off).map_err(|e| e.to_string())?;
        }
        Ok(())
    }

    fn try_attributes(&self, ptr: u32) -> std::result::Result<(), String> {
        let mut off = ptr as usize;
        let count = varint::try_read_u64(&self.attributes, &mut off).map_err(|e| e.to_string())?;
        for _ in 0..count.saturating_mul(2) {
            let len = varint::try_read_u64(&self.attributes, &mut off).map_err(|e| e.to_string())?;
            let end = off
                .checked_add(len as usize)
                .filter(|&end| end <= self.attributes.len())
                .ok_or_else(|| "attribute string runs past the arena".to_string())?;
            std::str::from_utf8(&self.attributes[off..end]).map_err(|e| e.to_string())?;
            off = end;
        }
        Ok(())
    }
}

fn write_vertex(out: &mut Vec<u8>, tile_id: u32, vertex: VertexId) {
    let foreign = vertex.tile_id != tile_id;
    varint::write_u64(out, (u64::from(vertex.local_id) << 1) | u64::from(foreign));
    if foreign {
        varint::write_u32(out, vertex.tile_id);
    }
}

fn read_vertex(
    data: &[u8],
    off: &mut usize,
    tile_id: u32,
) -> std::result::Result<VertexId, VarintError> {
    let start = *off;
    let packed = varint::try_read_u64(data, off)?;
    let local_id = u32::try_from(packed >> 1).map_err(|_| VarintError::Overflow(start))?;
    let tile = if packed & 1 == 1 {
        varint::try_read_u32(data, off)?
    } else {
        tile_id
    };
    Ok(VertexId::new(tile, local_id))
}

/// Lazily decoded shape points
pub struct Shape<'a> {
    data: &'a [u8],
    off: usize,
    remaining: usize,
    lon: i64,
    lat: i64,
}

impl Shape<'_> {
    fn empty() -> Self {
        Shape {
            data: &[],
            off: 0,
            remaining: 0,
            lon: 0,
            lat: 0,
        }
    }
}

impl Iterator for Shape<'_> {
    type Item = (f64, f64);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        self.lon += varint::read_i64(self.data, &mut self.off);
        self.lat += varint::read_i64(self.data, &mut self.off);
        Some((from_fixed(self.lon), from_fixed(self.lat)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Shape<'_> {}

/// Lazily decoded attribute pairs
pub struct Attributes<'a> {
    data: &'a [u8],
    off: usize,
    remaining: usize,
}

impl<'a> Attributes<'a> {
    fn read_str(&mut self) -> &'a str {
        let len = varint::read_u64(self.data, &mut self.off) as usize;
        let bytes = &self.data[self.off..self.off + len];
        self.off += len;
        std::str::from_utf8(bytes).unwrap_or_default()
    }
}

impl<'a> Iterator for Attributes<'a> {
    type Item = (&'a str, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let key = self.read_str();
        let value = self.read_str();
        Some((key, value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Attributes<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    const TILE: u32 = 90_038_489;

    fn write<'a>(v1: VertexId, v2: VertexId, shape: &'a [(f64, f64)], attributes: &'a [(String, String)]) -> EdgeWrite<'a> {
        EdgeWrite {
            vertex1: v1,
            vertex2: v2,
            partner: None,
            edge_type_id: 3,
            length_cm: 1250,
            shape,
            attributes,
        }
    }

    #[test]
    fn vertices_get_sequential_ids_and_keep_their_location() {
        let mut tile = NetworkTile::new(TILE, 14);
        let v0 = tile.add_vertex(4.7868, 50.8546);
        let v1 = tile.add_vertex(4.7870, 50.8550);

        assert_eq!(v0, VertexId::new(TILE, 0));
        assert_eq!(v1, VertexId::new(TILE, 1));
        let (lon, lat) = tile.vertex_location(v1).unwrap();
        assert!((lon - 4.7870).abs() < 1e-7);
        assert!((lat - 50.8550).abs() < 1e-7);
        assert!(tile.vertex_location(VertexId::new(TILE, 2)).is_none());
    }

    #[test]
    fn first_edge_id_is_byte_offset_zero() {
        let mut tile = NetworkTile::new(TILE, 14);
        let a = tile.add_vertex(4.78, 50.85);
        let b = tile.add_vertex(4.79, 50.85);
        let c = tile.add_vertex(4.79, 50.86);

        let e1 = tile.write_edge(write(a, b, &[], &[])).unwrap();
        let e2 = tile.write_edge(write(b, c, &[], &[])).unwrap();
        assert_eq!(e1.local_id, 0);
        assert_eq!(e2.local_id, tile.edge(0).end);
        assert_eq!(tile.edge_count(), 2);
    }

    #[test]
    fn new_edges_are_spliced_at_the_head_of_both_chains() {
        let mut tile = NetworkTile::new(TILE, 14);
        let a = tile.add_vertex(4.78, 50.85);
        let b = tile.add_vertex(4.79, 50.85);
        let c = tile.add_vertex(4.79, 50.86);

        let ab = tile.write_edge(write(a, b, &[], &[])).unwrap();
        let bc = tile.write_edge(write(b, c, &[], &[])).unwrap();

        assert_eq!(tile.first_edge(b.local_id), Some(bc.local_id));
        let record = tile.edge(bc.local_id);
        assert_eq!(record.next_for(b), Some(ab.local_id));
        assert_eq!(record.next_for(c), None);
        assert_eq!(tile.edge(ab.local_id).next_for(b), None);
    }

    #[test]
    fn record_round_trips_all_fields() {
        let mut tile = NetworkTile::new(TILE, 14);
        let a = tile.add_vertex(4.78, 50.85);
        let b = tile.add_vertex(4.79, 50.85);
        let shape = [(4.783, 50.851), (4.787, 50.849)];
        let attributes = vec![("highway".to_string(), "residential".to_string())];

        let id = tile.write_edge(write(a, b, &shape, &attributes)).unwrap();
        let record = tile.edge(id.local_id);

        assert_eq!(record.vertex1, a);
        assert_eq!(record.vertex2, b);
        assert_eq!(record.edge_type_id, 3);
        assert_eq!(record.length_cm, 1250);
        assert_eq!(record.tail_order, None);
        assert_eq!(record.end as usize, tile.edges.len());

        let decoded: Vec<_> = tile.shape(record.shape).collect();
        assert_eq!(decoded.len(), 2);
        assert!((decoded[1].0 - 4.787).abs() < 1e-7);
        assert!((decoded[1].1 - 50.849).abs() < 1e-7);

        let attrs: Vec<_> = tile.attributes(record.attributes).collect();
        assert_eq!(attrs, vec![("highway", "residential")]);
    }

    #[test]
    fn order_patch_leaves_neighbouring_fields_intact() {
        let mut tile = NetworkTile::new(TILE, 14);
        let a = tile.add_vertex(4.78, 50.85);
        let b = tile.add_vertex(4.79, 50.85);
        let id = tile.write_edge(write(a, b, &[], &[])).unwrap();

        let before = tile.edge(id.local_id);
        tile.patch_order(&before, false, 2);
        let after = tile.edge(id.local_id);

        assert_eq!(after.head_order, Some(2));
        assert_eq!(after.tail_order, None);
        assert_eq!(after.length_cm, before.length_cm);
        assert_eq!(after.end, before.end);
    }

    #[test]
    fn invalid_edges_are_rejected() {
        let mut tile = NetworkTile::new(TILE, 14);
        let a = tile.add_vertex(4.78, 50.85);

        let missing = VertexId::new(TILE, 9);
        assert!(matches!(
            tile.write_edge(write(a, missing, &[], &[])),
            Err(Error::VertexNotFound(v)) if v == missing
        ));
        assert!(matches!(
            tile.write_edge(write(a, a, &[], &[])),
            Err(Error::InvalidInput(_))
        ));

        // foreign endpoint without a partner copy
        let foreign = VertexId::new(TILE + 1, 0);
        assert!(matches!(
            tile.write_edge(write(a, foreign, &[], &[])),
            Err(Error::InvalidInput(_))
        ));
        assert!(tile.edges.is_empty());
    }

    #[test]
    fn cross_tile_records_carry_their_partner() {
        let mut tile = NetworkTile::new(TILE, 14);
        let a = tile.add_vertex(4.78, 50.85);
        let foreign = VertexId::new(TILE + 1, 4);
        let partner = EdgeId::new(TILE + 1, 17);

        let mut edge = write(a, foreign, &[], &[]);
        edge.partner = Some((partner, false));
        let id = tile.write_edge(edge).unwrap();

        let record = tile.edge(id.local_id);
        assert_eq!(record.vertex2, foreign);
        assert_eq!(record.partner, Some((partner, false)));
        assert_eq!(record.edge_id(TILE), id);
        assert_eq!(record.next_for(foreign), None);
        assert!(tile.validate().is_ok());
    }

    #[test]
    fn only_real_record_starts_are_located() {
        let mut tile = NetworkTile::new(TILE, 14);
        let a = tile.add_vertex(4.78, 50.85);
        let b = tile.add_vertex(4.79, 50.85);
        let id = tile.write_edge(write(a, b, &[], &[])).unwrap();

        assert_eq!(tile.locate_edge(id.local_id).map(|r| r.vertex2), Some(b));
        assert!(tile.locate_edge(1).is_none());
        assert!(tile.locate_edge(1000).is_none());
    }

    #[test]
    fn validation_catches_broken_pointers() {
        let mut tile = NetworkTile::new(TILE, 14);
        let a = tile.add_vertex(4.78, 50.85);
        let b = tile.add_vertex(4.79, 50.85);
        tile.write_edge(write(a, b, &[], &[])).unwrap();
        assert!(tile.validate().is_ok());

        tile.edge_pointers[0] = 1;
        assert!(tile.validate().is_err());
    }
}
