//! PathTree - append-only table of search visits
//!
//! Visits are addressed by sequential index and point at the visit they
//! were reached from. The table is cleared and reused between searches.

use butterfly_common::{EdgeId, VertexId};

/// One (edge, vertex reached) state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Visit {
    /// Vertex the edge was traversed to
    pub vertex: VertexId,
    pub edge: EdgeId,
    pub forward: bool,
    /// Turn order of `edge` at `vertex`
    pub order: Option<u8>,
    pub parent: Option<u32>,
}

#[derive(Debug, Clone, Default)]
pub struct PathTree {
    visits: Vec<Visit>,
}

impl PathTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, visit: Visit) -> u32 {
        let index = self.visits.len() as u32;
        self.visits.push(visit);
        index
    }

    /// # Panics
    /// If `index` was not returned by [`PathTree::add`] since the last clear.
    pub fn get(&self, index: u32) -> &Visit {
        &self.visits[index as usize]
    }

    /// Visits from `index` back to the root, following parents
    pub fn ancestry(&self, index: u32) -> impl Iterator<Item = &Visit> + '_ {
        std::iter::successors(Some(self.get(index)), |visit| visit.parent.map(|p| self.get(p)))
    }

    pub fn len(&self) -> usize {
        self.visits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visits.is_empty()
    }

    pub fn clear(&mut self) {
        self.visits.clear();
    }
}
