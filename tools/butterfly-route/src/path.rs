//! Path - a traversed sequence of edges between two snap points
//!
//! `offset1` and `offset2` are measured in the traversal direction of the
//! first and last edge: 0 is where the traversal enters the edge and 65535
//! where it leaves.

use std::fmt;

use butterfly_common::EdgeId;
use serde::{Deserialize, Serialize};

use crate::network::RoutingNetwork;
use crate::snap::MAX_OFFSET;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Path {
    edges: Vec<(EdgeId, bool)>,
    pub offset1: u16,
    pub offset2: u16,
}

impl Default for Path {
    fn default() -> Self {
        Self::new()
    }
}

impl Path {
    pub fn new() -> Self {
        Self {
            edges: Vec::new(),
            offset1: 0,
            offset2: MAX_OFFSET,
        }
    }

    /// Edges as `(edge, forward)` in traversal order
    pub fn edges(&self) -> &[(EdgeId, bool)] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    pub fn first(&self) -> Option<(EdgeId, bool)> {
        self.edges.first().copied()
    }

    pub fn last(&self) -> Option<(EdgeId, bool)> {
        self.edges.last().copied()
    }

    pub fn append(&mut self, edge: EdgeId, forward: bool) {
        self.edges.push((edge, forward));
    }

    pub fn prepend(&mut self, edge: EdgeId, forward: bool) {
        self.edges.insert(0, (edge, forward));
    }

    /// Drop end edges the path only touches at a vertex
    ///
    /// A first edge left at its very end or a last edge entered and left at
    /// its very start contributes nothing. A single-edge path is kept.
    pub fn trim(&mut self) {
        if self.edges.len() > 1 && self.offset1 == MAX_OFFSET {
            self.edges.remove(0);
            self.offset1 = 0;
        }
        if self.edges.len() > 1 && self.offset2 == 0 {
            self.edges.pop();
            self.offset2 = MAX_OFFSET;
        }
    }

    /// Traversed length in meters, `None` when an edge is missing from `network`
    pub fn length_m(&self, network: &RoutingNetwork) -> Option<f64> {
        let mut cursor = network.edge_enumerator();
        let last = self.edges.len().checked_sub(1)?;
        let mut total_cm = 0.0;
        for (i, &(edge, forward)) in self.edges.iter().enumerate() {
            if !cursor.move_to_edge(edge, forward) {
                return None;
            }
            let start = if i == 0 { self.offset1 } else { 0 };
            let end = if i == last { self.offset2 } else { MAX_OFFSET };
            let fraction = f64::from(end.saturating_sub(start)) / f64::from(MAX_OFFSET);
            total_cm += f64::from(cursor.length_cm()) * fraction;
        }
        Some(total_cm / 100.0)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.offset1)?;
        for (i, (edge, forward)) in self.edges.iter().enumerate() {
            let sign = if *forward { '+' } else { '-' };
            if i > 0 {
                write!(f, " ->")?;
            }
            write!(f, " {edge}{sign}")?;
        }
        write!(f, " [{}]", self.offset2)
    }
}
