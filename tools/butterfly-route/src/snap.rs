//! Snap points - locations on an edge
//!
//! The offset runs along the edge's canonical direction: 0 is the tail
//! vertex, 65535 the head vertex.

use std::fmt;
use std::str::FromStr;

use butterfly_common::EdgeId;
use serde::{Deserialize, Serialize};

use crate::network::RoutingNetwork;

/// Offset of the head vertex
pub const MAX_OFFSET: u16 = u16::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapPoint {
    pub edge_id: EdgeId,
    pub offset: u16,
}

impl SnapPoint {
    pub const fn new(edge_id: EdgeId, offset: u16) -> Self {
        Self { edge_id, offset }
    }

    /// Offset as a fraction of the edge, 0.0 at the tail
    pub fn fraction(&self) -> f64 {
        f64::from(self.offset) / f64::from(MAX_OFFSET)
    }

    /// Offset measured in traversal direction
    pub fn offset_along(&self, forward: bool) -> u16 {
        if forward {
            self.offset
        } else {
            MAX_OFFSET - self.offset
        }
    }

    /// Location on the edge geometry as (lon, lat), `None` for unknown edges
    pub fn location(&self, network: &RoutingNetwork) -> Option<(f64, f64)> {
        let mut cursor = network.edge_enumerator();
        if !cursor.move_to_edge(self.edge_id, true) {
            return None;
        }
        let mut points = vec![cursor.from_location()?];
        points.extend(cursor.shape());
        points.push(cursor.to_location()?);
        crate::geo::interpolate(&points, self.fraction())
    }
}

impl fmt::Display for SnapPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.edge_id, self.offset)
    }
}

/// Directions a search may use at a snap point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Forward,
    Backward,
    #[default]
    Both,
}

impl Direction {
    pub fn allows(self, forward: bool) -> bool {
        match self {
            Direction::Forward => forward,
            Direction::Backward => !forward,
            Direction::Both => true,
        }
    }

    /// Allowed traversal directions, forward first
    pub fn directions(self) -> impl Iterator<Item = bool> {
        [true, false].into_iter().filter(move |&f| self.allows(f))
    }
}

/// Snap point with the directions the search may use there
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DirectedSnapPoint {
    pub point: SnapPoint,
    pub direction: Direction,
}

impl DirectedSnapPoint {
    pub const fn new(point: SnapPoint, direction: Direction) -> Self {
        Self { point, direction }
    }

    pub const fn both(point: SnapPoint) -> Self {
        Self::new(point, Direction::Both)
    }

    pub fn edge_id(&self) -> EdgeId {
        self.point.edge_id
    }
}

impl From<SnapPoint> for DirectedSnapPoint {
    fn from(point: SnapPoint) -> Self {
        Self::both(point)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid snap point {input:?}: expected tile/local@offset[:f|:b]")]
pub struct ParseSnapError {
    input: String,
}

impl FromStr for DirectedSnapPoint {
    type Err = ParseSnapError;

    /// Parses `tile/local@offset`, optionally followed by `:f` or `:b`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSnapError {
            input: s.to_string(),
        };
        let (point, direction) = match s.trim().rsplit_once(':') {
            Some((point, "f")) => (point, Direction::Forward),
            Some((point, "b")) => (point, Direction::Backward),
            Some(_) => return Err(err()),
            None => (s.trim(), Direction::Both),
        };
        let (edge, offset) = point.split_once('@').ok_or_else(err)?;
        let edge_id = edge.parse::<EdgeId>().map_err(|_| err())?;
        let offset = offset.trim().parse::<u16>().map_err(|_| err())?;
        Ok(Self::new(SnapPoint::new(edge_id, offset), direction))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_direction_forms() {
        let both: DirectedSnapPoint = "90038489/12@100".parse().unwrap();
        assert_eq!(both.point, SnapPoint::new(EdgeId::new(90_038_489, 12), 100));
        assert_eq!(both.direction, Direction::Both);

        let forward: DirectedSnapPoint = "1/0@0:f".parse().unwrap();
        assert_eq!(forward.direction, Direction::Forward);
        let backward: DirectedSnapPoint = " 1/0@65535:b ".parse().unwrap();
        assert_eq!(backward.direction, Direction::Backward);
        assert_eq!(backward.point.offset, MAX_OFFSET);
    }

    #[test]
    fn rejects_malformed_input() {
        for input in ["", "1/0", "1/0@", "1/0@70000", "1/0@5:x", "x/0@5", "1@5"] {
            assert!(input.parse::<DirectedSnapPoint>().is_err(), "{input}");
        }
    }

    #[test]
    fn offsets_flip_with_direction() {
        let point = SnapPoint::new(EdgeId::new(1, 0), 1000);
        assert_eq!(point.offset_along(true), 1000);
        assert_eq!(point.offset_along(false), MAX_OFFSET - 1000);
        assert_eq!(SnapPoint::new(EdgeId::new(1, 0), MAX_OFFSET).fraction(), 1.0);
    }

    #[test]
    fn direction_filters() {
        assert_eq!(Direction::Both.directions().collect::<Vec<_>>(), vec![true, false]);
        assert_eq!(Direction::Backward.directions().collect::<Vec<_>>(), vec![false]);
        assert!(!Direction::Forward.allows(false));
    }
}
