//! Cost functions consumed by the search
//!
//! A cost function sees the candidate edge through the enumerator and the
//! edges traversed just before it, and returns `(traversal, turn)`.
//! `traversal <= 0` means the edge cannot be used in this direction; an
//! infinite or negative turn cost forbids the turn.

use butterfly_common::EdgeId;

use crate::network::RoutingNetworkEdgeEnumerator;

/// Stored turn cost that forbids the turn outright
pub const FORBIDDEN_TURN_COST: u32 = u32::MAX;

pub trait CostFunction {
    /// `previous` lists the preceding `(edge, turn order at the shared vertex)`, most recent last
    fn cost(
        &self,
        edge: &RoutingNetworkEdgeEnumerator<'_>,
        previous: &[(EdgeId, Option<u8>)],
    ) -> (f64, f64);
}

impl<F> CostFunction for F
where
    F: Fn(&RoutingNetworkEdgeEnumerator<'_>, &[(EdgeId, Option<u8>)]) -> (f64, f64),
{
    fn cost(
        &self,
        edge: &RoutingNetworkEdgeEnumerator<'_>,
        previous: &[(EdgeId, Option<u8>)],
    ) -> (f64, f64) {
        self(edge, previous)
    }
}

/// Sum of the turn costs stored for entering the current edge after `previous`
///
/// A forbidden cell yields infinity.
pub fn stored_turn_cost(
    edge: &RoutingNetworkEdgeEnumerator<'_>,
    previous: &[(EdgeId, Option<u8>)],
    turn_cost_type: Option<u32>,
) -> f64 {
    let Some(&(_, Some(from_order))) = previous.last() else {
        return 0.0;
    };
    let mut total = 0.0;
    for (kind, cost) in edge.turn_cost_to_tail(from_order) {
        if turn_cost_type.is_some_and(|t| t != kind) {
            continue;
        }
        if cost == FORBIDDEN_TURN_COST {
            return f64::INFINITY;
        }
        total += f64::from(cost);
    }
    total
}

/// Shortest distance in meters
///
/// Honors `oneway` attributes (`yes`, `-1`) and stored turn costs, which are
/// read as meters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DistanceCost {
    /// Only honor turn costs of this type; all types when `None`
    pub turn_cost_type: Option<u32>,
}

impl DistanceCost {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CostFunction for DistanceCost {
    fn cost(
        &self,
        edge: &RoutingNetworkEdgeEnumerator<'_>,
        previous: &[(EdgeId, Option<u8>)],
    ) -> (f64, f64) {
        let usable = match edge.attribute("oneway") {
            Some("yes") | Some("true") | Some("1") => edge.forward(),
            Some("-1") | Some("reverse") => !edge.forward(),
            _ => true,
        };
        if !usable {
            return (0.0, 0.0);
        }
        // zero-length edges still have to be traversable
        let meters = (f64::from(edge.length_cm()) / 100.0).max(0.01);
        (meters, stored_turn_cost(edge, previous, self.turn_cost_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{EdgeDetails, RouterDb};

    #[test]
    fn oneway_blocks_the_reverse_direction() {
        let db = RouterDb::new(14).unwrap();
        let mut session = db.mutate();
        let a = session.add_vertex(4.780, 50.850);
        let b = session.add_vertex(4.781, 50.850);
        let details = EdgeDetails {
            length_cm: Some(2_500),
            attributes: vec![("oneway".to_string(), "yes".to_string())],
            ..EdgeDetails::default()
        };
        let edge = session.add_edge(a, b, &details).unwrap();
        let network = session.commit();

        let mut cursor = network.edge_enumerator();
        assert!(cursor.move_to_edge(edge, true));
        assert_eq!(DistanceCost::new().cost(&cursor, &[]), (25.0, 0.0));
        assert!(cursor.move_to_edge(edge, false));
        assert_eq!(DistanceCost::new().cost(&cursor, &[]).0, 0.0);
    }

    #[test]
    fn forbidden_and_typed_turn_costs() {
        let db = RouterDb::new(14).unwrap();
        let mut session = db.mutate();
        let a = session.add_vertex(4.780, 50.850);
        let b = session.add_vertex(4.781, 50.850);
        let c = session.add_vertex(4.782, 50.850);
        let details = EdgeDetails {
            length_cm: Some(1_000),
            ..EdgeDetails::default()
        };
        let ab = session.add_edge(a, b, &details).unwrap();
        let bc = session.add_edge(b, c, &details).unwrap();
        session
            .add_turn_costs(b, 1, &[ab, bc], &[0, FORBIDDEN_TURN_COST, 0, 0])
            .unwrap();
        session.add_turn_costs(b, 2, &[ab, bc], &[0, 7, 0, 0]).unwrap();
        let network = session.commit();

        let mut cursor = network.edge_enumerator();
        assert!(cursor.move_to_edge(ab, true));
        let previous = [(ab, cursor.head_order())];
        assert!(cursor.move_to_edge(bc, true));

        assert_eq!(DistanceCost::new().cost(&cursor, &previous).1, f64::INFINITY);
        let typed = DistanceCost {
            turn_cost_type: Some(2),
        };
        assert_eq!(typed.cost(&cursor, &previous), (10.0, 7.0));
        assert_eq!(typed.cost(&cursor, &[]).1, 0.0);
    }

    fn flat(_: &RoutingNetworkEdgeEnumerator<'_>, _: &[(EdgeId, Option<u8>)]) -> (f64, f64) {
        (1.0, 0.0)
    }

    #[test]
    fn plain_functions_are_cost_functions() {
        let db = RouterDb::new(14).unwrap();
        let network = db.latest();
        let cursor = network.edge_enumerator();
        assert_eq!(flat.cost(&cursor, &[]), (1.0, 0.0));
    }
}
