//! Storage behavior of a routing network across tiles, sessions and streams

use std::sync::Arc;

use butterfly_common::{EdgeId, Error, TileId, VertexId};
use butterfly_route::network::MAX_TURN_ORDERS;
use butterfly_route::{EdgeDetails, RouterDb, RoutingNetwork};

const ZOOM: u8 = 14;

fn details(length_cm: u32) -> EdgeDetails {
    EdgeDetails {
        length_cm: Some(length_cm),
        ..EdgeDetails::default()
    }
}

/// Vertices a and b share a tile, c sits two tiles to the east
fn two_tiles(db: &RouterDb) -> (VertexId, VertexId, VertexId, EdgeId, EdgeId) {
    let mut session = db.mutate();
    let a = session.add_vertex(4.7800, 50.8500);
    let b = session.add_vertex(4.7810, 50.8500);
    let c = session.add_vertex(4.8300, 50.8500);
    let ab = session.add_edge(a, b, &details(7_000)).unwrap();
    let bc = session
        .add_edge(
            b,
            c,
            &EdgeDetails {
                edge_type_id: 3,
                length_cm: None,
                shape: vec![(4.8000, 50.8510), (4.8200, 50.8505)],
                attributes: vec![("highway".to_string(), "primary".to_string())],
            },
        )
        .unwrap();
    session.commit();
    (a, b, c, ab, bc)
}

fn incident(network: &RoutingNetwork, vertex: VertexId) -> Vec<(EdgeId, VertexId, bool)> {
    let mut cursor = network.edge_enumerator();
    assert!(cursor.move_to_vertex(vertex));
    let mut out = Vec::new();
    while cursor.move_next() {
        assert_eq!(cursor.from(), vertex);
        out.push((cursor.edge_id(), cursor.to(), cursor.forward()));
    }
    out.sort();
    out
}

#[test]
fn cross_tile_edges_are_visible_from_both_ends() {
    let db = RouterDb::new(ZOOM).unwrap();
    let (a, b, c, ab, bc) = two_tiles(&db);
    let network = db.latest();

    assert_ne!(b.tile_id, c.tile_id);
    assert_eq!(b.tile_id, TileId::from_location(4.7810, 50.8500, ZOOM).id());
    assert_eq!(network.tile_count(), 2);
    assert_eq!(network.edge_count(), 2);
    assert_eq!(bc.tile_id, b.tile_id);

    let mut at_b = vec![(ab, a, false), (bc, c, true)];
    at_b.sort();
    assert_eq!(incident(&network, b), at_b);
    assert_eq!(incident(&network, c), vec![(bc, b, false)]);

    // both copies describe the same edge
    let mut cursor = network.edge_enumerator();
    assert!(cursor.move_to_vertex(c));
    assert!(cursor.move_next());
    let from_c = (cursor.edge_type_id(), cursor.length_cm(), cursor.shape());
    let highway = cursor.attribute("highway");
    assert!(cursor.move_to_edge(bc, false));
    assert_eq!(cursor.from(), c);
    assert_eq!((cursor.edge_type_id(), cursor.length_cm(), cursor.shape()), from_c);
    assert_eq!(highway, Some("primary"));
    let first = cursor.shape()[0];
    assert!((first.0 - 4.8200).abs() < 1e-6, "{first:?}");
    assert!(cursor.length_cm() > 300_000, "{}", cursor.length_cm());
}

#[test]
fn turn_costs_at_a_tile_border_vertex() {
    let db = RouterDb::new(ZOOM).unwrap();
    let (_, _, c, _, bc) = two_tiles(&db);
    let mut session = db.mutate();
    let d = session.add_vertex(4.8310, 50.8500);
    let cd = session.add_edge(c, d, &details(1_000)).unwrap();
    session
        .add_turn_costs(c, 0, &[bc, cd], &[0, 40, 40, 0])
        .unwrap();
    let network = session.commit();

    // bc's order at c lives in the reversed copy in c's tile
    let mut cursor = network.edge_enumerator();
    assert!(cursor.move_to_edge(bc, true));
    let bc_order = cursor.head_order().unwrap();
    assert!(cursor.move_to_edge(cd, true));
    assert_eq!(cursor.turn_cost_to_tail(bc_order).collect::<Vec<_>>(), vec![(0, 40)]);
}

#[test]
fn turn_orders_are_permanent_and_bounded() {
    let db = RouterDb::new(ZOOM).unwrap();
    let mut session = db.mutate();
    let hub = session.add_vertex(4.7800, 50.8500);
    let mut spokes = Vec::new();
    for i in 0..=MAX_TURN_ORDERS {
        let leaf = session.add_vertex(4.7801 + i as f64 * 0.0001, 50.8501);
        spokes.push(session.add_edge(hub, leaf, &details(100)).unwrap());
    }

    session.set_turn_order(hub, spokes[0], 2).unwrap();
    assert!(matches!(
        session.set_turn_order(hub, spokes[0], 2),
        Err(Error::TurnOrderReassigned { existing: 2, .. })
    ));

    // one more edge than there are orders
    let n = spokes.len();
    let err = session
        .add_turn_costs(hub, 0, &spokes, &vec![1; n * n])
        .unwrap_err();
    assert!(matches!(err, Error::TurnOrderCapacity { .. }), "{err}");

    // a failed call leaves existing orders alone
    let network = session.commit();
    let tile = network.tile(hub.tile_id).unwrap();
    assert_eq!(tile.turn_order(hub, spokes[0]).unwrap(), Some(2));
    assert_eq!(tile.turn_order(hub, spokes[1]).unwrap(), None);
    assert_eq!(tile.turn_cost_record_count(hub), 0);
}

#[test]
fn sessions_publish_snapshots_atomically() {
    let db = RouterDb::new(ZOOM).unwrap();
    let (a, _, c, _, _) = two_tiles(&db);
    let before = db.latest();

    let mut session = db.mutate();
    let d = session.add_vertex(4.7805, 50.8505);
    session.add_edge(a, d, &details(500)).unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            let seen = db.latest();
            assert_eq!(seen.edge_count(), 2);
            assert!(!seen.has_vertex(d));
        });
    });

    let after = session.commit();
    assert_eq!(after.edge_count(), 3);
    assert_eq!(before.edge_count(), 2);
    assert!(Arc::ptr_eq(&after, &db.latest()));

    // only the tile that was written was copied
    assert!(!after.shares_tile(&before, a.tile_id));
    assert!(after.shares_tile(&before, c.tile_id));
}

#[test]
fn save_and_load_preserve_every_tile() {
    let db = RouterDb::new(ZOOM).unwrap();
    let (_, b, _, ab, bc) = two_tiles(&db);
    let mut session = db.mutate();
    session
        .add_turn_costs(b, 1, &[ab, bc], &[0, u32::MAX, 7, 0])
        .unwrap();
    let network = session.commit();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("network.bin");
    network.save(&path).unwrap();
    let loaded = RoutingNetwork::load(&path).unwrap();

    assert_eq!(loaded.zoom(), ZOOM);
    assert_eq!(loaded.tile_count(), network.tile_count());
    for (original, copy) in network.tiles().zip(loaded.tiles()) {
        assert_eq!(original, copy);
    }
    assert_eq!(incident(&loaded, b), incident(&network, b));
}

#[test]
fn damaged_streams_are_rejected() {
    let db = RouterDb::new(ZOOM).unwrap();
    two_tiles(&db);
    let mut bytes = Vec::new();
    db.latest().write_to(&mut bytes).unwrap();

    // magic, version, zoom and tile count take one byte each here
    let header = 7;
    for i in (header..bytes.len()).step_by(3) {
        let mut damaged = bytes.clone();
        damaged[i] ^= 0x5a;
        let err = RoutingNetwork::read_from(&mut damaged.as_slice()).unwrap_err();
        assert!(err.is_corruption(), "byte {i}: {err}");
    }

    for len in [0, 3, header, bytes.len() / 2, bytes.len() - 1] {
        let err = RoutingNetwork::read_from(&mut &bytes[..len]).unwrap_err();
        assert!(err.is_corruption(), "truncated to {len}: {err}");
    }

    let mut wrong_magic = bytes.clone();
    wrong_magic[0] = b'X';
    assert!(matches!(
        RoutingNetwork::read_from(&mut wrong_magic.as_slice()),
        Err(Error::Corrupt(_))
    ));
}

#[test]
fn tiles_load_once_on_demand() {
    let source = RouterDb::new(ZOOM).unwrap();
    let (_, _, c, _, _) = two_tiles(&source);
    let stored = source.latest().tile(c.tile_id).unwrap().clone();

    let db = RouterDb::new(ZOOM).unwrap();
    let loads = std::sync::atomic::AtomicUsize::new(0);
    std::thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                db.ensure_tile(c.tile_id, |_| {
                    loads.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                    Ok(Some(stored.clone()))
                })
                .unwrap();
            });
        }
    });

    assert_eq!(loads.into_inner(), 1);
    assert!(db.latest().has_vertex(c));
    assert!(db.load_locks().is_empty());
}
