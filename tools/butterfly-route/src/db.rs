//! RouterDb - publishes network snapshots and serializes writers
//!
//! Readers take the latest `Arc<RoutingNetwork>` and keep it for as long as
//! they need it. A writer holds the session lock, mutates a private copy
//! (tiles are copied on first write) and publishes it with `commit()`.

use std::sync::Arc;

use butterfly_common::{EdgeId, Error, Result, TileId, VertexId};
use parking_lot::{Mutex, MutexGuard, RwLock};
use rustc_hash::FxHashMap;

use crate::network::tile::EdgeWrite;
use crate::network::{NetworkTile, RoutingNetwork};

/// Everything about an edge except its endpoints
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EdgeDetails {
    pub edge_type_id: u32,
    /// Length in centimetres; computed from the geometry when `None`
    pub length_cm: Option<u32>,
    /// Intermediate points from vertex1 to vertex2, as (lon, lat)
    pub shape: Vec<(f64, f64)>,
    pub attributes: Vec<(String, String)>,
}

/// Per-tile-id locks so at most one load per tile is in flight
#[derive(Debug, Default)]
pub struct TileLoadLocks {
    locks: Mutex<FxHashMap<u32, Arc<Mutex<()>>>>,
}

impl TileLoadLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lock_for(&self, tile_id: u32) -> Arc<Mutex<()>> {
        self.locks
            .lock()
            .entry(tile_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Run `f` while holding the lock of `tile_id`
    pub fn with_lock<T>(&self, tile_id: u32, f: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(tile_id);
        let result = {
            let _guard = lock.lock();
            f()
        };
        let mut locks = self.locks.lock();
        // clones are only taken and released under the table lock
        drop(lock);
        if locks
            .get(&tile_id)
            .is_some_and(|entry| Arc::strong_count(entry) == 1)
        {
            locks.remove(&tile_id);
        }
        result
    }

    /// Number of tile ids with a lock currently allocated
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug)]
pub struct RouterDb {
    latest: RwLock<Arc<RoutingNetwork>>,
    writer: Mutex<()>,
    load_locks: TileLoadLocks,
}

impl RouterDb {
    /// Empty database at `zoom`
    pub fn new(zoom: u8) -> Result<Self> {
        if zoom > butterfly_common::tiles::MAX_ZOOM {
            return Err(Error::InvalidInput(format!(
                "zoom {zoom} exceeds the maximum of {}",
                butterfly_common::tiles::MAX_ZOOM
            )));
        }
        Ok(Self::from_network(RoutingNetwork::new(zoom)))
    }

    pub fn from_network(network: RoutingNetwork) -> Self {
        Self {
            latest: RwLock::new(Arc::new(network)),
            writer: Mutex::new(()),
            load_locks: TileLoadLocks::new(),
        }
    }

    pub fn zoom(&self) -> u8 {
        self.latest.read().zoom()
    }

    /// The most recently published snapshot
    pub fn latest(&self) -> Arc<RoutingNetwork> {
        Arc::clone(&self.latest.read())
    }

    /// Open a write session; blocks while another session is open
    pub fn mutate(&self) -> RoutingNetworkMutator<'_> {
        let guard = self.writer.lock();
        let network = RoutingNetwork::clone(&self.latest.read());
        RoutingNetworkMutator {
            db: self,
            _writer: guard,
            network,
            vertices_added: 0,
            edges_added: 0,
        }
    }

    /// Make sure `tile_id` is present, calling `loader` at most once per tile at a time
    ///
    /// Returns false when the loader has no such tile.
    pub fn ensure_tile<F>(&self, tile_id: u32, loader: F) -> Result<bool>
    where
        F: FnOnce(u32) -> Result<Option<NetworkTile>>,
    {
        if self.latest.read().tile(tile_id).is_some() {
            return Ok(true);
        }
        self.load_locks.with_lock(tile_id, || {
            // another caller may have finished loading while we waited
            if self.latest.read().tile(tile_id).is_some() {
                return Ok(true);
            }
            let Some(tile) = loader(tile_id)? else {
                return Ok(false);
            };
            if tile.tile_id() != tile_id {
                return Err(Error::InvalidInput(format!(
                    "loader returned tile {} for {tile_id}",
                    tile.tile_id()
                )));
            }
            let mut session = self.mutate();
            session.insert_tile(tile)?;
            session.commit();
            tracing::debug!(tile_id, "tile loaded");
            Ok(true)
        })
    }

    pub fn load_locks(&self) -> &TileLoadLocks {
        &self.load_locks
    }
}

/// Exclusive write session over a private copy of the latest snapshot
///
/// Nothing is visible to readers until [`commit`](Self::commit); dropping
/// the session discards its changes.
pub struct RoutingNetworkMutator<'db> {
    db: &'db RouterDb,
    _writer: MutexGuard<'db, ()>,
    network: RoutingNetwork,
    vertices_added: usize,
    edges_added: usize,
}

impl RoutingNetworkMutator<'_> {
    /// The session's working copy
    pub fn network(&self) -> &RoutingNetwork {
        &self.network
    }

    /// Add a vertex to the tile containing (lon, lat)
    pub fn add_vertex(&mut self, lon: f64, lat: f64) -> VertexId {
        let tile_id = TileId::from_location(lon, lat, self.network.zoom()).id();
        self.vertices_added += 1;
        self.network.tile_mut(tile_id).add_vertex(lon, lat)
    }

    /// Add an edge from `vertex1` to `vertex2`
    ///
    /// An edge between two tiles is written into both; the returned id is
    /// the canonical copy in `vertex1`'s tile.
    pub fn add_edge(
        &mut self,
        vertex1: VertexId,
        vertex2: VertexId,
        details: &EdgeDetails,
    ) -> Result<EdgeId> {
        for vertex in [vertex1, vertex2] {
            if !self.network.has_vertex(vertex) {
                return Err(Error::VertexNotFound(vertex));
            }
        }
        let length_cm = match details.length_cm {
            Some(length) => length,
            None => self.haversine_length_cm(vertex1, vertex2, &details.shape)?,
        };

        let edge = if vertex1.tile_id == vertex2.tile_id {
            self.network.tile_mut(vertex1.tile_id).write_edge(EdgeWrite {
                vertex1,
                vertex2,
                partner: None,
                edge_type_id: details.edge_type_id,
                length_cm,
                shape: &details.shape,
                attributes: &details.attributes,
            })?
        } else {
            let canonical = EdgeId::new(
                vertex1.tile_id,
                self.network.tile(vertex1.tile_id).map_or(0, NetworkTile::edge_arena_len),
            );
            let copy = EdgeId::new(
                vertex2.tile_id,
                self.network.tile(vertex2.tile_id).map_or(0, NetworkTile::edge_arena_len),
            );
            let written = self.network.tile_mut(vertex1.tile_id).write_edge(EdgeWrite {
                vertex1,
                vertex2,
                partner: Some((copy, false)),
                edge_type_id: details.edge_type_id,
                length_cm,
                shape: &details.shape,
                attributes: &details.attributes,
            })?;
            debug_assert_eq!(written, canonical);

            let reversed: Vec<_> = details.shape.iter().rev().copied().collect();
            self.network.tile_mut(vertex2.tile_id).write_edge(EdgeWrite {
                vertex1: vertex2,
                vertex2: vertex1,
                partner: Some((canonical, true)),
                edge_type_id: details.edge_type_id,
                length_cm,
                shape: &reversed,
                attributes: &details.attributes,
            })?;
            canonical
        };
        self.edges_added += 1;
        Ok(edge)
    }

    fn haversine_length_cm(
        &self,
        vertex1: VertexId,
        vertex2: VertexId,
        shape: &[(f64, f64)],
    ) -> Result<u32> {
        let location = |v: VertexId| {
            self.network
                .vertex_location(v)
                .ok_or(Error::VertexNotFound(v))
        };
        let points: Vec<(f64, f64)> = std::iter::once(location(vertex1)?)
            .chain(shape.iter().copied())
            .chain(std::iter::once(location(vertex2)?))
            .collect();
        let meters = crate::geo::polyline_length(&points);
        Ok((meters * 100.0).round().min(f64::from(u32::MAX)) as u32)
    }

    /// Add a turn-cost matrix at `vertex`; see [`NetworkTile::add_turn_costs`]
    pub fn add_turn_costs(
        &mut self,
        vertex: VertexId,
        turn_cost_type: u32,
        edges: &[EdgeId],
        costs: &[u32],
    ) -> Result<()> {
        self.network
            .vertex_tile_mut(vertex)?
            .add_turn_costs(vertex, turn_cost_type, edges, costs)
    }

    pub fn set_turn_order(&mut self, vertex: VertexId, edge: EdgeId, order: u8) -> Result<()> {
        self.network
            .vertex_tile_mut(vertex)?
            .set_turn_order(vertex, edge, order)
    }

    /// Add or replace a whole tile, e.g. one read from a stream
    pub fn insert_tile(&mut self, tile: NetworkTile) -> Result<()> {
        tile.validate().map_err(Error::Corrupt)?;
        self.network.insert_tile(Arc::new(tile))
    }

    /// Publish the session's network as the latest snapshot
    pub fn commit(self) -> Arc<RoutingNetwork> {
        let network = Arc::new(self.network);
        *self.db.latest.write() = Arc::clone(&network);
        tracing::debug!(
            vertices_added = self.vertices_added,
            edges_added = self.edges_added,
            tiles = network.tile_count(),
            "network committed"
        );
        network
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    // Leuven and Brussels are in different tiles at zoom 14
    const LEUVEN: (f64, f64) = (4.7868, 50.8546);
    const BRUSSELS: (f64, f64) = (4.3517, 50.8503);

    #[test]
    fn uncommitted_sessions_are_invisible() {
        let db = RouterDb::new(14).unwrap();
        {
            let mut session = db.mutate();
            session.add_vertex(LEUVEN.0, LEUVEN.1);
        }
        assert_eq!(db.latest().vertex_count(), 0);

        let mut session = db.mutate();
        let v = session.add_vertex(LEUVEN.0, LEUVEN.1);
        session.commit();
        assert!(db.latest().has_vertex(v));
        assert_eq!(v.tile_id, 90_038_489);
    }

    #[test]
    fn readers_keep_their_snapshot() {
        let db = RouterDb::new(14).unwrap();
        let before = db.latest();

        let mut session = db.mutate();
        session.add_vertex(LEUVEN.0, LEUVEN.1);
        session.commit();

        assert_eq!(before.vertex_count(), 0);
        assert_eq!(db.latest().vertex_count(), 1);
    }

    #[test]
    fn cross_tile_edges_are_written_twice() {
        let db = RouterDb::new(14).unwrap();
        let mut session = db.mutate();
        let a = session.add_vertex(LEUVEN.0, LEUVEN.1);
        let b = session.add_vertex(BRUSSELS.0, BRUSSELS.1);
        assert_ne!(a.tile_id, b.tile_id);

        let edge = session.add_edge(a, b, &EdgeDetails::default()).unwrap();
        let network = session.commit();

        assert_eq!(edge.tile_id, a.tile_id);
        assert_eq!(network.edge_count(), 1);
        assert_eq!(network.tile(a.tile_id).map(|t| t.edge_count()), Some(1));
        assert_eq!(network.tile(b.tile_id).map(|t| t.edge_count()), Some(1));
    }

    #[test]
    fn length_defaults_to_haversine_distance() {
        let db = RouterDb::new(14).unwrap();
        let mut session = db.mutate();
        let a = session.add_vertex(LEUVEN.0, LEUVEN.1);
        let b = session.add_vertex(BRUSSELS.0, BRUSSELS.1);
        let edge = session.add_edge(a, b, &EdgeDetails::default()).unwrap();
        let network = session.commit();

        let mut cursor = network.edge_enumerator();
        assert!(cursor.move_to_edge(edge, true));
        // roughly 30.6 km
        let km = f64::from(cursor.length_cm()) / 100_000.0;
        assert!((30.0..31.5).contains(&km), "{km}");
    }

    #[test]
    fn missing_vertices_are_rejected() {
        let db = RouterDb::new(14).unwrap();
        let mut session = db.mutate();
        let a = session.add_vertex(LEUVEN.0, LEUVEN.1);
        let ghost = VertexId::new(a.tile_id, 5);
        assert!(matches!(
            session.add_edge(a, ghost, &EdgeDetails::default()),
            Err(Error::VertexNotFound(v)) if v == ghost
        ));
    }

    #[test]
    fn ensure_tile_loads_once() {
        let db = RouterDb::new(14).unwrap();
        let calls = AtomicUsize::new(0);
        let loader = |tile_id: u32| {
            calls.fetch_add(1, Ordering::SeqCst);
            let mut tile = NetworkTile::new(tile_id, 14);
            tile.add_vertex(LEUVEN.0, LEUVEN.1);
            Ok(Some(tile))
        };

        assert!(db.ensure_tile(90_038_489, loader).unwrap());
        assert!(db.ensure_tile(90_038_489, loader).unwrap());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(db.load_locks().is_empty());

        assert!(!db.ensure_tile(1, |_| Ok(None)).unwrap());
    }

    #[test]
    fn concurrent_loads_of_one_tile_run_the_loader_once() {
        let db = RouterDb::new(14).unwrap();
        let calls = AtomicUsize::new(0);
        std::thread::scope(|scope| {
            for _ in 0..8 {
                scope.spawn(|| {
                    db.ensure_tile(42, |tile_id| {
                        calls.fetch_add(1, Ordering::SeqCst);
                        std::thread::sleep(std::time::Duration::from_millis(5));
                        Ok(Some(NetworkTile::new(tile_id, 14)))
                    })
                    .unwrap()
                });
            }
        });
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(db.latest().tile(42).is_some());
    }
}
