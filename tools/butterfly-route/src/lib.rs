//! Tiled road-network storage and edge-based routing
//!
//! A network is a set of Web-Mercator tiles, each holding its vertices,
//! edges, shapes, attributes and turn costs in compact byte arenas.
//! [`RouterDb`] publishes immutable snapshots of it and [`Dijkstra`] searches
//! them with turn costs and without u-turns.

pub mod cli;
pub mod config;
pub mod costs;
pub mod db;
pub mod geo;
pub mod import;
pub mod network;
pub mod path;
pub mod search;
pub mod snap;

pub use config::RoutingConfig;
pub use costs::{CostFunction, DistanceCost};
pub use db::{EdgeDetails, RouterDb, RoutingNetworkMutator, TileLoadLocks};
pub use network::{NetworkTile, RoutingNetwork, RoutingNetworkEdgeEnumerator};
pub use path::Path;
pub use search::{Dijkstra, PathResult, SearchHooks, SearchSettings};
pub use snap::{DirectedSnapPoint, Direction, SnapPoint};
