//! Shortest-path searches over a routing network snapshot

pub mod dijkstra;
pub mod heap;
pub mod path_tree;

pub use dijkstra::{Dijkstra, PathResult, SearchHooks, SearchSettings, SearchStats};
pub use heap::MinHeap;
pub use path_tree::{PathTree, Visit};
