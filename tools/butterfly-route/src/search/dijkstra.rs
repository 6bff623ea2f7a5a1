//! Edge-based Dijkstra
//!
//! The search state is the pair (edge, vertex reached) rather than the vertex
//! alone, so turn costs can depend on the incoming edge and a search never
//! turns back onto the edge it arrived on.
//!
//! Sources and targets are snap points. Departing from the source costs the
//! part of the source edge still ahead; arriving at a target costs the part
//! of the target edge up to the snap point.

use butterfly_common::{EdgeId, Error, Result, VertexId};
use rustc_hash::{FxHashMap, FxHashSet};

use super::heap::MinHeap;
use super::path_tree::{PathTree, Visit};
use crate::config::{RoutingConfig, DEFAULT_MAX_SETTLED};
use crate::costs::CostFunction;
use crate::network::RoutingNetwork;
use crate::path::Path;
use crate::snap::{DirectedSnapPoint, MAX_OFFSET};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchSettings {
    /// Stop after settling more than this many distinct states
    pub max_settled: usize,
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            max_settled: DEFAULT_MAX_SETTLED,
        }
    }
}

impl From<&RoutingConfig> for SearchSettings {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            max_settled: config.max_settled,
        }
    }
}

type Hook<'h> = Box<dyn FnMut(EdgeId, VertexId) -> bool + 'h>;

/// Optional callbacks into a running search
///
/// * `settled(edge, vertex)` runs when a state is settled; returning true stops the search.
/// * `queued(edge, vertex)` runs before a state is queued; returning true drops it
///   without marking it visited.
#[derive(Default)]
pub struct SearchHooks<'h> {
    settled: Option<Hook<'h>>,
    queued: Option<Hook<'h>>,
}

impl<'h> SearchHooks<'h> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_settled(mut self, hook: impl FnMut(EdgeId, VertexId) -> bool + 'h) -> Self {
        self.settled = Some(Box::new(hook));
        self
    }

    pub fn on_queued(mut self, hook: impl FnMut(EdgeId, VertexId) -> bool + 'h) -> Self {
        self.queued = Some(Box::new(hook));
        self
    }

    fn settled(&mut self, edge: EdgeId, vertex: VertexId) -> bool {
        self.settled.as_mut().is_some_and(|hook| hook(edge, vertex))
    }

    fn queued(&mut self, edge: EdgeId, vertex: VertexId) -> bool {
        self.queued.as_mut().is_some_and(|hook| hook(edge, vertex))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathResult {
    pub path: Path,
    pub cost: f64,
}

/// Counters of the last run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub settled: usize,
    pub queued: usize,
    pub targets_reached: usize,
}

#[derive(Debug, Clone, Copy)]
enum Arrival {
    /// Source and target on one edge, reached without leaving it
    SameEdge { forward: bool },
    /// Entered the target edge in `forward` direction after visit `parent`
    Via { parent: u32, forward: bool },
}

#[derive(Debug, Clone, Copy)]
struct Best {
    cost: f64,
    arrival: Arrival,
}

fn improve(best: &mut Option<Best>, cost: f64, arrival: Arrival) -> bool {
    if best.is_some_and(|b| b.cost <= cost) {
        return false;
    }
    *best = Some(Best { cost, arrival });
    true
}

/// Highest best-known cost, infinite while any target is unresolved
fn worst(best: &[Option<Best>]) -> f64 {
    if best.is_empty() || best.iter().any(Option::is_none) {
        return f64::INFINITY;
    }
    best.iter()
        .flatten()
        .map(|b| b.cost)
        .fold(f64::NEG_INFINITY, f64::max)
}

fn traversable(traversal: f64) -> bool {
    traversal > 0.0 && traversal.is_finite()
}

fn turn_allowed(turn: f64) -> bool {
    turn >= 0.0 && turn.is_finite()
}

fn fraction(offset: u16) -> f64 {
    f64::from(offset) / f64::from(MAX_OFFSET)
}

/// Reusable search state; one per thread
#[derive(Debug, Clone, Default)]
pub struct Dijkstra {
    settings: SearchSettings,
    tree: PathTree,
    heap: MinHeap,
    visited: FxHashSet<(EdgeId, VertexId)>,
    candidates: FxHashMap<VertexId, Vec<usize>>,
    stats: SearchStats,
}

impl Dijkstra {
    pub fn new(settings: SearchSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> SearchSettings {
        self.settings
    }

    pub fn stats(&self) -> SearchStats {
        self.stats
    }

    /// Visits of the last run
    pub fn path_tree(&self) -> &PathTree {
        &self.tree
    }

    /// Cheapest path from `source` to `target`, `None` when unreachable
    pub fn run_one_to_one<C>(
        &mut self,
        network: &RoutingNetwork,
        cost_fn: &C,
        source: DirectedSnapPoint,
        target: DirectedSnapPoint,
        hooks: &mut SearchHooks<'_>,
    ) -> Result<Option<PathResult>>
    where
        C: CostFunction + ?Sized,
    {
        Ok(self
            .run_one_to_many(network, cost_fn, source, &[target], hooks)?
            .pop()
            .flatten())
    }

    /// Cheapest paths from `source` to each target, in target order
    ///
    /// Unreachable targets are `None`. A source or target on an edge that
    /// does not exist is an error.
    pub fn run_one_to_many<C>(
        &mut self,
        network: &RoutingNetwork,
        cost_fn: &C,
        source: DirectedSnapPoint,
        targets: &[DirectedSnapPoint],
        hooks: &mut SearchHooks<'_>,
    ) -> Result<Vec<Option<PathResult>>>
    where
        C: CostFunction + ?Sized,
    {
        self.tree.clear();
        self.heap.clear();
        self.visited.clear();
        self.candidates.clear();
        self.stats = SearchStats::default();

        let mut cursor = network.edge_enumerator();
        if !cursor.move_to_edge(source.edge_id(), true) {
            return Err(Error::EdgeNotFound(source.edge_id()));
        }
        let source_edge = cursor.edge_id();
        let mut target_edges = Vec::with_capacity(targets.len());
        for (i, target) in targets.iter().enumerate() {
            if !cursor.move_to_edge(target.edge_id(), true) {
                return Err(Error::EdgeNotFound(target.edge_id()));
            }
            target_edges.push(cursor.edge_id());
            for vertex in [cursor.from(), cursor.to()] {
                self.candidates.entry(vertex).or_default().push(i);
            }
        }

        let mut best: Vec<Option<Best>> = vec![None; targets.len()];

        for forward in source.direction.directions() {
            if !cursor.move_to_edge(source_edge, forward) {
                continue;
            }
            let (traversal, _) = cost_fn.cost(&cursor, &[]);
            if !traversable(traversal) {
                continue;
            }
            let start = source.point.offset_along(forward);
            for (i, target) in targets.iter().enumerate() {
                if target_edges[i] != source_edge || !target.direction.allows(forward) {
                    continue;
                }
                let end = target.point.offset_along(forward);
                if end >= start {
                    let cost = traversal * fraction(end - start);
                    improve(&mut best[i], cost, Arrival::SameEdge { forward });
                }
            }
            let index = self.tree.add(Visit {
                vertex: cursor.to(),
                edge: source_edge,
                forward,
                order: cursor.head_order(),
                parent: None,
            });
            self.heap.push(index, traversal * fraction(MAX_OFFSET - start));
        }

        let mut worst_cost = worst(&best);
        while let Some((index, cost)) = self.heap.pop() {
            if cost > worst_cost {
                break;
            }
            let visit = *self.tree.get(index);
            if !self.visited.insert((visit.edge, visit.vertex)) {
                continue;
            }
            self.stats.settled += 1;
            if self.visited.len() > self.settings.max_settled {
                tracing::debug!(max_settled = self.settings.max_settled, "settle limit reached");
                break;
            }
            if hooks.settled(visit.edge, visit.vertex) {
                break;
            }
            if !cursor.move_to_vertex(visit.vertex) {
                continue;
            }

            let previous = [(visit.edge, visit.order)];
            while cursor.move_next() {
                let edge = cursor.edge_id();
                if edge == visit.edge {
                    continue;
                }
                let (traversal, turn) = cost_fn.cost(&cursor, &previous);
                if !traversable(traversal) || !turn_allowed(turn) {
                    continue;
                }
                let entered = cost + turn;
                let forward = cursor.forward();

                if let Some(pending) = self.candidates.get(&visit.vertex) {
                    for &i in pending {
                        if target_edges[i] != edge || !targets[i].direction.allows(forward) {
                            continue;
                        }
                        let arrival = entered + traversal * fraction(targets[i].point.offset_along(forward));
                        let via = Arrival::Via {
                            parent: index,
                            forward,
                        };
                        if improve(&mut best[i], arrival, via) {
                            worst_cost = worst(&best);
                        }
                    }
                }

                let to = cursor.to();
                if self.visited.contains(&(edge, to)) || hooks.queued(edge, to) {
                    continue;
                }
                let next = self.tree.add(Visit {
                    vertex: to,
                    edge,
                    forward,
                    order: cursor.head_order(),
                    parent: Some(index),
                });
                self.heap.push(next, entered + traversal);
                self.stats.queued += 1;
                tracing::trace!(%edge, %to, cost = entered + traversal, "queued");
            }
        }

        let results: Vec<Option<PathResult>> = best
            .iter()
            .enumerate()
            .map(|(i, b)| b.map(|b| self.reconstruct(&source, &targets[i], target_edges[i], b)))
            .collect();
        self.stats.targets_reached = results.iter().filter(|r| r.is_some()).count();
        tracing::debug!(
            settled = self.stats.settled,
            queued = self.stats.queued,
            targets = targets.len(),
            reached = self.stats.targets_reached,
            "search finished"
        );
        Ok(results)
    }

    fn reconstruct(
        &self,
        source: &DirectedSnapPoint,
        target: &DirectedSnapPoint,
        target_edge: EdgeId,
        best: Best,
    ) -> PathResult {
        let mut path = Path::new();
        let last_forward = match best.arrival {
            Arrival::SameEdge { forward } => {
                path.append(target_edge, forward);
                forward
            }
            Arrival::Via { parent, forward } => {
                let mut edges: Vec<_> = self
                    .tree
                    .ancestry(parent)
                    .map(|visit| (visit.edge, visit.forward))
                    .collect();
                edges.reverse();
                for (edge, edge_forward) in edges {
                    path.append(edge, edge_forward);
                }
                path.append(target_edge, forward);
                forward
            }
        };
        if let Some((_, first_forward)) = path.first() {
            path.offset1 = source.point.offset_along(first_forward);
        }
        path.offset2 = target.point.offset_along(last_forward);
        PathResult {
            path,
            cost: best.cost,
        }
    }
}
