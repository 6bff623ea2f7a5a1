//! Binary min-heap over (visit index, cost)
//!
//! Entries are never updated in place; the search pushes a new entry and
//! skips stale ones when they are popped.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

#[derive(Debug, Clone, Copy)]
struct Entry {
    cost: f64,
    index: u32,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    // reversed: BinaryHeap is a max-heap
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.index.cmp(&self.index))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MinHeap {
    heap: BinaryHeap<Entry>,
}

impl MinHeap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, index: u32, cost: f64) {
        self.heap.push(Entry { cost, index });
    }

    /// Cheapest entry; equal costs pop in insertion-index order
    pub fn pop(&mut self) -> Option<(u32, f64)> {
        self.heap.pop().map(|e| (e.index, e.cost))
    }

    pub fn peek_cost(&self) -> Option<f64> {
        self.heap.peek().map(|e| e.cost)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
    }
}
