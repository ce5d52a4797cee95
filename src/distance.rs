//! All-pairs hop distances over the static adjacency graph.

use std::collections::VecDeque;

use rayon::prelude::*;

use crate::graph::Graph;

/// Dense table of shortest hop counts between every pair of units.
///
/// A stored `0` means "no distance": either the pair is a unit with itself or the two
/// units lie in different connected components. The table never changes once built.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DistanceTable {
    size: usize,
    hops: Vec<u32>,
}

impl DistanceTable {
    /// Run one breadth-first search per unit, O(V·(V+E)) in total.
    ///
    /// Rows are independent, so sources are spread over the rayon pool.
    pub fn compute(graph: &Graph) -> Self {
        let size = graph.len();
        let rows: Vec<Vec<u32>> = (0..size)
            .into_par_iter()
            .map(|source| hops_from(graph, source))
            .collect();

        Self {
            size,
            hops: rows.concat(),
        }
    }

    /// Build a table from per-row hop counts. Every row must hold `rows.len()` entries.
    pub fn from_rows(rows: Vec<Vec<u32>>) -> Option<Self> {
        let size = rows.len();
        if rows.iter().any(|row| row.len() != size) {
            return None;
        }
        Some(Self {
            size,
            hops: rows.concat(),
        })
    }

    /// Number of units covered by the table.
    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Hop distance between two distinct, connected units.
    pub fn get(&self, from: usize, to: usize) -> Option<u32> {
        match self.hops[from * self.size + to] {
            0 => None,
            hops => Some(hops),
        }
    }

    /// Raw row for `from`, zeros included.
    pub fn row(&self, from: usize) -> &[u32] {
        &self.hops[from * self.size..(from + 1) * self.size]
    }

    /// Known distances from `from`, skipping itself and unreachable units.
    pub fn reachable_from(&self, from: usize) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.row(from)
            .iter()
            .enumerate()
            .filter(|(_, hops)| **hops != 0)
            .map(|(to, hops)| (to, *hops))
    }
}

/// Breadth-first hop counts from `source`; unreachable vertices and `source` stay 0.
fn hops_from(graph: &Graph, source: usize) -> Vec<u32> {
    let mut hops = vec![0u32; graph.len()];
    let mut visited = vec![false; graph.len()];
    let mut queue = VecDeque::new();

    visited[source] = true;
    queue.push_back(source);

    while let Some(vertex) = queue.pop_front() {
        let next = hops[vertex] + 1;
        for neighbor in graph.neighbors(vertex) {
            if !visited[neighbor] {
                visited[neighbor] = true;
                hops[neighbor] = next;
                queue.push_back(neighbor);
            }
        }
    }

    hops
}
