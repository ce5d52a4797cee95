// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe

use rayon::iter::{IndexedParallelIterator, IntoParallelRefIterator};
use rayon::iter::ParallelIterator as _;
use std::iter::Cloned;
use std::slice::Iter;
use sprs::{CsMat, TriMat};

/// Static, symmetric adjacency between units.
pub struct Graph {
    /// Adjacency pattern stored as a sparse matrix in CSR format. Every stored entry is 1.
    pub graph_csr: CsMat<u8>,
}

impl Graph {
    /// Create a graph with no vertices.
    pub fn new() -> Self {
        Self {
            graph_csr: CsMat::empty(sprs::CSR, 0),
        }
    }

    /// Build a graph of `num_vertices` vertices from undirected edges.
    ///
    /// Each pair is stored in both directions; repeated pairs and self loops are dropped.
    pub fn from_edges(num_vertices: usize, edges: &[(usize, usize)]) -> Self {
        let mut pairs: Vec<(usize, usize)> = edges
            .iter()
            .filter(|(a, b)| a != b)
            .flat_map(|&(a, b)| [(a, b), (b, a)])
            .collect();
        pairs.sort_unstable();
        pairs.dedup();

        // Building a TriMat first and then converting to CSR is cheaper than inserting.
        let mut triplet_matrix = TriMat::with_capacity((num_vertices, num_vertices), pairs.len());
        for (row, col) in pairs {
            triplet_matrix.add_triplet(row, col, 1u8);
        }

        Self {
            graph_csr: triplet_matrix.to_csr(),
        }
    }

    /// The number of vertices in the graph.
    pub fn len(&self) -> usize {
        debug_assert_eq!(self.graph_csr.rows(), self.graph_csr.cols());
        self.graph_csr.rows()
    }

    /// Whether the graph has no vertices.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of stored (directed) entries, i.e. twice the number of edges.
    pub fn nnz(&self) -> usize {
        self.graph_csr.nnz()
    }

    /// An iterator over the neighbors of the given vertex, in ascending order.
    pub fn neighbors(&self, vertex: usize) -> Cloned<Iter<'_, usize>> {
        match self.graph_csr.outer_view(vertex) {
            Some(view) => {
                let (indices, _data) = view.into_raw_storage();
                indices.iter().cloned()
            }
            None => <&[usize]>::default().iter().cloned(),
        }
    }

    /// Whether the two vertices share an edge.
    pub fn are_adjacent(&self, vertex1: usize, vertex2: usize) -> bool {
        self.graph_csr.get(vertex1, vertex2).is_some()
    }

    /// The edge cut of a placement.
    ///
    /// Counts the edges whose endpoints sit in different groups. Group id 0 marks an
    /// unplaced vertex; edges touching an unplaced vertex are not counted.
    ///
    /// # Example
    ///
    /// A placement with two groups (1 and 2)
    /// ```text,ignore
    ///          2
    ///    1*--:-*----* 2
    ///    / \ :/    /
    ///  1*  1*: <--/--- Dotted line crosses the edges that contribute to the cut.
    ///    \ / :   /     Here edge_cut = 3
    ///    1*  :\ /
    ///          * 2
    /// ```
    pub fn edge_cut(&self, placements: &[usize]) -> usize {
        debug_assert_eq!(self.len(), placements.len());

        let indptr = self.graph_csr.indptr().into_raw_storage();
        let indices = self.graph_csr.indices();
        indptr
            .par_iter()
            .zip(&indptr[1..])
            .enumerate()
            .map(|(vertex, (start, end))| {
                let group = placements[vertex];
                if group == 0 {
                    return 0;
                }
                indices[*start..*end]
                    .iter()
                    .take_while(|neighbor| **neighbor < vertex)
                    .filter(|neighbor| {
                        let other = placements[**neighbor];
                        other != 0 && other != group
                    })
                    .count()
            })
            .sum()
    }
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}
