// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe
pub mod algorithms;
pub mod catalog;
pub mod dataset;
pub mod distance;
pub mod error;
pub mod graph;
pub mod imbalance;
pub mod io;
pub mod report;
pub mod sweep;
pub mod synthetic;

pub use algorithms::{solve, GreedyGrower, PartitionState, Solution, SolverConfig, Termination};
pub use dataset::{Dataset, MetricSelector, Selector, UnitId};
pub use error::{Error, Result};

// The `Partition` trait allows for partitioning data.
// Partitioning algorithms implement this trait.
// The generic argument `M` defines the input of the algorithms (e.g. a dataset
// snapshot together with the metric to balance).
// The input partition must be of the correct size; its previous contents are
// overwritten.
pub trait Partition<M> {
    // Diagnostic data returned for a specific run of the algorithm.
    type Metadata;

    // Error details, should the algorithm fail to run.
    type Error;

    // Partition the given data and output the group ID of each element in
    // `part_ids`.
    //
    // Group IDs start from one; zero marks an element the algorithm could not
    // place. A group ID that does not appear in the array is an empty group.
    fn partition(&mut self, part_ids: &mut [usize], data: M)
                 -> std::result::Result<Self::Metadata, Self::Error>;
}
