//! Group bookkeeping, partition state and the greedy grower that drives it.

mod enclosure;
mod greedy_grower;
mod group;
mod state;

pub use greedy_grower::{
    solve, solve_with, GreedyGrower, Move, Solution, SolveOutcome, SolverConfig, StallReason,
    Termination,
};
pub use group::Group;
pub use state::{Observer, PartitionState, PlacementRecord, DEFAULT_DEVIATION_RATIO};
