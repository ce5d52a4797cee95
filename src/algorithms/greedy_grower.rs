use std::cmp::Ordering;
use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::algorithms::group::Group;
use crate::algorithms::state::{Observer, PartitionState, DEFAULT_DEVIATION_RATIO};
use crate::dataset::{Dataset, MetricSelector, UnitId};
use crate::error::{Error, Result};
use crate::Partition;

/// Tuning knobs of the greedy grower.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Number of recent moves remembered by the stall guard.
    pub history_len: usize,

    /// Fraction of all units that must be placed before enclosures are absorbed.
    pub enclosure_threshold: f64,

    /// Lower bound of the acceptable deviation, as a fraction of the average group
    /// metric. The deviation is never smaller than the largest unit's excess over the
    /// average.
    pub min_deviation_ratio: f64,

    /// Hard cap on committed steps. `None` picks `16 × units × groups`.
    pub max_steps: Option<usize>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            history_len: 5,
            enclosure_threshold: 0.5,
            min_deviation_ratio: DEFAULT_DEVIATION_RATIO,
            max_steps: None,
        }
    }
}

impl SolverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history_len(mut self, history_len: usize) -> Self {
        self.history_len = history_len;
        self
    }

    pub fn with_enclosure_threshold(mut self, threshold: f64) -> Self {
        self.enclosure_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn with_min_deviation_ratio(mut self, ratio: f64) -> Self {
        self.min_deviation_ratio = ratio;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = Some(max_steps);
        self
    }

    /// Step cap for a dataset of `units` units split into `groups` groups.
    pub fn step_limit(&self, units: usize, groups: usize) -> usize {
        self.max_steps
            .unwrap_or_else(|| 16 * units.max(1) * groups.max(1))
    }
}

/// A committed relocation. `from` is 0 for a unit that was unplaced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Move {
    pub unit: UnitId,
    pub from: usize,
    pub to: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum StallReason {
    /// The selected move was among the most recent ones.
    RepeatedMove(Move),
    /// The neediest group had nothing it could take.
    NoCandidate { group: usize },
    /// The step cap was reached.
    StepLimit(usize),
}

/// How a solve ended. `Stalled` is a best-effort result, not an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    Success,
    Stalled(StallReason),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SolveOutcome {
    pub termination: Termination,
    /// Moves chosen by the engine.
    pub steps: usize,
    /// Units pulled in through enclosure absorption.
    pub absorbed: usize,
}

impl SolveOutcome {
    pub fn is_success(&self) -> bool {
        self.termination == Termination::Success
    }
}

/// Final state of a solve together with how it ended.
pub struct Solution<'a> {
    pub state: PartitionState<'a>,
    pub outcome: SolveOutcome,
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct Candidate {
    unit: UnitId,
    from: usize,
}

/// Greedy Grower
///
/// Grows every group from the frontier outwards: each step picks the neediest group,
/// hands it the closest fitting candidate, and absorbs unplaced pockets that only this
/// group borders. Groups that are boxed in steal border units from neighbors whose
/// remaining members stay connected.
///
/// # Example
///
/// ```rust,no_run
/// use std::path::Path;
/// use contig_partition::algorithms::GreedyGrower;
/// use contig_partition::dataset::MetricSelector;
/// use contig_partition::io::load_dataset;
/// use contig_partition::Partition;
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
///
///     let dataset = load_dataset(Path::new("./testdata/test"))?;
///     let metric: MetricSelector = "T1".into();
///     let mut placements = vec![0; dataset.len()];
///
///     let outcome = GreedyGrower { num_groups: 2, ..Default::default() }
///         .partition(&mut placements, (&dataset, &metric))?;
///
///     let edge_cut = dataset.graph().edge_cut(&placements);
///     # let _ = (outcome, edge_cut);
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GreedyGrower {
    /// Number of groups
    pub num_groups: usize,

    pub config: SolverConfig,
}

impl Default for GreedyGrower {
    fn default() -> Self {
        GreedyGrower {
            num_groups: 2,
            config: SolverConfig::default(),
        }
    }
}

impl GreedyGrower {
    pub fn new(num_groups: usize, config: SolverConfig) -> Self {
        Self { num_groups, config }
    }

    /// Build a fresh state for `dataset` using this grower's group count and deviation.
    pub fn prepare<'a>(&self, dataset: &'a Dataset, metric: &MetricSelector) -> Result<PartitionState<'a>> {
        PartitionState::with_deviation_ratio(
            dataset,
            self.num_groups,
            metric,
            self.config.min_deviation_ratio,
        )
    }

    /// Drive `state` until every unit is placed within balance, or the grower stalls.
    pub fn run(&self, state: &mut PartitionState<'_>) -> Result<SolveOutcome> {
        let dataset = state.dataset();
        let step_limit = self.config.step_limit(dataset.len(), state.num_groups());
        let mut history: VecDeque<Move> = VecDeque::with_capacity(self.config.history_len + 1);
        let mut steps = 0;
        let mut absorbed = 0;

        let termination = loop {
            if state.is_complete() && state.is_balanced() {
                break Termination::Success;
            }
            if steps >= step_limit {
                break Termination::Stalled(StallReason::StepLimit(steps));
            }

            let target = select_group(state);
            let Some(candidate) = best_candidate(state, state.group(target)?) else {
                break Termination::Stalled(StallReason::NoCandidate { group: target });
            };

            let next = Move {
                unit: candidate.unit,
                from: candidate.from,
                to: target,
            };
            if history.contains(&next) {
                break Termination::Stalled(StallReason::RepeatedMove(next));
            }

            debug!(
                unit = %dataset.unit(next.unit).code,
                from = next.from,
                to = next.to,
                "commit move"
            );
            state.add_to_group(next.unit, next.to)?;
            steps += 1;

            let threshold = self.config.enclosure_threshold * dataset.len() as f64;
            if state.placed_count() as f64 >= threshold && state.can_classify_enclosures() {
                let pockets = state.generate_disconnected_groups(state.group(target)?);
                for pocket in pockets {
                    trace!(group = target, size = pocket.len(), "absorbing enclosure");
                    for unit in pocket {
                        state.add_to_group(unit, target)?;
                        absorbed += 1;
                    }
                }
            }

            history.push_back(next);
            if history.len() > self.config.history_len {
                history.pop_front();
            }
        };

        match termination {
            Termination::Success => info!(steps, absorbed, "partition complete"),
            Termination::Stalled(reason) => warn!(
                steps,
                absorbed,
                unplaced = state.unplaced().len(),
                ?reason,
                "partition stalled"
            ),
        }

        Ok(SolveOutcome {
            termination,
            steps,
            absorbed,
        })
    }
}

/// The neediest group: empty, still bordering unplaced units, or bordering nothing at
/// all, and among those the one with the smallest metric.
fn select_group(state: &PartitionState<'_>) -> usize {
    let needy = |group: &Group| {
        group.is_empty() || group.adjacent().is_empty() || state.has_any_unplaced_adjacent(group)
    };

    state
        .groups()
        .iter()
        .min_by(|a, b| {
            needy(b)
                .cmp(&needy(a))
                .then(a.metric().total_cmp(&b.metric()))
                .then(a.index().cmp(&b.index()))
        })
        .map(Group::index)
        .unwrap_or(1)
}

/// Units `group` may take next.
fn candidates(state: &PartitionState<'_>, group: &Group) -> Vec<Candidate> {
    let unplaced = |unit: UnitId| Candidate { unit, from: 0 };

    if group.is_empty() {
        return state.unplaced().iter().copied().map(unplaced).collect();
    }
    if state.has_any_unplaced_adjacent(group) {
        return group
            .adjacent()
            .iter()
            .copied()
            .filter(|unit| !state.is_placed(*unit))
            .map(unplaced)
            .collect();
    }

    // Boxed in: steal from neighbors that stay connected, or jump to a unit no member
    // can reach at all (another island).
    let dataset = state.dataset();
    let mut pool: Vec<Candidate> = group
        .adjacent()
        .iter()
        .copied()
        .filter_map(|unit| {
            let owner = state.group_for(unit).ok()?;
            // An emptied group would have nothing left to grow from.
            (owner.len() > 1 && owner.can_lose(dataset, unit)).then_some(Candidate {
                unit,
                from: owner.index(),
            })
        })
        .collect();
    pool.extend(
        state
            .unplaced()
            .iter()
            .copied()
            .filter(|unit| group.distance_sum(*unit) == 0)
            .map(unplaced),
    );
    pool
}

/// Unplaced before stolen, then closest to the group, then the metric landing nearest
/// the average.
fn best_candidate(state: &PartitionState<'_>, group: &Group) -> Option<Candidate> {
    let target = state.avg_group_metric();
    let gap = |candidate: &Candidate| (group.metric() + state.value(candidate.unit) - target).abs();

    candidates(state, group).into_iter().min_by(|a, b| {
        (a.from != 0)
            .cmp(&(b.from != 0))
            .then(group.distance_sum(a.unit).cmp(&group.distance_sum(b.unit)))
            .then_with(|| gap(a).total_cmp(&gap(b)))
            .then_with(|| compare_position(state, a.unit, b.unit))
    })
}

/// Final tie-break: larger metric first, then load order.
fn compare_position(state: &PartitionState<'_>, a: UnitId, b: UnitId) -> Ordering {
    state
        .value(b)
        .total_cmp(&state.value(a))
        .then(a.cmp(&b))
}

/// Partition `dataset` into `num_groups` groups balanced on `metric`.
///
/// Returns the final state whether or not the run converged; inspect
/// [`Solution::outcome`] to tell success from a stall.
pub fn solve<'a>(
    num_groups: usize,
    metric: &MetricSelector,
    dataset: &'a Dataset,
    observer: Option<Box<dyn Observer + 'a>>,
) -> Result<Solution<'a>> {
    solve_with(num_groups, metric, dataset, observer, &SolverConfig::default())
}

/// [`solve`] with explicit solver settings.
pub fn solve_with<'a>(
    num_groups: usize,
    metric: &MetricSelector,
    dataset: &'a Dataset,
    observer: Option<Box<dyn Observer + 'a>>,
    config: &SolverConfig,
) -> Result<Solution<'a>> {
    let grower = GreedyGrower::new(num_groups, config.clone());
    let mut state = grower.prepare(dataset, metric)?;
    if let Some(observer) = observer {
        state.set_observer(observer);
    }
    let outcome = grower.run(&mut state)?;
    Ok(Solution { state, outcome })
}

impl<'a> Partition<(&'a Dataset, &'a MetricSelector)> for GreedyGrower {
    type Metadata = SolveOutcome;
    type Error = Error;

    fn partition(
        &mut self,
        part_ids: &mut [usize],
        (dataset, metric): (&'a Dataset, &'a MetricSelector),
    ) -> std::result::Result<Self::Metadata, Self::Error> {
        if part_ids.len() != dataset.len() {
            return Err(Error::InputLenMismatch {
                expected: part_ids.len(),
                actual: dataset.len(),
            });
        }

        let mut state = self.prepare(dataset, metric)?;
        let outcome = self.run(&mut state)?;
        part_ids.copy_from_slice(state.placements());
        Ok(outcome)
    }
}
