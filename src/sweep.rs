//! Batch solves over every (group count, metric) combination of one dataset.

use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::algorithms::{solve_with, SolverConfig, Termination};
use crate::dataset::{Dataset, MetricSelector};
use crate::error::Result;
use crate::imbalance::compute_imbalance_from_group_loads;

/// Result of one solve in a sweep.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SweepRecord {
    pub num_groups: usize,
    pub metric: String,
    pub termination: Termination,
    pub steps: usize,
    pub unplaced: usize,
    pub imbalance: f64,
    /// Every group is contiguous.
    pub contiguous: bool,
}

/// Solve every combination of `group_counts` and `metrics` with default settings.
pub fn sweep(dataset: &Dataset, group_counts: &[usize], metrics: &[MetricSelector]) -> Result<Vec<SweepRecord>> {
    sweep_with(dataset, group_counts, metrics, &SolverConfig::default())
}

/// [`sweep`] with explicit solver settings.
///
/// Each combination is an independent solve over the shared read-only dataset, so
/// they run on the rayon pool. Records come back ordered by group count, then by the
/// position of the metric in `metrics`.
pub fn sweep_with(
    dataset: &Dataset,
    group_counts: &[usize],
    metrics: &[MetricSelector],
    config: &SolverConfig,
) -> Result<Vec<SweepRecord>> {
    let jobs: Vec<(usize, &MetricSelector)> = group_counts
        .iter()
        .flat_map(|&num_groups| metrics.iter().map(move |metric| (num_groups, metric)))
        .collect();

    let records = jobs
        .par_iter()
        .map(|&(num_groups, metric)| -> Result<SweepRecord> {
            let solution = solve_with(num_groups, metric, dataset, None, config)?;
            let state = &solution.state;
            let loads: Vec<f64> = state.groups().iter().map(|group| group.metric()).collect();
            Ok(SweepRecord {
                num_groups,
                metric: state.metric_name().to_string(),
                termination: solution.outcome.termination,
                steps: solution.outcome.steps,
                unplaced: state.unplaced().len(),
                imbalance: compute_imbalance_from_group_loads(&loads),
                contiguous: state.groups().iter().all(|group| group.is_contiguous(dataset)),
            })
        })
        .collect::<Result<Vec<SweepRecord>>>()?;

    info!(
        dataset = dataset.name(),
        runs = records.len(),
        succeeded = records.iter().filter(|record| record.termination == Termination::Success).count(),
        "sweep finished"
    );
    Ok(records)
}

#[cfg(test)]
mod tests {
    use itertools::assert_equal;
    use crate::dataset::tests::letters_dataset;
    use crate::error::Error;
    use crate::sweep::sweep;
    use crate::synthetic::{gen_uniform_metrics, grid_dataset};

    #[test]
    fn test_sweep_order() {
        // Arrange
        let dataset = letters_dataset();

        // Act
        let records = sweep(&dataset, &[3, 1, 2], &["T1".into(), 0usize.into()]).unwrap();

        // Assert
        assert_equal(records.iter().map(|record| record.num_groups), [3, 3, 1, 1, 2, 2]);
        assert!(records.iter().all(|record| record.metric == "T1"));
        let single = &records[2];
        assert!(single.termination == crate::algorithms::Termination::Success);
        assert_eq!(single.unplaced, 0);
        assert!(single.contiguous);
    }

    #[test]
    fn test_sweep_grid() {
        let dataset = grid_dataset(4, 4, gen_uniform_metrics(16)).unwrap();

        let records = sweep(&dataset, &[1, 2, 4], &["T1".into()]).unwrap();

        assert_eq!(records.len(), 3);
        assert!(records.iter().all(|record| record.contiguous));
    }

    #[test]
    fn test_sweep_bad_metric() {
        let dataset = letters_dataset();

        let result = sweep(&dataset, &[2], &["T9".into()]);

        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
