use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::algorithms::group::Group;
use crate::dataset::{Dataset, MetricSelector, UnitId};
use crate::error::{Error, Result};

/// Smallest allowed deviation, as a fraction of the average group metric.
pub const DEFAULT_DEVIATION_RATIO: f64 = 0.05;

/// One row of the placement snapshot handed to an [`Observer`].
#[derive(Clone, Debug, PartialEq)]
pub struct PlacementRecord<'a> {
    pub name: &'a str,
    pub metric: f64,
    /// 1-based group index, 0 when unplaced.
    pub group: usize,
}

/// Receives the full placement snapshot after every committed move.
///
/// Purely for progress reporting; the engine never reads anything back.
pub trait Observer {
    fn on_commit(&mut self, placements: &[PlacementRecord<'_>]);
}

impl<F> Observer for F
where
    F: FnMut(&[PlacementRecord<'_>]),
{
    fn on_commit(&mut self, placements: &[PlacementRecord<'_>]) {
        self(placements)
    }
}

/// All groups of one solve, the placement map, and the balance thresholds.
///
/// Every move goes through [`PartitionState::add_to_group`], which keeps placements,
/// the unplaced list and each group's aggregates consistent.
pub struct PartitionState<'a> {
    dataset: &'a Dataset,
    metric: usize,
    /// Active metric value per unit.
    values: Vec<f64>,
    groups: Vec<Group>,
    placements: Vec<usize>,
    /// Sorted by metric, largest first.
    unplaced: Vec<UnitId>,
    sum_unit_metrics: f64,
    avg_group_metric: f64,
    deviation: f64,
    observer: Option<Box<dyn Observer + 'a>>,
}

impl<'a> PartitionState<'a> {
    pub fn new(dataset: &'a Dataset, num_groups: usize, metric: &MetricSelector) -> Result<Self> {
        Self::with_deviation_ratio(dataset, num_groups, metric, DEFAULT_DEVIATION_RATIO)
    }

    /// Like [`PartitionState::new`] with a custom lower bound on the deviation, as a
    /// fraction of the average group metric.
    pub fn with_deviation_ratio(
        dataset: &'a Dataset,
        num_groups: usize,
        metric: &MetricSelector,
        deviation_ratio: f64,
    ) -> Result<Self> {
        if num_groups == 0 {
            return Err(Error::Configuration("number of groups must be positive".to_string()));
        }
        if !deviation_ratio.is_finite() || deviation_ratio < 0.0 {
            return Err(Error::Configuration(format!(
                "deviation ratio must be a non-negative number, got {deviation_ratio}"
            )));
        }
        let metric = dataset.metric_index(metric)?;

        let values: Vec<f64> = dataset.units().iter().map(|unit| unit.metric(metric)).collect();
        let mut unplaced: Vec<UnitId> = dataset.unit_ids().collect();
        unplaced.sort_by(|a, b| {
            values[b.index()]
                .total_cmp(&values[a.index()])
                .then(a.cmp(b))
        });

        let sum_unit_metrics: f64 = values.iter().sum();
        let avg_group_metric = sum_unit_metrics / num_groups as f64;
        let largest = values.iter().cloned().fold(0.0f64, f64::max);
        // Even the largest unit alone must fit inside the acceptable band.
        let deviation = (avg_group_metric * deviation_ratio).max(largest - avg_group_metric);

        Ok(Self {
            dataset,
            metric,
            placements: vec![0; values.len()],
            values,
            groups: (1..=num_groups).map(Group::new).collect(),
            unplaced,
            sum_unit_metrics,
            avg_group_metric,
            deviation,
            observer: None,
        })
    }

    /// Attach an observer notified after every committed move.
    pub fn set_observer(&mut self, observer: Box<dyn Observer + 'a>) {
        self.observer = Some(observer);
    }

    pub fn dataset(&self) -> &'a Dataset {
        self.dataset
    }

    /// Column of the active metric.
    pub fn metric_index(&self) -> usize {
        self.metric
    }

    pub fn metric_name(&self) -> &'a str {
        &self.dataset.metric_names()[self.metric]
    }

    /// Active metric value of a unit.
    pub fn value(&self, unit: UnitId) -> f64 {
        self.values[unit.index()]
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn num_groups(&self) -> usize {
        self.groups.len()
    }

    /// Group by its 1-based index.
    pub fn group(&self, index: usize) -> Result<&Group> {
        index
            .checked_sub(1)
            .and_then(|slot| self.groups.get(slot))
            .ok_or_else(|| {
                Error::InvalidState(format!(
                    "group index {index} out of range 1..={}",
                    self.groups.len()
                ))
            })
    }

    /// Placement of every unit: group index, or 0 when unplaced.
    pub fn placements(&self) -> &[usize] {
        &self.placements
    }

    pub fn placement(&self, unit: UnitId) -> usize {
        self.placements[unit.index()]
    }

    pub fn is_placed(&self, unit: UnitId) -> bool {
        self.placements[unit.index()] != 0
    }

    /// The group holding `unit`. Asking for an unplaced unit is a caller error.
    pub fn group_for(&self, unit: UnitId) -> Result<&Group> {
        match self.placement(unit) {
            0 => Err(Error::InvalidState(format!(
                "unit '{}' is not placed",
                self.dataset.unit(unit).code
            ))),
            index => self.group(index),
        }
    }

    /// Unplaced units, largest metric first.
    pub fn unplaced(&self) -> &[UnitId] {
        &self.unplaced
    }

    pub fn placed_count(&self) -> usize {
        self.placements.len() - self.unplaced.len()
    }

    pub fn sum_unit_metrics(&self) -> f64 {
        self.sum_unit_metrics
    }

    pub fn avg_group_metric(&self) -> f64 {
        self.avg_group_metric
    }

    pub fn deviation(&self) -> f64 {
        self.deviation
    }

    /// Inclusive band every group metric has to land in.
    pub fn acceptable_range(&self) -> (f64, f64) {
        (
            self.avg_group_metric - self.deviation,
            self.avg_group_metric + self.deviation,
        )
    }

    pub fn is_within_bounds(&self, group: &Group) -> bool {
        let (low, high) = self.acceptable_range();
        (low..=high).contains(&group.metric())
    }

    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    pub fn is_balanced(&self) -> bool {
        self.groups.iter().all(|group| self.is_within_bounds(group))
    }

    /// Whether any frontier unit of `group` is still unplaced.
    pub fn has_any_unplaced_adjacent(&self, group: &Group) -> bool {
        group.adjacent().iter().any(|unit| !self.is_placed(*unit))
    }

    /// Move `unit` into the group with 1-based `index`, taking it out of the unplaced
    /// list or its previous group. This is the only way a unit changes location.
    pub fn add_to_group(&mut self, unit: UnitId, index: usize) -> Result<()> {
        self.group(index)?;
        let previous = self.placements[unit.index()];
        if previous == index {
            return Ok(());
        }

        let dataset = self.dataset;
        let value = self.values[unit.index()];
        if previous == 0 {
            let position = self
                .unplaced
                .iter()
                .position(|candidate| *candidate == unit)
                .ok_or_else(|| {
                    Error::InvariantViolation(format!(
                        "unit '{}' has no placement but is missing from the unplaced list",
                        dataset.unit(unit).code
                    ))
                })?;
            self.unplaced.remove(position);
        } else {
            let source = &mut self.groups[previous - 1];
            if !source.contains(unit) {
                return Err(Error::InvariantViolation(format!(
                    "unit '{}' is placed in group {previous} but not a member of it",
                    dataset.unit(unit).code
                )));
            }
            source.remove_unit(dataset, unit, value);
        }

        self.groups[index - 1].add_unit(dataset, unit, value);
        self.placements[unit.index()] = index;
        self.notify();
        Ok(())
    }

    /// `(name, metric, group)` for every unit, sorted by name.
    pub fn snapshot(&self) -> Vec<PlacementRecord<'a>> {
        let dataset = self.dataset;
        let mut records: Vec<PlacementRecord<'a>> = dataset
            .unit_ids()
            .map(|unit| PlacementRecord {
                name: dataset.unit(unit).name.as_str(),
                metric: self.values[unit.index()],
                group: self.placements[unit.index()],
            })
            .collect();
        records.sort_by(|a, b| a.name.cmp(b.name));
        records
    }

    fn notify(&mut self) {
        if self.observer.is_none() {
            return;
        }
        let records = self.snapshot();
        if let Some(observer) = self.observer.as_mut() {
            observer.on_commit(&records);
        }
    }

    /// Recompute every derived structure from scratch and compare.
    ///
    /// Checks that each unit is either unplaced or in exactly the group its placement
    /// names, that metrics are conserved, and that every group's frontier and distance
    /// sums match its members. Meant for tests and diagnostics; costs O(V²).
    pub fn validate(&self) -> Result<()> {
        let dataset = self.dataset;
        let violation = |message: String| Err(Error::InvariantViolation(message));

        let unplaced: BTreeSet<UnitId> = self.unplaced.iter().copied().collect();
        if unplaced.len() != self.unplaced.len() {
            return violation("unplaced list holds duplicates".to_string());
        }

        for unit in dataset.unit_ids() {
            let placement = self.placements[unit.index()];
            let holders: Vec<usize> = self
                .groups
                .iter()
                .filter(|group| group.contains(unit))
                .map(Group::index)
                .collect();
            let expected: Vec<usize> = if placement == 0 { vec![] } else { vec![placement] };
            if placement > self.groups.len() || holders != expected {
                return violation(format!(
                    "unit '{}' placed in {placement} but held by {holders:?}",
                    dataset.unit(unit).code
                ));
            }
            if (placement == 0) != unplaced.contains(&unit) {
                return violation(format!(
                    "unit '{}' disagrees with the unplaced list",
                    dataset.unit(unit).code
                ));
            }
        }

        let placed: f64 = self.groups.iter().map(Group::metric).sum();
        let waiting: f64 = self.unplaced.iter().map(|unit| self.value(*unit)).sum();
        let tolerance = 1e-9 * self.sum_unit_metrics.abs().max(1.0);
        if (placed + waiting - self.sum_unit_metrics).abs() > tolerance {
            return violation(format!(
                "metric not conserved: {placed} placed + {waiting} unplaced != {}",
                self.sum_unit_metrics
            ));
        }

        for group in &self.groups {
            let frontier: BTreeSet<UnitId> = group
                .units()
                .iter()
                .flat_map(|member| dataset.neighbors(*member))
                .filter(|unit| !group.contains(*unit))
                .collect();
            if &frontier != group.adjacent() {
                return violation(format!("group {} frontier is stale", group.index()));
            }

            let mut sums: FxHashMap<UnitId, u64> = FxHashMap::default();
            for member in group.units() {
                for (other, hops) in dataset.distances_from(*member) {
                    *sums.entry(other).or_insert(0) += u64::from(hops);
                }
            }
            if &sums != group.distance_sums() {
                return violation(format!("group {} distance sums are stale", group.index()));
            }

            let members: f64 = group.units().iter().map(|unit| self.value(*unit)).sum();
            if (members - group.metric()).abs() > tolerance {
                return violation(format!("group {} metric is stale", group.index()));
            }
        }

        Ok(())
    }
}
