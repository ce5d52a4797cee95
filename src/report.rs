//! Summaries of a finished partition for people and machines.

use std::fmt::Write;

use serde::Serialize;

use crate::algorithms::{PartitionState, SolveOutcome, StallReason, Termination};
use crate::imbalance::imbalance;

/// One group of a [`Summary`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GroupSummary {
    pub index: usize,
    pub metric: f64,
    /// Percentage of the dataset total.
    pub share: f64,
    /// Member codes, sorted.
    pub units: Vec<String>,
    pub contiguous: bool,
}

/// Everything worth reporting about a final partition state.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Summary {
    pub dataset: String,
    pub metric: String,
    pub total: f64,
    /// Largest metric first.
    pub groups: Vec<GroupSummary>,
    /// Codes of units left unplaced, sorted.
    pub unplaced: Vec<String>,
    pub unplaced_metric: f64,
    pub smallest: f64,
    pub largest: f64,
    pub spread: f64,
    pub acceptable: (f64, f64),
    pub imbalance: f64,
    pub edge_cut: usize,
    pub outcome: SolveOutcome,
}

impl Summary {
    pub fn from_state(state: &PartitionState<'_>, outcome: &SolveOutcome) -> Self {
        let dataset = state.dataset();
        let total = state.sum_unit_metrics();

        let mut groups: Vec<GroupSummary> = state
            .groups()
            .iter()
            .map(|group| {
                let mut units: Vec<String> = group
                    .units()
                    .iter()
                    .map(|unit| dataset.unit(*unit).code.clone())
                    .collect();
                units.sort();
                GroupSummary {
                    index: group.index(),
                    metric: group.metric(),
                    share: share(total, group.metric()),
                    units,
                    contiguous: group.is_contiguous(dataset),
                }
            })
            .collect();
        groups.sort_by(|a, b| b.metric.total_cmp(&a.metric).then(a.index.cmp(&b.index)));

        let mut unplaced: Vec<String> = state
            .unplaced()
            .iter()
            .map(|unit| dataset.unit(*unit).code.clone())
            .collect();
        unplaced.sort();
        let unplaced_metric = state.unplaced().iter().map(|unit| state.value(*unit)).sum();

        let values: Vec<f64> = dataset.unit_ids().map(|unit| state.value(unit)).collect();
        let loads: Vec<f64> = state.groups().iter().map(|group| group.metric()).collect();
        let smallest = loads.iter().cloned().fold(f64::INFINITY, f64::min);
        let largest = loads.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

        Self {
            dataset: dataset.name().to_string(),
            metric: state.metric_name().to_string(),
            total,
            groups,
            unplaced,
            unplaced_metric,
            smallest,
            largest,
            spread: largest - smallest,
            acceptable: state.acceptable_range(),
            imbalance: imbalance(state.num_groups(), state.placements(), &values),
            edge_cut: dataset.graph().edge_cut(state.placements()),
            outcome: outcome.clone(),
        }
    }

    /// Spread, acceptable range, then one aligned line per group and the unplaced units.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let total = self.total;

        let _ = writeln!(out, "--------------- + {} + ---------------", describe(&self.outcome.termination));
        let _ = writeln!(
            out,
            "Final spread: {}, from {} to {}",
            num_with_percent(total, self.spread),
            num_with_percent(total, self.smallest),
            num_with_percent(total, self.largest)
        );
        let _ = writeln!(
            out,
            "Acceptable sizes: {} to {}",
            num_with_percent(total, self.acceptable.0),
            num_with_percent(total, self.acceptable.1)
        );

        let mut rows: Vec<(String, String)> = self
            .groups
            .iter()
            .map(|group| {
                (
                    format!("Group {} ({}):", group.index, percent(total, group.metric)),
                    group.units.join("|"),
                )
            })
            .collect();
        if !self.unplaced.is_empty() {
            rows.push((
                format!("Unplaced ({}):", percent(total, self.unplaced_metric)),
                self.unplaced.join("|"),
            ));
        }

        let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
        for (label, units) in rows {
            let _ = writeln!(out, "{label:width$} {units}");
        }
        out
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

fn describe(termination: &Termination) -> String {
    match termination {
        Termination::Success => "Complete".to_string(),
        Termination::Stalled(StallReason::RepeatedMove(_)) => "Stalled: repeated move".to_string(),
        Termination::Stalled(StallReason::NoCandidate { group }) => {
            format!("Stalled: no candidate for group {group}")
        }
        Termination::Stalled(StallReason::StepLimit(limit)) => {
            format!("Stalled: step limit {limit} reached")
        }
    }
}

fn share(total: f64, value: f64) -> f64 {
    if total == 0.0 {
        0.0
    } else {
        100.0 * value / total
    }
}

/// `value` as a percentage of `total` with two decimals, e.g. `15.56%`.
pub fn percent(total: f64, value: f64) -> String {
    format!("{:.2}%", share(total, value))
}

/// `value` with thousands separators and its share of `total`, e.g. `1,234.00 (15.56%)`.
pub fn num_with_percent(total: f64, value: f64) -> String {
    format!("{} ({})", with_thousands(value), percent(total, value))
}

fn with_thousands(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(formatted.len() + int_part.len() / 3 + 1);
    if value < 0.0 && formatted != "0.00" {
        grouped.push('-');
    }
    for (position, digit) in int_part.chars().enumerate() {
        if position > 0 && (int_part.len() - position) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped.push('.');
    grouped.push_str(frac_part);
    grouped
}
