//! Immutable per-dataset snapshot: units, adjacency and hop distances.

use std::fmt;
use std::str::FromStr;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::distance::DistanceTable;
use crate::error::{Error, Result};
use crate::graph::Graph;

/// Handle of a unit inside one [`Dataset`]: its position in load order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UnitId(usize);

impl UnitId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An indivisible graph node with named numeric metrics.
#[derive(Clone, Debug, PartialEq)]
pub struct Unit {
    pub code: String,
    pub name: String,
    /// One value per entry of [`Dataset::metric_names`].
    pub metrics: Vec<f64>,
}

impl Unit {
    pub fn metric(&self, metric: usize) -> f64 {
        self.metrics[metric]
    }
}

/// A unit as read from input rows, before adjacency is resolved.
#[derive(Clone, Debug, Default)]
pub struct UnitRecord {
    pub code: String,
    /// Display name; falls back to the code.
    pub name: Option<String>,
    pub metrics: Vec<f64>,
    /// Codes of neighboring units.
    pub adjacent: Vec<String>,
}

/// Picks a scale or a metric either by name or by position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Selector {
    Name(String),
    Index(usize),
}

pub type MetricSelector = Selector;
pub type DatasetSelector = Selector;

impl Selector {
    /// Resolve against an ordered list of names. `kind` only flavors the error message.
    pub fn resolve(&self, names: &[String], kind: &str) -> Result<usize> {
        match self {
            Selector::Name(name) => names
                .iter()
                .position(|candidate| candidate == name)
                .ok_or_else(|| Error::Configuration(format!("unknown {kind} '{name}'"))),
            Selector::Index(index) if *index < names.len() => Ok(*index),
            Selector::Index(index) => Err(Error::Configuration(format!(
                "{kind} index {index} out of range (have {})",
                names.len()
            ))),
        }
    }
}

impl FromStr for Selector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.parse::<usize>() {
            Ok(index) => Selector::Index(index),
            Err(_) => Selector::Name(s.to_string()),
        })
    }
}

impl From<&str> for Selector {
    fn from(name: &str) -> Self {
        Selector::Name(name.to_string())
    }
}

impl From<usize> for Selector {
    fn from(index: usize) -> Self {
        Selector::Index(index)
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Name(name) => f.write_str(name),
            Selector::Index(index) => write!(f, "{index}"),
        }
    }
}

/// Units, symmetric adjacency and precomputed hop distances for one dataset.
///
/// Built once and shared read-only by every solve over the dataset.
pub struct Dataset {
    name: String,
    metric_names: Vec<String>,
    units: Vec<Unit>,
    code_index: FxHashMap<String, UnitId>,
    graph: Graph,
    distances: DistanceTable,
}

impl Dataset {
    /// Build a dataset and compute its distance table from adjacency.
    pub fn from_records(
        name: impl Into<String>,
        metric_names: Vec<String>,
        records: Vec<UnitRecord>,
    ) -> Result<Self> {
        Self::from_records_with(name, metric_names, records, |graph, _| {
            DistanceTable::compute(graph)
        })
    }

    /// Build a dataset, obtaining the distance table from `distances` once the graph is
    /// resolved. Lets a loader substitute a cached table.
    pub fn from_records_with<F>(
        name: impl Into<String>,
        metric_names: Vec<String>,
        records: Vec<UnitRecord>,
        distances: F,
    ) -> Result<Self>
    where
        F: FnOnce(&Graph, &[Unit]) -> DistanceTable,
    {
        let name = name.into();
        let mut code_index =
            FxHashMap::with_capacity_and_hasher(records.len(), Default::default());
        let mut units = Vec::with_capacity(records.len());

        for (index, record) in records.iter().enumerate() {
            if record.metrics.len() != metric_names.len() {
                return Err(Error::DataIntegrity(format!(
                    "unit '{}' has {} metric values, expected {}",
                    record.code,
                    record.metrics.len(),
                    metric_names.len()
                )));
            }
            if code_index
                .insert(record.code.clone(), UnitId(index))
                .is_some()
            {
                return Err(Error::DataIntegrity(format!(
                    "duplicate unit code '{}'",
                    record.code
                )));
            }
            units.push(Unit {
                code: record.code.clone(),
                name: record.name.clone().unwrap_or_else(|| record.code.clone()),
                metrics: record.metrics.clone(),
            });
        }

        let mut listed: FxHashSet<(usize, usize)> = FxHashSet::default();
        for (index, record) in records.iter().enumerate() {
            for code in &record.adjacent {
                let other = code_index.get(code).ok_or_else(|| {
                    Error::DataIntegrity(format!(
                        "unit '{}' lists unknown neighbor '{code}'",
                        record.code
                    ))
                })?;
                if other.0 == index {
                    return Err(Error::DataIntegrity(format!(
                        "unit '{}' lists itself as a neighbor",
                        record.code
                    )));
                }
                listed.insert((index, other.0));
            }
        }

        let one_sided = listed
            .iter()
            .filter(|(a, b)| !listed.contains(&(*b, *a)))
            .count();
        if one_sided > 0 {
            warn!(dataset = %name, one_sided, "symmetrized one-sided adjacency entries");
        }

        let edges: Vec<(usize, usize)> = listed.into_iter().collect();
        let graph = Graph::from_edges(units.len(), &edges);
        let distances = distances(&graph, &units);
        if distances.len() != units.len() {
            return Err(Error::InvariantViolation(format!(
                "distance table covers {} units, dataset has {}",
                distances.len(),
                units.len()
            )));
        }

        info!(dataset = %name, units = units.len(), edges = graph.nnz() / 2, "dataset ready");

        Ok(Self {
            name,
            metric_names,
            units,
            code_index,
            graph,
            distances,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, id: UnitId) -> &Unit {
        &self.units[id.0]
    }

    pub fn unit_ids(&self) -> impl Iterator<Item = UnitId> {
        (0..self.units.len()).map(UnitId)
    }

    /// Handle for a unit code.
    pub fn lookup(&self, code: &str) -> Option<UnitId> {
        self.code_index.get(code).copied()
    }

    pub fn metric_names(&self) -> &[String] {
        &self.metric_names
    }

    /// Column index of the selected metric.
    pub fn metric_index(&self, metric: &MetricSelector) -> Result<usize> {
        metric.resolve(&self.metric_names, "metric")
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn distance_table(&self) -> &DistanceTable {
        &self.distances
    }

    pub fn neighbors(&self, id: UnitId) -> impl Iterator<Item = UnitId> + '_ {
        self.graph.neighbors(id.0).map(UnitId)
    }

    pub fn are_adjacent(&self, a: UnitId, b: UnitId) -> bool {
        self.graph.are_adjacent(a.0, b.0)
    }

    /// Hop distance between two distinct units of the same component.
    pub fn distance(&self, from: UnitId, to: UnitId) -> Option<u32> {
        self.distances.get(from.0, to.0)
    }

    /// Every known distance from `from`; itself and unreachable units are skipped.
    pub fn distances_from(&self, from: UnitId) -> impl Iterator<Item = (UnitId, u32)> + '_ {
        self.distances
            .reachable_from(from.0)
            .map(|(to, hops)| (UnitId(to), hops))
    }
}
