//! Synthetic datasets for tests, demos and benchmarking.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

use crate::dataset::{Dataset, UnitRecord};
use crate::error::{Error, Result};

/// Generate a metric vector where every unit weighs the same
pub fn gen_uniform_metrics(no_of_units: usize) -> Vec<f64> {
    vec![1.0; no_of_units]
}

/// Generate a metric vector where every unit has a random weight in `[min, max]`.
///
/// A seed makes the draw reproducible.
pub fn gen_random_metrics(no_of_units: usize, min_metric: f64, max_metric: f64, seed: Option<u64>) -> Result<Vec<f64>> {
    if !min_metric.is_finite() || !max_metric.is_finite() {
        return Err(Error::Configuration("metric bounds must be finite".to_string()));
    }
    if max_metric < min_metric {
        return Err(Error::Configuration("max metric must not be below min metric".to_string()));
    }
    if min_metric < 0.0 {
        return Err(Error::Configuration("metrics must be non-negative".to_string()));
    }

    let mut rng = match seed {
        Some(seed) => SmallRng::seed_from_u64(seed),
        None => SmallRng::from_entropy(),
    };

    Ok((0..no_of_units)
        .map(|_| rng.gen_range(min_metric..=max_metric))
        .collect())
}

/// A `rows × cols` grid where each cell borders the cells above, below, left and right.
///
/// Cells are coded `R{row}C{col}` in row-major order and carry one metric, `T1`.
pub fn grid_dataset(rows: usize, cols: usize, metrics: Vec<f64>) -> Result<Dataset> {
    if metrics.len() != rows * cols {
        return Err(Error::InputLenMismatch {
            expected: rows * cols,
            actual: metrics.len(),
        });
    }

    let code = |row: usize, col: usize| format!("R{row}C{col}");
    let records = metrics
        .into_iter()
        .enumerate()
        .map(|(cell, value)| {
            let (row, col) = (cell / cols, cell % cols);
            let mut adjacent = Vec::with_capacity(4);
            if row > 0 {
                adjacent.push(code(row - 1, col));
            }
            if row + 1 < rows {
                adjacent.push(code(row + 1, col));
            }
            if col > 0 {
                adjacent.push(code(row, col - 1));
            }
            if col + 1 < cols {
                adjacent.push(code(row, col + 1));
            }
            UnitRecord {
                code: code(row, col),
                name: None,
                metrics: vec![value],
                adjacent,
            }
        })
        .collect();

    Dataset::from_records(format!("grid-{rows}x{cols}"), vec!["T1".to_string()], records)
}
