// This file has code from https://github.com/LIHPC-Computational-Geometry/coupe (See NOTICE.md)
use num_traits::ToPrimitive;

/// Calculates the total weight of each group of a placement vector.
///
/// Group ids are 1-based; units with id 0 (unplaced) or an id past `num_groups` are
/// left out. Slot `i` of the result holds the load of group `i + 1`.
pub fn compute_group_loads<W: ToPrimitive>(placements: &[usize], num_groups: usize, weights: &[W]) -> Vec<f64> {
    let mut loads = vec![0.0; num_groups];

    for (&group, w) in placements.iter().zip(weights) {
        if (1..=num_groups).contains(&group) {
            loads[group - 1] += w.to_f64().unwrap_or(0.0);
        }
    }

    loads
}

/// Compute imbalance after passing group loads: the largest relative excess of a group
/// over an even split of the total.
pub fn compute_imbalance_from_group_loads(group_loads: &[f64]) -> f64 {
    if group_loads.is_empty() {
        return 0.0;
    }
    let total_weight: f64 = group_loads.iter().sum();

    let ideal_group_weight = total_weight / group_loads.len().to_f64().unwrap_or(1.0);
    if ideal_group_weight == 0.0 {
        return 0.0;
    }

    group_loads
        .iter()
        .map(|group_weight| (group_weight - ideal_group_weight) / ideal_group_weight)
        .fold(0.0f64, |acc, dev| acc.max(dev))
}

/// Compute the imbalance of the given placement vector.
pub fn imbalance<W: ToPrimitive>(num_groups: usize, placements: &[usize], weights: &[W]) -> f64 {
    if num_groups == 0 {
        return 0.0;
    }

    let group_loads = compute_group_loads(placements, num_groups, weights);

    compute_imbalance_from_group_loads(&group_loads)
}
