use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::dataset::{Dataset, UnitId};

/// A growing subset of units forming one output partition.
///
/// Keeps three aggregates in step with its members:
/// - `metric`: sum of the members' active metric values,
/// - `adj`: units adjacent to some member that are not members themselves,
/// - `distance_sum`: for every unit, the sum of its hop distances to all members.
#[derive(Clone, Debug)]
pub struct Group {
    index: usize,
    units: BTreeSet<UnitId>,
    metric: f64,
    adj: BTreeSet<UnitId>,
    distance_sum: FxHashMap<UnitId, u64>,
}

impl Group {
    /// Create an empty group. Indices are 1-based; 0 is reserved for "unplaced".
    pub fn new(index: usize) -> Self {
        Self {
            index,
            units: BTreeSet::new(),
            metric: 0.0,
            adj: BTreeSet::new(),
            distance_sum: FxHashMap::default(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn units(&self) -> &BTreeSet<UnitId> {
        &self.units
    }

    pub fn contains(&self, unit: UnitId) -> bool {
        self.units.contains(&unit)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn metric(&self) -> f64 {
        self.metric
    }

    /// The frontier: non-member units adjacent to a member.
    pub fn adjacent(&self) -> &BTreeSet<UnitId> {
        &self.adj
    }

    /// Sum of hop distances from `unit` to every member; 0 when none is known.
    pub fn distance_sum(&self, unit: UnitId) -> u64 {
        self.distance_sum.get(&unit).copied().unwrap_or(0)
    }

    pub fn distance_sums(&self) -> &FxHashMap<UnitId, u64> {
        &self.distance_sum
    }

    /// Add a unit whose active metric value is `value`.
    pub(crate) fn add_unit(&mut self, dataset: &Dataset, unit: UnitId, value: f64) {
        if !self.units.insert(unit) {
            return;
        }
        self.metric += value;

        self.adj.remove(&unit);
        for neighbor in dataset.neighbors(unit) {
            if !self.units.contains(&neighbor) {
                self.adj.insert(neighbor);
            }
        }

        for (other, hops) in dataset.distances_from(unit) {
            *self.distance_sum.entry(other).or_insert(0) += u64::from(hops);
        }
    }

    /// Remove a member whose active metric value is `value`.
    pub(crate) fn remove_unit(&mut self, dataset: &Dataset, unit: UnitId, value: f64) {
        if !self.units.remove(&unit) {
            return;
        }
        self.metric -= value;

        if dataset.neighbors(unit).any(|n| self.units.contains(&n)) {
            self.adj.insert(unit);
        }
        for neighbor in dataset.neighbors(unit) {
            if self.units.contains(&neighbor) {
                continue;
            }
            if !dataset.neighbors(neighbor).any(|n| self.units.contains(&n)) {
                self.adj.remove(&neighbor);
            }
        }

        for (other, hops) in dataset.distances_from(unit) {
            if let Some(sum) = self.distance_sum.get_mut(&other) {
                *sum -= u64::from(hops);
                if *sum == 0 {
                    self.distance_sum.remove(&other);
                }
            }
        }
    }

    /// Whether the members bordering `unit` stay mutually reachable through the other
    /// members once `unit` leaves.
    ///
    /// Trivially true when `unit` borders no member.
    pub fn can_lose(&self, dataset: &Dataset, unit: UnitId) -> bool {
        let mut border: BTreeSet<UnitId> = dataset
            .neighbors(unit)
            .filter(|n| self.units.contains(n))
            .collect();
        let Some(start) = border.pop_first() else {
            return true;
        };

        let mut seen = BTreeSet::from([unit, start]);
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            for next in dataset.neighbors(current) {
                if self.units.contains(&next) && seen.insert(next) {
                    border.remove(&next);
                    stack.push(next);
                }
            }
            if border.is_empty() {
                return true;
            }
        }

        border.is_empty()
    }

    /// Connected components of the subgraph induced by the members.
    pub fn components(&self, dataset: &Dataset) -> Vec<BTreeSet<UnitId>> {
        let mut seen = BTreeSet::new();
        let mut components = Vec::new();

        for &root in &self.units {
            if !seen.insert(root) {
                continue;
            }
            let mut component = BTreeSet::from([root]);
            let mut stack = vec![root];
            while let Some(current) = stack.pop() {
                for next in dataset.neighbors(current) {
                    if self.units.contains(&next) && seen.insert(next) {
                        component.insert(next);
                        stack.push(next);
                    }
                }
            }
            components.push(component);
        }

        components
    }

    /// Whether the group is contiguous.
    ///
    /// Members are split into induced components. Two components only count as a break
    /// when the static graph connects them; pieces on separate islands can never be
    /// joined, so a group spanning islands is contiguous as long as each island's share
    /// is connected.
    pub fn is_contiguous(&self, dataset: &Dataset) -> bool {
        let components = self.components(dataset);
        let representatives: Vec<UnitId> = components
            .iter()
            .filter_map(|component| component.first().copied())
            .collect();

        representatives.iter().enumerate().all(|(i, &a)| {
            representatives[i + 1..]
                .iter()
                .all(|&b| dataset.distance(a, b).is_none())
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::dataset::tests::letters_dataset;
    use super::*;

    fn ids(dataset: &Dataset, codes: &str) -> BTreeSet<UnitId> {
        codes.chars().map(|c| dataset.lookup(&c.to_string()).unwrap()).collect()
    }

    fn sums(dataset: &Dataset, entries: &[(&str, u64)]) -> FxHashMap<UnitId, u64> {
        entries
            .iter()
            .map(|(code, sum)| (dataset.lookup(code).unwrap(), *sum))
            .collect()
    }

    fn add(group: &mut Group, dataset: &Dataset, code: &str) {
        let unit = dataset.lookup(code).unwrap();
        group.add_unit(dataset, unit, dataset.unit(unit).metric(0));
    }

    fn remove(group: &mut Group, dataset: &Dataset, code: &str) {
        let unit = dataset.lookup(code).unwrap();
        group.remove_unit(dataset, unit, dataset.unit(unit).metric(0));
    }

    #[test]
    fn test_new_group() {
        let group = Group::new(1);

        assert_eq!(group.index(), 1);
        assert_eq!(group.metric(), 0.0);
        assert!(group.is_empty());
    }

    #[test]
    fn test_unit_changes() {
        let dataset = letters_dataset();
        let mut group = Group::new(1);

        add(&mut group, &dataset, "B");
        assert_eq!(group.metric(), 1.0);
        assert_eq!(group.units(), &ids(&dataset, "B"));
        assert_eq!(group.adjacent(), &ids(&dataset, "CEF"));
        assert_eq!(
            group.distance_sums(),
            &sums(&dataset, &[("C", 1), ("E", 1), ("F", 1), ("G", 2), ("H", 2), ("I", 3), ("J", 3)])
        );

        add(&mut group, &dataset, "E");
        assert_eq!(group.metric(), 5.0);
        assert_eq!(group.adjacent(), &ids(&dataset, "CF"));
        assert_eq!(
            group.distance_sums(),
            &sums(&dataset, &[("B", 1), ("C", 3), ("E", 1), ("F", 2), ("G", 4), ("H", 4), ("I", 6), ("J", 6)])
        );

        remove(&mut group, &dataset, "B");
        assert_eq!(group.metric(), 4.0);
        assert_eq!(group.units(), &ids(&dataset, "E"));
        assert_eq!(group.adjacent(), &ids(&dataset, "BF"));
        assert_eq!(
            group.distance_sums(),
            &sums(&dataset, &[("B", 1), ("C", 2), ("F", 1), ("G", 2), ("H", 2), ("I", 3), ("J", 3)])
        );

        add(&mut group, &dataset, "A");
        assert_eq!(group.metric(), 4.0);
        assert_eq!(group.adjacent(), &ids(&dataset, "BDF"));
        assert_eq!(group.distance_sum(dataset.lookup("D").unwrap()), 1);

        remove(&mut group, &dataset, "E");
        assert_eq!(group.metric(), 0.0);
        assert_eq!(group.units(), &ids(&dataset, "A"));
        assert_eq!(group.adjacent(), &ids(&dataset, "D"));
        assert_eq!(group.distance_sums(), &sums(&dataset, &[("D", 1)]));

        remove(&mut group, &dataset, "A");
        assert!(group.is_empty());
        assert!(group.adjacent().is_empty());
        assert!(group.distance_sums().is_empty());
    }

    #[test]
    fn test_can_lose() {
        let dataset = letters_dataset();
        let mut group = Group::new(1);
        for code in ["A", "C", "G", "H"] {
            add(&mut group, &dataset, code);
        }
        let unit = |code: &str| dataset.lookup(code).unwrap();

        assert!(group.can_lose(&dataset, unit("A")));
        assert!(group.can_lose(&dataset, unit("H")));
        assert!(group.can_lose(&dataset, unit("C")));
        assert!(!group.can_lose(&dataset, unit("G")));
        // Not a member and borders nothing in the group.
        assert!(group.can_lose(&dataset, unit("E")));

        remove(&mut group, &dataset, "H");
        assert!(group.can_lose(&dataset, unit("G")));
    }

    #[test]
    fn test_can_lose_through_other_members() {
        // F borders B, C and E; they stay linked through B once F leaves.
        let dataset = letters_dataset();
        let mut group = Group::new(1);
        for code in ["B", "C", "E", "F"] {
            add(&mut group, &dataset, code);
        }

        assert!(group.can_lose(&dataset, dataset.lookup("F").unwrap()));
        assert!(group.can_lose(&dataset, dataset.lookup("B").unwrap()));
    }

    #[test]
    fn test_is_contiguous() {
        let dataset = letters_dataset();
        let mut group = Group::new(1);
        assert!(group.is_contiguous(&dataset));

        for code in ["A", "D", "C", "B"] {
            add(&mut group, &dataset, code);
            assert!(group.is_contiguous(&dataset), "after adding {code}");
        }

        add(&mut group, &dataset, "H");
        assert!(!group.is_contiguous(&dataset));

        add(&mut group, &dataset, "I");
        assert!(!group.is_contiguous(&dataset));

        add(&mut group, &dataset, "F");
        assert!(group.is_contiguous(&dataset));

        remove(&mut group, &dataset, "H");
        assert!(!group.is_contiguous(&dataset));

        remove(&mut group, &dataset, "I");
        assert!(group.is_contiguous(&dataset));

        remove(&mut group, &dataset, "D");
        assert!(group.is_contiguous(&dataset));
    }

    #[test]
    fn test_components() {
        let dataset = letters_dataset();
        let mut group = Group::new(1);
        for code in ["A", "D", "B", "H"] {
            add(&mut group, &dataset, code);
        }

        let components = group.components(&dataset);
        assert_eq!(components.len(), 3);
        assert!(components.contains(&ids(&dataset, "AD")));
    }
}
