use proptest::prelude::*;

use contig_partition::algorithms::solve;
use contig_partition::synthetic::{gen_random_metrics, grid_dataset};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn solve_keeps_partition_consistent(
        rows in 1usize..6,
        cols in 1usize..6,
        num_groups in 1usize..5,
        seed in any::<u64>(),
    ) {
        let metrics = gen_random_metrics(rows * cols, 1.0, 20.0, Some(seed)).unwrap();
        let dataset = grid_dataset(rows, cols, metrics).unwrap();

        let solution = solve(num_groups, &"T1".into(), &dataset, None).unwrap();
        let state = &solution.state;

        prop_assert!(state.validate().is_ok());

        // Every unit is either unplaced or a member of exactly the group it is placed in.
        for unit in dataset.unit_ids() {
            let owners: Vec<usize> = state
                .groups()
                .iter()
                .filter(|group| group.contains(unit))
                .map(|group| group.index())
                .collect();
            match state.placement(unit) {
                0 => {
                    prop_assert!(owners.is_empty());
                    prop_assert!(state.unplaced().contains(&unit));
                }
                group => prop_assert_eq!(owners, vec![group]),
            }
        }

        let placed: f64 = state.groups().iter().map(|group| group.metric()).sum();
        let unplaced: f64 = state.unplaced().iter().map(|unit| state.value(*unit)).sum();
        prop_assert!((placed + unplaced - state.sum_unit_metrics()).abs() < 1e-6);

        if solution.outcome.is_success() {
            prop_assert!(state.is_complete());
            prop_assert!(state.is_balanced());
            for group in state.groups() {
                prop_assert!(group.is_contiguous(&dataset));
            }
        }
    }
}
