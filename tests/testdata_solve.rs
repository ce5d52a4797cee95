use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use tempfile::{tempdir, TempDir};

use contig_partition::algorithms::{solve, PartitionState, StallReason, Termination};
use contig_partition::catalog::Catalog;
use contig_partition::dataset::{Dataset, UnitId};
use contig_partition::report::Summary;

/// Copy the checked-in dataset so the distance cache lands in a scratch directory.
fn load_test_dataset() -> (TempDir, Arc<Dataset>) {
    let source = Path::new(env!("CARGO_MANIFEST_DIR")).join("testdata").join("test");
    let root = tempdir().unwrap();
    let target = root.path().join("test");
    fs::create_dir(&target).unwrap();
    for file in ["adjacency.csv", "data.tsv", "names.tsv"] {
        fs::copy(source.join(file), target.join(file)).unwrap();
    }

    let dataset = Catalog::open(root.path()).unwrap().dataset(&"test".into()).unwrap();
    (root, dataset)
}

fn ids(dataset: &Dataset, codes: &str) -> BTreeSet<UnitId> {
    codes.chars().map(|c| dataset.lookup(&c.to_string()).unwrap()).collect()
}

#[test]
fn test_distances_from_island() {
    let (_root, dataset) = load_test_dataset();
    let d = dataset.lookup("D").unwrap();

    let distances: Vec<(String, u32)> = dataset
        .distances_from(d)
        .map(|(unit, hops)| (dataset.unit(unit).code.clone(), hops))
        .collect();

    assert_eq!(distances, vec![("A".to_string(), 1)]);
}

#[test]
fn test_single_group_takes_everything() {
    // Arrange
    let (_root, dataset) = load_test_dataset();

    // Act
    let solution = solve(1, &"T1".into(), &dataset, None).unwrap();
    let text = Summary::from_state(&solution.state, &solution.outcome).render_text();

    // Assert
    assert_eq!(solution.outcome.termination, Termination::Success);
    solution.state.validate().unwrap();
    assert!(text.contains("Group 1 (100.00%): A|B|C|D|E|F|G|H|I|J"));
    assert!(!text.contains("Unplaced"));
}

#[test]
fn test_two_groups_stall_with_everything_placed() {
    let (_root, dataset) = load_test_dataset();

    let solution = solve(2, &"T1".into(), &dataset, None).unwrap();
    let state = &solution.state;

    assert!(matches!(
        solution.outcome.termination,
        Termination::Stalled(StallReason::RepeatedMove(_))
    ));
    state.validate().unwrap();
    assert!(state.is_complete());
    let metrics: Vec<f64> = state.groups().iter().map(|group| group.metric()).collect();
    assert_eq!(metrics, vec![20.0, 25.0]);
    assert_eq!(state.groups()[0].units(), &ids(&dataset, "ADIJ"));
    assert!(state.groups().iter().all(|group| group.is_contiguous(&dataset)));
}

#[test]
fn test_four_groups_run_out_of_candidates() {
    let (_root, dataset) = load_test_dataset();

    let solution = solve(4, &"T1".into(), &dataset, None).unwrap();

    assert_eq!(
        solution.outcome.termination,
        Termination::Stalled(StallReason::NoCandidate { group: 3 })
    );
    assert_eq!(solution.state.groups()[2].units(), &ids(&dataset, "AD"));
    solution.state.validate().unwrap();
}

#[test]
fn test_enclosures_after_seeding() {
    // Arrange
    let (_root, dataset) = load_test_dataset();
    let mut state = PartitionState::new(&dataset, 2, &"T1".into()).unwrap();
    for (codes, group) in [("AD", 1), ("HF", 2)] {
        for code in codes.chars() {
            state.add_to_group(dataset.lookup(&code.to_string()).unwrap(), group).unwrap();
        }
    }

    // Act
    let pockets = state.generate_disconnected_groups(state.group(2).unwrap());

    // Assert
    assert_eq!(pockets.len(), 2);
    assert!(pockets.contains(&ids(&dataset, "BCEG")));
    assert!(pockets.contains(&ids(&dataset, "IJ")));
    assert!(state.generate_disconnected_groups(state.group(1).unwrap()).is_empty());
}

#[test]
fn test_unknown_metric_is_rejected() {
    let (_root, dataset) = load_test_dataset();

    assert!(matches!(
        solve(2, &"Population".into(), &dataset, None),
        Err(contig_partition::Error::Configuration(_))
    ));
    assert!(matches!(
        solve(0, &"T1".into(), &dataset, None),
        Err(contig_partition::Error::Configuration(_))
    ));
}
