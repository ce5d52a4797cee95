use std::collections::BTreeSet;

use crate::algorithms::group::Group;
use crate::algorithms::state::PartitionState;
use crate::dataset::UnitId;

impl<'a> PartitionState<'a> {
    /// Whether enclosures can be told apart from open frontier yet: every group must
    /// already border something.
    pub fn can_classify_enclosures(&self) -> bool {
        self.groups().iter().all(|group| !group.adjacent().is_empty())
    }

    /// Pockets of unplaced units that only `group` borders.
    ///
    /// Flood-fills through unplaced units from each unclassified unplaced neighbor of
    /// `group`. A pocket that touches a unit of any other group is a real boundary and
    /// is dropped; the rest are returned, each a connected set the group can absorb.
    /// Every unit is classified at most once per call.
    pub fn generate_disconnected_groups(&self, group: &Group) -> Vec<BTreeSet<UnitId>> {
        let dataset = self.dataset();
        let mut classified: BTreeSet<UnitId> = BTreeSet::new();
        let mut pockets = Vec::new();

        for &seed in group.adjacent() {
            if self.is_placed(seed) || classified.contains(&seed) {
                continue;
            }

            let mut pocket = BTreeSet::from([seed]);
            let mut stack = vec![seed];
            let mut bordered_by_other = false;
            while let Some(current) = stack.pop() {
                for next in dataset.neighbors(current) {
                    match self.placement(next) {
                        0 => {
                            if pocket.insert(next) {
                                stack.push(next);
                            }
                        }
                        owner if owner != group.index() => bordered_by_other = true,
                        _ => {}
                    }
                }
            }

            classified.extend(pocket.iter().copied());
            if !bordered_by_other {
                pockets.push(pocket);
            }
        }

        pockets
    }
}
