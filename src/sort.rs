use crate::domain::RankRecord;

/// Orders records by rank ascending. Stable, so records that share a rank keep
/// their arrival order.
pub fn sort_by_rank(records: &mut [RankRecord]) {
    records.sort_by_key(|record| record.rank);
}

/// Index of the first record that ranks lower than its predecessor.
pub fn first_unsorted(records: &[RankRecord]) -> Option<usize> {
    records
        .windows(2)
        .position(|pair| pair[0].rank > pair[1].rank)
        .map(|index| index + 1)
}

pub fn is_sorted_by_rank(records: &[RankRecord]) -> bool {
    first_unsorted(records).is_none()
}
