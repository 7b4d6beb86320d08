//! Assertions over search hits.

use mailstore_search::search::compare_hits;
use mailstore_search::types::{SearchHit, SortSpec};
use std::cmp::Ordering;

/// Asserts the hit ids, in order.
pub fn assert_ids(hits: &[SearchHit], expected: &[i32]) {
    let actual: Vec<i32> = hits.iter().map(|hit| hit.id).collect();
    assert_eq!(actual, expected, "unexpected hit ids");
}

/// Asserts that consecutive hits are strictly ordered by the in-memory
/// comparator, which rules out both misordering and duplicates.
pub fn assert_strictly_ordered(hits: &[SearchHit], sort: &SortSpec) {
    for pair in hits.windows(2) {
        assert_eq!(
            compare_hits(sort, &pair[0], &pair[1]),
            Ordering::Less,
            "hits {} and {} are out of order for {:?}",
            pair[0].id,
            pair[1].id,
            sort
        );
    }
}
