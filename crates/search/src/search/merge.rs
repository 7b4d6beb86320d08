//! Combining the results of split searches.

use std::collections::HashSet;

use crate::types::{SearchHit, SortSpec};

use super::sort::sort_hits;

/// Merges the arms of a split union into one ordered list without
/// duplicate ids.
pub fn merge_union(lists: Vec<Vec<SearchHit>>, sort: &SortSpec) -> Vec<SearchHit> {
    let mut merged: Vec<SearchHit> = lists.into_iter().flatten().collect();
    sort_hits(&mut merged, sort);
    let mut seen = HashSet::with_capacity(merged.len());
    merged.retain(|hit| seen.insert(hit.id));
    merged
}

/// Keeps the hits present in every list, ordered by `sort`.
///
/// Hits are taken from the shortest list.
pub fn intersect(mut lists: Vec<Vec<SearchHit>>, sort: &SortSpec) -> Vec<SearchHit> {
    if lists.is_empty() {
        return Vec::new();
    }
    lists.sort_by_key(Vec::len);
    let mut rest = lists.split_off(1);
    let Some(mut result) = lists.pop() else {
        return Vec::new();
    };
    for other in rest.drain(..) {
        let ids: HashSet<i32> = other.iter().map(|hit| hit.id).collect();
        result.retain(|hit| ids.contains(&hit.id));
        if result.is_empty() {
            break;
        }
    }
    let mut seen = HashSet::with_capacity(result.len());
    result.retain(|hit| seen.insert(hit.id));
    sort_hits(&mut result, sort);
    result
}
