//! Interval merging.
//!
//! Uses O(n log n) sort + O(n) single-pass sweep-line merge. Adjacent
//! intervals (`next.start == cur.end`) are merged as well as overlapping ones.

use crate::interval::Interval;

/// Sort and merge `intervals` in place, returning the total merged length.
///
/// Running it again on its own output is a no-op.
pub fn merge_in_place(intervals: &mut Vec<Interval>) -> u64 {
    if intervals.is_empty() {
        return 0;
    }

    intervals.sort_unstable();

    // Write cursor: intervals[..=w] holds merged output
    let mut w = 0;
    for r in 1..intervals.len() {
        let next = intervals[r];
        let current = &mut intervals[w];
        if current.touches(&next) {
            // Extend current span
            current.end = current.end.max(next.end);
        } else {
            w += 1;
            intervals[w] = next;
        }
    }
    intervals.truncate(w + 1);

    total_length(intervals)
}

/// Sum of interval lengths.
#[inline]
pub fn total_length(intervals: &[Interval]) -> u64 {
    intervals.iter().map(|i| i.len() as u64).sum()
}

/// True if `intervals` is sorted with a strict gap between neighbours.
pub fn is_merged(intervals: &[Interval]) -> bool {
    intervals
        .windows(2)
        .all(|w| w[0].start < w[0].end && w[1].start > w[0].end)
}
