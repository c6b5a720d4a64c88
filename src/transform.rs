//! Region transforms applied between reading targets and tiling them.
//!
//! Each transform rewrites a store bucket by bucket and leaves it merged.

use crate::index::RangeDb;
use crate::interval::Interval;
use crate::store::IntervalStore;
use log::debug;

/// Grow every region shorter than `min_size` to exactly `min_size`.
///
/// Growth is split evenly around the region. If the left share would cross
/// position 0 the remainder goes to the right. Regions already long enough
/// are left alone.
pub fn round_up(store: &mut IntervalStore, min_size: u32) {
    store.merge();
    for id in store.chrom_ids() {
        let grown: Vec<Interval> = store
            .intervals(id)
            .iter()
            .map(|iv| grow_to(*iv, min_size))
            .collect();
        store.replace_intervals(id, grown);
    }
    store.merge();
}

#[inline]
fn grow_to(iv: Interval, min_size: u32) -> Interval {
    let len = iv.len();
    if len >= min_size {
        return iv;
    }
    let grow = min_size - len;
    let mut left = grow / 2;
    let mut right = grow - left;
    if left > iv.start {
        right += left - iv.start;
        left = iv.start;
    }
    Interval::new(iv.start - left, iv.end.saturating_add(right))
}

/// Expand every region by `flank` on both sides, merge, then shrink by
/// `trim` on both sides.
///
/// With `flank == trim` this is a morphological closing: regions separated
/// by at most `2 * flank` bases fuse and every other boundary is restored.
/// Regions emptied by a larger `trim` are dropped.
pub fn flank_trim(store: &mut IntervalStore, flank: u32, trim: u32) {
    store.merge();
    let flank = i64::from(flank);
    let trim = i64::from(trim);

    for id in store.chrom_ids() {
        // Signed so that a left expansion past 0 is undone exactly
        let mut expanded: Vec<(i64, i64)> = Vec::with_capacity(store.intervals(id).len());
        for iv in store.intervals(id) {
            let start = i64::from(iv.start) - flank;
            let end = i64::from(iv.end) + flank;
            match expanded.last_mut() {
                Some(last) if start <= last.1 => last.1 = last.1.max(end),
                _ => expanded.push((start, end)),
            }
        }

        let shrunk: Vec<Interval> = expanded
            .into_iter()
            .filter_map(|(start, end)| {
                let start = (start + trim).max(0);
                let end = (end - trim).min(i64::from(u32::MAX));
                (start < end).then(|| Interval::new(start as u32, end as u32))
            })
            .collect();
        store.replace_intervals(id, shrunk);
    }
    store.merge();
}

/// What happened to each region during [`intersect_with_range_db`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IntersectStats {
    /// Regions with at least one overlapping range.
    pub overlapped: u64,
    /// Regions replaced by part of a nearby range.
    pub rescued: u64,
    /// Regions with nothing allowed within reach.
    pub dropped: u64,
}

/// Restrict every region to the ranges of `db`.
///
/// Each region is replaced by its intersections with `db`. A region that
/// overlaps nothing is replaced by the part of the nearest range within
/// `max_gap` that faces it, at most `max_rescue_span` bases long; without
/// such a range it is dropped.
pub fn intersect_with_range_db<D: RangeDb + ?Sized>(
    store: &mut IntervalStore,
    db: &D,
    max_gap: u32,
    max_rescue_span: u32,
) -> (IntervalStore, IntersectStats) {
    store.merge();
    let mut result = store.empty_like();
    let mut stats = IntersectStats::default();

    for id in store.chrom_ids() {
        let chrom = store.name(id).unwrap_or_default();
        let mut kept = Vec::new();

        for iv in store.intervals(id) {
            let hits = db.overlapping(chrom, iv.start, iv.end);
            if !hits.is_empty() {
                stats.overlapped += 1;
                kept.extend(hits.iter().filter_map(|hit| iv.intersect(hit)));
                continue;
            }

            match db.nearest(chrom, iv.start, iv.end, max_gap) {
                Some(range) => {
                    let piece = facing_part(*iv, range, max_rescue_span);
                    debug!(
                        "Rescued {}:{}-{} with unique range {}-{}",
                        chrom, iv.start, iv.end, piece.start, piece.end
                    );
                    stats.rescued += 1;
                    kept.push(piece);
                }
                None => {
                    debug!(
                        "Dropped {}:{}-{}: no unique range within {} bp",
                        chrom, iv.start, iv.end, max_gap
                    );
                    stats.dropped += 1;
                }
            }
        }

        result.replace_intervals(id, kept);
    }

    result.merge();
    (result, stats)
}

/// The end of `range` closest to `target`, truncated to `span` bases.
fn facing_part(target: Interval, range: Interval, span: u32) -> Interval {
    if range.start >= target.end {
        Interval::new(range.start, range.end.min(range.start.saturating_add(span)))
    } else {
        Interval::new(range.start.max(range.end.saturating_sub(span)), range.end)
    }
}
