//! Range database queries for the uniqueness filter.
//!
//! The design pipeline only needs two questions answered: which allowed
//! ranges overlap a target, and which allowed range lies nearest to it.
//! [`RangeDb`] captures that; [`UniqIndex`] answers it from sorted, merged
//! per-chromosome lists with binary search.

use crate::config::CoordSpace;
use crate::error::{Result, TilerError};
use crate::interval::Interval;
use crate::store::IntervalStore;
use log::{info, warn};
use rustc_hash::FxHashMap;
use std::path::Path;

/// A queryable set of allowed ranges.
pub trait RangeDb {
    /// Ranges sharing at least one base with `[start, end)`, ascending.
    fn overlapping(&self, chrom: &str, start: u32, end: u32) -> Vec<Interval>;

    /// The range closest to `[start, end)` whose gap to it is at most
    /// `max_distance`. On a tie the upstream range wins.
    fn nearest(&self, chrom: &str, start: u32, end: u32, max_distance: u32) -> Option<Interval>;
}

/// In-memory range database.
#[derive(Debug, Clone, Default)]
pub struct UniqIndex {
    /// Merged, sorted ranges per chromosome
    ranges_by_chrom: FxHashMap<String, Vec<Interval>>,
}

impl UniqIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a store; the store is merged first.
    pub fn from_store(store: &mut IntervalStore) -> Self {
        store.merge();
        let ranges_by_chrom = store
            .chrom_ids()
            .filter_map(|id| {
                let name = store.name(id)?;
                let ranges = store.intervals(id);
                (!ranges.is_empty()).then(|| (name.to_string(), ranges.to_vec()))
            })
            .collect();
        Self { ranges_by_chrom }
    }

    /// Load a BED file (plain or gzip-compressed) of allowed ranges.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut store = IntervalStore::from_path(path, CoordSpace::ZeroBased).map_err(|e| {
            TilerError::Database {
                path: path.to_path_buf(),
                message: e.to_string(),
            }
        })?;

        let index = Self::from_store(&mut store);
        if index.is_empty() {
            warn!(
                "Uniqueness database {} holds no ranges; every target will be dropped",
                path.display()
            );
        } else {
            info!(
                "Loaded {} unique ranges ({} bp) from {}",
                store.region_count(),
                store.total_length(),
                path.display()
            );
        }
        Ok(index)
    }

    /// Ranges of one chromosome.
    pub fn get_chrom(&self, chrom: &str) -> Option<&[Interval]> {
        self.ranges_by_chrom.get(chrom).map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.ranges_by_chrom.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges_by_chrom.values().all(Vec::is_empty)
    }
}

impl RangeDb for UniqIndex {
    fn overlapping(&self, chrom: &str, start: u32, end: u32) -> Vec<Interval> {
        let Some(ranges) = self.get_chrom(chrom) else {
            return Vec::new();
        };
        let query = Interval::new(start, end);

        // Merged ranges are sorted on both ends
        let first = ranges.partition_point(|r| r.end <= start);
        ranges[first..]
            .iter()
            .take_while(|r| r.start < end)
            .filter(|r| r.overlaps(&query))
            .copied()
            .collect()
    }

    fn nearest(&self, chrom: &str, start: u32, end: u32, max_distance: u32) -> Option<Interval> {
        let ranges = self.get_chrom(chrom)?;
        let query = Interval::new(start, end);

        let first = ranges.partition_point(|r| r.end <= start);
        if let Some(hit) = ranges.get(first).filter(|r| r.overlaps(&query)) {
            return Some(*hit);
        }

        let upstream = first.checked_sub(1).and_then(|i| ranges.get(i));
        let downstream = ranges.get(first);

        let best = match (upstream, downstream) {
            (Some(up), Some(down)) => {
                if query.distance_to(down) < query.distance_to(up) {
                    down
                } else {
                    up
                }
            }
            (Some(only), None) | (None, Some(only)) => only,
            (None, None) => return None,
        };

        (query.distance_to(best) <= max_distance).then_some(*best)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_index() -> UniqIndex {
        let mut store = IntervalStore::default();
        store.ingest("chr1", 100, 200);
        store.ingest("chr1", 150, 250);
        store.ingest("chr1", 300, 400);
        store.ingest("chr2", 100, 200);
        UniqIndex::from_store(&mut store)
    }

    #[test]
    fn test_build_index() {
        let index = sample_index();

        assert_eq!(index.len(), 3);
        assert_eq!(
            index.get_chrom("chr1"),
            Some(&[Interval::new(100, 250), Interval::new(300, 400)][..])
        );
    }

    #[test]
    fn test_overlapping() {
        let index = sample_index();

        assert_eq!(
            index.overlapping("chr1", 200, 350),
            vec![Interval::new(100, 250), Interval::new(300, 400)]
        );
        assert_eq!(index.overlapping("chr1", 250, 300), vec![]);
        assert_eq!(index.overlapping("chr3", 100, 200), vec![]);
    }

    #[test]
    fn test_nearest_within_distance() {
        let index = sample_index();

        // 40 bases after the first range, 10 before the second
        assert_eq!(
            index.nearest("chr1", 290, 295, 50),
            Some(Interval::new(300, 400))
        );
        assert_eq!(index.nearest("chr1", 500, 510, 50), None);
        assert_eq!(
            index.nearest("chr1", 500, 510, 100),
            Some(Interval::new(300, 400))
        );
    }

    #[test]
    fn test_nearest_tie_prefers_upstream() {
        let index = sample_index();

        assert_eq!(
            index.nearest("chr1", 270, 280, 30),
            Some(Interval::new(100, 250))
        );
    }

    #[test]
    fn test_nearest_returns_overlap() {
        let index = sample_index();

        assert_eq!(
            index.nearest("chr2", 150, 160, 0),
            Some(Interval::new(100, 200))
        );
        assert_eq!(index.nearest("chrX", 150, 160, 1_000), None);
    }

    #[test]
    fn test_missing_database_file() {
        let err = UniqIndex::from_path("/nonexistent/uniq.bed").unwrap_err();
        assert!(matches!(err, TilerError::Database { .. }));
    }
}
