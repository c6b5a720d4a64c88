//! Per-chromosome interval store with bounded-memory streaming ingestion.
//!
//! Raw intervals are appended to a bucket per chromosome. Whenever the number
//! of held intervals exceeds the last merged size by a chunk, every dirty
//! bucket is sorted and merged, so memory tracks the size of the merged
//! output rather than the size of the input file.

use crate::config::{CoordSpace, Normalized, DEFAULT_CHUNK};
use crate::error::{Result, TilerError};
use crate::interval::{Interval, Region};
use crate::merge::merge_in_place;
use crate::names::NameTable;
use crate::streaming::buffers::DEFAULT_LINE_BUFFER;
use crate::streaming::input::open_input;
use crate::streaming::output::BedWriter;
use crate::streaming::parsing::{parse_region_line, RegionLine};
use log::{debug, warn};
use std::io::{BufRead, Write};
use std::path::Path;

/// Why an input line was not stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Comment,
    Blank,
    Malformed(&'static str),
}

/// Outcome of ingesting one line or record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingest {
    Added,
    /// Stored after correcting a zero-length record in 0-based mode.
    Corrected,
    Skipped(SkipReason),
}

/// Line counters collected while reading a region file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub lines: usize,
    pub added: usize,
    pub corrected: usize,
    pub comments: usize,
    pub blank: usize,
    pub malformed: usize,
}

impl IngestStats {
    fn record(&mut self, outcome: Ingest) {
        self.lines += 1;
        match outcome {
            Ingest::Added => self.added += 1,
            Ingest::Corrected => {
                self.added += 1;
                self.corrected += 1;
            }
            Ingest::Skipped(SkipReason::Comment) => self.comments += 1,
            Ingest::Skipped(SkipReason::Blank) => self.blank += 1,
            Ingest::Skipped(SkipReason::Malformed(_)) => self.malformed += 1,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct ChromBucket {
    /// Merged intervals, followed by raw appends while `dirty`
    intervals: Vec<Interval>,
    merged_length: u64,
    dirty: bool,
}

/// Interval store keyed by chromosome name.
#[derive(Debug, Clone)]
pub struct IntervalStore {
    names: NameTable,
    /// Buckets indexed by name id
    buckets: Vec<ChromBucket>,
    coords: CoordSpace,
    regions_raw: u64,
    length_raw: u64,
    regions: u64,
    length: u64,
    /// Intervals currently held across all buckets
    held: usize,
    chunk_size: usize,
    flush_threshold: usize,
}

impl Default for IntervalStore {
    fn default() -> Self {
        Self::new(CoordSpace::default())
    }
}

impl IntervalStore {
    /// Create an empty store reading coordinates in the given convention.
    pub fn new(coords: CoordSpace) -> Self {
        Self {
            names: NameTable::new(),
            buckets: Vec::new(),
            coords,
            regions_raw: 0,
            length_raw: 0,
            regions: 0,
            length: 0,
            held: 0,
            chunk_size: DEFAULT_CHUNK,
            flush_threshold: DEFAULT_CHUNK,
        }
    }

    /// Set how many intervals may accumulate beyond the merged size before a
    /// flush.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self.flush_threshold = self.held + self.chunk_size;
        self
    }

    /// Read a whole region file (plain or gzip-compressed).
    pub fn from_path<P: AsRef<Path>>(path: P, coords: CoordSpace) -> Result<Self> {
        let mut store = Self::new(coords);
        store.read_path(path)?;
        Ok(store)
    }

    /// Read every record from an already opened source.
    pub fn from_reader<R: BufRead>(reader: R, coords: CoordSpace, source: &Path) -> Result<Self> {
        let mut store = Self::new(coords);
        store.read_from(reader, source)?;
        Ok(store)
    }

    /// Append every record of a region file to this store.
    pub fn read_path<P: AsRef<Path>>(&mut self, path: P) -> Result<IngestStats> {
        let path = path.as_ref();
        let reader = open_input(path).map_err(|source| TilerError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        self.read_from(reader, path)
    }

    /// Append every record from `reader`. `source` names the input in logs.
    pub fn read_from<R: BufRead>(&mut self, mut reader: R, source: &Path) -> Result<IngestStats> {
        let mut stats = IngestStats::default();
        let mut line = Vec::with_capacity(DEFAULT_LINE_BUFFER);

        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            let outcome = self.ingest_line(&line);
            stats.record(outcome);

            match outcome {
                Ingest::Added => {}
                Ingest::Corrected => warn!(
                    "{}:{}: zero-length region looks 1-based, converted to 0-based",
                    source.display(),
                    stats.lines
                ),
                Ingest::Skipped(SkipReason::Blank) => {
                    warn!("{}:{}: empty line skipped", source.display(), stats.lines)
                }
                Ingest::Skipped(SkipReason::Malformed(why)) => warn!(
                    "{}:{}: malformed line skipped ({})",
                    source.display(),
                    stats.lines,
                    why
                ),
                Ingest::Skipped(SkipReason::Comment) => {}
            }
        }

        debug!(
            "{}: {} lines, {} regions, {} skipped",
            source.display(),
            stats.lines,
            stats.added,
            stats.lines - stats.added
        );
        Ok(stats)
    }

    /// Parse and store one text line.
    pub fn ingest_line(&mut self, line: &[u8]) -> Ingest {
        match parse_region_line(line) {
            RegionLine::Record { chrom, start, end } => self.ingest(chrom, start, end),
            RegionLine::Comment => Ingest::Skipped(SkipReason::Comment),
            RegionLine::Blank => Ingest::Skipped(SkipReason::Blank),
            RegionLine::Malformed(why) => Ingest::Skipped(SkipReason::Malformed(why)),
        }
    }

    /// Store one record given in this store's coordinate convention.
    ///
    /// Reversed coordinates are swapped before conversion.
    pub fn ingest(&mut self, chrom: &str, start: u32, end: u32) -> Ingest {
        let (start, end) = if end < start { (end, start) } else { (start, end) };

        let (interval, outcome) = match self.coords.normalize(start, end) {
            Normalized::Exact(s, e) => (Interval::new(s, e), Ingest::Added),
            Normalized::Corrected(s, e) => (Interval::new(s, e), Ingest::Corrected),
            Normalized::Invalid => {
                return Ingest::Skipped(SkipReason::Malformed("1-based start of 0"))
            }
        };

        self.insert(chrom, interval);
        outcome
    }

    /// Store an already-normalized 0-based interval.
    pub fn insert(&mut self, chrom: &str, interval: Interval) {
        let id = self.names.intern(chrom);
        if id == self.buckets.len() {
            self.buckets.push(ChromBucket::default());
        }

        let bucket = &mut self.buckets[id];
        bucket.intervals.push(interval);
        bucket.dirty = true;

        self.regions_raw += 1;
        self.length_raw += interval.len() as u64;
        self.held += 1;

        self.maybe_flush();
    }

    /// Merge everything once enough raw intervals have piled up.
    fn maybe_flush(&mut self) {
        if self.held >= self.flush_threshold {
            self.merge();
            self.flush_threshold = self.regions as usize + self.chunk_size;
            debug!(
                "Flushed interval store: {} merged regions, next flush at {}",
                self.regions, self.flush_threshold
            );
        }
    }

    /// Sort and merge every dirty bucket, then refresh the aggregates.
    ///
    /// Idempotent: buckets without new intervals are left untouched.
    pub fn merge(&mut self) {
        for bucket in self.buckets.iter_mut().filter(|b| b.dirty) {
            bucket.merged_length = merge_in_place(&mut bucket.intervals);
            bucket.dirty = false;
        }
        self.recount();
    }

    fn recount(&mut self) {
        self.held = self.buckets.iter().map(|b| b.intervals.len()).sum();
        self.regions = self.held as u64;
        self.length = self.buckets.iter().map(|b| b.merged_length).sum();
    }

    /// Merged regions in chromosome first-seen order, ascending within a
    /// chromosome. Each call merges pending data and restarts from the top.
    pub fn regions(&mut self) -> RegionIter<'_> {
        self.merge();
        self.iter()
    }

    /// Iterate without merging; yields the merged view only after
    /// [`merge`](Self::merge).
    pub fn iter(&self) -> RegionIter<'_> {
        RegionIter {
            buckets: &self.buckets,
            chrom: 0,
            idx: 0,
        }
    }

    /// Chromosome ids in first-seen order.
    pub fn chrom_ids(&self) -> std::ops::Range<usize> {
        0..self.buckets.len()
    }

    #[inline]
    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.names.lookup(name)
    }

    #[inline]
    pub fn name(&self, id: usize) -> Option<&str> {
        self.names.name(id)
    }

    pub fn names(&self) -> &NameTable {
        &self.names
    }

    /// Intervals of one chromosome. Merged unless records were added since
    /// the last [`merge`](Self::merge).
    pub fn intervals(&self, id: usize) -> &[Interval] {
        self.buckets
            .get(id)
            .map(|b| b.intervals.as_slice())
            .unwrap_or(&[])
    }

    /// Replace the intervals of one chromosome; the bucket is re-merged on
    /// the next merge pass.
    pub(crate) fn replace_intervals(&mut self, id: usize, intervals: Vec<Interval>) {
        if let Some(bucket) = self.buckets.get_mut(id) {
            bucket.intervals = intervals;
            bucket.dirty = true;
        }
    }

    /// An empty store sharing this store's names and convention.
    pub(crate) fn empty_like(&self) -> Self {
        let mut store = Self::new(self.coords).with_chunk_size(self.chunk_size);
        for name in self.names.names() {
            store.names.intern(name);
            store.buckets.push(ChromBucket::default());
        }
        store
    }

    pub fn coords(&self) -> CoordSpace {
        self.coords
    }

    /// Number of merged regions (valid after a merge).
    pub fn region_count(&self) -> u64 {
        self.regions
    }

    /// Total merged length (valid after a merge).
    pub fn total_length(&self) -> u64 {
        self.length
    }

    /// Records ingested before any merge.
    pub fn raw_region_count(&self) -> u64 {
        self.regions_raw
    }

    /// Summed length of ingested records before any merge.
    pub fn raw_length(&self) -> u64 {
        self.length_raw
    }

    pub fn is_empty(&self) -> bool {
        self.held == 0
    }

    /// Write the merged view as BED3.
    pub fn write_bed<W: Write>(&mut self, output: W) -> Result<()> {
        self.merge();
        let mut writer = BedWriter::new(output);
        for id in self.chrom_ids() {
            let chrom = self.names.name(id).unwrap_or_default().as_bytes();
            for interval in &self.buckets[id].intervals {
                writer.write_bed3_line(chrom, interval.start, interval.end)?;
            }
        }
        writer.flush()
    }
}

/// Ordered iterator over a merged store.
pub struct RegionIter<'a> {
    buckets: &'a [ChromBucket],
    chrom: usize,
    idx: usize,
}

impl Iterator for RegionIter<'_> {
    type Item = Region;

    fn next(&mut self) -> Option<Region> {
        loop {
            let bucket = self.buckets.get(self.chrom)?;
            if let Some(interval) = bucket.intervals.get(self.idx) {
                self.idx += 1;
                return Some(Region::new(self.chrom, interval.start, interval.end));
            }
            self.chrom += 1;
            self.idx = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::is_merged;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};

    fn store_from(content: &str) -> IntervalStore {
        let mut store = IntervalStore::new(CoordSpace::ZeroBased);
        store
            .read_from(content.as_bytes(), Path::new("test.bed"))
            .unwrap();
        store
    }

    #[test]
    fn test_overlapping_records_merge() {
        let mut store = store_from("chr1\t100\t200\nchr1\t190\t300\n");
        let regions: Vec<Region> = store.regions().collect();

        assert_eq!(regions, vec![Region::new(0, 100, 300)]);
        assert_eq!(store.region_count(), 1);
        assert_eq!(store.total_length(), 200);
        assert_eq!(store.raw_region_count(), 2);
        assert_eq!(store.raw_length(), 210);
    }

    #[test]
    fn test_first_seen_chromosome_order() {
        let mut store = store_from("chr2\t10\t20\nchr1\t5\t9\nchr2\t1\t3\n");
        let regions: Vec<Region> = store.regions().collect();

        assert_eq!(
            regions,
            vec![
                Region::new(0, 1, 3),
                Region::new(0, 10, 20),
                Region::new(1, 5, 9)
            ]
        );
        assert_eq!(store.name(0), Some("chr2"));
        assert_eq!(store.lookup("chr1"), Some(1));
        assert_eq!(store.lookup("chr3"), None);
        assert_eq!(store.chrom_ids().collect::<Vec<_>>(), vec![0, 1]);
    }

    #[test]
    fn test_ingest_outcomes() {
        let mut store = IntervalStore::new(CoordSpace::ZeroBased);

        assert_eq!(store.ingest_line(b"chr1\t100\t200"), Ingest::Added);
        assert_eq!(store.ingest_line(b"chr1\t300\t300"), Ingest::Corrected);
        assert_eq!(
            store.ingest_line(b"# header"),
            Ingest::Skipped(SkipReason::Comment)
        );
        assert_eq!(store.ingest_line(b""), Ingest::Skipped(SkipReason::Blank));
        assert!(matches!(
            store.ingest_line(b"chr1"),
            Ingest::Skipped(SkipReason::Malformed(_))
        ));

        store.merge();
        assert_eq!(
            store.intervals(0),
            &[Interval::new(100, 200), Interval::new(299, 300)]
        );
    }

    #[test]
    fn test_reversed_coordinates_swapped() {
        let mut store = IntervalStore::new(CoordSpace::ZeroBased);
        store.ingest("chr1", 500, 400);
        store.merge();

        assert_eq!(store.intervals(0), &[Interval::new(400, 500)]);
    }

    #[test]
    fn test_one_based_convention() {
        let mut store = IntervalStore::new(CoordSpace::OneBased);
        store
            .read_from(&b"chr1\t1\t100\nchr1\t150\nchr1\t0\t5\n"[..], Path::new("t"))
            .unwrap();
        store.merge();

        assert_eq!(
            store.intervals(0),
            &[Interval::new(0, 100), Interval::new(149, 150)]
        );
    }

    #[test]
    fn test_read_stats() {
        let mut store = IntervalStore::new(CoordSpace::ZeroBased);
        let stats = store
            .read_from(
                &b"#c\nchr1\t1\t5\n\nchr1\tx\nchr1\t7\t7\n"[..],
                Path::new("t"),
            )
            .unwrap();

        assert_eq!(stats.lines, 5);
        assert_eq!(stats.added, 2);
        assert_eq!(stats.corrected, 1);
        assert_eq!(stats.comments, 1);
        assert_eq!(stats.blank, 1);
        assert_eq!(stats.malformed, 1);
    }

    #[test]
    fn test_merge_idempotent() {
        let mut store = store_from("chr1\t1\t10\nchr1\t5\t20\nchr1\t30\t40\n");
        store.merge();
        let first: Vec<Region> = store.regions().collect();
        let length = store.total_length();
        store.merge();

        assert_eq!(store.regions().collect::<Vec<_>>(), first);
        assert_eq!(store.total_length(), length);
    }

    #[test]
    fn test_iteration_restarts_after_new_data() {
        let mut store = store_from("chr1\t1\t10\n");
        assert_eq!(store.regions().count(), 1);

        store.ingest("chr1", 50, 60);
        assert_eq!(store.regions().count(), 2);
        assert_eq!(store.regions().count(), 2);
    }

    #[test]
    fn test_chunked_flush_matches_single_merge() {
        let mut rng = SmallRng::seed_from_u64(42);
        let mut chunked = IntervalStore::new(CoordSpace::ZeroBased).with_chunk_size(16);
        let mut whole = IntervalStore::new(CoordSpace::ZeroBased).with_chunk_size(usize::MAX);

        for _ in 0..5_000 {
            let chrom = if rng.gen_bool(0.5) { "chr1" } else { "chr2" };
            let start = rng.gen_range(0..50_000);
            let end = start + rng.gen_range(1..200);
            chunked.ingest(chrom, start, end);
            whole.ingest(chrom, start, end);
        }

        let a: Vec<Region> = chunked.regions().collect();
        let b: Vec<Region> = whole.regions().collect();
        assert_eq!(a, b);
        assert_eq!(chunked.total_length(), whole.total_length());
        assert_eq!(chunked.raw_region_count(), 5_000);
        assert_eq!(chunked.raw_length(), whole.raw_length());
        for id in chunked.chrom_ids() {
            assert!(is_merged(chunked.intervals(id)));
        }
    }

    #[test]
    fn test_flush_bounds_held_intervals() {
        let mut store = IntervalStore::new(CoordSpace::ZeroBased).with_chunk_size(100);
        // Heavily redundant input collapses to one region per flush
        for i in 0..10_000u32 {
            store.ingest("chr1", i % 50, 1_000);
            assert!(store.held <= 101);
        }
        store.merge();
        assert_eq!(store.intervals(0), &[Interval::new(0, 1_000)]);
    }

    #[test]
    fn test_clone_is_independent() {
        let mut store = store_from("chr1\t1\t10\n");
        let mut copy = store.clone();
        copy.ingest("chr1", 100, 200);

        assert_eq!(store.regions().count(), 1);
        assert_eq!(copy.regions().count(), 2);
    }

    #[test]
    fn test_write_bed() {
        let mut store = store_from("chr2\t5\t9\nchr1\t1\t3\nchr2\t8\t12\n");
        let mut out = Vec::new();
        store.write_bed(&mut out).unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), "chr2\t5\t12\nchr1\t1\t3\n");
    }
}
