//! Core interval types for genomic region representation.
//!
//! Chromosomes are tracked separately (by [`crate::names::NameTable`] id) so
//! an interval is just two coordinates.

use std::fmt;

/// A 0-based, half-open `[start, end)` range on an implicit chromosome.
///
/// The derived ordering compares `start` then `end`, which is the sort key
/// used by the merger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Interval {
    pub start: u32,
    pub end: u32,
}

impl Interval {
    /// Create a new interval.
    #[inline]
    pub const fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Returns the length of the interval.
    #[inline]
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    /// Returns true if the interval has zero length.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Check if this interval shares at least one base with another.
    #[inline]
    pub fn overlaps(&self, other: &Interval) -> bool {
        self.start < other.end && other.start < self.end
    }

    /// Overlap or adjacency: the two would merge into one interval.
    #[inline]
    pub fn touches(&self, other: &Interval) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    /// Intersection with another interval, if non-empty.
    #[inline]
    pub fn intersect(&self, other: &Interval) -> Option<Interval> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        (start < end).then_some(Interval { start, end })
    }

    /// Bases between two non-overlapping intervals; 0 if they overlap or touch.
    #[inline]
    pub fn distance_to(&self, other: &Interval) -> u32 {
        if self.end <= other.start {
            other.start - self.end
        } else if other.end <= self.start {
            self.start - other.end
        } else {
            0
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\t{}", self.start, self.end)
    }
}

impl From<(u32, u32)> for Interval {
    fn from((start, end): (u32, u32)) -> Self {
        Self { start, end }
    }
}

/// One item of a store's ordered iteration: an interval with its chromosome id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    pub chrom_id: usize,
    pub start: u32,
    pub end: u32,
}

impl Region {
    #[inline]
    pub fn new(chrom_id: usize, start: u32, end: u32) -> Self {
        Self {
            chrom_id,
            start,
            end,
        }
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.end.saturating_sub(self.start)
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    #[inline]
    pub fn interval(&self) -> Interval {
        Interval::new(self.start, self.end)
    }
}
