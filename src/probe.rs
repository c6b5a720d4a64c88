//! Designed oligo probes.

use crate::error::{Result, TilerError};
use crate::interval::Interval;

/// One designed oligo.
///
/// `blocks` holds one interval for a plain probe and two for a bridge probe
/// whose sequence concatenates both, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeRecord {
    pub chrom: String,
    pub start: u32,
    pub end: u32,
    pub oligo_length: u32,
    /// Upper-cased bases
    pub sequence: Vec<u8>,
    pub blocks: Vec<Interval>,
    pub gc_content: f32,
    /// Fraction of bases soft-masked (lower case) in the reference
    pub repeat_ratio: f32,
    /// 1 for a regular placement, 0 when clamped against a boundary
    pub rank: u8,
}

impl ProbeRecord {
    /// Build a probe from its blocks and the raw reference bases.
    ///
    /// Fails on any base other than `ACGT` in either case.
    pub fn new(
        chrom: &str,
        blocks: Vec<Interval>,
        oligo_length: u32,
        mut sequence: Vec<u8>,
        rank: u8,
    ) -> Result<Self> {
        let start = blocks.first().map_or(0, |b| b.start);
        let end = blocks.last().map_or(0, |b| b.end);

        let repeat_ratio = uppercase_masked(&mut sequence).map_err(|base| {
            TilerError::AmbiguousBase {
                chrom: chrom.to_string(),
                start,
                base: base as char,
                sequence: String::from_utf8_lossy(&sequence).into_owned(),
            }
        })?;
        let gc_content = gc_content(&sequence);

        Ok(Self {
            chrom: chrom.to_string(),
            start,
            end,
            oligo_length,
            sequence,
            blocks,
            gc_content,
            repeat_ratio,
            rank,
        })
    }

    #[inline]
    pub fn is_bridge(&self) -> bool {
        self.blocks.len() > 1
    }
}

/// Upper-case `sequence` in place and return the fraction of bases that were
/// lower case. The first non-nucleotide byte is returned as the error.
pub fn uppercase_masked(sequence: &mut [u8]) -> std::result::Result<f32, u8> {
    let mut masked = 0usize;
    for base in sequence.iter_mut() {
        match *base {
            b'A' | b'C' | b'G' | b'T' => {}
            b'a' | b'c' | b'g' | b't' => {
                masked += 1;
                base.make_ascii_uppercase();
            }
            other => return Err(other),
        }
    }
    Ok(ratio(masked, sequence.len()))
}

/// Fraction of `G`/`C` bases (either case).
pub fn gc_content(sequence: &[u8]) -> f32 {
    let gc = sequence
        .iter()
        .filter(|b| matches!(b, b'G' | b'C' | b'g' | b'c'))
        .count();
    ratio(gc, sequence.len())
}

#[inline]
fn ratio(count: usize, total: usize) -> f32 {
    if total == 0 {
        0.0
    } else {
        count as f32 / total as f32
    }
}
