//! Design parameters and coordinate conventions.
//!
//! Everything here is a plain value threaded through constructors; nothing is
//! process-global.

use log::warn;

/// Target regions shorter than this are grown to it before design, so that a
/// single-base target is still covered by at least two oligos.
pub const ROUND_SIZE: u32 = 100;
/// Upper bound on the per-base oligo depth.
pub const DEPTH_LIMIT: f32 = 20.0;
pub const DEFAULT_DEPTH: f32 = 2.0;
/// Largest gap a bubble oligo may span between two regions.
pub const BUBBLE_GAP_MAX: u32 = 30;
/// In dynamic mode, regions shorter than this use the minimal oligo length.
pub const SMALL_REGION: u32 = 200;
/// Flank used to fuse nearby target regions.
pub const FLANK_REGION: u32 = 50;
/// Flank used to heal small holes left by the uniqueness database.
pub const FLANK_UNIQ: u32 = 10;
/// Search distance for rescuing targets with no unique overlap.
pub const RESCUE_GAP: u32 = 200;
pub const DEFAULT_OLIGO_LENGTH: u32 = 50;
pub const OLIGO_LENGTH_MIN: u32 = 50;
pub const OLIGO_LENGTH_MAX: u32 = 120;
/// Fixed lengths below this are considered a mistake and raised to the minimum.
pub const OLIGO_LENGTH_FLOOR: u32 = 40;
/// Intervals accumulated beyond the merged size before a store flushes.
pub const DEFAULT_CHUNK: usize = 10_000;

/// How start/end columns of region files are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoordSpace {
    /// BED convention: 0-based start, exclusive end.
    #[default]
    ZeroBased,
    /// 1-based start, inclusive end.
    OneBased,
}

/// Outcome of normalizing one raw coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalized {
    /// Coordinates were already valid for the convention.
    Exact(u32, u32),
    /// A zero-length record was read as a 1-based single base.
    Corrected(u32, u32),
    /// Not representable (a 1-based start of 0).
    Invalid,
}

impl CoordSpace {
    /// Convert a raw `(start, end)` pair (already ordered so that
    /// `start <= end`) to a 0-based half-open interval.
    #[inline]
    pub fn normalize(self, start: u32, end: u32) -> Normalized {
        match self {
            CoordSpace::ZeroBased => {
                if start != end {
                    Normalized::Exact(start, end)
                } else if start == 0 {
                    Normalized::Corrected(0, 1)
                } else {
                    Normalized::Corrected(start - 1, end)
                }
            }
            CoordSpace::OneBased => {
                if start == 0 {
                    Normalized::Invalid
                } else {
                    Normalized::Exact(start - 1, end)
                }
            }
        }
    }
}

/// Oligo length policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OligoLength {
    Fixed(u32),
    /// Short regions use `min`, everything else `max`.
    Dynamic { min: u32, max: u32 },
}

impl OligoLength {
    /// Oligo length for a region (or bridged pair) of the given length.
    #[inline]
    pub fn resolve(&self, region_len: u32) -> u32 {
        match *self {
            OligoLength::Fixed(len) => len,
            OligoLength::Dynamic { min, max } => {
                if region_len < SMALL_REGION {
                    min
                } else {
                    max.min(region_len).max(min)
                }
            }
        }
    }

    /// Shortest region that can be tiled without borrowing bases.
    #[inline]
    pub fn shortest(&self) -> u32 {
        match *self {
            OligoLength::Fixed(len) => len,
            OligoLength::Dynamic { min, .. } => min,
        }
    }

    /// Longest oligo this policy can produce; recorded as `##max_length`.
    #[inline]
    pub fn longest(&self) -> u32 {
        match *self {
            OligoLength::Fixed(len) => len,
            OligoLength::Dynamic { max, .. } => max,
        }
    }
}

/// Parameters of the probe tiler.
#[derive(Debug, Clone, PartialEq)]
pub struct TilerConfig {
    pub oligo_length: OligoLength,
    /// Lower bound for oligo lengths; the dynamic minimum.
    pub min_oligo_length: u32,
    /// Upper bound for oligo lengths; the dynamic maximum and the rescue span.
    pub max_oligo_length: u32,
    /// Desired number of oligos covering each base.
    pub depth: f32,
    /// Design regions that can neither be tiled nor bridged anyway.
    pub force_design: bool,
    pub max_bubble_gap: u32,
}

impl Default for TilerConfig {
    fn default() -> Self {
        Self {
            oligo_length: OligoLength::Fixed(DEFAULT_OLIGO_LENGTH),
            min_oligo_length: OLIGO_LENGTH_MIN,
            max_oligo_length: OLIGO_LENGTH_MAX,
            depth: DEFAULT_DEPTH,
            force_design: false,
            max_bubble_gap: BUBBLE_GAP_MAX,
        }
    }
}

impl TilerConfig {
    /// Build a configuration from raw command-line values.
    ///
    /// `length == 0` selects dynamic mode between `min` and `max` (defaulting
    /// to [`OLIGO_LENGTH_MIN`] and [`OLIGO_LENGTH_MAX`]). In fixed mode the
    /// bounds still clamp `length` in [`TilerConfig::sanitize`].
    pub fn from_args(length: u32, min: Option<u32>, max: Option<u32>, depth: f32) -> Self {
        let min = min.unwrap_or(OLIGO_LENGTH_MIN);
        let max = max.unwrap_or(OLIGO_LENGTH_MAX);
        let oligo_length = if length == 0 {
            OligoLength::Dynamic { min, max }
        } else {
            OligoLength::Fixed(length)
        };
        Self {
            oligo_length,
            min_oligo_length: min,
            max_oligo_length: max,
            depth,
            ..Self::default()
        }
    }

    pub fn with_force_design(mut self, force: bool) -> Self {
        self.force_design = force;
        self
    }

    /// Clamp out-of-range parameters to the nearest usable value, logging a
    /// warning for each correction.
    ///
    /// The bounds are settled first: ordered, the maximum kept within
    /// `[OLIGO_LENGTH_FLOOR, SMALL_REGION]` and the minimum no lower than the
    /// floor. A fixed length is then clamped into the bounds the same way the
    /// command line always did: below the floor it becomes the minimum, above
    /// the maximum it becomes the maximum.
    pub fn sanitize(mut self) -> Self {
        let (mut min, mut max) = (self.min_oligo_length, self.max_oligo_length);
        if min > max {
            warn!("Minimal oligo length {} exceeds maximal {}. Swapped.", min, max);
            std::mem::swap(&mut min, &mut max);
        }
        if max > SMALL_REGION {
            warn!(
                "Maximal oligo length {} is longer than a small region ({}). Force set to {}.",
                max, SMALL_REGION, SMALL_REGION
            );
            max = SMALL_REGION;
        } else if max < OLIGO_LENGTH_FLOOR {
            warn!(
                "Maximal oligo length {} is too short (< {}). Force set to {}.",
                max, OLIGO_LENGTH_FLOOR, OLIGO_LENGTH_FLOOR
            );
            max = OLIGO_LENGTH_FLOOR;
        }
        if min < OLIGO_LENGTH_FLOOR {
            let raised = OLIGO_LENGTH_MIN.min(max);
            warn!(
                "Minimal oligo length {} is too short (< {}). Force set to {}.",
                min, OLIGO_LENGTH_FLOOR, raised
            );
            min = raised;
        }
        self.min_oligo_length = min;
        self.max_oligo_length = max;

        self.oligo_length = match self.oligo_length {
            OligoLength::Fixed(len) if len < OLIGO_LENGTH_FLOOR => {
                warn!(
                    "Oligo length {} is too short (< {}). Force set to {}.",
                    len, OLIGO_LENGTH_FLOOR, min
                );
                OligoLength::Fixed(min)
            }
            OligoLength::Fixed(len) if len > max => {
                warn!(
                    "Oligo length {} is too long (> {}). Force set to {}.",
                    len, max, max
                );
                OligoLength::Fixed(max)
            }
            OligoLength::Fixed(len) => OligoLength::Fixed(len),
            OligoLength::Dynamic { .. } => OligoLength::Dynamic { min, max },
        };

        if self.depth.is_nan() || self.depth <= 0.0 {
            warn!("Depth {} is not usable. Force set to {}.", self.depth, DEFAULT_DEPTH);
            self.depth = DEFAULT_DEPTH;
        } else if self.depth > DEPTH_LIMIT {
            warn!(
                "Depth capped to {}. Usually 2 ~ 4x is enough.",
                DEPTH_LIMIT
            );
            self.depth = DEPTH_LIMIT;
        } else if self.depth < 1.0 {
            warn!("Depth {} is below 1. Force set to 1.", self.depth);
            self.depth = 1.0;
        }
        self
    }
}
