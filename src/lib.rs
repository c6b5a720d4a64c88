// Clippy allows for the whole crate
#![allow(clippy::too_many_arguments)]
#![allow(clippy::type_complexity)]

//! oligo-tiler: tiled oligo probe design for DNA capture arrays
//!
//! Target regions are read into an [`store::IntervalStore`], reshaped by the
//! transforms in [`transform`] and tiled by [`tiler::ProbeTiler`] against a
//! reference genome.
//!
//! # Features
//!
//! - **Streaming interval store**: bounded memory while reading large BED files
//! - **Uniqueness filtering**: restrict probes to a database of unique ranges
//! - **Bridge probes**: short regions are joined across small gaps
//!
//! # Example
//!
//! ```rust,no_run
//! use oligo_tiler::prelude::*;
//!
//! let mut store = IntervalStore::from_path("targets.bed", CoordSpace::ZeroBased).unwrap();
//! let reference = IndexedFasta::open("genome.fa").unwrap();
//!
//! let mut tiler = ProbeTiler::new(TilerConfig::default(), reference);
//! let probes = tiler.design(&mut store).unwrap();
//! println!("{} probes", probes.len());
//! ```

pub mod commands;
pub mod config;
pub mod error;
pub mod index;
pub mod interval;
pub mod merge;
pub mod names;
pub mod probe;
pub mod reference;
pub mod store;
pub mod streaming;
pub mod tiler;
pub mod transform;

// Re-export commonly used types
pub use error::{Result, TilerError};
pub use interval::{Interval, Region};
pub use probe::ProbeRecord;
pub use store::IntervalStore;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::commands::{DesignCommand, MergeProbesCommand};
    pub use crate::config::{CoordSpace, OligoLength, TilerConfig};
    pub use crate::error::{Result, TilerError};
    pub use crate::index::{RangeDb, UniqIndex};
    pub use crate::interval::{Interval, Region};
    pub use crate::probe::ProbeRecord;
    pub use crate::reference::{IndexedFasta, MemoryReference, SequenceSource};
    pub use crate::store::IntervalStore;
    pub use crate::tiler::ProbeTiler;
    pub use crate::transform::{flank_trim, intersect_with_range_db, round_up};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_basic_workflow() {
        use crate::prelude::*;
        use std::io::Cursor;
        use std::path::Path;

        let content = "chr1\t100\t200\nchr1\t150\t250\nchr1\t300\t400\n";
        let mut store =
            IntervalStore::from_reader(Cursor::new(content), CoordSpace::ZeroBased, Path::new("inline"))
                .unwrap();

        let merged: Vec<Region> = store.regions().collect();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].start, 100);
        assert_eq!(merged[0].end, 250);
    }

    #[test]
    fn test_design_workflow() {
        use crate::prelude::*;

        let contig: Vec<u8> = b"ACGGTCAT".iter().copied().cycle().take(2_000).collect();
        let reference = MemoryReference::new().with_contig("chr1", contig);
        let mut store = IntervalStore::default();
        store.insert("chr1", Interval::new(500, 520));
        round_up(&mut store, 100);
        flank_trim(&mut store, 10, 10);

        let mut tiler = ProbeTiler::new(TilerConfig::default(), reference);
        let probes = tiler.design(&mut store).unwrap();

        // 460-560 holds two 50 bp oligos at depth 2
        assert_eq!(probes.len(), 4);
        assert!(probes.iter().all(|p| p.start >= 460 && p.end <= 560));
    }
}
