//! Command implementations for oligo-tiler.

pub mod design;
pub mod merge_probes;

pub use design::{DesignCommand, DesignStats};
pub use merge_probes::{MergeProbesCommand, MergeProbesStats};
