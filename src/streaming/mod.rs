//! Streaming I/O shared by every command:
//! - gzip-transparent input
//! - zero-allocation region line parsing
//! - buffered report and probe output
//!
//! Inputs are read one line at a time so memory is bounded by the interval
//! store, never by file size.

pub mod buffers;
pub mod input;
pub mod output;
pub mod parsing;

pub use input::{maybe_decompress, open_input};
pub use output::{BedWriter, ProbeHeader, ProbeWriter, PROBE_COLUMNS};
pub use parsing::{parse_region_line, parse_u32_fast, RegionLine};
