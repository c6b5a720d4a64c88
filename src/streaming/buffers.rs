//! Buffer size constants for streaming I/O.
//!
//! These constants control memory usage vs I/O throughput tradeoffs.

/// Default output buffer size (2 MB).
pub const DEFAULT_OUTPUT_BUFFER: usize = 2 * 1024 * 1024;

/// Default input buffer size (256 KB).
pub const DEFAULT_INPUT_BUFFER: usize = 256 * 1024;

/// Default line buffer capacity (1 KB).
/// Sufficient for most region and probe lines.
pub const DEFAULT_LINE_BUFFER: usize = 1024;
