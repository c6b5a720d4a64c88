//! Error types shared by every stage of the design pipeline.
//!
//! Only fatal conditions are represented here. Per-line problems during
//! ingestion are reported as [`crate::store::Ingest`] outcomes and never
//! abort a read.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal errors. The binary reports these and exits with status 1.
#[derive(Error, Debug)]
pub enum TilerError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to open {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("{}: parse error at line {line}: {message}", .path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },

    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    #[error("No regions could be read from {}", .0.display())]
    EmptyInput(PathBuf),

    #[error("Reference {}: {message}", .path.display())]
    Reference { path: PathBuf, message: String },

    #[error("Uniqueness database {}: {message}", .path.display())]
    Database { path: PathBuf, message: String },

    #[error("Ambiguous base '{base}' in probe sequence at {chrom}:{start}: {sequence}")]
    AmbiguousBase {
        chrom: String,
        start: u32,
        base: char,
        sequence: String,
    },

    #[error(
        "Bridge design at {chrom}:{start}-{end} requires a region shorter than the oligo length {oligo_length}"
    )]
    BridgePrecondition {
        chrom: String,
        start: u32,
        end: u32,
        oligo_length: u32,
    },

    #[error(
        "Bridge probe at {chrom}:{start}-{end} has {actual} bases, expected {expected} (blocks {blocks})"
    )]
    BridgeLength {
        chrom: String,
        start: u32,
        end: u32,
        expected: u32,
        actual: usize,
        blocks: String,
    },
}

pub type Result<T> = std::result::Result<T, TilerError>;
