//! Merge-probes command: concatenate probe files under one header.
//!
//! The merged header is the first file's `##` block with `##max_length`
//! raised to the largest value among all inputs, followed by the `##Command`
//! lines of the other files and a `##Merge command` line.

use crate::error::{Result, TilerError};
use crate::streaming::output::PROBE_COLUMNS;
use crate::streaming::parsing::trim_newline;
use crate::streaming::open_input;
use log::{info, warn};
use std::fmt;
use std::io::{BufRead, BufWriter, Write};
use std::path::{Path, PathBuf};

const MAX_LENGTH_TAG: &str = "##max_length=";
const COMMAND_TAG: &str = "##Command=";

/// Merge-probes command configuration.
#[derive(Debug, Clone, Default)]
pub struct MergeProbesCommand {
    pub inputs: Vec<PathBuf>,
    /// Write only the merged header
    pub header_only: bool,
    /// Write only the probe lines
    pub no_header: bool,
    /// Recorded in the `##Merge command` line
    pub command_line: String,
}

/// Statistics from a merge run.
#[derive(Debug, Default, Clone)]
pub struct MergeProbesStats {
    pub files_merged: usize,
    pub files_skipped: usize,
    pub probes: u64,
    pub max_length: u32,
}

impl fmt::Display for MergeProbesStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Files merged: {}, Skipped: {}, Probes: {}, Max length: {}",
            self.files_merged, self.files_skipped, self.probes, self.max_length
        )
    }
}

/// An opened probe file with its header consumed.
struct ProbeInput {
    reader: Box<dyn BufRead>,
    header: Vec<String>,
    /// First body line, read while looking for the end of the header
    first: Option<Vec<u8>>,
    max_length: Option<u32>,
}

impl ProbeInput {
    fn open(path: &Path) -> Result<Self> {
        let mut reader = open_input(path).map_err(|source| TilerError::Open {
            path: path.to_path_buf(),
            source,
        })?;

        let mut header = Vec::new();
        let mut first = None;
        let mut max_length = None;
        let mut line = Vec::new();
        loop {
            line.clear();
            if reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            let text = trim_newline(&line);
            if text.is_empty() {
                continue;
            }
            if !text.starts_with(b"#") {
                first = Some(text.to_vec());
                break;
            }
            let text = String::from_utf8_lossy(text).into_owned();
            if let Some(value) = text.strip_prefix(MAX_LENGTH_TAG) {
                max_length = value.trim().parse().ok();
            }
            header.push(text);
        }

        Ok(Self {
            reader,
            header,
            first,
            max_length,
        })
    }

    /// Copy every remaining probe line to `out`, returning how many.
    fn copy_body<W: Write>(&mut self, out: &mut W) -> Result<u64> {
        let mut count = 0;
        if let Some(first) = self.first.take() {
            out.write_all(&first)?;
            out.write_all(b"\n")?;
            count += 1;
        }
        let mut line = Vec::new();
        loop {
            line.clear();
            if self.reader.read_until(b'\n', &mut line)? == 0 {
                break;
            }
            let text = trim_newline(&line);
            if text.is_empty() || text.starts_with(b"#") {
                continue;
            }
            out.write_all(text)?;
            out.write_all(b"\n")?;
            count += 1;
        }
        Ok(count)
    }
}

impl MergeProbesCommand {
    pub fn new(inputs: Vec<PathBuf>) -> Self {
        Self {
            inputs,
            ..Self::default()
        }
    }

    pub fn with_header_only(mut self, header_only: bool) -> Self {
        self.header_only = header_only;
        self
    }

    pub fn with_no_header(mut self, no_header: bool) -> Self {
        self.no_header = no_header;
        self
    }

    pub fn with_command_line(mut self, command_line: String) -> Self {
        self.command_line = command_line;
        self
    }

    /// Merge all readable inputs into `output`.
    ///
    /// Unreadable inputs are skipped with a warning; fewer than two readable
    /// inputs is an error.
    pub fn run<W: Write>(&self, output: W) -> Result<MergeProbesStats> {
        let mut stats = MergeProbesStats::default();
        let mut files = Vec::with_capacity(self.inputs.len());
        for path in &self.inputs {
            match ProbeInput::open(path) {
                Ok(file) => files.push(file),
                Err(e) => {
                    warn!("{}; skipped", e);
                    stats.files_skipped += 1;
                }
            }
        }
        if files.len() < 2 {
            return Err(TilerError::InvalidFormat(format!(
                "at least two readable probe files are required, got {}",
                files.len()
            )));
        }
        stats.files_merged = files.len();
        stats.max_length = files.iter().filter_map(|f| f.max_length).max().unwrap_or(0);

        let mut out = BufWriter::new(output);
        if !self.no_header {
            self.write_header(&mut out, &files, stats.max_length)?;
        }
        if !self.header_only {
            for file in &mut files {
                stats.probes += file.copy_body(&mut out)?;
            }
        }
        out.flush()?;

        info!("{}", stats);
        Ok(stats)
    }

    fn write_header<W: Write>(
        &self,
        out: &mut W,
        files: &[ProbeInput],
        max_length: u32,
    ) -> Result<()> {
        let (first, rest) = files.split_first().ok_or_else(|| {
            TilerError::InvalidFormat("no probe files to merge".to_string())
        })?;

        for line in first.header.iter().filter(|l| l.starts_with("##")) {
            if line.starts_with(MAX_LENGTH_TAG) {
                writeln!(out, "{}{}", MAX_LENGTH_TAG, max_length)?;
            } else {
                writeln!(out, "{}", line)?;
            }
        }
        for line in rest
            .iter()
            .flat_map(|f| f.header.iter())
            .filter(|l| l.starts_with(COMMAND_TAG))
        {
            writeln!(out, "{}", line)?;
        }
        writeln!(out, "##Merge command={}", self.command_line)?;
        writeln!(out, "{}", PROBE_COLUMNS)?;
        Ok(())
    }
}
