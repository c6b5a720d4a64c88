//! Reference sequence access.
//!
//! [`IndexedFasta`] memory-maps an uncompressed FASTA and locates bases with
//! its samtools-style `.fai` index, building the index when it is missing.
//! Case is preserved so soft-masked repeats stay visible to the tiler.

use crate::error::{Result, TilerError};
use log::{info, warn};
use memchr::memchr;
use memmap2::Mmap;
use rustc_hash::FxHashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Source of genomic sequence.
pub trait SequenceSource {
    /// Bases of `[start, end)` (0-based, half-open) on `chrom`.
    ///
    /// Fewer bases are returned when the range runs past the contig end; an
    /// unknown contig yields an empty vector.
    fn fetch(&self, chrom: &str, start: u32, end: u32) -> Result<Vec<u8>>;
}

/// One `.fai` line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaiEntry {
    pub length: u64,
    /// Byte offset of the first base
    pub offset: u64,
    pub line_bases: u64,
    /// Bytes per line including the terminator
    pub line_bytes: u64,
}

/// Memory-mapped FASTA with a `.fai` index.
pub struct IndexedFasta {
    path: PathBuf,
    data: Mmap,
    index: FxHashMap<String, FaiEntry>,
    /// Contig names in file order
    names: Vec<String>,
}

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// `<fasta>.fai`
pub fn fai_path(fasta: &Path) -> PathBuf {
    let mut path = fasta.as_os_str().to_owned();
    path.push(".fai");
    PathBuf::from(path)
}

impl IndexedFasta {
    /// Open a FASTA, loading `<path>.fai` or building it if absent.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reference_error = |message: String| TilerError::Reference {
            path: path.to_path_buf(),
            message,
        };

        let file = File::open(path).map_err(|e| reference_error(e.to_string()))?;
        // The map is read-only and lives as long as the reader
        let data = unsafe { Mmap::map(&file) }.map_err(|e| reference_error(e.to_string()))?;

        if data.starts_with(&GZIP_MAGIC) {
            return Err(reference_error(
                "compressed FASTA is not supported, decompress it first".to_string(),
            ));
        }

        let index_path = fai_path(path);
        let entries = if index_path.exists() {
            read_fai(&index_path)?
        } else {
            info!("Building FASTA index {}", index_path.display());
            let entries = build_fai(&data).map_err(reference_error)?;
            if let Err(e) = write_fai(&index_path, &entries) {
                warn!(
                    "Could not write FASTA index {}: {}; keeping it in memory",
                    index_path.display(),
                    e
                );
            }
            entries
        };

        if entries.is_empty() {
            return Err(reference_error("no sequences found".to_string()));
        }

        let mut index = FxHashMap::default();
        let mut names = Vec::with_capacity(entries.len());
        for (name, entry) in entries {
            names.push(name.clone());
            index.insert(name, entry);
        }

        Ok(Self {
            path: path.to_path_buf(),
            data,
            index,
            names,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn contig_len(&self, chrom: &str) -> Option<u64> {
        self.index.get(chrom).map(|e| e.length)
    }

    pub fn contigs(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl SequenceSource for IndexedFasta {
    fn fetch(&self, chrom: &str, start: u32, end: u32) -> Result<Vec<u8>> {
        let Some(entry) = self.index.get(chrom) else {
            return Ok(Vec::new());
        };
        let end = u64::from(end).min(entry.length);
        let mut pos = u64::from(start);
        let mut out = Vec::with_capacity(end.saturating_sub(pos) as usize);

        // Copy whole line segments at a time
        while pos < end {
            let row = pos / entry.line_bases;
            let col = pos % entry.line_bases;
            let take = (entry.line_bases - col).min(end - pos);
            let at = (entry.offset + row * entry.line_bytes + col) as usize;
            match self.data.get(at..at + take as usize) {
                Some(chunk) => out.extend_from_slice(chunk),
                None => break,
            }
            pos += take;
        }
        Ok(out)
    }
}

/// Scan a FASTA and compute its index entries in file order.
pub fn build_fai(data: &[u8]) -> std::result::Result<Vec<(String, FaiEntry)>, String> {
    let mut entries: Vec<(String, FaiEntry)> = Vec::new();
    let mut current: Option<(String, FaiEntry)> = None;
    let mut saw_short_line = false;
    let mut offset = 0usize;
    let mut line_no = 0usize;

    while offset < data.len() {
        let line_end = memchr(b'\n', &data[offset..]).map_or(data.len(), |i| offset + i + 1);
        let raw = &data[offset..line_end];
        let line = crate::streaming::parsing::trim_newline(raw);
        line_no += 1;

        if let Some(header) = line.strip_prefix(b">") {
            entries.extend(current.take());
            let name = header
                .split(|b| b.is_ascii_whitespace())
                .next()
                .filter(|n| !n.is_empty())
                .ok_or_else(|| format!("line {}: header without a name", line_no))?;
            let name = String::from_utf8_lossy(name).into_owned();
            current = Some((
                name,
                FaiEntry {
                    length: 0,
                    offset: line_end as u64,
                    line_bases: 0,
                    line_bytes: 0,
                },
            ));
            saw_short_line = false;
        } else if !line.is_empty() {
            let Some((_, entry)) = current.as_mut() else {
                return Err(format!("line {}: sequence before the first header", line_no));
            };
            let bases = line.len() as u64;
            if entry.line_bases == 0 {
                entry.offset = offset as u64;
                entry.line_bases = bases;
                entry.line_bytes = raw.len() as u64;
            } else if bases > entry.line_bases || (saw_short_line && bases == entry.line_bases) {
                return Err(format!("line {}: inconsistent line length", line_no));
            } else if bases < entry.line_bases {
                saw_short_line = true;
            }
            entry.length += bases;
        }

        offset = line_end;
    }
    entries.extend(current);
    Ok(entries)
}

fn read_fai(path: &Path) -> Result<Vec<(String, FaiEntry)>> {
    let file = File::open(path).map_err(|source| TilerError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_error = |line: usize, message: String| TilerError::Parse {
        path: path.to_path_buf(),
        line,
        message,
    };

    let mut entries = Vec::new();
    for (i, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 5 {
            return Err(parse_error(i + 1, "expected 5 tab-separated fields".to_string()));
        }
        let mut numbers = [0u64; 4];
        for (slot, col) in numbers.iter_mut().zip(&cols[1..5]) {
            *slot = col
                .parse()
                .map_err(|e| parse_error(i + 1, format!("invalid number '{}': {}", col, e)))?;
        }
        let [length, offset, line_bases, line_bytes] = numbers;
        // A record without sequence lines has zero width
        let empty_record = length == 0 && line_bases == 0 && line_bytes == 0;
        if !empty_record && (line_bases == 0 || line_bytes < line_bases) {
            return Err(parse_error(i + 1, "invalid line width".to_string()));
        }
        entries.push((
            cols[0].to_string(),
            FaiEntry {
                length,
                offset,
                line_bases,
                line_bytes,
            },
        ));
    }
    Ok(entries)
}

fn write_fai(path: &Path, entries: &[(String, FaiEntry)]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for (name, e) in entries {
        writeln!(
            writer,
            "{}\t{}\t{}\t{}\t{}",
            name, e.length, e.offset, e.line_bases, e.line_bytes
        )?;
    }
    writer.flush()
}

/// In-memory reference, keyed by contig name.
#[derive(Debug, Clone, Default)]
pub struct MemoryReference {
    contigs: FxHashMap<String, Vec<u8>>,
}

impl MemoryReference {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chrom: &str, sequence: impl Into<Vec<u8>>) {
        self.contigs.insert(chrom.to_string(), sequence.into());
    }

    pub fn with_contig(mut self, chrom: &str, sequence: impl Into<Vec<u8>>) -> Self {
        self.insert(chrom, sequence);
        self
    }
}

impl SequenceSource for MemoryReference {
    fn fetch(&self, chrom: &str, start: u32, end: u32) -> Result<Vec<u8>> {
        let Some(seq) = self.contigs.get(chrom) else {
            return Ok(Vec::new());
        };
        let end = (end as usize).min(seq.len());
        let start = (start as usize).min(end);
        Ok(seq[start..end].to_vec())
    }
}

impl<S: SequenceSource + ?Sized> SequenceSource for &S {
    fn fetch(&self, chrom: &str, start: u32, end: u32) -> Result<Vec<u8>> {
        (**self).fetch(chrom, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const FASTA: &str = ">chr1 description\nACGTACGTAC\nGTacgtACGT\nAC\n>chr2\nGGGG\nCC\n";

    fn write_fasta(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("ref.fa");
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_build_fai() {
        let entries = build_fai(FASTA.as_bytes()).unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "chr1");
        assert_eq!(
            entries[0].1,
            FaiEntry {
                length: 22,
                offset: 18,
                line_bases: 10,
                line_bytes: 11
            }
        );
        assert_eq!(entries[1].0, "chr2");
        assert_eq!(entries[1].1.length, 6);
        assert_eq!(entries[1].1.offset, 49);
    }

    #[test]
    fn test_build_fai_rejects_ragged_lines() {
        assert!(build_fai(b">c\nACGT\nAC\nACGT\n").is_err());
        assert!(build_fai(b"ACGT\n>c\nACGT\n").is_err());
    }

    #[test]
    fn test_fetch_across_lines() {
        let dir = TempDir::new().unwrap();
        let path = write_fasta(&dir, FASTA);
        let fasta = IndexedFasta::open(&path).unwrap();

        assert_eq!(fasta.fetch("chr1", 0, 4).unwrap(), b"ACGT");
        assert_eq!(fasta.fetch("chr1", 8, 16).unwrap(), b"ACGTacgt");
        assert_eq!(fasta.fetch("chr2", 2, 6).unwrap(), b"GGCC");
        assert_eq!(fasta.contig_len("chr1"), Some(22));
        assert_eq!(fasta.contigs().collect::<Vec<_>>(), vec!["chr1", "chr2"]);
    }

    #[test]
    fn test_fetch_short_and_unknown() {
        let dir = TempDir::new().unwrap();
        let path = write_fasta(&dir, FASTA);
        let fasta = IndexedFasta::open(&path).unwrap();

        assert_eq!(fasta.fetch("chr1", 18, 30).unwrap(), b"GTAC");
        assert!(fasta.fetch("chr1", 40, 50).unwrap().is_empty());
        assert!(fasta.fetch("chrUn", 0, 10).unwrap().is_empty());
    }

    #[test]
    fn test_index_written_and_reused() {
        let dir = TempDir::new().unwrap();
        let path = write_fasta(&dir, FASTA);
        IndexedFasta::open(&path).unwrap();

        let fai = fs::read_to_string(fai_path(&path)).unwrap();
        assert_eq!(fai, "chr1\t22\t18\t10\t11\nchr2\t6\t49\t4\t5\n");

        let reopened = IndexedFasta::open(&path).unwrap();
        assert_eq!(reopened.fetch("chr2", 0, 6).unwrap(), b"GGGGCC");
    }

    #[test]
    fn test_empty_record_index_reused() {
        let dir = TempDir::new().unwrap();
        let path = write_fasta(&dir, ">empty\n>chr1\nACGTACGTAC\n");
        IndexedFasta::open(&path).unwrap();

        let fai = fs::read_to_string(fai_path(&path)).unwrap();
        assert_eq!(fai, "empty\t0\t7\t0\t0\nchr1\t10\t13\t10\t11\n");

        let reopened = IndexedFasta::open(&path).unwrap();
        assert_eq!(reopened.contig_len("empty"), Some(0));
        assert!(reopened.fetch("empty", 0, 10).unwrap().is_empty());
        assert_eq!(reopened.fetch("chr1", 2, 6).unwrap(), b"GTAC");
    }

    #[test]
    fn test_zero_width_with_bases_rejected() {
        let dir = TempDir::new().unwrap();
        let path = write_fasta(&dir, FASTA);
        fs::write(fai_path(&path), "chr1\t22\t18\t0\t0\n").unwrap();

        assert!(matches!(
            IndexedFasta::open(&path),
            Err(TilerError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_bad_fai() {
        let dir = TempDir::new().unwrap();
        let path = write_fasta(&dir, FASTA);
        fs::write(fai_path(&path), "chr1\t22\tx\t10\t11\n").unwrap();

        assert!(matches!(
            IndexedFasta::open(&path),
            Err(TilerError::Parse { line: 1, .. })
        ));
    }

    #[test]
    fn test_missing_reference() {
        assert!(matches!(
            IndexedFasta::open("/nonexistent/ref.fa"),
            Err(TilerError::Reference { .. })
        ));
    }

    #[test]
    fn test_memory_reference() {
        let reference = MemoryReference::new().with_contig("chr1", "ACGTacgt");

        assert_eq!(reference.fetch("chr1", 2, 6).unwrap(), b"GTac");
        assert_eq!(reference.fetch("chr1", 6, 20).unwrap(), b"gt");
        assert!(reference.fetch("chr1", 20, 30).unwrap().is_empty());
        assert!(reference.fetch("chr9", 0, 3).unwrap().is_empty());
    }
}
