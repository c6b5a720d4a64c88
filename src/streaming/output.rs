//! Output formatting for region reports and probe files.
//!
//! Integers go through itoa to avoid allocation in the hot path. The two
//! probe score columns are fixed at two decimals, which only `write!` does.

use crate::error::Result;
use crate::probe::ProbeRecord;
use crate::streaming::buffers::DEFAULT_OUTPUT_BUFFER;
use std::io::{BufWriter, Write};

/// Column header line of a probe file.
pub const PROBE_COLUMNS: &str =
    "#chrom\tstart\tend\tseq_length\tsequence\tn_block\tstarts\tends\trepeat_ratio\tGC_content\trank";

/// BED3 writer for region reports.
pub struct BedWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
}

impl<W: Write> BedWriter<W> {
    pub fn new(output: W) -> Self {
        Self::with_capacity(DEFAULT_OUTPUT_BUFFER, output)
    }

    pub fn with_capacity(capacity: usize, output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(capacity, output),
            itoa_buf: itoa::Buffer::new(),
        }
    }

    /// Write a BED3 record followed by newline.
    #[inline]
    pub fn write_bed3_line(&mut self, chrom: &[u8], start: u32, end: u32) -> Result<()> {
        self.writer.write_all(chrom)?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(self.itoa_buf.format(start).as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(self.itoa_buf.format(end).as_bytes())?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}

/// Metadata recorded in the `##` lines of a probe file.
#[derive(Debug, Clone, Copy)]
pub struct ProbeHeader<'a> {
    pub version: &'a str,
    pub project: &'a str,
    pub max_length: u32,
    pub command: &'a str,
}

/// Writer for the tab-separated probe format.
pub struct ProbeWriter<W: Write> {
    writer: BufWriter<W>,
    itoa_buf: itoa::Buffer,
    written: u64,
}

impl<W: Write> ProbeWriter<W> {
    pub fn new(output: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(DEFAULT_OUTPUT_BUFFER, output),
            itoa_buf: itoa::Buffer::new(),
            written: 0,
        }
    }

    /// Write the `##` metadata block and the column header.
    pub fn write_header(&mut self, header: &ProbeHeader<'_>) -> Result<()> {
        writeln!(self.writer, "##filetype=probe")?;
        writeln!(self.writer, "##generate_oligos Version={}", header.version)?;
        writeln!(self.writer, "##project_name={}", header.project)?;
        writeln!(self.writer, "##max_length={}", header.max_length)?;
        writeln!(self.writer, "##Command={}", header.command)?;
        writeln!(self.writer, "{}", PROBE_COLUMNS)?;
        Ok(())
    }

    #[inline]
    fn write_int(&mut self, n: u32) -> Result<()> {
        self.writer.write_all(self.itoa_buf.format(n).as_bytes())?;
        Ok(())
    }

    /// Write one probe line.
    pub fn write_probe(&mut self, probe: &ProbeRecord) -> Result<()> {
        self.writer.write_all(probe.chrom.as_bytes())?;
        self.writer.write_all(b"\t")?;
        self.write_int(probe.start)?;
        self.writer.write_all(b"\t")?;
        self.write_int(probe.end)?;
        self.writer.write_all(b"\t")?;
        self.write_int(probe.oligo_length)?;
        self.writer.write_all(b"\t")?;
        self.writer.write_all(&probe.sequence)?;
        self.writer.write_all(b"\t")?;
        self.write_int(probe.blocks.len() as u32)?;

        // Block lists keep a trailing comma
        self.writer.write_all(b"\t")?;
        for block in &probe.blocks {
            self.write_int(block.start)?;
            self.writer.write_all(b",")?;
        }
        self.writer.write_all(b"\t")?;
        for block in &probe.blocks {
            self.write_int(block.end)?;
            self.writer.write_all(b",")?;
        }

        write!(
            self.writer,
            "\t{:.2}\t{:.2}\t",
            probe.repeat_ratio, probe.gc_content
        )?;
        self.write_int(probe.rank as u32)?;
        self.writer.write_all(b"\n")?;

        self.written += 1;
        Ok(())
    }

    /// Probes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flush buffered output and hand back the underlying writer.
    pub fn into_inner(self) -> Result<W> {
        let inner = self.writer.into_inner().map_err(|e| e.into_error())?;
        Ok(inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interval::Interval;

    fn probe(blocks: Vec<Interval>, sequence: &[u8]) -> ProbeRecord {
        ProbeRecord {
            chrom: "chr1".to_string(),
            start: blocks[0].start,
            end: blocks[blocks.len() - 1].end,
            oligo_length: sequence.len() as u32,
            sequence: sequence.to_vec(),
            blocks,
            gc_content: 0.5,
            repeat_ratio: 0.25,
            rank: 1,
        }
    }

    #[test]
    fn test_write_bed3() {
        let mut output = Vec::new();
        {
            let mut writer = BedWriter::new(&mut output);
            writer.write_bed3_line(b"chr1", 100, 200).unwrap();
            writer.flush().unwrap();
        }
        assert_eq!(output, b"chr1\t100\t200\n");
    }

    #[test]
    fn test_header() {
        let mut writer = ProbeWriter::new(Vec::new());
        writer
            .write_header(&ProbeHeader {
                version: "0.1.0",
                project: "demo",
                max_length: 120,
                command: "oligo-tiler design -p demo",
            })
            .unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "##filetype=probe",
                "##generate_oligos Version=0.1.0",
                "##project_name=demo",
                "##max_length=120",
                "##Command=oligo-tiler design -p demo",
                PROBE_COLUMNS,
            ]
        );
    }

    #[test]
    fn test_single_block_probe() {
        let mut writer = ProbeWriter::new(Vec::new());
        writer
            .write_probe(&probe(vec![Interval::new(100, 108)], b"ACGTACGT"))
            .unwrap();
        assert_eq!(writer.written(), 1);
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        assert_eq!(
            text,
            "chr1\t100\t108\t8\tACGTACGT\t1\t100,\t108,\t0.25\t0.50\t1\n"
        );
    }

    #[test]
    fn test_bridge_probe_blocks() {
        let mut writer = ProbeWriter::new(Vec::new());
        let mut record = probe(
            vec![Interval::new(100, 104), Interval::new(120, 124)],
            b"ACGTACGT",
        );
        record.rank = 0;
        writer.write_probe(&record).unwrap();
        let text = String::from_utf8(writer.into_inner().unwrap()).unwrap();

        assert_eq!(
            text,
            "chr1\t100\t124\t8\tACGTACGT\t2\t100,120,\t104,124,\t0.25\t0.50\t0\n"
        );
    }
}
