//! Design command: target regions in, tiled probe file out.
//!
//! Pipeline:
//! 1. read and merge the targets
//! 2. grow short targets to [`ROUND_SIZE`]
//! 3. fuse targets closer than twice [`FLANK_REGION`]
//! 4. restrict to the uniqueness database, if one is given
//! 5. heal holes narrower than twice [`FLANK_UNIQ`]
//! 6. tile into `probes.txt.gz` and write the region reports

use crate::config::{
    CoordSpace, TilerConfig, FLANK_REGION, FLANK_UNIQ, RESCUE_GAP, ROUND_SIZE,
};
use crate::error::{Result, TilerError};
use crate::index::UniqIndex;
use crate::reference::{IndexedFasta, SequenceSource};
use crate::store::IntervalStore;
use crate::streaming::output::{ProbeHeader, ProbeWriter};
use crate::tiler::{ProbeTiler, TilerStats};
use crate::transform::{flank_trim, intersect_with_range_db, round_up, IntersectStats};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{error, info};
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

pub const PROBE_FILE: &str = "probes.txt.gz";
pub const TARGET_REPORT: &str = "target_regions.bed";
pub const DESIGN_REPORT: &str = "design_regions.bed";

/// Design command configuration.
#[derive(Debug, Clone)]
pub struct DesignCommand {
    pub fasta: PathBuf,
    pub target: PathBuf,
    /// Regions considered unique enough for probes
    pub database: Option<PathBuf>,
    pub outdir: Option<PathBuf>,
    pub project: String,
    pub coords: CoordSpace,
    pub config: TilerConfig,
    /// Recorded verbatim in the probe file header
    pub command_line: String,
}

/// Summary of one design run.
#[derive(Debug, Clone, Default)]
pub struct DesignStats {
    pub target_regions: u64,
    pub target_length: u64,
    pub design_regions: u64,
    pub design_length: u64,
    pub intersect: Option<IntersectStats>,
    pub tiler: TilerStats,
    pub outdir: PathBuf,
}

impl fmt::Display for DesignStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Targets: {} ({} bp), Design regions: {} ({} bp), {}",
            self.target_regions,
            self.target_length,
            self.design_regions,
            self.design_length,
            self.tiler
        )
    }
}

impl DesignCommand {
    pub fn new<P: Into<PathBuf>, Q: Into<PathBuf>>(fasta: P, target: Q, project: &str) -> Self {
        Self {
            fasta: fasta.into(),
            target: target.into(),
            database: None,
            outdir: None,
            project: project.to_string(),
            coords: CoordSpace::default(),
            config: TilerConfig::default(),
            command_line: String::new(),
        }
    }

    pub fn with_database(mut self, database: Option<PathBuf>) -> Self {
        self.database = database;
        self
    }

    pub fn with_outdir(mut self, outdir: Option<PathBuf>) -> Self {
        self.outdir = outdir;
        self
    }

    pub fn with_coords(mut self, coords: CoordSpace) -> Self {
        self.coords = coords;
        self
    }

    pub fn with_config(mut self, config: TilerConfig) -> Self {
        self.config = config.sanitize();
        self
    }

    pub fn with_command_line(mut self, command_line: String) -> Self {
        self.command_line = command_line;
        self
    }

    /// Run the whole pipeline against the indexed FASTA.
    pub fn run(&self) -> Result<DesignStats> {
        let reference = IndexedFasta::open(&self.fasta)?;
        self.run_with(&reference)
    }

    /// Run the whole pipeline against any sequence source.
    pub fn run_with<S: SequenceSource>(&self, reference: S) -> Result<DesignStats> {
        let outdir = self.prepare_outdir();
        let (mut targets, mut design, intersect) = self.prepare_regions()?;

        let mut stats = DesignStats {
            target_regions: targets.region_count(),
            target_length: targets.total_length(),
            design_regions: design.region_count(),
            design_length: design.total_length(),
            intersect,
            outdir: outdir.clone(),
            ..DesignStats::default()
        };

        stats.tiler = self.write_probes(&outdir, &mut design, reference)?;
        info!("Generated {} probes.", stats.tiler.probes);

        write_report(&outdir.join(TARGET_REPORT), &mut targets)?;
        write_report(&outdir.join(DESIGN_REPORT), &mut design)?;

        Ok(stats)
    }

    /// Output directory, created if needed. Falls back to the working
    /// directory when it cannot be created.
    fn prepare_outdir(&self) -> PathBuf {
        let Some(dir) = &self.outdir else {
            return PathBuf::from(".");
        };
        if dir.is_dir() {
            return dir.clone();
        }
        match fs::create_dir_all(dir) {
            Ok(()) => {
                info!("Created output directory {}", dir.display());
                dir.clone()
            }
            Err(e) => {
                error!(
                    "Failed to create directory {}: {}; writing to ./ instead",
                    dir.display(),
                    e
                );
                PathBuf::from(".")
            }
        }
    }

    /// Read the targets and derive the design regions.
    ///
    /// Returns the rounded targets, the design regions and, when a database
    /// was used, what happened to each target.
    pub fn prepare_regions(
        &self,
    ) -> Result<(IntervalStore, IntervalStore, Option<IntersectStats>)> {
        let mut targets = IntervalStore::from_path(&self.target, self.coords)?;
        targets.merge();
        if targets.region_count() == 0 {
            return Err(TilerError::EmptyInput(self.target.clone()));
        }
        info!(
            "Read {} target regions ({} bp, {} records) from {}",
            targets.region_count(),
            targets.total_length(),
            targets.raw_region_count(),
            self.target.display()
        );

        // A single-base target still gets at least two oligos
        round_up(&mut targets, ROUND_SIZE);

        let mut fused = targets.clone();
        flank_trim(&mut fused, FLANK_REGION, FLANK_REGION);

        let (mut design, intersect) = match &self.database {
            Some(path) => {
                let db = UniqIndex::from_path(path)?;
                let (design, stats) = intersect_with_range_db(
                    &mut fused,
                    &db,
                    RESCUE_GAP,
                    self.config.max_oligo_length,
                );
                info!(
                    "Uniqueness filter: {} overlapped, {} rescued, {} dropped",
                    stats.overlapped, stats.rescued, stats.dropped
                );
                (design, Some(stats))
            }
            None => {
                info!("No uniqueness database specified.");
                (fused, None)
            }
        };

        flank_trim(&mut design, FLANK_UNIQ, FLANK_UNIQ);
        Ok((targets, design, intersect))
    }

    fn write_probes<S: SequenceSource>(
        &self,
        outdir: &Path,
        design: &mut IntervalStore,
        reference: S,
    ) -> Result<TilerStats> {
        let path = outdir.join(PROBE_FILE);
        let file = File::create(&path).map_err(|source| TilerError::Open {
            path: path.clone(),
            source,
        })?;
        let mut writer = ProbeWriter::new(GzEncoder::new(file, Compression::default()));
        writer.write_header(&ProbeHeader {
            version: crate::VERSION,
            project: &self.project,
            max_length: self.config.oligo_length.longest(),
            command: &self.command_line,
        })?;

        let mut tiler = ProbeTiler::new(self.config.clone(), reference);
        let stats = tiler.run(design, |probe| writer.write_probe(&probe))?;

        writer.into_inner()?.finish()?;
        Ok(stats)
    }
}

fn write_report(path: &Path, store: &mut IntervalStore) -> Result<()> {
    let file = File::create(path).map_err(|source| TilerError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    store.write_bed(file)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OligoLength;
    use crate::reference::MemoryReference;
    use flate2::read::MultiGzDecoder;
    use std::io::Read;
    use tempfile::TempDir;

    fn contig(len: usize) -> Vec<u8> {
        b"ACGTTGCAacgt".iter().copied().cycle().take(len).collect()
    }

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn read_probes(path: &Path) -> String {
        let mut text = String::new();
        MultiGzDecoder::new(File::open(path).unwrap())
            .read_to_string(&mut text)
            .unwrap();
        text
    }

    #[test]
    fn test_prepare_regions_without_database() {
        let dir = TempDir::new().unwrap();
        let target = write(&dir, "t.bed", "chr1\t1000\t1010\nchr1\t1100\t1400\nchr1\t3000\t3001\n");
        let cmd = DesignCommand::new("ref.fa", target, "p");

        let (mut targets, mut design, intersect) = cmd.prepare_regions().unwrap();

        assert!(intersect.is_none());
        // 1000-1010 grows to 955-1055; the gap to 1100 is fused
        assert_eq!(
            targets.regions().map(|r| (r.start, r.end)).collect::<Vec<_>>(),
            vec![(955, 1_055), (1_100, 1_400), (2_951, 3_051)]
        );
        assert_eq!(
            design.regions().map(|r| (r.start, r.end)).collect::<Vec<_>>(),
            vec![(955, 1_400), (2_951, 3_051)]
        );
    }

    #[test]
    fn test_prepare_regions_with_database() {
        let dir = TempDir::new().unwrap();
        let target = write(&dir, "t.bed", "chr1\t1000\t1400\nchr1\t5000\t5100\n");
        let db = write(&dir, "u.bed", "chr1\t900\t1200\nchr1\t1205\t1300\nchr1\t5150\t6000\n");
        let cmd = DesignCommand::new("ref.fa", &target, "p")
            .with_database(Some(db.clone()))
            .with_config(TilerConfig::from_args(50, None, None, 2.0));

        let (_, mut design, intersect) = cmd.prepare_regions().unwrap();
        let intersect = intersect.unwrap();

        assert_eq!(intersect.overlapped, 1);
        assert_eq!(intersect.rescued, 1);
        // The 5 bp hole is healed, the rescue spans the maximal oligo length
        // even though oligos are 50 bp
        assert_eq!(
            design.regions().map(|r| (r.start, r.end)).collect::<Vec<_>>(),
            vec![(1_000, 1_300), (5_150, 5_270)]
        );

        let cmd = DesignCommand::new("ref.fa", &target, "p")
            .with_database(Some(db))
            .with_config(TilerConfig::from_args(50, None, Some(80), 2.0));
        let (_, mut design, _) = cmd.prepare_regions().unwrap();
        assert_eq!(design.regions().last().map(|r| (r.start, r.end)), Some((5_150, 5_230)));
    }

    #[test]
    fn test_empty_target_is_fatal() {
        let dir = TempDir::new().unwrap();
        let target = write(&dir, "t.bed", "# nothing here\n\n");
        let cmd = DesignCommand::new("ref.fa", target, "p");

        assert!(matches!(
            cmd.prepare_regions(),
            Err(TilerError::EmptyInput(_))
        ));
    }

    #[test]
    fn test_run_writes_outputs() {
        let dir = TempDir::new().unwrap();
        let target = write(&dir, "t.bed", "chr1\t1000\t1200\n");
        let outdir = dir.path().join("out");
        let reference = MemoryReference::new().with_contig("chr1", contig(5_000));
        let cmd = DesignCommand::new("ref.fa", target, "demo")
            .with_outdir(Some(outdir.clone()))
            .with_config(TilerConfig {
                oligo_length: OligoLength::Fixed(50),
                ..TilerConfig::default()
            })
            .with_command_line("oligo-tiler design -p demo".to_string());

        let stats = cmd.run_with(&reference).unwrap();

        assert_eq!(stats.tiler.probes, 8);
        let text = read_probes(&outdir.join(PROBE_FILE));
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "##filetype=probe");
        assert_eq!(lines[2], "##project_name=demo");
        assert_eq!(lines[3], "##max_length=50");
        assert_eq!(lines[4], "##Command=oligo-tiler design -p demo");
        assert_eq!(lines.len(), 6 + 8);
        assert!(lines[6].starts_with("chr1\t1000\t1050\t50\t"));

        assert_eq!(
            fs::read_to_string(outdir.join(TARGET_REPORT)).unwrap(),
            "chr1\t1000\t1200\n"
        );
        assert_eq!(
            fs::read_to_string(outdir.join(DESIGN_REPORT)).unwrap(),
            "chr1\t1000\t1200\n"
        );
    }
}
