//! oligo-tiler: tiled capture-array probe design
//!
//! Usage: oligo-tiler <COMMAND> [OPTIONS]

use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process;

use oligo_tiler::commands::{DesignCommand, MergeProbesCommand};
use oligo_tiler::config::{CoordSpace, OligoLength, TilerConfig, DEFAULT_DEPTH, DEFAULT_OLIGO_LENGTH};
use oligo_tiler::error::{Result, TilerError};

#[derive(Parser)]
#[command(name = "oligo-tiler")]
#[command(version)]
#[command(about = "Design tiled oligo probes for DNA capture arrays", long_about = None)]
struct Cli {
    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    /// Log per-region tiling parameters
    #[arg(long, global = true, conflicts_with = "quiet")]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Tile probes over target regions
    Design {
        /// Reference genome FASTA (uncompressed; .fai is built if missing)
        #[arg(short = 'r', long)]
        fasta: PathBuf,

        /// Target regions in BED format (plain or gzipped)
        #[arg(short = 't', long)]
        target: PathBuf,

        /// Uniqueness database in BED format
        #[arg(short = 'u', long)]
        database: Option<PathBuf>,

        /// Output directory (default: current directory)
        #[arg(short = 'o', long)]
        outdir: Option<PathBuf>,

        /// Project name recorded in the probe file
        #[arg(short = 'p', long)]
        project: String,

        /// Oligo length; 0 picks it per region between --min and --max
        #[arg(short = 'l', long, default_value_t = DEFAULT_OLIGO_LENGTH)]
        length: u32,

        /// Minimal oligo length in dynamic mode
        #[arg(long)]
        min: Option<u32>,

        /// Maximal oligo length in dynamic mode
        #[arg(long)]
        max: Option<u32>,

        /// Tiling depth (oligos per base)
        #[arg(short = 'd', long, default_value_t = DEFAULT_DEPTH)]
        depth: f32,

        /// Design regions too short to tile or bridge anyway
        #[arg(long)]
        must_design: bool,

        /// Target coordinates are 1-based
        #[arg(long)]
        one_based: bool,
    },

    /// Merge probe files under one header
    MergeProbes {
        /// Probe files (plain or gzipped), at least two
        #[arg(required = true, num_args = 2..)]
        files: Vec<PathBuf>,

        /// Only write the merged header
        #[arg(long, conflicts_with = "no_header")]
        header_only: bool,

        /// Only write the probe lines
        #[arg(long)]
        no_header: bool,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug {
        LevelFilter::Debug
    } else if cli.quiet {
        LevelFilter::Warn
    } else {
        LevelFilter::Info
    };
    // RUST_LOG, when set, overrides the flag-derived level
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .init();

    let command_line = std::env::args().collect::<Vec<_>>().join(" ");
    info!("oligo-tiler {}", oligo_tiler::VERSION);
    info!("Command: {}", command_line);

    let result = match cli.command {
        Commands::Design {
            fasta,
            target,
            database,
            outdir,
            project,
            length,
            min,
            max,
            depth,
            must_design,
            one_based,
        } => run_design(
            fasta,
            target,
            database,
            outdir,
            project,
            TilerConfig::from_args(length, min, max, depth).with_force_design(must_design),
            one_based,
            command_line,
        ),

        Commands::MergeProbes {
            files,
            header_only,
            no_header,
            output,
        } => run_merge_probes(files, header_only, no_header, output, command_line),
    };

    if let Err(e) = result {
        error!("{}", e);
        process::exit(1);
    }
}

#[allow(clippy::too_many_arguments)]
fn run_design(
    fasta: PathBuf,
    target: PathBuf,
    database: Option<PathBuf>,
    outdir: Option<PathBuf>,
    project: String,
    config: TilerConfig,
    one_based: bool,
    command_line: String,
) -> Result<()> {
    let config = config.sanitize();
    if let OligoLength::Dynamic { min, max } = config.oligo_length {
        info!("Dynamic oligo length between {} and {}", min, max);
    }
    let coords = if one_based {
        CoordSpace::OneBased
    } else {
        CoordSpace::ZeroBased
    };

    let cmd = DesignCommand::new(fasta, target, &project)
        .with_database(database)
        .with_outdir(outdir)
        .with_coords(coords)
        .with_config(config)
        .with_command_line(command_line);

    let stats = cmd.run()?;
    info!("{}", stats);
    info!("Results written to {}", stats.outdir.display());
    Ok(())
}

fn run_merge_probes(
    files: Vec<PathBuf>,
    header_only: bool,
    no_header: bool,
    output: Option<PathBuf>,
    command_line: String,
) -> Result<()> {
    let cmd = MergeProbesCommand::new(files)
        .with_header_only(header_only)
        .with_no_header(no_header)
        .with_command_line(command_line);

    match output {
        Some(path) => {
            let file = File::create(&path).map_err(|source| TilerError::Open {
                path: path.clone(),
                source,
            })?;
            cmd.run(file)?;
        }
        None => {
            let stdout = io::stdout();
            cmd.run(stdout.lock())?;
        }
    }
    Ok(())
}
