//! Signature database CLI
//!
//! Command-line front end of the sigdb-merge library:
//! - `merge`: merge the pattern files of many builds into one database
//! - `generate`: run the signature generator over a tree of object files
//! - `unpack`: extract the objects of static archives and `.lib` files

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use sigdb_merge::pipeline::{self, ArUnpacker, ArchiveUnpacker, Locator, RzBin, RzSign};
use sigdb_merge::Merger;
use std::path::{Path, PathBuf};

mod config;
mod report;

/// sigdb - build FLIRT signature databases
#[derive(Parser, Debug)]
#[command(name = "sigdb")]
#[command(about = "Build and shrink signature databases from pattern files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbosity level (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge pattern files of several versions of a library into one database
    Merge(MergeArgs),
    /// Generate pattern files from object files
    Generate(GenerateArgs),
    /// Unpack static archives into `<archive>.ext` directories
    Unpack(UnpackArgs),
}

#[derive(Args, Debug)]
struct MergeArgs {
    /// Input directory with one folder per version of the same library
    #[arg(short, long, value_name = "DIR")]
    input: PathBuf,

    /// Output directory for the final database
    #[arg(short, long, value_name = "DIR")]
    output: PathBuf,

    /// Architecture name
    #[arg(short, long)]
    arch: Option<String>,

    /// Architecture bits
    #[arg(short, long)]
    bits: Option<String>,

    /// System/OS name (linux, mac, win, haiku)
    #[arg(short, long)]
    system: Option<String>,

    /// System variant (may be empty)
    #[arg(long)]
    variant: Option<String>,

    /// Library name (example: libc)
    #[arg(short, long)]
    library: Option<String>,

    /// Similarity threshold (default 0.66)
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Extension of the pattern files to ingest (default pac)
    #[arg(long)]
    suffix: Option<String>,

    /// Parser threads (0 = one per core, 1 = sequential)
    #[arg(short, long)]
    jobs: Option<usize>,

    /// TOML file with [target] and [merge] sections
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a JSON summary of the run to this file
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// Input directory to scan for .o/.lo/.obj files
    #[arg(short, long, value_name = "DIR")]
    input: PathBuf,

    /// Output directory (optional, requires --libname)
    #[arg(short, long, value_name = "DIR", requires = "libname")]
    output: Option<PathBuf>,

    /// Library name in the output directory
    #[arg(short, long)]
    libname: Option<String>,

    /// rz-sign binary path
    #[arg(long, default_value = "rz-sign")]
    rz_sign: PathBuf,

    /// rz-bin binary path
    #[arg(long, default_value = "rz-bin")]
    rz_bin: PathBuf,

    /// Worker threads (0 = one per core)
    #[arg(short, long, default_value_t = 0)]
    jobs: usize,

    /// Write a JSON summary of the run to this file
    #[arg(long, value_name = "FILE")]
    summary: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct UnpackArgs {
    /// Input directory to scan for .a/.lib files
    #[arg(short, long, value_name = "DIR")]
    input: PathBuf,

    /// ar binary path
    #[arg(long, default_value = "ar")]
    ar: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    log::debug!("sigdb v{}", sigdb_merge::VERSION);

    match cli.command {
        Command::Merge(args) => merge(args),
        Command::Generate(args) => generate(args, cli.verbose > 0),
        Command::Unpack(args) => unpack(args),
    }
}

fn merge(args: MergeArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => config::FileConfig::default(),
    };

    let overrides = config::Overrides {
        target: config::TargetConfig {
            arch: args.arch,
            bits: args.bits,
            system: args.system,
            variant: args.variant,
            library: args.library,
        },
        threshold: args.threshold,
        suffix: args.suffix,
        jobs: args.jobs,
    };
    let (target, merge_config) = file.resolve(overrides)?;

    let inputs = pipeline::find_pattern_inputs(&args.input)
        .with_context(|| format!("Failed to list input directory: {:?}", args.input))?;
    log::info!("found {} files in {}", inputs.len(), args.input.display());

    let mut merger = Merger::new(merge_config)?;
    merger.ingest_paths(&inputs)?;

    let (path, outcome) = merger
        .merge_into(&target, &args.output)
        .with_context(|| format!("Failed to merge {}", args.input.display()))?;

    let summary = report::MergeSummary::new(&path, &outcome);
    summary.print();
    if let Some(summary_path) = &args.summary {
        report::write_json(&summary, summary_path)?;
    }
    Ok(())
}

fn generate(args: GenerateArgs, verbose: bool) -> Result<()> {
    let input = args
        .input
        .canonicalize()
        .with_context(|| format!("Invalid input directory: {:?}", args.input))?;
    println!("input dir: {}", input.display());

    let objects = pipeline::find_objects(&input)?;
    if objects.is_empty() {
        bail!("cannot find any *.o, *.lo or *.obj files in '{}'", input.display());
    }
    println!("found {} files to ingest", objects.len());

    let output = match args.output {
        Some(dir) => Some(absolute(&dir)?),
        None => None,
    };
    let locator = Locator::new(&input, output, args.libname.unwrap_or_default());
    let inspector = RzBin::new(args.rz_bin);
    let generator = RzSign::new(args.rz_sign).with_verbose(verbose);

    let stats = pipeline::generate_all(&objects, &inspector, &generator, &locator, args.jobs)?;
    report::print_generate(&stats);
    if let Some(summary_path) = &args.summary {
        report::write_json(&stats, summary_path)?;
    }
    Ok(())
}

fn unpack(args: UnpackArgs) -> Result<()> {
    println!("input dir: {}", args.input.display());
    let archives = pipeline::find_archives(&args.input)?;
    if archives.is_empty() {
        bail!("cannot find any *.a or *.lib files in '{}'", args.input.display());
    }
    println!("found {} files to ingest", archives.len());

    let unpacker = ArUnpacker::new(args.ar);
    let total = archives.len();
    for (index, archive) in archives.iter().enumerate() {
        let mut dest = archive.clone().into_os_string();
        dest.push(".ext");
        let dest = PathBuf::from(dest);

        log::info!("[{}|{}] unpacking {}", index + 1, total, archive.display());
        let staged = unpacker
            .unpack(archive, &dest)
            .with_context(|| format!("Failed to unpack {:?}", archive))?;
        if staged.is_empty() {
            log::warn!("no files were unpacked from {}", archive.display());
        }
    }

    println!("done.");
    Ok(())
}

fn absolute(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    Ok(std::env::current_dir()?.join(path))
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_merge_args() {
        let cli = Cli::parse_from([
            "sigdb", "merge", "-i", "in", "-o", "out", "-a", "x86", "-b", "64", "-s", "linux",
            "-l", "libc", "-t", "0.8", "-vv",
        ]);
        assert_eq!(cli.verbose, 2);
        let Command::Merge(args) = cli.command else {
            panic!("expected merge");
        };
        assert_eq!(args.threshold, Some(0.8));
        assert_eq!(args.library.as_deref(), Some("libc"));
    }

    #[test]
    fn test_generate_output_requires_libname() {
        let result = Cli::try_parse_from(["sigdb", "generate", "-i", "in", "-o", "out"]);
        assert!(result.is_err());
    }
}
