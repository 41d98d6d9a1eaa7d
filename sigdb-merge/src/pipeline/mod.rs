//! Upstream pipeline: unpacking archives and generating pattern files
//!
//! The merge core never calls external tools itself. The stages that do are
//! expressed as traits so they can be swapped for fakes in tests:
//!
//! - [`BinaryInspector`] reports the binary type, architecture and bit width
//!   of an object file
//! - [`SignatureGenerator`] turns one object file into one pattern file
//! - [`ArchiveUnpacker`] stages the members of an archive on disk
//!
//! [`generate_all`] runs generation over many objects on a bounded worker
//! pool. A failing object is logged and counted; it never stops the batch.

pub mod discover;
pub mod tools;

pub use discover::{find_archives, find_files, find_objects, find_pattern_inputs};
pub use tools::{ArUnpacker, RzBin, RzSign};

use crate::types::Result;
use chrono::{DateTime, TimeDelta, Utc};
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

/// Metadata needed to place a pattern file in the database tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryInfo {
    /// Binary type, e.g. `elf`, `coff`
    pub bintype: String,
    /// Architecture name
    pub arch: String,
    /// Bit width
    pub bits: String,
}

/// Reads binary metadata from an object file
pub trait BinaryInspector: Sync {
    /// `None` means the object carries no usable metadata and is skipped
    fn inspect(&self, object: &Path) -> Option<BinaryInfo>;
}

/// Produces the pattern file of one object file
pub trait SignatureGenerator: Sync {
    fn generate(&self, object: &Path, output: &Path) -> Result<()>;
}

/// Extracts the members of an archive into a directory
pub trait ArchiveUnpacker: Sync {
    /// Returns the files staged under `dest`. Fails only if extraction
    /// itself fails, not when the archive has no members of interest.
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>>;
}

/// Maps an object file to the location of its pattern file
#[derive(Debug, Clone)]
pub struct Locator {
    input: PathBuf,
    output: Option<PathBuf>,
    library: String,
}

impl Locator {
    /// `output = None` places each pattern file next to its object
    pub fn new(
        input: impl Into<PathBuf>,
        output: Option<PathBuf>,
        library: impl Into<String>,
    ) -> Self {
        Self {
            input: input.into(),
            output,
            library: library.into(),
        }
    }

    /// Pattern file path for `object`
    ///
    /// With an output directory the layout is
    /// `<output>/<bintype>/<arch>/<bits>/<library>/<dir relative to input>/<name>.pat`.
    pub fn pattern_path(&self, object: &Path, info: &BinaryInfo) -> PathBuf {
        let name = match object.file_name() {
            Some(name) => format!("{}.pat", name.to_string_lossy()),
            None => "unnamed.pat".to_string(),
        };

        let Some(output) = &self.output else {
            return object.with_file_name(name);
        };

        let relative_dir = object
            .strip_prefix(&self.input)
            .ok()
            .and_then(Path::parent)
            .unwrap_or_else(|| Path::new(""));

        output
            .join(&info.bintype)
            .join(&info.arch)
            .join(&info.bits)
            .join(&self.library)
            .join(relative_dir)
            .join(name)
    }
}

/// Progress and ETA reporting for long batches
#[derive(Debug)]
pub struct Progress {
    total: usize,
    done: AtomicUsize,
    start: DateTime<Utc>,
}

impl Progress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            done: AtomicUsize::new(0),
            start: Utc::now(),
        }
    }

    /// Count one more item and return `<remaining> <elapsed> (<percent>%)`
    pub fn tick(&self) -> String {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        let elapsed = Utc::now() - self.start;
        self.report(done, elapsed)
    }

    fn report(&self, done: usize, elapsed: TimeDelta) -> String {
        let total = self.total.max(1);
        let elapsed_secs = elapsed.num_seconds().max(0);
        let remaining = (total as i64 * elapsed_secs) / done.max(1) as i64 - elapsed_secs;
        format!(
            "{} {} ({:3}%)",
            format_hms(remaining.max(0)),
            format_hms(elapsed_secs),
            done * 100 / total
        )
    }
}

fn format_hms(secs: i64) -> String {
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

/// What happened to one object during generation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Generated {
    Created,
    Exists,
    Unknown,
    Failed,
}

/// Counters reported by [`generate_all`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GenerateStats {
    pub generated: usize,
    pub skipped_existing: usize,
    pub skipped_unknown: usize,
    pub failed: usize,
}

/// Generate pattern files for every object on a pool of `jobs` threads
/// (0 lets rayon decide)
pub fn generate_all<I, G>(
    objects: &[PathBuf],
    inspector: &I,
    generator: &G,
    locator: &Locator,
    jobs: usize,
) -> Result<GenerateStats>
where
    I: BinaryInspector + ?Sized,
    G: SignatureGenerator + ?Sized,
{
    let progress = Progress::new(objects.len());

    let pool = rayon::ThreadPoolBuilder::new().num_threads(jobs).build()?;
    let outcomes: Vec<Generated> = pool.install(|| {
        objects
            .par_iter()
            .map(|object| {
                let name = object.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                log::info!("{} parsing {}", progress.tick(), name);
                generate_one(object, inspector, generator, locator)
            })
            .collect()
    });

    let mut stats = GenerateStats::default();
    for outcome in outcomes {
        match outcome {
            Generated::Created => stats.generated += 1,
            Generated::Exists => stats.skipped_existing += 1,
            Generated::Unknown => stats.skipped_unknown += 1,
            Generated::Failed => stats.failed += 1,
        }
    }
    Ok(stats)
}

fn generate_one<I, G>(
    object: &Path,
    inspector: &I,
    generator: &G,
    locator: &Locator,
) -> Generated
where
    I: BinaryInspector + ?Sized,
    G: SignatureGenerator + ?Sized,
{
    let Some(info) = inspector.inspect(object) else {
        log::debug!("no binary metadata for {}, skipping", object.display());
        return Generated::Unknown;
    };

    let output = locator.pattern_path(object, &info);
    if output.exists() {
        log::debug!("{} already exists, skipping", output.display());
        return Generated::Exists;
    }

    if let Some(parent) = output.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            log::warn!("cannot create {}: {}", parent.display(), e);
            return Generated::Failed;
        }
    }

    match generator.generate(object, &output) {
        Ok(()) => Generated::Created,
        Err(e) => {
            log::warn!("signature generation failed for {}: {}", object.display(), e);
            Generated::Failed
        }
    }
}
