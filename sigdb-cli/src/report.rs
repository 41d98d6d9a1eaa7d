//! Run summaries
//!
//! A short line on stdout for every run, and optionally a JSON file with the
//! full counters for scripts that drive many merges.

use anyhow::{Context, Result};
use serde::Serialize;
use sigdb_merge::pipeline::GenerateStats;
use sigdb_merge::{IngestStats, MergeOutcome, ResolveStats};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything worth knowing about a finished merge
#[derive(Debug, Clone, Serialize)]
pub struct MergeSummary {
    pub database: PathBuf,
    pub records: usize,
    pub ingest: IngestStats,
    pub resolve: ResolveStats,
}

impl MergeSummary {
    pub fn new(database: &Path, outcome: &MergeOutcome) -> Self {
        Self {
            database: database.to_path_buf(),
            records: outcome.database.len(),
            ingest: outcome.ingest,
            resolve: outcome.stats,
        }
    }

    pub fn print(&self) {
        println!("{}", self.resolve);
        println!(
            "{} has been created ({} signatures from {} files)",
            self.database.display(),
            self.records,
            self.ingest.files_parsed
        );
        if self.ingest.malformed > 0 || self.ingest.files_failed > 0 {
            println!(
                "skipped {} malformed lines and {} unreadable files",
                self.ingest.malformed, self.ingest.files_failed
            );
        }
    }
}

pub fn print_generate(stats: &GenerateStats) {
    println!(
        "generated {} pattern files ({} already present, {} without binary info, {} failed)",
        stats.generated, stats.skipped_existing, stats.skipped_unknown, stats.failed
    );
}

/// Write any summary as pretty JSON
pub fn write_json<T: Serialize>(summary: &T, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json).with_context(|| format!("Failed to write summary: {:?}", path))?;
    Ok(())
}
