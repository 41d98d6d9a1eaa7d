//! Merge orchestration
//!
//! [`Merger`] owns the configuration, the index being filled and the ingest
//! counters of one run. A run has three phases that never overlap:
//! ingestion, resolution, writing.
//!
//! Ingestion may parse files in parallel. Each file is parsed into a local
//! record list; all inserts into the index happen afterwards on the calling
//! thread, in sorted path order.

use crate::config::{DatabaseTarget, MergeConfig};
use crate::database::SignatureDatabase;
use crate::index::SignatureIndex;
use crate::parser::{parse_file, ParsedFile};
use crate::resolver::ConflictResolver;
use crate::types::{ResolveStats, Result};
use crate::writer::write_database_file;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Counters collected while ingesting files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    /// Paths handed to the merger
    pub files_seen: usize,
    /// Files with the expected suffix that were parsed
    pub files_parsed: usize,
    /// Files skipped for not carrying the expected suffix
    pub files_skipped: usize,
    /// Files that could not be read
    pub files_failed: usize,
    /// Records admitted by the parser
    pub records: usize,
    /// Malformed lines skipped
    pub malformed: usize,
}

/// Result of a completed merge
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub database: SignatureDatabase,
    pub ingest: IngestStats,
    pub stats: ResolveStats,
}

/// Orchestration context of a single merge run
pub struct Merger {
    config: MergeConfig,
    resolver: ConflictResolver,
    index: SignatureIndex,
    ingest: IngestStats,
}

impl Merger {
    /// Create a merger; fails if the configuration is invalid
    pub fn new(config: MergeConfig) -> Result<Self> {
        config.validate()?;
        let resolver = ConflictResolver::new(config.threshold)?;
        Ok(Self {
            config,
            resolver,
            index: SignatureIndex::new(),
            ingest: IngestStats::default(),
        })
    }

    pub fn config(&self) -> &MergeConfig {
        &self.config
    }

    /// Index filled so far
    pub fn index(&self) -> &SignatureIndex {
        &self.index
    }

    /// Ingest counters so far
    pub fn ingest_stats(&self) -> IngestStats {
        self.ingest
    }

    /// Parse and index a set of files
    ///
    /// Paths are sorted first so the order the caller enumerated them in has
    /// no influence on the database. Unreadable files are logged and counted,
    /// they do not abort the run.
    pub fn ingest_paths<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<()> {
        let mut paths: Vec<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
        paths.sort();
        paths.dedup();

        log::info!("ingesting {} files", paths.len());
        let suffix = self.config.suffix.as_str();

        let parsed: Vec<Result<Option<ParsedFile>>> = if self.config.jobs == 1 {
            paths.iter().map(|path| parse_file(path, suffix)).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.config.jobs)
                .build()?;
            pool.install(|| {
                paths
                    .par_iter()
                    .map(|path| parse_file(path, suffix))
                    .collect()
            })
        };

        for (path, result) in paths.iter().zip(parsed) {
            self.absorb(path, result);
        }

        log::info!(
            "indexed {} signatures in {} groups from {} files",
            self.index.line_count(),
            self.index.group_count(),
            self.ingest.files_parsed
        );
        Ok(())
    }

    /// Parse and index a single file on the calling thread
    pub fn ingest_file(&mut self, path: &Path) {
        let result = parse_file(path, &self.config.suffix);
        self.absorb(path, result);
    }

    fn absorb(&mut self, path: &Path, result: Result<Option<ParsedFile>>) {
        self.ingest.files_seen += 1;
        match result {
            Ok(Some(parsed)) => {
                self.ingest.files_parsed += 1;
                self.ingest.records += parsed.stats.records;
                self.ingest.malformed += parsed.stats.malformed;
                self.index.extend(parsed.records);
            }
            Ok(None) => self.ingest.files_skipped += 1,
            Err(e) => {
                log::warn!("failed to read {}: {}", path.display(), e);
                self.ingest.files_failed += 1;
            }
        }
    }

    /// Resolve conflicts and hand back the database
    pub fn finish(self) -> Result<MergeOutcome> {
        log::info!(
            "resolving {} buckets with threshold {:.2}",
            self.index.bucket_count(),
            self.resolver.threshold()
        );
        let (database, stats) = self.resolver.resolve(self.index)?;
        Ok(MergeOutcome {
            database,
            ingest: self.ingest,
            stats,
        })
    }

    /// Resolve and write the database for `target` into `output_dir`
    pub fn merge_into(
        self,
        target: &DatabaseTarget,
        output_dir: &Path,
    ) -> Result<(PathBuf, MergeOutcome)> {
        target.validate()?;
        let outcome = self.finish()?;
        let path = output_dir.join(target.file_name());
        write_database_file(&outcome.database, &path)?;
        Ok((path, outcome))
    }
}
