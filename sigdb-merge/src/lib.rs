//! Signature Database Merger Library
//!
//! Merges many per-object FLIRT-style pattern files into one canonical
//! signature database per (architecture, bits, system, library).
//!
//! # Architecture
//!
//! A merge run has three phases that never overlap:
//! - **Ingestion**: pattern files are parsed and their records grouped by
//!   checksum key and exact pattern ([`SignatureIndex`])
//! - **Resolution**: every group of colliding records is kept, reduced to one
//!   representative, or dropped ([`ConflictResolver`])
//! - **Writing**: survivors are written once, in first-seen order
//!
//! The upstream stages (unpacking archives, running the signature generator
//! per object) live in [`pipeline`] behind traits and are not needed to merge.
//!
//! # Example Usage
//!
//! ```no_run
//! use sigdb_merge::{DatabaseTarget, MergeConfig, Merger};
//! use std::path::Path;
//!
//! let inputs = sigdb_merge::pipeline::find_pattern_inputs(Path::new("sigdb-tmp/libc")).unwrap();
//!
//! let mut merger = Merger::new(MergeConfig::new().with_threshold(0.66)).unwrap();
//! merger.ingest_paths(&inputs).unwrap();
//!
//! let target = DatabaseTarget::new("x86", "64", "linux", "libc");
//! let (path, outcome) = merger.merge_into(&target, Path::new("out")).unwrap();
//! println!("{}: {}", path.display(), outcome.stats);
//! ```

// Public modules
pub mod config;
pub mod database;
pub mod index;
pub mod merger;
pub mod parser;
pub mod pipeline;
pub mod resolver;
pub mod similarity;
pub mod types;
pub mod writer;

// Re-export main types for convenience
pub use config::{DatabaseTarget, MergeConfig};
pub use database::SignatureDatabase;
pub use index::{PatternBucket, SignatureIndex};
pub use merger::{IngestStats, MergeOutcome, Merger};
pub use resolver::{ConflictResolver, Resolution, DEFAULT_THRESHOLD};
pub use types::{GroupKey, MergeError, ResolveStats, Result, SignatureRecord};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_basics() {
        // Smoke test: a fresh merger has nothing indexed
        let merger = Merger::new(MergeConfig::new()).unwrap();
        assert!(merger.index().is_empty());
        assert_eq!(merger.ingest_stats(), IngestStats::default());
    }
}
