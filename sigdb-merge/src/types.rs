//! Core types for the signature database merger
//!
//! This module defines the records produced by the parser, the keys used to
//! bucket them, and the error type shared by every stage of a merge run.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Result type for merge operations
pub type Result<T> = std::result::Result<T, MergeError>;

/// Checksum length of the sentinel group key
pub const SENTINEL_CRC_LENGTH: &str = "00";

/// Checksum value of the sentinel group key
pub const SENTINEL_CRC16: &str = "0000";

/// Coarse discriminator shared by records that may land in the same matcher bucket
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    /// Checksum length token (hex)
    pub crc_length: String,
    /// Checksum value token (hex)
    pub crc16: String,
}

impl GroupKey {
    /// Create a new group key
    pub fn new(crc_length: impl Into<String>, crc16: impl Into<String>) -> Self {
        Self {
            crc_length: crc_length.into(),
            crc16: crc16.into(),
        }
    }

    /// True for the zero-length / zero-checksum key.
    ///
    /// A matcher falls back to pattern bytes alone for these records, so any
    /// collision in this key is never resolved in favour of one candidate.
    pub fn is_sentinel(&self) -> bool {
        self.crc_length == SENTINEL_CRC_LENGTH && self.crc16 == SENTINEL_CRC16
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.crc_length, self.crc16)
    }
}

/// A single signature line parsed from a pattern file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureRecord {
    /// Wildcarded byte pattern (field 0)
    pub pattern: String,
    /// Checksum length token (field 1)
    pub crc_length: String,
    /// Checksum value token (field 2)
    pub crc16: String,
    /// Function size, hex encoded (field 3). Never `"0000"`.
    pub size: String,
    /// Reserved/offset field (field 4), passed through verbatim
    pub reserved: String,
    /// Symbol name (field 5). Never a `case.0x` placeholder.
    pub name: String,
    /// First six fields joined by single spaces; this is what gets written out
    pub raw_line: String,
    /// Any fields after the name, verbatim
    pub trailing: Option<String>,
    /// File the record was read from
    pub source_file: PathBuf,
}

impl SignatureRecord {
    /// Group key of this record
    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(self.crc_length.clone(), self.crc16.clone())
    }

    /// Function size in bytes, if the hex token is well formed
    pub fn size_bytes(&self) -> Option<u64> {
        u64::from_str_radix(&self.size, 16).ok()
    }
}

/// Counters reported by the conflict resolver
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveStats {
    /// Raw lines visited, singletons included
    pub total: usize,
    /// Raw lines dropped with their ambiguous or sentinel buckets
    pub bad: usize,
    /// Raw lines in conflicting buckets that were reduced to one survivor
    pub resolved: usize,
}

impl fmt::Display for ResolveStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "dropped {} signatures due conflicts and resolved {} over {} total.",
            self.bad, self.resolved, self.total
        )
    }
}

/// Errors that can occur while merging signature files
#[derive(Debug, thiserror::Error)]
pub enum MergeError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Similarity threshold must be within [0, 1], got {0}")]
    InvalidThreshold(f64),

    #[error("Invalid database target: {0}")]
    InvalidTarget(String),

    #[error("Could not find and load any signature from the input files")]
    NoSignatures,

    #[error("External tool failed: {0}")]
    ToolError(String),

    #[error("Failed to parse tool output: {0}")]
    ToolOutputError(#[from] serde_json::Error),

    #[error("Failed to build worker pool: {0}")]
    ThreadPoolError(#[from] rayon::ThreadPoolBuildError),
}
