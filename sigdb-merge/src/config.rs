//! Merge configuration types
//!
//! `MergeConfig` carries the knobs of a merge run, `DatabaseTarget` names the
//! (architecture, bits, system, library) tuple a database is built for. Both
//! deserialize from TOML/JSON so the CLI can load them from a file.

use crate::resolver::DEFAULT_THRESHOLD;
use crate::types::{MergeError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for a merge run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Minimum name cohesion for a conflicting bucket to keep one record
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    /// Extension (without the dot) of the pattern files to ingest
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Parser threads; 0 lets rayon decide, 1 parses sequentially
    #[serde(default)]
    pub jobs: usize,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_suffix() -> String {
    "pac".to_string()
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            suffix: default_suffix(),
            jobs: 0,
        }
    }
}

impl MergeConfig {
    /// Create a configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the similarity threshold
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Builder method: set the input file suffix
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Builder method: set the number of parser threads
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Check the configuration before a run
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(MergeError::InvalidThreshold(self.threshold));
        }
        Ok(())
    }
}

/// The database a merge run produces
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseTarget {
    /// Architecture name, e.g. `x86`
    pub arch: String,
    /// Bit width, e.g. `64`
    pub bits: String,
    /// System name, e.g. `linux`
    pub system: String,
    /// Optional system variant, appended to the system with `_`
    #[serde(default)]
    pub variant: Option<String>,
    /// Library name, e.g. `libc`
    pub library: String,
}

impl DatabaseTarget {
    pub fn new(
        arch: impl Into<String>,
        bits: impl Into<String>,
        system: impl Into<String>,
        library: impl Into<String>,
    ) -> Self {
        Self {
            arch: arch.into(),
            bits: bits.into(),
            system: system.into(),
            variant: None,
            library: library.into(),
        }
    }

    /// Builder method: set the system variant
    pub fn with_variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = Some(variant.into());
        self
    }

    /// System name including the variant, if any
    pub fn system_name(&self) -> String {
        match self.variant.as_deref() {
            Some(variant) if !variant.is_empty() => format!("{}_{}", self.system, variant),
            _ => self.system.clone(),
        }
    }

    /// Output file name: `<arch>_<bits>_<system>[_<variant>]_<library>.pac`
    pub fn file_name(&self) -> String {
        format!(
            "{}_{}_{}_{}.pac",
            self.arch,
            self.bits,
            self.system_name(),
            self.library
        )
    }

    /// Every component except the variant must be set
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("arch", &self.arch),
            ("bits", &self.bits),
            ("system", &self.system),
            ("library", &self.library),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(MergeError::InvalidTarget(format!("{} must not be empty", field)));
            }
        }
        Ok(())
    }
}
