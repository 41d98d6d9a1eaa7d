//! Configuration loading and parsing
//!
//! A merge can be described in a TOML file instead of (or in addition to)
//! command-line flags. Flags given on the command line win.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sigdb_merge::{DatabaseTarget, MergeConfig};
use std::fs;
use std::path::Path;

/// Merge configuration as stored in a TOML file
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FileConfig {
    #[serde(default)]
    pub target: TargetConfig,
    #[serde(default)]
    pub merge: MergeConfig,
}

/// `[target]` section; every field may also come from the command line
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TargetConfig {
    pub arch: Option<String>,
    pub bits: Option<String>,
    pub system: Option<String>,
    pub variant: Option<String>,
    pub library: Option<String>,
}

/// Command-line values that override the file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub target: TargetConfig,
    pub threshold: Option<f64>,
    pub suffix: Option<String>,
    pub jobs: Option<usize>,
}

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<FileConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: FileConfig = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    Ok(config)
}

fn pick(flag: Option<String>, file: Option<String>, name: &str) -> Result<String> {
    match flag.or(file) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => bail!("missing {} (use --{} or set it in the [target] section)", name, name),
    }
}

impl FileConfig {
    /// Apply command-line overrides and produce the run configuration
    pub fn resolve(self, overrides: Overrides) -> Result<(DatabaseTarget, MergeConfig)> {
        let flags = overrides.target;
        let file = self.target;

        let mut target = DatabaseTarget::new(
            pick(flags.arch, file.arch, "arch")?,
            pick(flags.bits, file.bits, "bits")?,
            pick(flags.system, file.system, "system")?,
            pick(flags.library, file.library, "library")?,
        );
        if let Some(variant) = flags.variant.or(file.variant) {
            target = target.with_variant(variant);
        }
        target.validate()?;

        let mut merge = self.merge;
        if let Some(threshold) = overrides.threshold {
            merge.threshold = threshold;
        }
        if let Some(suffix) = overrides.suffix {
            merge.suffix = suffix;
        }
        if let Some(jobs) = overrides.jobs {
            merge.jobs = jobs;
        }
        merge.validate()?;

        Ok((target, merge))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_deserialization() {
        let toml_content = r#"
            [target]
            arch = "x86"
            bits = "64"
            system = "linux"
            library = "libc"

            [merge]
            threshold = 0.7
        "#;

        let config: FileConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.target.arch.as_deref(), Some("x86"));
        assert_eq!(config.merge.threshold, 0.7);
        assert_eq!(config.merge.suffix, "pac");
    }

    #[test]
    fn test_flags_override_file() {
        let config: FileConfig = toml::from_str(
            r#"
            [target]
            arch = "x86"
            bits = "32"
            system = "linux"
            library = "libc"
            "#,
        )
        .unwrap();

        let overrides = Overrides {
            target: TargetConfig {
                bits: Some("64".into()),
                variant: Some("musl".into()),
                ..Default::default()
            },
            threshold: Some(0.5),
            ..Default::default()
        };

        let (target, merge) = config.resolve(overrides).unwrap();
        assert_eq!(target.file_name(), "x86_64_linux_musl_libc.pac");
        assert_eq!(merge.threshold, 0.5);
    }

    #[test]
    fn test_missing_target_field() {
        let err = FileConfig::default().resolve(Overrides::default()).unwrap_err();
        assert!(err.to_string().contains("arch"));
    }

    #[test]
    fn test_invalid_threshold_is_rejected() {
        let overrides = Overrides {
            target: TargetConfig {
                arch: Some("x86".into()),
                bits: Some("64".into()),
                system: Some("linux".into()),
                library: Some("libc".into()),
                variant: None,
            },
            threshold: Some(1.5),
            ..Default::default()
        };
        assert!(FileConfig::default().resolve(overrides).is_err());
    }
}
