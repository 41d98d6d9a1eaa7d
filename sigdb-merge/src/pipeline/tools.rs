//! Process-backed pipeline stages
//!
//! Thin wrappers around `rz-bin`, `rz-sign` and `ar`.

use super::{ArchiveUnpacker, BinaryInfo, BinaryInspector, SignatureGenerator};
use crate::types::{MergeError, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Run a command and return its stdout; a non-zero exit is an error
fn run(command: &mut Command) -> Result<String> {
    log::trace!("running {:?}", command);
    let output = command.output()?;
    if !output.status.success() {
        return Err(MergeError::ToolError(format!(
            "{:?} exit with {}",
            command, output.status
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

/// Binary metadata via `rz-bin -Ij`
#[derive(Debug, Clone)]
pub struct RzBin {
    program: PathBuf,
}

#[derive(Debug, Deserialize)]
struct RzBinOutput {
    #[serde(default)]
    info: RzBinInfo,
}

#[derive(Debug, Default, Deserialize)]
struct RzBinInfo {
    bintype: Option<String>,
    arch: Option<String>,
    bits: Option<serde_json::Value>,
}

impl RzBin {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Extract binary metadata from `rz-bin -Ij` output
    pub fn parse_info(json: &str) -> Result<Option<BinaryInfo>> {
        let output: RzBinOutput = serde_json::from_str(json)?;
        let info = output.info;
        let (Some(bintype), Some(arch)) = (info.bintype, info.arch) else {
            return Ok(None);
        };
        let bits = match info.bits {
            Some(serde_json::Value::String(bits)) => bits,
            Some(serde_json::Value::Number(bits)) => bits.to_string(),
            _ => "None".to_string(),
        };
        Ok(Some(BinaryInfo { bintype, arch, bits }))
    }
}

impl Default for RzBin {
    fn default() -> Self {
        Self::new("rz-bin")
    }
}

impl BinaryInspector for RzBin {
    fn inspect(&self, object: &Path) -> Option<BinaryInfo> {
        let json = match run(Command::new(&self.program).arg("-Ij").arg(object)) {
            Ok(json) if !json.is_empty() => json,
            Ok(_) => return None,
            Err(e) => {
                log::warn!("{}", e);
                return None;
            }
        };
        match Self::parse_info(&json) {
            Ok(info) => info,
            Err(e) => {
                log::warn!("unreadable rz-bin output for {}: {}", object.display(), e);
                None
            }
        }
    }
}

/// Pattern generation via `rz-sign`
#[derive(Debug, Clone)]
pub struct RzSign {
    program: PathBuf,
    verbose: bool,
}

impl RzSign {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            verbose: false,
        }
    }

    /// Builder method: let rz-sign log at a more verbose level
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    fn command(&self, object: &Path, output: &Path) -> Command {
        let log_level = if self.verbose { 5 } else { 6 };
        let mut command = Command::new(&self.program);
        command
            .args(["-q", "-a"])
            .args(["-e", "flirt.node.optimize=0"])
            .args(["-e", "bin.demangle=false"])
            .arg("-e")
            .arg(format!("log.level={}", log_level))
            .arg("-o")
            .arg(output)
            .arg(object);
        command
    }
}

impl Default for RzSign {
    fn default() -> Self {
        Self::new("rz-sign")
    }
}

impl SignatureGenerator for RzSign {
    fn generate(&self, object: &Path, output: &Path) -> Result<()> {
        run(&mut self.command(object, output)).map(|_| ())
    }
}

/// Archive extraction via `ar`
///
/// Windows import libraries may name members with full paths
/// (`d:\build\obj\file.obj`); their directories are created before
/// extraction so `ar` can write them. Members containing spaces are left out
/// of that step.
#[derive(Debug, Clone)]
pub struct ArUnpacker {
    program: PathBuf,
}

impl ArUnpacker {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Directories that must exist under `dest` before extracting `members`
    pub fn member_dirs(members: &str, dest: &Path) -> Vec<PathBuf> {
        let mut dirs: Vec<PathBuf> = members
            .lines()
            .map(str::trim)
            .filter(|m| !m.is_empty() && !m.contains(' '))
            .filter_map(|m| {
                let member = m.replace('\\', "/");
                // drop a drive letter such as `d:/`
                let member = match member.split_once(":/") {
                    Some((drive, rest)) if drive.len() == 1 => rest.to_string(),
                    _ => member.clone(),
                };
                let member = member.trim_start_matches('/');
                Path::new(member).parent().map(|p| dest.join(p))
            })
            .filter(|dir| dir != dest)
            .collect();
        dirs.sort();
        dirs.dedup();
        dirs
    }
}

impl Default for ArUnpacker {
    fn default() -> Self {
        Self::new("ar")
    }
}

impl ArchiveUnpacker for ArUnpacker {
    fn unpack(&self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
        let archive = fs::canonicalize(archive)?;
        fs::create_dir_all(dest)?;

        let members = run(Command::new(&self.program).arg("t").arg(&archive))?;
        for dir in Self::member_dirs(&members, dest) {
            fs::create_dir_all(dir)?;
        }

        run(Command::new(&self.program)
            .arg("x")
            .arg(&archive)
            .current_dir(dest))?;

        let staged = super::discover::find_files(dest, &[])?;
        log::debug!("{}: {} members staged", archive.display(), staged.len());
        Ok(staged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rz_bin_info() {
        let json = r#"{
            "core": {"file": "printf.o"},
            "info": {"arch": "x86", "bits": 64, "bintype": "elf", "os": "linux"}
        }"#;
        let info = RzBin::parse_info(json).unwrap().unwrap();
        assert_eq!(
            info,
            BinaryInfo {
                bintype: "elf".into(),
                arch: "x86".into(),
                bits: "64".into(),
            }
        );
    }

    #[test]
    fn test_parse_rz_bin_without_metadata() {
        assert_eq!(RzBin::parse_info(r#"{"info":{"bits":32}}"#).unwrap(), None);
        assert_eq!(RzBin::parse_info("{}").unwrap(), None);
        assert!(RzBin::parse_info("not json").is_err());
    }

    #[test]
    fn test_rz_sign_command_line() {
        let command = RzSign::default().command(Path::new("a.o"), Path::new("a.o.pat"));
        let args: Vec<String> = command
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            vec![
                "-q", "-a", "-e", "flirt.node.optimize=0", "-e", "bin.demangle=false",
                "-e", "log.level=6", "-o", "a.o.pat", "a.o",
            ]
        );
    }

    #[test]
    fn test_member_dirs() {
        let members = "plain.obj\nd:\\build\\obj\\file.obj\nsub/dir/x.obj\nwith space\\y.obj\n";
        let dirs = ArUnpacker::member_dirs(members, Path::new("/stage"));
        assert_eq!(
            dirs,
            vec![
                PathBuf::from("/stage/build/obj"),
                PathBuf::from("/stage/sub/dir"),
            ]
        );
    }
}
