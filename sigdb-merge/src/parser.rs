//! Pattern file parser
//!
//! Turns the lines of a raw pattern file into [`SignatureRecord`]s.
//!
//! ## Line format
//! `<pattern> <crc length> <crc16> <size> <reserved> <name> [trailing...]`,
//! single-space separated. A line consisting of `---` ends the record section.
//!
//! ## Admission filters
//! - names starting with `case.0x` are jump-table labels and are dropped
//! - size `0000` means unknown size and is dropped
//! - lines with fewer than six fields are reported as malformed

use crate::types::{Result, SignatureRecord};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Line terminating the record section of a pattern file
pub const TERMINATOR: &str = "---";

/// Name prefix of compiler-generated jump-table labels
pub const PLACEHOLDER_PREFIX: &str = "case.0x";

/// Size token meaning "unknown size"
pub const ZERO_SIZE: &str = "0000";

/// Minimum number of fields in a record line
pub const MIN_FIELDS: usize = 6;

/// Index of the symbol name within a record line
pub const NAME_FIELD: usize = 5;

/// What a single input line turned into
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    /// An admitted record
    Record(SignatureRecord),
    /// Name is a `case.0x` placeholder
    Placeholder,
    /// Size is `0000`
    ZeroSize,
    /// Fewer than six fields (holds the field count)
    Malformed(usize),
}

/// Per-file parse counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParseStats {
    pub lines: usize,
    pub records: usize,
    pub malformed: usize,
    pub placeholders: usize,
    pub zero_size: usize,
}

/// Records parsed from one file together with its counters
#[derive(Debug, Clone, Default)]
pub struct ParsedFile {
    pub records: Vec<SignatureRecord>,
    pub stats: ParseStats,
}

/// True if a symbol name is a jump-table placeholder
pub fn is_placeholder(name: &str) -> bool {
    name.starts_with(PLACEHOLDER_PREFIX)
}

/// Symbol name of a stored raw line (field 5)
pub fn symbol_name(raw_line: &str) -> &str {
    raw_line.split(' ').nth(NAME_FIELD).unwrap_or("")
}

/// True if the file name carries the `.<suffix>` extension
pub fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.ends_with(&format!(".{}", suffix)))
        .unwrap_or(false)
}

/// Classify a single line of a pattern file
///
/// Trailing whitespace should already be stripped; the terminator line is the
/// caller's business.
pub fn parse_line(line: &str, source: &Path) -> LineOutcome {
    let fields: Vec<&str> = line.split(' ').collect();
    if fields.len() < MIN_FIELDS {
        return LineOutcome::Malformed(fields.len());
    }

    let name = fields[NAME_FIELD];
    if is_placeholder(name) {
        return LineOutcome::Placeholder;
    }
    if fields[3] == ZERO_SIZE {
        return LineOutcome::ZeroSize;
    }

    let trailing = if fields.len() > MIN_FIELDS {
        Some(fields[MIN_FIELDS..].join(" "))
    } else {
        None
    };

    LineOutcome::Record(SignatureRecord {
        pattern: fields[0].to_string(),
        crc_length: fields[1].to_string(),
        crc16: fields[2].to_string(),
        size: fields[3].to_string(),
        reserved: fields[4].to_string(),
        name: name.to_string(),
        raw_line: fields[..MIN_FIELDS].join(" "),
        trailing,
        source_file: source.to_path_buf(),
    })
}

/// Parse every record line of a reader up to the terminator
///
/// Lines that are not valid UTF-8 are counted as malformed and skipped;
/// only read errors fail the whole file.
pub fn parse_reader<R: BufRead>(mut reader: R, source: &Path) -> Result<ParsedFile> {
    let mut parsed = ParsedFile::default();
    let mut buf = Vec::new();
    let mut index = 0usize;

    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        index += 1;

        let line = match std::str::from_utf8(&buf) {
            Ok(line) => line.trim_end(),
            Err(e) => {
                parsed.stats.lines += 1;
                parsed.stats.malformed += 1;
                log::warn!(
                    "{}:{}: skipping line that is not valid UTF-8 ({})",
                    source.display(),
                    index,
                    e
                );
                continue;
            }
        };
        if line == TERMINATOR {
            break;
        }
        parsed.stats.lines += 1;

        match parse_line(line, source) {
            LineOutcome::Record(record) => {
                parsed.stats.records += 1;
                parsed.records.push(record);
            }
            LineOutcome::Placeholder => parsed.stats.placeholders += 1,
            LineOutcome::ZeroSize => parsed.stats.zero_size += 1,
            LineOutcome::Malformed(count) => {
                parsed.stats.malformed += 1;
                log::warn!(
                    "{}:{}: skipping malformed line ({} fields, need {})",
                    source.display(),
                    index,
                    count,
                    MIN_FIELDS
                );
            }
        }
    }

    Ok(parsed)
}

/// Parse a pattern file
///
/// Returns `Ok(None)` if the file name does not end in `.<suffix>`.
pub fn parse_file(path: &Path, suffix: &str) -> Result<Option<ParsedFile>> {
    if !has_suffix(path, suffix) {
        log::debug!("not a {} file: {}", suffix, path.display());
        return Ok(None);
    }

    log::debug!("parsing {}", path.display());
    let file = File::open(path)?;
    let parsed = parse_reader(BufReader::new(file), path)?;

    log::debug!(
        "{}: {} records from {} lines ({} malformed, {} placeholders, {} zero-size)",
        path.display(),
        parsed.stats.records,
        parsed.stats.lines,
        parsed.stats.malformed,
        parsed.stats.placeholders,
        parsed.stats.zero_size
    );

    Ok(Some(parsed))
}
