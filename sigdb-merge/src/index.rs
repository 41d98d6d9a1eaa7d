//! Signature index
//!
//! Accumulates parsed records from many files into
//! `GroupKey -> pattern -> set of raw lines`. Both map levels keep first-seen
//! order; each bucket keeps its raw lines sorted so the resolver's choice of
//! "first" does not depend on the order files were read in.

use crate::types::{GroupKey, SignatureRecord};
use indexmap::IndexMap;
use std::collections::BTreeSet;

/// Distinct raw lines observed for one exact pattern within one group
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatternBucket {
    lines: BTreeSet<String>,
}

impl PatternBucket {
    /// Insert a raw line; returns false if it was already present
    pub fn insert(&mut self, raw_line: String) -> bool {
        self.lines.insert(raw_line)
    }

    /// Number of distinct raw lines
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Raw lines in lexicographic order
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    /// Lexicographically first raw line
    pub fn first(&self) -> Option<&str> {
        self.lines.first().map(String::as_str)
    }

    /// Consume the bucket, returning its raw lines sorted
    pub fn into_sorted(self) -> Vec<String> {
        self.lines.into_iter().collect()
    }
}

/// Buckets of one group, keyed by pattern
pub type PatternGroup = IndexMap<String, PatternBucket>;

/// Accumulation container filled during ingestion
#[derive(Debug, Clone, Default)]
pub struct SignatureIndex {
    groups: IndexMap<GroupKey, PatternGroup>,
}

impl SignatureIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a record under its group key and pattern
    pub fn add(&mut self, record: SignatureRecord) {
        let key = record.group_key();
        let inserted = self
            .groups
            .entry(key)
            .or_default()
            .entry(record.pattern)
            .or_default()
            .insert(record.raw_line);
        if !inserted {
            log::trace!("duplicate raw line from {}", record.source_file.display());
        }
    }

    /// Register every record of an iterator
    pub fn extend<I: IntoIterator<Item = SignatureRecord>>(&mut self, records: I) {
        for record in records {
            self.add(record);
        }
    }

    /// Number of distinct group keys
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Number of (group key, pattern) buckets
    pub fn bucket_count(&self) -> usize {
        self.groups.values().map(|group| group.len()).sum()
    }

    /// Number of distinct raw lines across all buckets
    pub fn line_count(&self) -> usize {
        self.groups
            .values()
            .flat_map(|group| group.values())
            .map(PatternBucket::len)
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Look up the bucket of one pattern
    pub fn bucket(&self, key: &GroupKey, pattern: &str) -> Option<&PatternBucket> {
        self.groups.get(key)?.get(pattern)
    }

    /// Groups in first-seen order
    pub fn groups(&self) -> impl Iterator<Item = (&GroupKey, &PatternGroup)> {
        self.groups.iter()
    }

    /// Consume the index, yielding groups in first-seen order
    pub fn into_groups(self) -> impl Iterator<Item = (GroupKey, PatternGroup)> {
        self.groups.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_line, LineOutcome};
    use std::path::Path;

    fn record(line: &str) -> SignatureRecord {
        match parse_line(line, Path::new("test.pac")) {
            LineOutcome::Record(record) => record,
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn test_empty_index() {
        let index = SignatureIndex::new();
        assert!(index.is_empty());
        assert_eq!(index.group_count(), 0);
        assert_eq!(index.bucket_count(), 0);
        assert_eq!(index.line_count(), 0);
    }

    #[test]
    fn test_duplicates_collapse() {
        let mut index = SignatureIndex::new();
        index.add(record("AA 01 0001 0010 :0000 strlen"));
        index.add(record("AA 01 0001 0010 :0000 strlen"));
        assert_eq!(index.line_count(), 1);
    }

    #[test]
    fn test_grouping_and_bucket_order() {
        let mut index = SignatureIndex::new();
        index.extend(vec![
            record("BB 02 a1b2 0010 :0000 zeta"),
            record("AA 01 0001 0010 :0000 strlen"),
            record("BB 02 a1b2 0020 :0000 alpha"),
            record("CC 02 a1b2 0010 :0000 other"),
        ]);

        assert_eq!(index.group_count(), 2);
        assert_eq!(index.bucket_count(), 3);
        assert_eq!(index.line_count(), 4);

        // groups keep first-seen order
        let keys: Vec<String> = index.groups().map(|(k, _)| k.to_string()).collect();
        assert_eq!(keys, vec!["02 a1b2", "01 0001"]);

        // bucket lines are sorted regardless of insertion order
        let bucket = index.bucket(&GroupKey::new("02", "a1b2"), "BB").unwrap();
        let lines: Vec<&str> = bucket.lines().collect();
        assert_eq!(
            lines,
            vec!["BB 02 a1b2 0010 :0000 zeta", "BB 02 a1b2 0020 :0000 alpha"]
        );
        assert_eq!(bucket.first(), Some("BB 02 a1b2 0010 :0000 zeta"));
    }
}
