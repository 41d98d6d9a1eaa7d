//! Resolved signature database
//!
//! Output of conflict resolution: at most one surviving raw line per
//! (group key, pattern), in the first-seen order of the index it came from.

use crate::types::GroupKey;
use indexmap::IndexMap;

/// Resolved database ready to be written
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignatureDatabase {
    groups: IndexMap<GroupKey, IndexMap<String, String>>,
}

impl SignatureDatabase {
    /// Create an empty database
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure a group exists, keeping its first-seen position even if
    /// every bucket in it ends up dropped
    pub fn open_group(&mut self, key: GroupKey) {
        self.groups.entry(key).or_default();
    }

    /// Record the surviving raw line of a pattern
    pub fn keep(&mut self, key: GroupKey, pattern: String, raw_line: String) {
        self.groups.entry(key).or_default().insert(pattern, raw_line);
    }

    /// Surviving raw line of a pattern
    pub fn get(&self, key: &GroupKey, pattern: &str) -> Option<&str> {
        self.groups.get(key)?.get(pattern).map(String::as_str)
    }

    /// Number of surviving records
    pub fn len(&self) -> usize {
        self.groups.values().map(|group| group.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of group keys, including groups with no survivors
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }

    /// Surviving raw lines in write order
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.groups
            .values()
            .flat_map(|group| group.values())
            .map(String::as_str)
    }
}
