//! Conflict resolution
//!
//! Decides, for every (group key, pattern) bucket, whether to keep its only
//! record, keep one representative of several, or drop them all.
//!
//! ## Rules
//! 1. One raw line: kept as is.
//! 2. Several raw lines under the sentinel key `00 0000`: dropped. Without a
//!    checksum the matcher relies on the pattern alone.
//! 3. Several raw lines whose names have a cohesion below the threshold:
//!    dropped as different functions sharing a pattern.
//! 4. Otherwise the lexicographically first raw line survives.

use crate::database::SignatureDatabase;
use crate::index::{PatternBucket, SignatureIndex};
use crate::parser::symbol_name;
use crate::similarity::cohesion;
use crate::types::{GroupKey, MergeError, ResolveStats, Result};

/// Default name-similarity threshold
pub const DEFAULT_THRESHOLD: f64 = 0.66;

/// Resolution of a single bucket
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// Only one raw line; never in conflict
    Singleton(String),
    /// Conflicting lines judged to be the same symbol; first one kept
    Resolved { kept: String, score: f64 },
    /// Conflict under the sentinel key
    DroppedSentinel,
    /// Names too dissimilar to pick one
    DroppedDissimilar { score: f64 },
}

/// Resolves conflicts with a fixed similarity threshold
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictResolver {
    threshold: f64,
}

impl ConflictResolver {
    /// Create a resolver; the threshold must lie in `[0, 1]`
    pub fn new(threshold: f64) -> Result<Self> {
        if !(0.0..=1.0).contains(&threshold) {
            return Err(MergeError::InvalidThreshold(threshold));
        }
        Ok(Self { threshold })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Decide what happens to one bucket
    pub fn resolve_bucket(&self, key: &GroupKey, bucket: PatternBucket) -> Resolution {
        let mut lines = bucket.into_sorted();
        if lines.len() < 2 {
            return match lines.pop() {
                Some(line) => Resolution::Singleton(line),
                // empty buckets are never created by the index
                None => Resolution::DroppedDissimilar { score: 0.0 },
            };
        }

        if key.is_sentinel() {
            return Resolution::DroppedSentinel;
        }

        let names: Vec<&str> = lines.iter().map(|line| symbol_name(line)).collect();
        let score = cohesion(&names);
        if score < self.threshold {
            return Resolution::DroppedDissimilar { score };
        }

        // at least two lines, sorted: index 0 is the lexicographic first
        let kept = lines.swap_remove(0);
        Resolution::Resolved { kept, score }
    }

    /// Resolve every bucket of the index
    ///
    /// Fails with [`MergeError::NoSignatures`] if the index held no records.
    pub fn resolve(&self, index: SignatureIndex) -> Result<(SignatureDatabase, ResolveStats)> {
        let mut db = SignatureDatabase::new();
        let mut stats = ResolveStats::default();

        for (key, group) in index.into_groups() {
            db.open_group(key.clone());
            for (pattern, bucket) in group {
                let n = bucket.len();
                stats.total += n;

                // names are only needed for the trace
                let names = if log::log_enabled!(log::Level::Debug) && n > 1 {
                    bucket.lines().map(symbol_name).collect::<Vec<_>>().join(", ")
                } else {
                    String::new()
                };

                match self.resolve_bucket(&key, bucket) {
                    Resolution::Singleton(line) => {
                        db.keep(key.clone(), pattern, line);
                    }
                    Resolution::DroppedSentinel => {
                        log::debug!(
                            "[{}] dropping {} signatures with prelude {} ({})",
                            key,
                            n,
                            pattern,
                            names
                        );
                        stats.bad += n;
                    }
                    Resolution::DroppedDissimilar { score } => {
                        log::debug!(
                            "[{}] dropping {} signatures with prelude {} ({}) due similarity of {:.2}",
                            key,
                            n,
                            pattern,
                            names,
                            score
                        );
                        stats.bad += n;
                    }
                    Resolution::Resolved { kept, score } => {
                        log::debug!(
                            "[{}] keeping {} signatures with prelude {} ({}) and similarity of {:.2}",
                            key,
                            n,
                            pattern,
                            names,
                            score
                        );
                        stats.resolved += n;
                        db.keep(key.clone(), pattern, kept);
                    }
                }
            }
        }

        if stats.total == 0 {
            return Err(MergeError::NoSignatures);
        }

        log::info!("{}", stats);
        Ok((db, stats))
    }
}

impl Default for ConflictResolver {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::{parse_line, LineOutcome};
    use std::path::Path;

    fn index_of(lines: &[&str]) -> SignatureIndex {
        let mut index = SignatureIndex::new();
        for line in lines {
            match parse_line(line, Path::new("test.pac")) {
                LineOutcome::Record(record) => index.add(record),
                other => panic!("unexpected outcome: {:?}", other),
            }
        }
        index
    }

    #[test]
    fn test_threshold_validation() {
        assert!(ConflictResolver::new(0.0).is_ok());
        assert!(ConflictResolver::new(1.0).is_ok());
        assert!(matches!(
            ConflictResolver::new(1.5),
            Err(MergeError::InvalidThreshold(_))
        ));
        assert!(ConflictResolver::new(f64::NAN).is_err());
        assert_eq!(ConflictResolver::default().threshold(), DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_singleton_is_kept() {
        let index = index_of(&["AA 00 0000 0010 :0000 lonely"]);
        let (db, stats) = ConflictResolver::default().resolve(index).unwrap();
        let key = GroupKey::new("00", "0000");
        assert_eq!(db.get(&key, "AA"), Some("AA 00 0000 0010 :0000 lonely"));
        assert_eq!(
            stats,
            ResolveStats {
                total: 1,
                bad: 0,
                resolved: 0
            }
        );
    }

    #[test]
    fn test_similar_names_keep_first() {
        let index = index_of(&[
            "AA 02 a1b2 0012 :0000 alloc_init2",
            "AA 02 a1b2 0010 :0000 alloc_init",
        ]);
        let (db, stats) = ConflictResolver::default().resolve(index).unwrap();
        let key = GroupKey::new("02", "a1b2");
        assert_eq!(db.get(&key, "AA"), Some("AA 02 a1b2 0010 :0000 alloc_init"));
        assert_eq!(
            stats,
            ResolveStats {
                total: 2,
                bad: 0,
                resolved: 2
            }
        );
    }

    #[test]
    fn test_dissimilar_names_are_dropped() {
        let index = index_of(&[
            "AA 02 a1b2 0010 :0000 foo_bar",
            "AA 02 a1b2 0010 :0000 xyz_qux",
        ]);
        let (db, stats) = ConflictResolver::default().resolve(index).unwrap();
        assert!(db.is_empty());
        assert_eq!(
            stats,
            ResolveStats {
                total: 2,
                bad: 2,
                resolved: 0
            }
        );
    }

    #[test]
    fn test_sentinel_conflict_is_dropped_even_when_similar() {
        let index = index_of(&[
            "AA 00 0000 0010 :0000 memcpy",
            "AA 00 0000 0012 :0000 memcpy",
        ]);
        let (db, stats) = ConflictResolver::default().resolve(index).unwrap();
        assert!(db.is_empty());
        assert_eq!(
            stats,
            ResolveStats {
                total: 2,
                bad: 2,
                resolved: 0
            }
        );
    }

    #[test]
    fn test_threshold_edges() {
        let lines = [
            "AA 02 a1b2 0010 :0000 foo_bar",
            "AA 02 a1b2 0010 :0000 xyz_qux",
        ];
        let resolver = ConflictResolver::new(0.0).unwrap();
        let (db, _) = resolver.resolve(index_of(&lines)).unwrap();
        assert_eq!(db.len(), 1);

        let same = ["AA 02 a1b2 0010 :0000 puts", "AA 02 a1b2 0014 :0000 puts"];
        let resolver = ConflictResolver::new(1.0).unwrap();
        let (db, stats) = resolver.resolve(index_of(&same)).unwrap();
        assert_eq!(db.len(), 1);
        assert_eq!(stats.resolved, 2);
    }

    #[test]
    fn test_empty_index_is_fatal() {
        let result = ConflictResolver::default().resolve(SignatureIndex::new());
        assert!(matches!(result, Err(MergeError::NoSignatures)));
    }

    #[test]
    fn test_mixed_counters() {
        let index = index_of(&[
            "AA 01 0001 0010 :0000 single",
            "BB 02 a1b2 0010 :0000 qsort",
            "BB 02 a1b2 0010 :0000 qsort_r",
            "CC 02 a1b2 0010 :0000 open",
            "CC 02 a1b2 0010 :0000 wcsxfrm",
            "CC 02 a1b2 0010 :0000 kill",
            "DD 00 0000 0010 :0000 x",
            "DD 00 0000 0011 :0000 x",
        ]);
        let (db, stats) = ConflictResolver::default().resolve(index).unwrap();
        assert_eq!(
            stats,
            ResolveStats {
                total: 8,
                bad: 5,
                resolved: 2
            }
        );
        assert_eq!(db.len(), 2);
        assert_eq!(db.group_count(), 3);
    }
}
