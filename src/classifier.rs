//! Change classification against a prior snapshot
//!
//! Every freshly fingerprinted file is compared with the baseline record for
//! the same path and ends up in exactly one class:
//!
//! | Class        | Flag          | Condition                                          |
//! |--------------|---------------|----------------------------------------------------|
//! | Inserted     | `INSERTED`    | no baseline record                                 |
//! | Suspicious   | `SUSPICIOUS`  | at least one suspicion rule matched                |
//! | Unchanged    | none          | size, hash and all three timestamps equal          |
//! | Mismatched   | `MISMATCHED`  | anything else                                      |
//!
//! ## Suspicion rules
//!
//! The rules look for one dimension changing without the change that should
//! normally accompany it. All rules are evaluated; when several match, the
//! reported reason is the one of the *last* matching rule in this order:
//!
//! 1. accessed time earlier than created time
//! 2. only the size changed (hash and all timestamps equal)
//! 3. only the hash changed (size and all timestamps equal)
//! 4. hash and size changed while the modified time did not
//!
//! Rule 1 is unreliable on platforms that keep the modified time but reset
//! the creation time when copying files, and should not be read in isolation.
//!
//! Without a content hash the rules do not apply: a file is either unchanged
//! (size and timestamps equal) or mismatched.
//!
//! Run-level state lives in an explicit [`RunContext`] owned by the caller.

use crate::snapshot::Snapshot;
use crate::types::{FileRecord, RunStats, StatusFlags};
use std::fmt;
use tracing::{debug, warn};

/// Why a file was flagged suspicious
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SuspicionReason {
    /// Accessed time is earlier than created time
    TimesInconsistent,
    /// Size changed, hash and timestamps did not
    SizeOnly,
    /// Hash changed, size and timestamps did not
    HashOnly,
    /// Hash and size changed, modified time did not
    HashAndSizeWithoutModified,
}

impl SuspicionReason {
    /// Human readable reason text
    pub fn as_str(self) -> &'static str {
        match self {
            SuspicionReason::TimesInconsistent => "file times are inconsistent",
            SuspicionReason::SizeOnly => "only the size has changed",
            SuspicionReason::HashOnly => "only hash changed",
            SuspicionReason::HashAndSizeWithoutModified => {
                "hash and size changed but not modified timestamp"
            }
        }
    }
}

impl fmt::Display for SuspicionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    /// No baseline record existed
    Inserted,
    /// Identical to the baseline
    Unchanged,
    /// Changed without matching a suspicion rule
    Mismatched,
    /// Matched at least one suspicion rule
    Suspicious(SuspicionReason),
}

impl Classification {
    /// Flags a record carries for this outcome
    pub fn flags(self) -> StatusFlags {
        match self {
            Classification::Inserted => StatusFlags::INSERTED,
            Classification::Unchanged => StatusFlags::empty(),
            Classification::Mismatched => StatusFlags::MISMATCHED,
            Classification::Suspicious(_) => StatusFlags::SUSPICIOUS,
        }
    }

    /// Suspicion reason, if any
    pub fn reason(self) -> Option<SuspicionReason> {
        match self {
            Classification::Suspicious(reason) => Some(reason),
            _ => None,
        }
    }
}

/// Stateless rule engine comparing a current record with its baseline
#[derive(Debug, Clone, Copy)]
pub struct ChangeClassifier {
    hashing_enabled: bool,
}

impl ChangeClassifier {
    /// Create a classifier; `hashing_enabled` must match how the current
    /// records were fingerprinted
    pub fn new(hashing_enabled: bool) -> Self {
        Self { hashing_enabled }
    }

    /// Whether suspicion rules are in effect
    pub fn hashing_enabled(&self) -> bool {
        self.hashing_enabled
    }

    /// Classify `current` against `prior` without touching either record
    pub fn evaluate(&self, current: &FileRecord, prior: Option<&FileRecord>) -> Classification {
        let Some(prior) = prior else {
            return Classification::Inserted;
        };

        if !self.hashing_enabled {
            return if current.times_equal(prior) && current.size == prior.size {
                Classification::Unchanged
            } else {
                Classification::Mismatched
            };
        }

        if let Some(reason) = Self::suspicion(current, prior) {
            Classification::Suspicious(reason)
        } else if current.is_equal(prior) {
            Classification::Unchanged
        } else {
            Classification::Mismatched
        }
    }

    /// Classify `current` and set its flags accordingly
    ///
    /// Any flags already present on `current` are replaced.
    pub fn classify(&self, current: &mut FileRecord, prior: Option<&FileRecord>) -> Classification {
        let classification = self.evaluate(current, prior);
        current.flags = classification.flags();
        classification
    }

    /// Evaluate every suspicion rule; the last one that matches wins
    pub fn suspicion(current: &FileRecord, prior: &FileRecord) -> Option<SuspicionReason> {
        let times_equal = current.times_equal(prior);
        let size_changed = current.size != prior.size;
        let hash_changed = current.content_hash != prior.content_hash;

        let rules = [
            (
                current.accessed < current.created,
                SuspicionReason::TimesInconsistent,
            ),
            (
                size_changed && !hash_changed && times_equal,
                SuspicionReason::SizeOnly,
            ),
            (
                hash_changed && !size_changed && times_equal,
                SuspicionReason::HashOnly,
            ),
            (
                hash_changed && size_changed && current.modified == prior.modified,
                SuspicionReason::HashAndSizeWithoutModified,
            ),
        ];

        rules
            .into_iter()
            .filter(|(matched, _)| *matched)
            .map(|(_, reason)| reason)
            .last()
    }
}

/// Explicit state of one run: baseline, result snapshot and counters
///
/// The prior snapshot is only read. Records are classified one at a time by
/// the owning thread; parallel fingerprinting hands its results over before
/// classification starts.
#[derive(Debug)]
pub struct RunContext {
    classifier: ChangeClassifier,
    prior: Snapshot,
    current: Snapshot,
    stats: RunStats,
}

impl RunContext {
    /// Start a run against `prior`; the prior's flags are cleared
    pub fn new(classifier: ChangeClassifier, mut prior: Snapshot) -> Self {
        prior.clear_flags();
        Self {
            classifier,
            current: Snapshot::with_capacity(prior.len()),
            prior,
            stats: RunStats::default(),
        }
    }

    /// The baseline in use
    pub fn prior(&self) -> &Snapshot {
        &self.prior
    }

    /// The snapshot built so far
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Counters so far (`deleted` is only set by [`RunContext::finish`])
    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Classify one fingerprinted record and add it to the current snapshot
    ///
    /// Returns `None` without counting anything when a record with the same
    /// lowercase key is already part of this run. Overlapping root
    /// directories or names differing only by case lead there; the first
    /// record seen is kept.
    pub fn record(&mut self, mut record: FileRecord) -> Option<Classification> {
        if let Some(existing) = self.current.get(&record.path) {
            warn!(
                "Skipping {}: already recorded as {}",
                record.path, existing.path
            );
            return None;
        }

        let prior = self.prior.get(&record.path);
        let classification = self.classifier.classify(&mut record, prior);

        self.stats.total_files += 1;
        if self.classifier.hashing_enabled() {
            self.stats.bytes_read += record.size;
            self.stats.max_file_size = self.stats.max_file_size.max(record.size);
        }

        match classification {
            Classification::Inserted => {
                self.stats.added += 1;
                debug!("New file: {}", record.path);
            }
            Classification::Unchanged => self.stats.unchanged += 1,
            Classification::Mismatched => {
                self.stats.mismatched += 1;
                debug!("Modified file: {}", record.path);
            }
            Classification::Suspicious(reason) => {
                self.stats.suspicious += 1;
                warn!("Suspicious file {}: {}", record.path, reason);
            }
        }

        self.current.insert(record);
        Some(classification)
    }

    /// Number of baseline records with no counterpart in this run
    pub fn deleted(&self) -> usize {
        self.prior
            .keys()
            .filter(|key| !self.current.contains(key))
            .count()
    }

    /// Close the run, returning the new snapshot and the final counters
    pub fn finish(mut self) -> (Snapshot, RunStats) {
        self.stats.deleted = self.deleted();
        (self.current, self.stats)
    }
}
