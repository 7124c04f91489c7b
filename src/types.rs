//! Core data types used throughout the filecrc library
//!
//! This module contains the data model shared by the scanner, the codec
//! and the classifier.
//!
//! ## Overview
//!
//! - **Fingerprints**: [`FileRecord`] with its [`StatusFlags`]
//! - **Run results**: [`RunStats`] counters and the derived deleted count
//! - **Traversal**: [`WalkEntry`] / [`WalkAction`] exchanged with a tree walker
//! - **Progress**: [`ProgressInfo`] for long running scans
//!
//! ## Examples
//!
//! ```rust
//! use filecrc::types::{FileRecord, StatusFlags};
//! use chrono::Utc;
//!
//! let now = Utc::now();
//! let mut record = FileRecord::new("/data/Report.TXT", 10, 42, now, now, now);
//! record.flags.insert(StatusFlags::INSERTED);
//!
//! assert_eq!(record.key(), "/data/report.txt");
//! assert_eq!(record.flags.to_prefix(), "--N");
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Placeholder used in the status prefix for an unset flag
pub const CODE_MISSING: char = '-';
/// Status prefix letter for [`StatusFlags::SUSPICIOUS`]
pub const CODE_SUSPICIOUS: char = 'S';
/// Status prefix letter for [`StatusFlags::MISMATCHED`]
pub const CODE_MISMATCHED: char = 'M';
/// Status prefix letter for [`StatusFlags::INSERTED`]
pub const CODE_INSERTED: char = 'N';

/// Per-run comparison findings for one record
///
/// A 3-bit set. The flags describe what *this* run found when comparing a
/// file against the prior snapshot; they are persisted with the snapshot but
/// are cleared again before that snapshot is used as a baseline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusFlags(u8);

impl StatusFlags {
    /// Change pattern matched one of the suspicion rules
    pub const SUSPICIOUS: StatusFlags = StatusFlags(0x01);
    /// Changed from the baseline without matching a suspicion rule
    pub const MISMATCHED: StatusFlags = StatusFlags(0x02);
    /// No baseline record existed for the path
    pub const INSERTED: StatusFlags = StatusFlags(0x04);

    /// Empty flag set
    pub const fn empty() -> Self {
        StatusFlags(0)
    }

    /// Raw bit value
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether no flag is set
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every bit of `other` is set
    pub const fn contains(self, other: StatusFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// Set the bits of `other`
    pub fn insert(&mut self, other: StatusFlags) {
        self.0 |= other.0;
    }

    /// Reset to the empty set
    pub fn clear(&mut self) {
        self.0 = 0;
    }

    /// Render the fixed 3-character status prefix
    ///
    /// Columns are suspicious, mismatched, inserted; an unset column holds
    /// [`CODE_MISSING`].
    pub fn to_prefix(self) -> String {
        let column = |flag: StatusFlags, code: char| {
            if self.contains(flag) {
                code
            } else {
                CODE_MISSING
            }
        };

        [
            column(Self::SUSPICIOUS, CODE_SUSPICIOUS),
            column(Self::MISMATCHED, CODE_MISMATCHED),
            column(Self::INSERTED, CODE_INSERTED),
        ]
        .iter()
        .collect()
    }

    /// Rebuild flags from a status prefix
    ///
    /// Any character other than the placeholder sets the column's flag.
    /// Returns `None` unless the prefix is exactly three characters.
    pub fn from_prefix(prefix: &str) -> Option<Self> {
        let columns: Vec<char> = prefix.chars().collect();
        if columns.len() != 3 {
            return None;
        }

        let mut flags = StatusFlags::empty();
        for (column, flag) in columns
            .iter()
            .zip([Self::SUSPICIOUS, Self::MISMATCHED, Self::INSERTED])
        {
            if *column != CODE_MISSING {
                flags.insert(flag);
            }
        }
        Some(flags)
    }
}

impl fmt::Display for StatusFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_prefix())
    }
}

/// Fingerprint of one scanned file
///
/// Holds everything needed to compare a file against a later scan: size,
/// the three independent timestamps and a CRC-64 of the content.
///
/// # Examples
///
/// ```rust
/// # use filecrc::types::FileRecord;
/// # use chrono::Utc;
/// let t = Utc::now();
/// let a = FileRecord::new("/a/b.txt", 100, 42, t, t, t);
/// let b = FileRecord::new("/A/B.TXT", 100, 42, t, t, t);
///
/// assert_eq!(a.key(), b.key());
/// assert!(a.is_equal(&b));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Full path as scanned, with `/` separators
    pub path: String,
    /// File size in bytes
    pub size: u64,
    /// CRC-64 of the file content (0 when hashing was skipped)
    pub content_hash: u64,
    /// Creation timestamp
    pub created: DateTime<Utc>,
    /// Last access timestamp
    pub accessed: DateTime<Utc>,
    /// Last modification timestamp
    pub modified: DateTime<Utc>,
    /// Findings of the run that produced or loaded this record
    pub flags: StatusFlags,
}

impl FileRecord {
    /// Create a record with no flags set
    pub fn new(
        path: impl Into<String>,
        size: u64,
        content_hash: u64,
        created: DateTime<Utc>,
        accessed: DateTime<Utc>,
        modified: DateTime<Utc>,
    ) -> Self {
        Self {
            path: path.into(),
            size,
            content_hash,
            created,
            accessed,
            modified,
            flags: StatusFlags::empty(),
        }
    }

    /// Snapshot lookup key: the lowercased path
    pub fn key(&self) -> String {
        self.path.to_lowercase()
    }

    /// Whether all three timestamps match `other`
    pub fn times_equal(&self, other: &FileRecord) -> bool {
        self.created == other.created
            && self.accessed == other.accessed
            && self.modified == other.modified
    }

    /// Whether size, hash and all timestamps match `other`
    pub fn is_equal(&self, other: &FileRecord) -> bool {
        self.times_equal(other)
            && self.size == other.size
            && self.content_hash == other.content_hash
    }

    /// Multi-line listing used when inspecting a snapshot
    pub fn display(&self) -> String {
        format!(
            "File name: {}\nFlags: '{}', Size: {}, CRC: {}\nCreated: {}, Modified: {}, Accessed: {}\n",
            self.path,
            self.flags,
            group_digits(self.size),
            self.content_hash,
            self.created.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.modified.to_rfc3339_opts(SecondsFormat::Nanos, true),
            self.accessed.to_rfc3339_opts(SecondsFormat::Nanos, true),
        )
    }
}

/// Counters accumulated over one run
///
/// `deleted` is derived once the scan is complete; every other counter is
/// incremented while files are classified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Regular files visited (after excludes)
    pub total_files: usize,
    /// Files flagged suspicious
    pub suspicious: usize,
    /// Files changed without matching a suspicion rule
    pub mismatched: usize,
    /// Files with no baseline record
    pub added: usize,
    /// Files identical to their baseline record
    pub unchanged: usize,
    /// Baseline records not seen during this run
    pub deleted: usize,
    /// Total bytes read while hashing
    pub bytes_read: u64,
    /// Largest file read while hashing
    pub max_file_size: u64,
}

impl RunStats {
    /// Number of files that were classified this run
    pub fn classified(&self) -> usize {
        self.suspicious + self.mismatched + self.added + self.unchanged
    }

    /// Check if the run found anything worth reporting
    pub fn has_changes(&self) -> bool {
        self.suspicious > 0 || self.mismatched > 0 || self.added > 0 || self.deleted > 0
    }
}

/// One entry produced by a tree walker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Full path of the entry
    pub path: PathBuf,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// Final path component
    pub name: String,
}

/// Visitor answer for a walked entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalkAction {
    /// Keep walking (descend if the entry is a directory)
    Continue,
    /// Do not descend into this directory
    SkipSubtree,
}

/// Progress information for long-running operations
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Current operation being performed
    pub operation: String,
    /// Current item being processed
    pub current_item: Option<String>,
    /// Number of items processed
    pub processed: usize,
    /// Total number of items (if known)
    pub total: Option<usize>,
    /// Bytes processed
    pub bytes_processed: u64,
}

/// Render an integer with thousands separators (`1234567` → `1,234,567`)
pub fn group_digits<N: ToString>(value: N) -> String {
    let digits = value.to_string();
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => ("-", rest.to_string()),
        None => ("", digits),
    };

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}{}", sign, grouped)
}
