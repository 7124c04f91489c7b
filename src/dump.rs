//! Snapshot inspection
//!
//! Reads a persisted snapshot *with* its stored findings and selects records
//! either by flag (suspicious / added / modified) or by a regular expression
//! matched against each `/`-separated component of the path. The two
//! selection styles are mutually exclusive.
//!
//! ```rust
//! use filecrc::dump::{inspect, DumpFilter};
//!
//! let snapshot = b"S--:/srv/a.txt|2024-01-01T00:00:00Z|2024-01-01T00:00:00Z|2024-01-01T00:00:00Z|1|2\n\
//!                  ---:/srv/b.txt|2024-01-01T00:00:00Z|2024-01-01T00:00:00Z|2024-01-01T00:00:00Z|3|4\n";
//!
//! let report = inspect(snapshot, &DumpFilter::new().with_suspicious(true)).unwrap();
//! assert_eq!(report.total, 2);
//! assert_eq!(report.selected.len(), 1);
//! assert_eq!(report.unchanged, 1);
//! ```

use crate::error::{FileCrcError, Result};
use crate::snapshot::decode;
use crate::types::{group_digits, FileRecord, StatusFlags};
use regex::Regex;

/// Which records to select
#[derive(Debug, Clone, Default)]
pub struct DumpFilter {
    flags: StatusFlags,
    name: Option<Regex>,
}

impl DumpFilter {
    /// Filter that selects nothing (summary counts only)
    pub fn new() -> Self {
        Self::default()
    }

    /// Select suspicious records
    pub fn with_suspicious(mut self, on: bool) -> Self {
        if on {
            self.flags.insert(StatusFlags::SUSPICIOUS);
        }
        self
    }

    /// Select added records
    pub fn with_added(mut self, on: bool) -> Self {
        if on {
            self.flags.insert(StatusFlags::INSERTED);
        }
        self
    }

    /// Select modified records
    pub fn with_modified(mut self, on: bool) -> Self {
        if on {
            self.flags.insert(StatusFlags::MISMATCHED);
        }
        self
    }

    /// Select records with a path component matching `pattern`
    ///
    /// # Errors
    ///
    /// [`FileCrcError::Pattern`] if the expression does not compile,
    /// [`FileCrcError::Configuration`] if flag selection is also set.
    pub fn with_name_pattern(mut self, pattern: &str) -> Result<Self> {
        self.name = Some(Regex::new(pattern)?);
        self.validate()?;
        Ok(self)
    }

    /// Reject a filter that mixes name and flag selection
    pub fn validate(&self) -> Result<()> {
        if self.name.is_some() && !self.flags.is_empty() {
            return Err(FileCrcError::config(
                "the name search is mutually exclusive with flag selection",
            ));
        }
        Ok(())
    }

    /// Whether `record` is selected
    pub fn matches(&self, record: &FileRecord) -> bool {
        match &self.name {
            Some(pattern) => record
                .path
                .replace('\\', "/")
                .split('/')
                .any(|component| pattern.is_match(component)),
            None => record.flags.bits() & self.flags.bits() != 0,
        }
    }
}

/// Result of inspecting a snapshot
#[derive(Debug, Clone, Default)]
pub struct DumpReport {
    /// Selected records in file order
    pub selected: Vec<FileRecord>,
    /// Records read
    pub total: usize,
    /// Records carrying the suspicious flag
    pub suspicious: usize,
    /// Records carrying the inserted flag
    pub inserted: usize,
    /// Records carrying the mismatched flag
    pub modified: usize,
    /// Records with no flag
    pub unchanged: usize,
}

impl DumpReport {
    /// Summary block printed after the selected records
    pub fn summary(&self) -> String {
        format!(
            "Total records read:      {}\n\
             Total records selected:  {}\n\
             Suspicious records read: {}\n\
             Inserted records read:   {}\n\
             Modified records read:   {}\n\
             Unchanged records read:  {}\n",
            group_digits(self.total),
            group_digits(self.selected.len()),
            group_digits(self.suspicious),
            group_digits(self.inserted),
            group_digits(self.modified),
            group_digits(self.unchanged),
        )
    }
}

/// Decode a serialized snapshot, count its findings and select records
///
/// Records keep the flags they were stored with. The first undecodable line
/// aborts with [`FileCrcError::Format`].
pub fn inspect(bytes: &[u8], filter: &DumpFilter) -> Result<DumpReport> {
    filter.validate()?;

    let text = String::from_utf8_lossy(bytes);
    let mut report = DumpReport::default();

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let record = decode(line)?;
        report.total += 1;

        if record.flags.is_empty() {
            report.unchanged += 1;
        }
        if record.flags.contains(StatusFlags::SUSPICIOUS) {
            report.suspicious += 1;
        }
        if record.flags.contains(StatusFlags::INSERTED) {
            report.inserted += 1;
        }
        if record.flags.contains(StatusFlags::MISMATCHED) {
            report.modified += 1;
        }

        if filter.matches(&record) {
            report.selected.push(record);
        }
    }

    Ok(report)
}
