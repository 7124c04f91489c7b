//! # filecrc - File integrity scanning
//!
//! Fingerprints directory trees and compares each run against the snapshot
//! captured by the previous one, so that tampering or silent corruption
//! shows up as a list of suspicious files.
//!
//! ## Overview
//!
//! For every regular file under the configured roots, filecrc records:
//! - the size in bytes
//! - the created, accessed and modified timestamps
//! - a CRC-64 (ECMA) of the full content
//!
//! Each file is then classified against the previous snapshot as unchanged,
//! inserted, mismatched (a normal edit) or suspicious (a change pattern that
//! an ordinary edit does not produce, such as the content changing while all
//! timestamps stay put). Files missing from the new scan are counted as
//! deleted.
//!
//! The new snapshot is stored as a single-entry zip archive, optionally AES
//! encrypted, and becomes the baseline for the next run. Older archives are
//! kept as a numbered family (`files1.zip`, `files2.zip`, ...) that can be
//! pruned with [`retention::RetentionManager`].
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use filecrc::{Config, JobBuilder};
//! use filecrc::types::ProgressInfo;
//! use std::path::Path;
//!
//! # fn main() -> filecrc::Result<()> {
//! let config = Config::load(Path::new("filecrc.json"))?;
//! let report = JobBuilder::new(config).build()?.run(None::<fn(ProgressInfo)>)?;
//!
//! println!(
//!     "{} files, {} suspicious, {} added, {} deleted",
//!     report.stats.total_files,
//!     report.stats.suspicious,
//!     report.stats.added,
//!     report.stats.deleted
//! );
//! # Ok(())
//! # }
//! ```
//!
//! ## Using the pieces directly
//!
//! ```rust,no_run
//! use filecrc::{ChangeClassifier, Fingerprinter, Snapshot};
//! use std::path::Path;
//!
//! # fn main() -> filecrc::Result<()> {
//! # let previous_bytes: Vec<u8> = Vec::new();
//! let prior = Snapshot::load(&previous_bytes, true)?;
//! let mut current = Fingerprinter::new(true).fingerprint(Path::new("/etc/hosts"))?;
//!
//! let previous = prior.get(&current.key()).cloned();
//! let class = ChangeClassifier::new(true).classify(&mut current, previous.as_ref());
//! println!("{:?} -> {}", class, current.flags.to_prefix());
//! # Ok(())
//! # }
//! ```
//!
//! ## Snapshot format
//!
//! One line per file, see [`snapshot`]:
//!
//! ```text
//! S--:/srv/data/report.pdf|2024-01-02T03:04:05.123456789Z|...|...|10240|1234567890123456789
//! ```
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`] with [`FileCrcError`].
//! Configuration problems are reported before anything is scanned; I/O and
//! format errors abort the run without touching the previous archive.
//!
//! ## Module Organization
//!
//! - [`fingerprint`]: per-file size, timestamps and CRC-64
//! - [`snapshot`]: line codec and the snapshot map
//! - [`archive`]: zip container with optional encryption
//! - [`scanner`]: tree walking and exclude patterns
//! - [`classifier`]: suspicion rules and run counters
//! - [`retention`]: numbered archive families
//! - [`config`]: JSON job configuration
//! - [`notify`]: end-of-run notifications
//! - [`run`]: complete scan jobs
//! - [`dump`]: snapshot inspection
//! - [`types`]: shared data types
//! - [`error`]: error types

// Public API modules
pub mod archive;
pub mod classifier;
pub mod config;
pub mod dump;
pub mod error;
pub mod fingerprint;
pub mod notify;
pub mod retention;
pub mod run;
pub mod scanner;
pub mod snapshot;
pub mod types;

// Internal modules (not part of public API)
mod collections;

// Re-export main types for convenience
pub use archive::ArchiveStore;
pub use classifier::{ChangeClassifier, Classification, RunContext, SuspicionReason};
pub use config::Config;
pub use error::{FileCrcError, Result};
pub use fingerprint::{FileMetadataProvider, Fingerprinter};
pub use notify::{Notification, Notifier, TracingNotifier};
pub use retention::{next_available_name, RetentionManager};
pub use run::{Job, JobBuilder, RunMode, RunReport};
pub use scanner::{DirectoryScanner, ExcludeSet, TreeWalker, WalkdirWalker};
pub use snapshot::Snapshot;
pub use types::{FileRecord, RunStats, StatusFlags};
