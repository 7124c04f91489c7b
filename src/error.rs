//! Error types for the filecrc library
//!
//! This module defines all error types that can occur while scanning,
//! loading, classifying and archiving snapshots. The variants follow the
//! failure classes of a run:
//!
//! - **Configuration** errors are reported before any scan starts
//! - **I/O** errors (stat, read, write, archive entry access) abort the run
//! - **Format** errors mean a persisted snapshot is corrupt and cannot be used
//!   as a baseline
//!
//! Classification itself never fails, so there is no error variant for it.

use std::path::PathBuf;
use thiserror::Error;

/// Type alias for Results in the filecrc library
pub type Result<T> = std::result::Result<T, FileCrcError>;

/// Main error type for all filecrc operations
#[derive(Debug, Error)]
pub enum FileCrcError {
    /// I/O errors during file operations
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error tied to a specific file
    #[error("Error processing file '{}': {source}", .path.display())]
    FileIo {
        /// File that could not be read or stat'ed
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Errors during JSON deserialization of the configuration
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid or missing configuration
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Invalid exclude or selection pattern
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// A snapshot line could not be decoded
    #[error("The line '{line}' is invalid: {reason}")]
    Format {
        /// Offending line, without its terminator
        line: String,
        /// What was wrong with it
        reason: String,
    },

    /// Errors reported by the zip container
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Named entry missing from an archive
    #[error("The file '{entry}' is not in the zip file '{}'", .archive.display())]
    EntryNotFound {
        /// Requested entry name (empty for "first entry")
        entry: String,
        /// Archive that was searched
        archive: PathBuf,
    },

    /// Wrong or missing password for an encrypted entry
    #[error("Invalid password for '{entry}' in '{}'", .archive.display())]
    InvalidPassword {
        /// Entry that could not be decrypted
        entry: String,
        /// Archive holding the entry
        archive: PathBuf,
    },

    /// Walk directory error from walkdir crate
    #[error("Walk directory error: {0}")]
    WalkDir(#[from] walkdir::Error),

    /// A scanned path cannot be represented in the snapshot line format
    #[error("The path '{0}' cannot be stored in a snapshot: it contains '|' or a line break")]
    UnstorablePath(String),

    /// Retention pruning failed part way
    #[error("Error deleting '{}', {} file(s) were not deleted: {source}", .failed.display(), .remaining.len())]
    Retention {
        /// File whose deletion failed
        failed: PathBuf,
        /// Files that should have been deleted but remain, the failed one first
        remaining: Vec<PathBuf>,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A retain count of zero was requested without the force acknowledgement
    #[error("A retain count of zero deletes every file and requires the force flag")]
    ForceRequired,

    /// Notification could not be delivered
    #[error("Notification error: {0}")]
    Notification(String),

    /// Thread pool error
    #[error("Thread pool error: {0}")]
    ThreadPool(String),
}

impl From<rayon::ThreadPoolBuildError> for FileCrcError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        FileCrcError::ThreadPool(err.to_string())
    }
}

impl FileCrcError {
    /// Create a configuration error with a custom message
    pub fn config(msg: impl Into<String>) -> Self {
        FileCrcError::Configuration(msg.into())
    }

    /// Create a format error for a snapshot line
    pub fn format(line: impl Into<String>, reason: impl Into<String>) -> Self {
        FileCrcError::Format {
            line: line.into(),
            reason: reason.into(),
        }
    }

    /// Wrap an I/O error with the path it happened on
    pub fn file_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        FileCrcError::FileIo {
            path: path.into(),
            source,
        }
    }

    /// Check if this error is a configuration problem
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            FileCrcError::Configuration(_)
                | FileCrcError::Json(_)
                | FileCrcError::Pattern(_)
                | FileCrcError::ForceRequired
        )
    }

    /// Check if this error indicates a corrupt snapshot
    pub fn is_format_error(&self) -> bool {
        matches!(self, FileCrcError::Format { .. })
    }

    /// Get a user-friendly error message with suggestions
    pub fn user_message(&self) -> String {
        match self {
            FileCrcError::Format { .. } => {
                format!(
                    "{}. The previous snapshot is corrupt; remove it or compare against an older archive with --base.",
                    self
                )
            }
            FileCrcError::InvalidPassword { archive, .. } => {
                format!(
                    "Could not decrypt {:?}. Check the password in the configuration file.",
                    archive
                )
            }
            FileCrcError::UnstorablePath(_) => {
                format!("{}. Rename the file or add it to the excludes.", self)
            }
            FileCrcError::Retention { remaining, .. } => {
                let mut message = format!("{}. Still present:", self);
                for path in remaining {
                    message.push_str(&format!("\n  {}", path.display()));
                }
                message
            }
            FileCrcError::ForceRequired => {
                format!("{}. Pass --force to delete every archive in the family.", self)
            }
            _ => self.to_string(),
        }
    }
}
