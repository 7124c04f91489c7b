//! File fingerprinting
//!
//! Produces a [`FileRecord`] for a single file: size, created / accessed /
//! modified timestamps and a CRC-64 (ECMA polynomial) over the full content.
//!
//! Metadata is captured before the content is touched. After hashing, the
//! file's access time is put back to the captured value so that fingerprinting
//! does not show up as an access on the next run.
//!
//! Timestamp retrieval goes through the [`FileMetadataProvider`] trait. The
//! default [`StdMetadataProvider`] uses `std::fs::Metadata`; where the
//! platform or filesystem has no creation time, the modification time is used
//! in its place.
//!
//! ## Example
//!
//! ```rust,no_run
//! use filecrc::fingerprint::Fingerprinter;
//! use std::path::Path;
//!
//! # fn main() -> filecrc::Result<()> {
//! let fingerprinter = Fingerprinter::new(true);
//! let record = fingerprinter.fingerprint(Path::new("/etc/hosts"))?;
//! println!("{} bytes, crc {}", record.size, record.content_hash);
//! # Ok(())
//! # }
//! ```

use crate::error::{FileCrcError, Result};
use crate::types::FileRecord;
use chrono::{DateTime, Utc};
use crc::{Crc, CRC_64_XZ};
use filetime::FileTime;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::trace;

/// CRC-64 with the ECMA-182 polynomial, reflected, complemented in and out
const CRC64_ECMA: Crc<u64> = Crc::<u64>::new(&CRC_64_XZ);

/// Compute the CRC-64 (ECMA) of a byte slice
pub fn crc64(data: &[u8]) -> u64 {
    CRC64_ECMA.checksum(data)
}

/// Raw filesystem facts about one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStat {
    /// File size in bytes
    pub size: u64,
    /// Creation time (modification time where unavailable)
    pub created: SystemTime,
    /// Last access time
    pub accessed: SystemTime,
    /// Last modification time
    pub modified: SystemTime,
}

/// Source of per-file size and timestamps
///
/// Implementations exist per platform; tests substitute fixed values.
pub trait FileMetadataProvider: Send + Sync {
    /// Read size and the three timestamps of `path`
    fn stat(&self, path: &Path) -> Result<FileStat>;

    /// Put the access time of `path` back to `accessed`
    fn restore_accessed(&self, path: &Path, accessed: SystemTime) -> Result<()>;
}

/// Metadata provider backed by `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdMetadataProvider;

impl FileMetadataProvider for StdMetadataProvider {
    fn stat(&self, path: &Path) -> Result<FileStat> {
        let metadata = fs::metadata(path).map_err(|e| FileCrcError::file_io(path, e))?;
        let modified = metadata
            .modified()
            .map_err(|e| FileCrcError::file_io(path, e))?;
        let accessed = metadata
            .accessed()
            .map_err(|e| FileCrcError::file_io(path, e))?;
        let created = metadata.created().unwrap_or(modified);

        Ok(FileStat {
            size: metadata.len(),
            created,
            accessed,
            modified,
        })
    }

    fn restore_accessed(&self, path: &Path, accessed: SystemTime) -> Result<()> {
        filetime::set_file_atime(path, FileTime::from_system_time(accessed))
            .map_err(|e| FileCrcError::file_io(path, e))
    }
}

/// Builds [`FileRecord`]s from files on disk
#[derive(Clone)]
pub struct Fingerprinter {
    hashing: bool,
    provider: Arc<dyn FileMetadataProvider>,
}

impl std::fmt::Debug for Fingerprinter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Fingerprinter")
            .field("hashing", &self.hashing)
            .finish()
    }
}

impl Fingerprinter {
    /// Create a fingerprinter using the std metadata provider
    ///
    /// With `hashing` off, no file content is read and every record gets a
    /// hash of 0.
    pub fn new(hashing: bool) -> Self {
        Self {
            hashing,
            provider: Arc::new(StdMetadataProvider),
        }
    }

    /// Replace the metadata provider
    pub fn with_provider(mut self, provider: Arc<dyn FileMetadataProvider>) -> Self {
        self.provider = provider;
        self
    }

    /// Whether content hashing is enabled
    pub fn hashing_enabled(&self) -> bool {
        self.hashing
    }

    /// Fingerprint one file
    ///
    /// # Errors
    ///
    /// - [`FileCrcError::FileIo`] if the file cannot be stat'ed, read, or its
    ///   access time cannot be restored
    pub fn fingerprint(&self, path: &Path) -> Result<FileRecord> {
        let stat = self.provider.stat(path)?;

        let content_hash = if self.hashing {
            let content = fs::read(path).map_err(|e| FileCrcError::file_io(path, e))?;
            let hash = crc64(&content);
            drop(content);

            self.provider.restore_accessed(path, stat.accessed)?;
            hash
        } else {
            0
        };

        trace!("Fingerprinted {:?}: {} bytes, crc {}", path, stat.size, content_hash);

        Ok(FileRecord::new(
            normalize_path(path),
            stat.size,
            content_hash,
            DateTime::<Utc>::from(stat.created),
            DateTime::<Utc>::from(stat.accessed),
            DateTime::<Utc>::from(stat.modified),
        ))
    }
}

/// Path text as stored in a snapshot: `/` separators throughout
pub fn normalize_path(path: &Path) -> String {
    path.to_string_lossy().replace('\\', "/")
}
