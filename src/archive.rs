//! Single-entry zip container for serialized snapshots
//!
//! The archive holds exactly one deflated entry. With a password the entry is
//! AES-256 encrypted (WinZip AE-2), otherwise it is stored in the clear.
//!
//! Reading never returns empty data in place of a failure: a missing archive,
//! a missing entry and a wrong password are all errors.
//!
//! ```rust,no_run
//! use filecrc::archive::ArchiveStore;
//! use std::path::Path;
//!
//! # fn main() -> filecrc::Result<()> {
//! let store = ArchiveStore::new();
//! store.write(Path::new("files.zip"), Some("p@ss"), "fileinfo.txt", b"...")?;
//! let bytes = store.read(Path::new("files.zip"), Some("fileinfo.txt"), Some("p@ss"))?;
//! # Ok(())
//! # }
//! ```

use crate::error::{FileCrcError, Result};
use std::fs::{self, File};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::{debug, trace};
use zip::result::ZipError;
use zip::write::SimpleFileOptions;
use zip::{AesMode, CompressionMethod, ZipArchive, ZipWriter};

/// Largest buffer reserved up front from sizes declared in an archive
const PREALLOCATION_LIMIT: u64 = 64 * 1024 * 1024;
/// Upper bound on the deflate expansion ratio
const MAX_EXPANSION: u64 = 1032;

/// Buffer size to reserve for an entry; the header sizes are not trusted
fn preallocation(declared: u64, compressed: u64) -> usize {
    let plausible = declared
        .min(compressed.saturating_mul(MAX_EXPANSION))
        .min(PREALLOCATION_LIMIT);
    usize::try_from(plausible).unwrap_or(0)
}

/// Reads and writes single-entry snapshot archives
#[derive(Debug, Clone, Copy, Default)]
pub struct ArchiveStore;

impl ArchiveStore {
    /// Create an archive store
    pub fn new() -> Self {
        ArchiveStore
    }

    /// Write `bytes` as the only entry `entry` of a new archive at `path`
    ///
    /// An existing file at `path` is replaced. The archive is assembled in
    /// memory first so a failure never leaves a half-written container.
    pub fn write(
        &self,
        path: &Path,
        password: Option<&str>,
        entry: &str,
        bytes: &[u8],
    ) -> Result<()> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::with_capacity(bytes.len() / 4)));
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        match password {
            Some(password) => {
                writer.start_file(entry, options.with_aes_encryption(AesMode::Aes256, password))?
            }
            None => writer.start_file(entry, options)?,
        }
        writer
            .write_all(bytes)
            .map_err(|e| FileCrcError::file_io(path, e))?;

        let container = writer.finish()?.into_inner();
        fs::write(path, &container).map_err(|e| FileCrcError::file_io(path, e))?;

        debug!(
            "Wrote archive {:?}: entry '{}', {} bytes ({} compressed), encrypted: {}",
            path,
            entry,
            bytes.len(),
            container.len(),
            password.is_some()
        );
        Ok(())
    }

    /// Read the content of one entry of the archive at `path`
    ///
    /// With `entry` set to `None` (or an empty name) the first entry is used.
    ///
    /// # Errors
    ///
    /// - [`FileCrcError::FileIo`] if the archive cannot be opened or read
    /// - [`FileCrcError::EntryNotFound`] if the entry does not exist
    /// - [`FileCrcError::InvalidPassword`] if the entry is encrypted and the
    ///   password is missing or wrong
    pub fn read(&self, path: &Path, entry: Option<&str>, password: Option<&str>) -> Result<Vec<u8>> {
        let file = File::open(path).map_err(|e| FileCrcError::file_io(path, e))?;
        let mut archive = ZipArchive::new(file)?;

        let entry = entry.filter(|name| !name.is_empty());
        let entry_label = entry.unwrap_or_default().to_string();
        let password = password.unwrap_or_default().as_bytes();

        let not_found = || FileCrcError::EntryNotFound {
            entry: entry_label.clone(),
            archive: path.to_path_buf(),
        };
        let bad_password = || FileCrcError::InvalidPassword {
            entry: entry_label.clone(),
            archive: path.to_path_buf(),
        };

        if archive.is_empty() {
            return Err(not_found());
        }

        let opened = match entry {
            Some(name) if password.is_empty() => archive.by_name(name),
            Some(name) => archive.by_name_decrypt(name, password),
            None if password.is_empty() => archive.by_index(0),
            None => archive.by_index_decrypt(0, password),
        };

        let mut zip_file = match opened {
            Ok(zip_file) => zip_file,
            Err(ZipError::FileNotFound) => return Err(not_found()),
            Err(ZipError::InvalidPassword) => return Err(bad_password()),
            Err(ZipError::UnsupportedArchive(msg)) if msg == ZipError::PASSWORD_REQUIRED => {
                return Err(bad_password())
            }
            Err(e) => return Err(e.into()),
        };

        trace!("Reading entry '{}' from {:?}", zip_file.name(), path);

        let mut content =
            Vec::with_capacity(preallocation(zip_file.size(), zip_file.compressed_size()));
        if let Err(e) = zip_file.read_to_end(&mut content) {
            // AES authentication failures surface while reading
            return Err(if zip_file.encrypted() {
                bad_password()
            } else {
                FileCrcError::file_io(path, e)
            });
        }

        Ok(content)
    }

    /// Names of every entry in the archive, in container order
    pub fn entry_names(&self, path: &Path) -> Result<Vec<String>> {
        let file = File::open(path).map_err(|e| FileCrcError::file_io(path, e))?;
        let archive = ZipArchive::new(file)?;
        Ok(archive.file_names().map(str::to_string).collect())
    }
}
