//! Numbered archive families: pruning and naming
//!
//! A family is the set of files in one directory named
//! `<base><N><suffix>`, where `<N>` is a plain decimal number and `base` /
//! `suffix` come from a reference name split at its last `.`
//! (`files.zip` → `files` + `.zip`, so `files1.zip`, `files12.zip`, ...).
//!
//! [`RetentionManager::prune`] keeps the highest numbered members and deletes
//! the rest, oldest first. [`next_available_name`] is the writer side: it picks
//! the next free number so a run never overwrites an earlier archive.

use crate::error::{FileCrcError, Result};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Marker appended to the base name of temporary output files
pub const TEMP_MARKER: &str = "-Tmp";

/// A reference name taken apart into directory, base and suffix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyName {
    /// Directory given with the name, if any
    parent: Option<PathBuf>,
    /// File name of the reference
    file_name: String,
    /// Part before the last `.`
    base: String,
    /// Last `.` and everything after it (may be empty)
    suffix: String,
}

impl FamilyName {
    /// Split a reference name such as `backups/files.zip`
    pub fn parse(reference: &Path) -> Result<Self> {
        let normalized = PathBuf::from(reference.to_string_lossy().replace('\\', "/"));
        let file_name = normalized
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                FileCrcError::config(format!("'{}' does not name a file", reference.display()))
            })?;

        let (base, suffix) = match file_name.rfind('.') {
            Some(dot) => (file_name[..dot].to_string(), file_name[dot..].to_string()),
            None => (file_name.clone(), String::new()),
        };

        Ok(Self {
            parent: normalized
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .map(Path::to_path_buf),
            file_name,
            base,
            suffix,
        })
    }

    /// Same family with the temporary marker appended to the base
    pub fn temporary(&self) -> Self {
        let mut temp = self.clone();
        temp.base.push_str(TEMP_MARKER);
        temp
    }

    /// Base name without number or suffix
    pub fn base(&self) -> &str {
        &self.base
    }

    /// Suffix including the leading `.`
    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Directory the family lives in (`.` when none was given)
    pub fn directory(&self) -> &Path {
        self.parent.as_deref().unwrap_or_else(|| Path::new("."))
    }

    /// Path of the reference name itself
    pub fn reference(&self) -> PathBuf {
        self.place(&self.file_name)
    }

    /// Path of member number `n`
    pub fn member(&self, n: u64) -> PathBuf {
        self.place(&format!("{}{}{}", self.base, n, self.suffix))
    }

    fn place(&self, file_name: &str) -> PathBuf {
        match &self.parent {
            Some(parent) => parent.join(file_name),
            None => PathBuf::from(file_name),
        }
    }

    fn pattern(&self) -> Result<Regex> {
        Ok(Regex::new(&format!(
            "^{}([0-9]+){}$",
            regex::escape(&self.base),
            regex::escape(&self.suffix)
        ))?)
    }

    /// Existing members as `(number, path)`, lowest number first
    pub fn members(&self) -> Result<Vec<(u64, PathBuf)>> {
        let pattern = self.pattern()?;
        let directory = self.directory();
        let mut members = Vec::new();

        for entry in fs::read_dir(directory).map_err(|e| FileCrcError::file_io(directory, e))? {
            let entry = entry.map_err(|e| FileCrcError::file_io(directory, e))?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            let Some(captures) = pattern.captures(&name) else {
                continue;
            };
            match captures[1].parse::<u64>() {
                Ok(number) => members.push((number, self.place(&name))),
                Err(_) => debug!("Ignoring {} - number out of range", name),
            }
        }

        members.sort_by_key(|(number, _)| *number);
        Ok(members)
    }

    /// Whether a file with the reference name exists, compared case-insensitively
    fn reference_exists(&self) -> Result<bool> {
        let directory = self.directory();
        let wanted = self.file_name.to_lowercase();

        for entry in fs::read_dir(directory).map_err(|e| FileCrcError::file_io(directory, e))? {
            let entry = entry.map_err(|e| FileCrcError::file_io(directory, e))?;
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                continue;
            }
            if entry.file_name().to_string_lossy().to_lowercase() == wanted {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

/// Pick an output name that does not overwrite anything
///
/// When `name` does not exist and `temp` is false, `name` itself is
/// returned. Otherwise the result is `<base><N><suffix>` (with `-Tmp` added
/// to the base for temporary names) where `N` is one more than the highest
/// existing number in that family, starting at 1.
///
/// ```rust,no_run
/// use filecrc::retention::next_available_name;
/// use std::path::Path;
///
/// # fn main() -> filecrc::Result<()> {
/// // with files.zip and files1.zip present
/// assert_eq!(next_available_name(Path::new("files.zip"), false)?, Path::new("files2.zip"));
/// assert_eq!(next_available_name(Path::new("files.zip"), true)?, Path::new("files-Tmp1.zip"));
/// # Ok(())
/// # }
/// ```
pub fn next_available_name(name: &Path, temp: bool) -> Result<PathBuf> {
    let family = FamilyName::parse(name)?;
    if !temp && !family.reference_exists()? {
        return Ok(family.reference());
    }

    let family = if temp { family.temporary() } else { family };
    let highest = family
        .members()?
        .last()
        .map(|(number, _)| *number)
        .unwrap_or(0);

    Ok(family.member(highest + 1))
}

/// Deletes old members of a numbered archive family
#[derive(Debug, Clone, Copy)]
pub struct RetentionManager {
    retain: usize,
    force: bool,
}

impl RetentionManager {
    /// Keep the `retain` highest numbered members
    pub fn new(retain: usize) -> Self {
        Self {
            retain,
            force: false,
        }
    }

    /// Acknowledge that a retain count of zero deletes the whole family
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Check the retain count / force combination
    ///
    /// # Errors
    ///
    /// - [`FileCrcError::ForceRequired`] for a count of zero without force
    /// - [`FileCrcError::Configuration`] for force with a non-zero count
    pub fn validate(&self) -> Result<()> {
        match (self.retain, self.force) {
            (0, false) => Err(FileCrcError::ForceRequired),
            (n, true) if n > 0 => Err(FileCrcError::config(
                "The force flag can only be used with a retain count of zero",
            )),
            _ => Ok(()),
        }
    }

    /// Delete all but the newest members of the family of `reference`
    ///
    /// Members are deleted in ascending numeric order. Returns the deleted
    /// paths.
    ///
    /// # Errors
    ///
    /// - validation errors, see [`RetentionManager::validate`]
    /// - [`FileCrcError::FileIo`] when the family has no members
    /// - [`FileCrcError::Retention`] when a deletion fails; it lists the
    ///   failing file and every later one, which are left in place
    pub fn prune(&self, reference: &Path) -> Result<Vec<PathBuf>> {
        self.validate()?;

        let family = FamilyName::parse(reference)?;
        let members = family.members()?;
        if members.is_empty() {
            return Err(FileCrcError::file_io(
                reference,
                io::Error::new(io::ErrorKind::NotFound, "there are no files found to clean up"),
            ));
        }

        let delete_count = members.len().saturating_sub(self.retain);
        let doomed: Vec<PathBuf> = members
            .into_iter()
            .take(delete_count)
            .map(|(_, path)| path)
            .collect();
        let mut deleted = Vec::with_capacity(delete_count);

        for (index, path) in doomed.iter().enumerate() {
            if let Err(source) = fs::remove_file(path) {
                return Err(FileCrcError::Retention {
                    failed: path.clone(),
                    remaining: doomed[index..].to_vec(),
                    source,
                });
            }
            info!("Deleted {}", path.display());
            deleted.push(path.clone());
        }

        Ok(deleted)
    }
}
