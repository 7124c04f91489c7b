//! Directory traversal and per-file fingerprinting
//!
//! The [`DirectoryScanner`] walks each configured root through a
//! [`TreeWalker`], filters entries with the exclude patterns and hands every
//! remaining regular file to the [`Fingerprinter`].
//!
//! ## Excludes
//!
//! Exclude patterns are regular expressions matched against the lowercase
//! final component of each entry (`.git`, `thumbs.db`, ...), never the full
//! path. A matching directory is pruned with its whole subtree; a matching
//! file is skipped.
//!
//! ## Failure policy
//!
//! Traversal and fingerprinting are fail-fast: the first walk, stat or read
//! error aborts the scan and no partial result is returned.
//!
//! ## Parallelism
//!
//! Paths are collected first, then fingerprinted on a rayon pool with the
//! configured number of workers. One worker gives a purely sequential scan.
//! Results come back in traversal order either way.

use crate::error::{FileCrcError, Result};
use crate::fingerprint::Fingerprinter;
use crate::types::{FileRecord, ProgressInfo, WalkAction, WalkEntry};
use rayon::prelude::*;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

/// Source of directory entries for a root
///
/// The visitor is called for every entry, the root included. Returning
/// [`WalkAction::SkipSubtree`] for a directory stops the walker from
/// descending into it; an error from the visitor ends the walk.
pub trait TreeWalker: Send + Sync {
    /// Walk `root`, calling `visit` for each entry
    fn walk(
        &self,
        root: &Path,
        visit: &mut dyn FnMut(&WalkEntry) -> Result<WalkAction>,
    ) -> Result<()>;
}

/// [`TreeWalker`] backed by the `walkdir` crate
///
/// Only directories and regular files are reported. Symbolic links are not
/// followed; links and special files are left out.
#[derive(Debug, Clone, Copy, Default)]
pub struct WalkdirWalker;

impl WalkdirWalker {
    /// Walker that does not follow symbolic links
    pub fn new() -> Self {
        Self
    }
}

impl TreeWalker for WalkdirWalker {
    fn walk(
        &self,
        root: &Path,
        visit: &mut dyn FnMut(&WalkEntry) -> Result<WalkAction>,
    ) -> Result<()> {
        let mut entries = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(entry) = entries.next() {
            let entry = entry?;
            let file_type = entry.file_type();

            if !file_type.is_dir() && !file_type.is_file() {
                trace!("Not a regular file: {:?}", entry.path());
                continue;
            }

            let walk_entry = WalkEntry {
                path: entry.path().to_path_buf(),
                is_dir: file_type.is_dir(),
                name: entry.file_name().to_string_lossy().into_owned(),
            };

            if visit(&walk_entry)? == WalkAction::SkipSubtree && walk_entry.is_dir {
                entries.skip_current_dir();
            }
        }

        Ok(())
    }
}

/// Compiled exclude patterns
#[derive(Debug, Clone, Default)]
pub struct ExcludeSet {
    patterns: Vec<Regex>,
}

impl ExcludeSet {
    /// Compile a list of regular expressions, stopping at the first invalid one
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| Regex::new(p.as_ref()))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Whether the entry name matches any pattern (compared lowercased)
    pub fn is_excluded(&self, name: &str) -> bool {
        if self.patterns.is_empty() {
            return false;
        }
        let name = name.to_lowercase();
        self.patterns.iter().any(|p| p.is_match(&name))
    }

    /// Number of patterns
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Whether there are no patterns
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Files selected by a walk, before fingerprinting
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Regular files to fingerprint, in traversal order
    pub files: Vec<PathBuf>,
    /// Directories pruned by an exclude pattern
    pub skipped_dirs: Vec<PathBuf>,
    /// Files skipped by an exclude pattern
    pub skipped_files: Vec<PathBuf>,
}

/// Walks root directories and fingerprints the files found
///
/// ```rust,no_run
/// use filecrc::fingerprint::Fingerprinter;
/// use filecrc::scanner::{DirectoryScanner, ExcludeSet};
/// use filecrc::types::ProgressInfo;
///
/// # fn main() -> filecrc::Result<()> {
/// let scanner = DirectoryScanner::new(vec!["/srv/data".into()])
///     .with_excludes(ExcludeSet::new(&["^\\.git$", "\\.tmp$"])?)
///     .with_workers(4);
///
/// let records = scanner.scan(&Fingerprinter::new(true), None::<fn(ProgressInfo)>)?;
/// println!("{} files", records.len());
/// # Ok(())
/// # }
/// ```
pub struct DirectoryScanner {
    roots: Vec<PathBuf>,
    excludes: ExcludeSet,
    walker: Arc<dyn TreeWalker>,
    workers: usize,
}

impl std::fmt::Debug for DirectoryScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirectoryScanner")
            .field("roots", &self.roots)
            .field("excludes", &self.excludes.len())
            .field("workers", &self.workers)
            .finish()
    }
}

impl DirectoryScanner {
    /// Scanner over `roots` with no excludes, the walkdir walker and one
    /// worker per CPU
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            excludes: ExcludeSet::default(),
            walker: Arc::new(WalkdirWalker::new()),
            workers: num_cpus::get(),
        }
    }

    /// Set the exclude patterns
    pub fn with_excludes(mut self, excludes: ExcludeSet) -> Self {
        self.excludes = excludes;
        self
    }

    /// Replace the tree walker
    pub fn with_walker(mut self, walker: Arc<dyn TreeWalker>) -> Self {
        self.walker = walker;
        self
    }

    /// Set the number of fingerprinting workers (at least 1)
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Walk every root and apply the excludes without reading any file
    pub fn select(&self) -> Result<Selection> {
        let mut selection = Selection::default();

        for root in &self.roots {
            debug!("Walking {:?}", root);

            self.walker.walk(root, &mut |entry: &WalkEntry| -> Result<WalkAction> {
                let excluded = self.excludes.is_excluded(&entry.name);

                if entry.is_dir {
                    if excluded {
                        info!("Skipping directory: {}", entry.path.display());
                        selection.skipped_dirs.push(entry.path.clone());
                        return Ok(WalkAction::SkipSubtree);
                    }
                    return Ok(WalkAction::Continue);
                }

                if excluded {
                    info!("Skipping file: {}", entry.path.display());
                    selection.skipped_files.push(entry.path.clone());
                } else {
                    selection.files.push(entry.path.clone());
                }
                Ok(WalkAction::Continue)
            })?;
        }

        Ok(selection)
    }

    /// Walk every root and fingerprint each selected file
    ///
    /// The progress callback, when given, is called once per fingerprinted
    /// file from whichever worker finished it.
    pub fn scan<F>(&self, fingerprinter: &Fingerprinter, progress: Option<F>) -> Result<Vec<FileRecord>>
    where
        F: Fn(ProgressInfo) + Send + Sync,
    {
        let start = Instant::now();
        let selection = self.select()?;
        let total = selection.files.len();

        let processed = AtomicUsize::new(0);
        let bytes = AtomicU64::new(0);

        let fingerprint_one = |path: &PathBuf| -> Result<FileRecord> {
            let record = fingerprinter.fingerprint(path).inspect_err(|e| {
                warn!("{}", e);
            })?;

            let done = processed.fetch_add(1, Ordering::Relaxed) + 1;
            let bytes_done = bytes.fetch_add(record.size, Ordering::Relaxed) + record.size;
            if let Some(ref callback) = progress {
                callback(ProgressInfo {
                    operation: "Fingerprinting files".to_string(),
                    current_item: Some(record.path.clone()),
                    processed: done,
                    total: Some(total),
                    bytes_processed: bytes_done,
                });
            }
            Ok(record)
        };

        let records = if self.workers <= 1 || total < 2 {
            selection
                .files
                .iter()
                .map(fingerprint_one)
                .collect::<Result<Vec<_>>>()?
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.workers)
                .build()
                .map_err(FileCrcError::from)?;
            pool.install(|| {
                selection
                    .files
                    .par_iter()
                    .map(fingerprint_one)
                    .collect::<Result<Vec<_>>>()
            })?
        };

        debug!(
            "Fingerprinted {} files ({} bytes) with {} worker(s) in {:?}",
            records.len(),
            bytes.load(Ordering::Relaxed),
            self.workers,
            start.elapsed()
        );

        Ok(records)
    }
}
