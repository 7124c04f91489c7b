//! End-to-end scan jobs
//!
//! A [`Job`] ties the pieces together for one run:
//!
//! 1. pick the baseline archive and load the prior snapshot from it
//! 2. walk and fingerprint every root directory
//! 3. classify each file against the baseline
//! 4. write the new snapshot archive and rotate the previous one
//! 5. optionally send a notification
//!
//! ## Run modes
//!
//! | Mode             | Baseline             | Output                                   |
//! |------------------|----------------------|------------------------------------------|
//! | normal           | `zipname` if present | `zipname`; previous one becomes `<base><N><suffix>` |
//! | base             | the given archive    | `<base>-Tmp<N><suffix>` next to it       |
//! | analyze only     | `zipname` or base    | nothing                                  |
//! | verify config    | -                    | nothing, configuration checked only      |
//! | verify excludes  | -                    | nothing, walk with excludes only         |
//!
//! In the normal mode the new archive is written under a temporary name
//! first. The previous archive is only renamed once that write succeeded, so
//! a failed run leaves it untouched.
//!
//! ## Example
//!
//! ```rust,no_run
//! use filecrc::config::Config;
//! use filecrc::run::JobBuilder;
//! use filecrc::types::ProgressInfo;
//! use std::path::Path;
//!
//! # fn main() -> filecrc::Result<()> {
//! let config = Config::load(Path::new("filecrc.json"))?;
//! let job = JobBuilder::new(config).analyze_only(true).build()?;
//!
//! let report = job.run(None::<fn(ProgressInfo)>)?;
//! println!("{} suspicious file(s)", report.stats.suspicious);
//! # Ok(())
//! # }
//! ```

use crate::archive::ArchiveStore;
use crate::classifier::{ChangeClassifier, RunContext};
use crate::config::Config;
use crate::error::{FileCrcError, Result};
use crate::fingerprint::{FileMetadataProvider, Fingerprinter};
use crate::notify::{Notification, Notifier, RunOutcome, TracingNotifier};
use crate::retention::next_available_name;
use crate::scanner::{DirectoryScanner, TreeWalker, WalkdirWalker};
use crate::snapshot::Snapshot;
use crate::types::{group_digits, ProgressInfo, RunStats};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What a job does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode {
    /// Compare with `zipname`, write a new `zipname` and rotate the old one
    Normal,
    /// Compare with a named archive, write a temporary-named archive
    Base(PathBuf),
    /// Compare only
    AnalyzeOnly,
    /// Check the configuration only
    VerifyConfig,
    /// Walk with excludes applied, without reading files
    VerifyExcludes,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Normal => write!(f, "normal"),
            RunMode::Base(path) => write!(f, "base {}", path.display()),
            RunMode::AnalyzeOnly => write!(f, "analyze only"),
            RunMode::VerifyConfig => write!(f, "verify configuration"),
            RunMode::VerifyExcludes => write!(f, "verify excludes"),
        }
    }
}

/// Outcome of a successful run
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Mode the job ran in
    pub mode: RunMode,
    /// Whether file content was hashed
    pub hashing: bool,
    /// Counters
    pub stats: RunStats,
    /// Archive the files were compared with
    pub baseline: Option<PathBuf>,
    /// Archive written by this run
    pub output: Option<PathBuf>,
    /// New name of the previous archive after rotation
    pub rotated: Option<PathBuf>,
    /// Directories pruned by excludes
    pub skipped_dirs: usize,
    /// Files skipped by excludes
    pub skipped_files: usize,
    /// Wall time of the run
    pub elapsed: Duration,
}

impl RunReport {
    fn new(mode: RunMode, hashing: bool) -> Self {
        Self {
            mode,
            hashing,
            stats: RunStats::default(),
            baseline: None,
            output: None,
            rotated: None,
            skipped_dirs: 0,
            skipped_files: 0,
            elapsed: Duration::ZERO,
        }
    }

    /// Human readable run summary, one line per statistic
    pub fn summary_lines(&self) -> Vec<String> {
        let stats = &self.stats;
        let mut lines = vec![
            format!("Total files processed:        {}", group_digits(stats.total_files)),
            format!("Number of suspicious files:   {}", group_digits(stats.suspicious)),
            format!("Number of modified files:     {}", group_digits(stats.mismatched)),
            format!("Number of files added:        {}", group_digits(stats.added)),
            format!("Number of files deleted:      {}", group_digits(stats.deleted)),
        ];

        if self.hashing && self.mode != RunMode::VerifyExcludes {
            lines.push(format!("Total size of files read:     {}", group_digits(stats.bytes_read)));
            lines.push(format!("Maximum file size read:       {}", group_digits(stats.max_file_size)));
        } else {
            lines.push("Total size of files read:     No files were read".to_string());
            lines.push("Maximum file size read:       No files were read".to_string());
        }

        let elapsed = Duration::from_millis(self.elapsed.as_millis() as u64);
        lines.push(format!(
            "Processing completed in {}",
            humantime::format_duration(elapsed)
        ));
        lines
    }

    /// Emit the summary through tracing
    pub fn log_summary(&self) {
        for line in self.summary_lines() {
            info!("{}", line);
        }
    }
}

/// Builder for [`Job`]
pub struct JobBuilder {
    config: Config,
    analyze_only: bool,
    hashing: bool,
    base: Option<PathBuf>,
    verify_config: bool,
    verify_excludes: bool,
    walker: Arc<dyn TreeWalker>,
    metadata: Option<Arc<dyn FileMetadataProvider>>,
    notifier: Arc<dyn Notifier>,
}

impl JobBuilder {
    /// Start from a configuration; defaults to a normal run with hashing
    pub fn new(config: Config) -> Self {
        Self {
            config,
            analyze_only: false,
            hashing: true,
            base: None,
            verify_config: false,
            verify_excludes: false,
            walker: Arc::new(WalkdirWalker::new()),
            metadata: None,
            notifier: Arc::new(TracingNotifier),
        }
    }

    /// Compare without writing an archive
    pub fn analyze_only(mut self, on: bool) -> Self {
        self.analyze_only = on;
        self
    }

    /// Hash file content (only analyze-only runs may turn this off)
    pub fn hashing(mut self, on: bool) -> Self {
        self.hashing = on;
        self
    }

    /// Compare against a specific archive instead of `zipname`
    pub fn base(mut self, base: Option<PathBuf>) -> Self {
        self.base = base;
        self
    }

    /// Only check the configuration
    pub fn verify_config(mut self, on: bool) -> Self {
        self.verify_config = on;
        self
    }

    /// Only walk the trees with excludes applied
    pub fn verify_excludes(mut self, on: bool) -> Self {
        self.verify_excludes = on;
        self
    }

    /// Replace the tree walker
    pub fn walker(mut self, walker: Arc<dyn TreeWalker>) -> Self {
        self.walker = walker;
        self
    }

    /// Replace the file metadata provider
    pub fn metadata_provider(mut self, provider: Arc<dyn FileMetadataProvider>) -> Self {
        self.metadata = Some(provider);
        self
    }

    /// Replace the notifier
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Check option combinations and build the job
    ///
    /// # Errors
    ///
    /// [`FileCrcError::Configuration`] when
    /// - hashing is disabled outside analyze-only
    /// - a verify option is combined with analyze-only, no-hash or a base
    /// - the configuration itself is invalid
    pub fn build(self) -> Result<Job> {
        let mut problems = Vec::new();

        if !self.hashing && !self.analyze_only {
            problems.push("hashing can only be disabled together with analyze only");
        }
        if (self.verify_config || self.verify_excludes)
            && (self.analyze_only || !self.hashing || self.base.is_some())
        {
            problems.push("verify options cannot be combined with analyze only, no hash or a base name");
        }
        if !problems.is_empty() {
            return Err(FileCrcError::config(problems.join("; ")));
        }

        self.config.validate()?;

        let mode = if self.verify_excludes {
            RunMode::VerifyExcludes
        } else if self.verify_config {
            RunMode::VerifyConfig
        } else if self.analyze_only {
            RunMode::AnalyzeOnly
        } else if let Some(base) = &self.base {
            RunMode::Base(base.clone())
        } else {
            RunMode::Normal
        };

        Ok(Job {
            config: self.config,
            mode,
            hashing: self.hashing,
            base: self.base,
            walker: self.walker,
            metadata: self.metadata,
            notifier: self.notifier,
            store: ArchiveStore::new(),
        })
    }
}

/// One configured run
pub struct Job {
    config: Config,
    mode: RunMode,
    hashing: bool,
    base: Option<PathBuf>,
    walker: Arc<dyn TreeWalker>,
    metadata: Option<Arc<dyn FileMetadataProvider>>,
    notifier: Arc<dyn Notifier>,
    store: ArchiveStore,
}

impl fmt::Debug for Job {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Job")
            .field("mode", &self.mode)
            .field("hashing", &self.hashing)
            .field("base", &self.base)
            .finish()
    }
}

impl Job {
    /// Mode this job runs in
    pub fn mode(&self) -> &RunMode {
        &self.mode
    }

    /// Configuration in use
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the job and send the notification if one is configured
    ///
    /// The notification is sent for failed runs too. A delivery failure turns
    /// an otherwise successful run into an error.
    pub fn run<F>(&self, progress: Option<F>) -> Result<RunReport>
    where
        F: Fn(ProgressInfo) + Send + Sync,
    {
        let start = Instant::now();
        let result = self.execute(progress).map(|mut report| {
            report.elapsed = start.elapsed();
            report
        });

        match &result {
            Ok(report) => report.log_summary(),
            Err(e) => error!("Processing failed: {}", e),
        }

        let verifying = matches!(self.mode, RunMode::VerifyConfig | RunMode::VerifyExcludes);
        if self.config.send_mail && !verifying {
            let empty = RunStats::default();
            let outcome = RunOutcome {
                stats: result.as_ref().map(|r| &r.stats).unwrap_or(&empty),
                analyze_only: self.mode == RunMode::AnalyzeOnly,
                failed: result.is_err(),
                archive: result.as_ref().ok().and_then(|r| r.output.as_deref()),
            };
            let notification = Notification::compose(&self.config, &outcome);

            if let Err(e) = self.notifier.send(&notification) {
                error!("An error occurred sending the notification: {}", e);
                if result.is_ok() {
                    return Err(e);
                }
            }
        }

        result
    }

    fn execute<F>(&self, progress: Option<F>) -> Result<RunReport>
    where
        F: Fn(ProgressInfo) + Send + Sync,
    {
        let mut report = RunReport::new(self.mode.clone(), self.hashing);
        info!("Starting {} run", self.mode);

        let scanner = DirectoryScanner::new(self.config.root_paths())
            .with_excludes(self.config.excludes()?)
            .with_walker(Arc::clone(&self.walker))
            .with_workers(self.config.workers());

        match self.mode {
            RunMode::VerifyConfig => {
                info!("The configuration file is correct");
                return Ok(report);
            }
            RunMode::VerifyExcludes => {
                info!("Verifying exclusion definitions only");
                let selection = scanner.select()?;
                report.stats.total_files = selection.files.len();
                report.skipped_dirs = selection.skipped_dirs.len();
                report.skipped_files = selection.skipped_files.len();
                return Ok(report);
            }
            _ => {}
        }

        self.config.log_summary();
        if !self.hashing {
            info!("No hash will be computed or compared");
        }
        if self.mode == RunMode::AnalyzeOnly {
            info!("Performing analysis only, no zip file will be created");
        }

        let baseline = self.baseline_path()?;
        let prior = match &baseline {
            Some(path) => {
                info!("Processing root dirs against file {}", path.display());
                self.load_snapshot(path).inspect_err(|_| {
                    error!("Error loading the previous snapshot {}", path.display());
                })?
            }
            None => {
                info!("No previous snapshot found, every file is treated as new");
                Snapshot::new()
            }
        };
        report.baseline = baseline;

        let mut fingerprinter = Fingerprinter::new(self.hashing);
        if let Some(provider) = &self.metadata {
            fingerprinter = fingerprinter.with_provider(Arc::clone(provider));
        }

        let records = scanner.scan(&fingerprinter, progress)?;

        let mut context = RunContext::new(ChangeClassifier::new(self.hashing), prior);
        for record in records {
            context.record(record);
        }
        let (snapshot, stats) = context.finish();
        report.stats = stats;

        if self.config.debug.stats {
            debug!(
                "Snapshot holds {} records; {} bytes read, largest file {} bytes",
                snapshot.len(),
                report.stats.bytes_read,
                report.stats.max_file_size
            );
        }

        if self.mode != RunMode::AnalyzeOnly {
            let (output, rotated) = self.persist(&snapshot)?;
            report.output = Some(output);
            report.rotated = rotated;
        }

        Ok(report)
    }

    /// Archive to compare with, `None` for a first run
    fn baseline_path(&self) -> Result<Option<PathBuf>> {
        if let Some(base) = &self.base {
            if !base.is_file() {
                return Err(FileCrcError::config(format!(
                    "the base file '{}' does not exist",
                    base.display()
                )));
            }
            return Ok(Some(base.clone()));
        }

        let current = PathBuf::from(&self.config.zip_name);
        Ok(current.is_file().then_some(current))
    }

    /// Read and decode a snapshot archive as a baseline
    pub fn load_snapshot(&self, path: &Path) -> Result<Snapshot> {
        let bytes = self
            .store
            .read(path, Some(&self.config.entry_name), self.config.password())?;
        let snapshot = Snapshot::load(&bytes, true)?;
        debug!("Loaded {} baseline records from {}", snapshot.len(), path.display());
        Ok(snapshot)
    }

    /// Write the new snapshot; returns the final path and the rotated name
    fn persist(&self, snapshot: &Snapshot) -> Result<(PathBuf, Option<PathBuf>)> {
        let bytes = snapshot.to_bytes()?;
        let entry = &self.config.entry_name;
        let password = self.config.password();

        if let RunMode::Base(base) = &self.mode {
            let output = next_available_name(base, true)?;
            self.store.write(&output, password, entry, &bytes)?;
            info!("The output file is {}", output.display());
            return Ok((output, None));
        }

        let current = PathBuf::from(&self.config.zip_name);
        let temp = next_available_name(&current, true)?;
        if let Err(e) = self.store.write(&temp, password, entry, &bytes) {
            let _ = fs::remove_file(&temp);
            return Err(e);
        }

        let rotated = if current.is_file() {
            let rotated = next_available_name(&current, false)?;
            fs::rename(&current, &rotated).map_err(|e| {
                let _ = fs::remove_file(&temp);
                FileCrcError::file_io(&current, e)
            })?;
            info!("Existing zip file '{}' is now {}", current.display(), rotated.display());
            Some(rotated)
        } else {
            None
        };

        if let Err(e) = fs::rename(&temp, &current) {
            if let Some(rotated) = &rotated {
                if let Err(restore) = fs::rename(rotated, &current) {
                    warn!(
                        "Could not restore {} from {}: {}",
                        current.display(),
                        rotated.display(),
                        restore
                    );
                }
            }
            return Err(FileCrcError::file_io(&temp, e));
        }

        info!("Snapshot written to {}", current.display());
        Ok((current, rotated))
    }
}
