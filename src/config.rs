//! JSON job configuration
//!
//! A job is described by a small JSON document:
//!
//! ```json
//! {
//!   "rootdirs": ["c:/Dir1", "/srv/data"],
//!   "zipname":  "filesinfo.zip",
//!   "filename": "stats.txt",
//!   "password": "secret",
//!   "exclude":  ["^\\.git$", "\\.tmp$"],
//!   "hostname": "myhost",
//!   "sendmail": true,
//!   "logfile":  "filecrc.log",
//!   "email":    { "from": "me@example.com", "to": ["ops@example.com"], "attach": ["log", "zip"] },
//!   "debug":    { "stats": true, "workers": 4 }
//! }
//! ```
//!
//! Unknown keys are rejected. [`Config::load`] normalizes root directories
//! (`\` becomes `/`, trailing slash removed) and then runs
//! [`Config::validate`], which reports every problem found rather than only
//! the first.

use crate::error::{FileCrcError, Result};
use crate::scanner::ExcludeSet;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default name of the snapshot entry inside the archive
pub const DEFAULT_ENTRY_NAME: &str = "fileinfo.txt";

/// Attachment keyword for the log file
pub const ATTACH_LOG: &str = "log";
/// Attachment keyword for the snapshot archive
pub const ATTACH_ZIP: &str = "zip";

fn default_entry_name() -> String {
    DEFAULT_ENTRY_NAME.to_string()
}

/// Complete job configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Directory trees to scan, in order
    #[serde(rename = "rootdirs")]
    pub root_dirs: Vec<String>,
    /// Current snapshot archive
    #[serde(rename = "zipname", default)]
    pub zip_name: String,
    /// Name of the snapshot entry inside the archive
    #[serde(rename = "filename", default = "default_entry_name")]
    pub entry_name: String,
    /// Archive password; the archive is not encrypted without one
    #[serde(default)]
    pub password: Option<String>,
    /// Exclude patterns matched against lowercase entry names
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Host name used in notifications (defaults to the machine name)
    #[serde(default)]
    pub hostname: Option<String>,
    /// Whether to send a notification at the end of a run
    #[serde(rename = "sendmail", default)]
    pub send_mail: bool,
    /// Notification settings
    #[serde(default)]
    pub email: EmailConfig,
    /// Log file; events go to stderr when absent
    #[serde(rename = "logfile", default)]
    pub log_file: Option<PathBuf>,
    /// Diagnostics and tuning
    #[serde(default)]
    pub debug: DebugConfig,
}

/// Notification settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// Sender address
    #[serde(default)]
    pub from: String,
    /// Recipients
    #[serde(default)]
    pub to: Vec<String>,
    /// Copy recipients
    #[serde(default)]
    pub cc: Vec<String>,
    /// Subject override; the generated summary is used when absent
    #[serde(default)]
    pub subject: Option<String>,
    /// What to attach: `log` and/or `zip`
    #[serde(default)]
    pub attach: Vec<String>,
}

/// Diagnostics and tuning
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DebugConfig {
    /// Log extra run statistics
    #[serde(default)]
    pub stats: bool,
    /// Fingerprinting workers (defaults to the number of CPUs)
    #[serde(default)]
    pub workers: Option<usize>,
}

impl Config {
    /// Read, normalize and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        debug!("Loading configuration from {:?}", path);
        let text = fs::read_to_string(path).map_err(|e| FileCrcError::file_io(path, e))?;
        Self::from_json(&text)
    }

    /// Parse, normalize and validate configuration text
    pub fn from_json(text: &str) -> Result<Self> {
        let mut config: Config = serde_json::from_str(text)?;
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Apply the normalization rules in place
    pub fn normalize(&mut self) {
        for dir in &mut self.root_dirs {
            *dir = normalize_root(dir);
        }

        if self.password.as_deref() == Some("") {
            self.password = None;
        }

        for kind in &mut self.email.attach {
            *kind = kind.to_lowercase();
        }
    }

    /// Check every rule and report all violations together
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if self.root_dirs.is_empty() {
            problems.push("the root directory list, rootdirs, is required".to_string());
        }
        if self.root_dirs.iter().any(|d| d.is_empty()) {
            problems.push("rootdirs contains an empty directory name".to_string());
        }
        if self.zip_name.trim().is_empty() {
            problems.push("a zip file name, zipname, is required".to_string());
        }
        if self.entry_name.trim().is_empty() {
            problems.push("the snapshot entry name, filename, cannot be empty".to_string());
        }

        for pattern in &self.exclude {
            if let Err(e) = Regex::new(pattern) {
                problems.push(format!("exclude pattern '{}' is invalid: {}", pattern, e));
            }
        }

        if self.send_mail {
            if self.email.from.trim().is_empty() {
                problems.push("the email from address, from, was not specified".to_string());
            }
            if self.email.to.is_empty() {
                problems.push("the email to list, to, was not specified".to_string());
            }
        }

        for kind in &self.email.attach {
            match kind.as_str() {
                ATTACH_LOG if self.log_file.is_none() => problems
                    .push("a log file attachment requires a logfile to be specified".to_string()),
                ATTACH_LOG | ATTACH_ZIP => {}
                other => problems.push(format!("the attachment keyword '{}' is invalid", other)),
            }
        }

        if self.debug.workers == Some(0) {
            problems.push("debug.workers must be at least 1".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(FileCrcError::config(problems.join("; ")))
        }
    }

    /// Root directories as paths
    pub fn root_paths(&self) -> Vec<PathBuf> {
        self.root_dirs.iter().map(PathBuf::from).collect()
    }

    /// Compiled exclude patterns
    pub fn excludes(&self) -> Result<ExcludeSet> {
        ExcludeSet::new(&self.exclude)
    }

    /// Archive password, if encryption is configured
    pub fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    /// Host name for notifications: configured value or the machine's name
    pub fn hostname(&self) -> String {
        match &self.hostname {
            Some(name) if !name.is_empty() => name.clone(),
            _ => hostname::get()
                .map(|h| h.to_string_lossy().into_owned())
                .unwrap_or_else(|_| "localhost".to_string()),
        }
    }

    /// Number of fingerprinting workers
    pub fn workers(&self) -> usize {
        self.debug.workers.unwrap_or_else(num_cpus::get).max(1)
    }

    /// Whether `kind` (`log` or `zip`) should be attached to notifications
    pub fn attaches(&self, kind: &str) -> bool {
        self.email.attach.iter().any(|k| k == kind)
    }

    /// Log the settings that change run behaviour
    pub fn log_summary(&self) {
        if self.password.is_none() {
            info!("No zip encryption password supplied, the file will not be encrypted");
        }
        if self.entry_name == DEFAULT_ENTRY_NAME {
            debug!("Snapshot entry name not specified, {} is being used", DEFAULT_ENTRY_NAME);
        }
        debug!(
            "Scanning {} root(s) with {} exclude pattern(s) and {} worker(s)",
            self.root_dirs.len(),
            self.exclude.len(),
            self.workers()
        );
    }
}

/// `c:\Dir1\` → `c:/Dir1`; a bare `/` is kept
fn normalize_root(dir: &str) -> String {
    let dir = dir.replace('\\', "/");
    let trimmed = dir.trim_end_matches('/');
    if trimmed.is_empty() && !dir.is_empty() {
        "/".to_string()
    } else {
        trimmed.to_string()
    }
}
