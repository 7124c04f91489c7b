//! End-of-run notifications
//!
//! A [`Notification`] summarises a run for the operator: the subject carries
//! the counters, the HTML body says whether the run failed and what is
//! attached. Delivery is behind the [`Notifier`] trait so a mail transport can
//! be plugged in by the embedding application; the crate ships
//! [`TracingNotifier`], which records the message as a tracing event.

use crate::config::{Config, ATTACH_LOG, ATTACH_ZIP};
use crate::error::Result;
use crate::types::RunStats;
use std::path::{Path, PathBuf};
use tracing::info;

/// A composed end-of-run message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// Sender address
    pub from: String,
    /// Recipients
    pub to: Vec<String>,
    /// Copy recipients
    pub cc: Vec<String>,
    /// Subject line
    pub subject: String,
    /// HTML body
    pub html_body: String,
    /// Files to attach
    pub attachments: Vec<PathBuf>,
}

/// What happened in the run being reported
#[derive(Debug, Clone, Copy)]
pub struct RunOutcome<'a> {
    /// Counters (possibly partial when the run failed)
    pub stats: &'a RunStats,
    /// Whether no archive was meant to be written
    pub analyze_only: bool,
    /// Whether the run ended in error
    pub failed: bool,
    /// Archive written by the run, if any
    pub archive: Option<&'a Path>,
}

/// `"<host> scanned files: <s> suspicious, <t> total, <a> added, <m> modified <d> deleted"`
pub fn subject_line(host: &str, stats: &RunStats) -> String {
    format!(
        "{} scanned files: {} suspicious, {} total, {} added, {} modified {} deleted",
        host, stats.suspicious, stats.total_files, stats.added, stats.mismatched, stats.deleted
    )
}

impl Notification {
    /// Compose the message for `outcome` using the configured addresses
    pub fn compose(config: &Config, outcome: &RunOutcome<'_>) -> Self {
        let mut attachments = Vec::new();
        for kind in &config.email.attach {
            match kind.as_str() {
                ATTACH_LOG => attachments.extend(config.log_file.clone()),
                // nothing to attach when no archive was produced
                ATTACH_ZIP if !outcome.analyze_only => {
                    attachments.extend(outcome.archive.map(Path::to_path_buf))
                }
                _ => {}
            }
        }

        let mut html_body = String::new();
        if outcome.analyze_only {
            html_body.push_str("Analysis only specified, <b>no zip file produced</b><p>");
        }
        if outcome.failed {
            html_body.push_str("Processing completed <b>in error</b><p>");
        } else {
            html_body.push_str("Processing completed <b>without errors</b><p>");
        }
        for file in &attachments {
            html_body.push_str(&format!("File {} attached<p>", file.display()));
        }

        let subject = config
            .email
            .subject
            .clone()
            .unwrap_or_else(|| subject_line(&config.hostname(), outcome.stats));

        Self {
            from: config.email.from.clone(),
            to: config.email.to.clone(),
            cc: config.email.cc.clone(),
            subject,
            html_body,
            attachments,
        }
    }
}

/// Delivers notifications
pub trait Notifier: Send + Sync {
    /// Send one notification
    fn send(&self, notification: &Notification) -> Result<()>;
}

/// Notifier that only records the message through `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn send(&self, notification: &Notification) -> Result<()> {
        info!(
            from = %notification.from,
            to = ?notification.to,
            cc = ?notification.cc,
            attachments = notification.attachments.len(),
            "Notification: {}",
            notification.subject
        );
        Ok(())
    }
}
