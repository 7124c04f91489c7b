//! # filecrc CLI - File integrity scanning
//!
//! Command-line front end for the filecrc library.
//!
//! ## Usage
//! ```bash
//! # Scan the configured roots, compare with the last snapshot and archive the result
//! filecrc scan -c filecrc.json
//!
//! # Compare against an older archive without writing anything
//! filecrc scan -c filecrc.json --analyze --base files3.zip
//!
//! # List the suspicious files recorded in a snapshot archive
//! filecrc dump files.zip -s -p secret
//!
//! # Keep the five newest archives of the files<N>.zip family
//! filecrc prune -r 5 files.zip
//! ```

use clap::{Parser, Subcommand};
use colored::*;
use filecrc::dump::{inspect, DumpFilter};
use filecrc::types::{group_digits, ProgressInfo};
use filecrc::{ArchiveStore, Config, FileCrcError, JobBuilder, Result, RetentionManager, RunMode};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Exit code for configuration and run-fatal errors
const EXIT_FAILURE: i32 = 2;

/// filecrc - detect suspicious file changes between scans
#[derive(Parser)]
#[command(name = "filecrc")]
#[command(version)]
#[command(about = "Fingerprint directory trees and flag suspicious changes between runs")]
#[command(long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan the configured directories and compare with the previous snapshot
    Scan {
        /// Configuration file
        #[arg(short, long, default_value = "filecrc.json")]
        config: PathBuf,

        /// Compare only, do not write a snapshot archive
        #[arg(short, long)]
        analyze: bool,

        /// Do not read file content (analyze only)
        #[arg(long)]
        no_hash: bool,

        /// Compare against this archive instead of the configured zip name
        #[arg(short, long)]
        base: Option<PathBuf>,

        /// Check the configuration file and stop
        #[arg(long)]
        verify_config: bool,

        /// Walk the directories applying excludes only
        #[arg(long)]
        verify_excludes: bool,

        /// Show progress
        #[arg(long)]
        progress: bool,
    },

    /// Print records stored in a snapshot archive
    Dump {
        /// Snapshot archive
        archive: PathBuf,

        /// Select suspicious records
        #[arg(short, long)]
        suspicious: bool,

        /// Select added records
        #[arg(short, long)]
        added: bool,

        /// Select modified records
        #[arg(short, long)]
        modified: bool,

        /// Select records with a path component matching this regular expression
        #[arg(short, long)]
        name: Option<String>,

        /// Archive password
        #[arg(short, long)]
        password: Option<String>,

        /// Entry to read (defaults to the first one)
        #[arg(short, long)]
        file: Option<String>,
    },

    /// Delete the oldest archives of a numbered family
    Prune {
        /// Number of archives to keep
        #[arg(short, long)]
        retain: usize,

        /// Allow a retain count of zero
        #[arg(long)]
        force: bool,

        /// Family reference name, e.g. files.zip for files1.zip, files2.zip, ...
        base: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    // Disable colors if needed
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(cli) {
        eprintln!("{}: {}", "Error".red().bold(), e.user_message());
        std::process::exit(EXIT_FAILURE);
    }
}

/// Main command runner
fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Scan {
            config,
            analyze,
            no_hash,
            base,
            verify_config,
            verify_excludes,
            progress,
        } => {
            let config = Config::load(&config)?;
            init_logging(cli.verbose, config.log_file.as_deref())?;

            let job = JobBuilder::new(config)
                .analyze_only(analyze)
                .hashing(!no_hash)
                .base(base)
                .verify_config(verify_config)
                .verify_excludes(verify_excludes)
                .build()?;
            cmd_scan(job, progress)
        }
        Commands::Dump {
            archive,
            suspicious,
            added,
            modified,
            name,
            password,
            file,
        } => {
            init_logging(cli.verbose, None)?;
            let mut filter = DumpFilter::new()
                .with_suspicious(suspicious)
                .with_added(added)
                .with_modified(modified);
            if let Some(pattern) = name {
                filter = filter.with_name_pattern(&pattern)?;
            }
            cmd_dump(&archive, &filter, password.as_deref(), file.as_deref())
        }
        Commands::Prune {
            retain,
            force,
            base,
        } => {
            init_logging(cli.verbose, None)?;
            cmd_prune(&base, retain, force)
        }
    }
}

/// Install the tracing subscriber
///
/// `RUST_LOG` wins when set; otherwise `-v` raises the level to debug. With a
/// log file configured, events go there instead of stderr.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> Result<()> {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| FileCrcError::file_io(path, e))?;
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
    Ok(())
}

/// Run a scan job and print its summary
fn cmd_scan(job: filecrc::Job, show_progress: bool) -> Result<()> {
    println!("{} ({})", "Scanning files...".blue().bold(), job.mode());

    let bar = if show_progress {
        let pb = ProgressBar::new(0);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let callback = bar.clone().map(|pb| {
        move |info: ProgressInfo| {
            if let Some(total) = info.total {
                pb.set_length(total as u64);
            }
            pb.set_position(info.processed as u64);
            if let Some(item) = info.current_item {
                pb.set_message(item);
            }
        }
    });

    let result = job.run(callback);
    if let Some(pb) = bar {
        pb.finish_and_clear();
    }
    let report = result?;

    match report.mode {
        RunMode::VerifyConfig => {
            println!("{} The configuration file is correct", "✓".green().bold());
            return Ok(());
        }
        RunMode::VerifyExcludes => {
            println!("{} Exclusions verified", "✓".green().bold());
            println!("  Files selected:      {}", group_digits(report.stats.total_files).cyan());
            println!("  Directories skipped: {}", group_digits(report.skipped_dirs).cyan());
            println!("  Files skipped:       {}", group_digits(report.skipped_files).cyan());
            return Ok(());
        }
        _ => {}
    }

    let marker = if report.stats.suspicious > 0 {
        "!".red().bold()
    } else {
        "✓".green().bold()
    };
    println!("{} Scan complete", marker);
    if let Some(baseline) = &report.baseline {
        println!("  Compared with: {}", baseline.display().to_string().cyan());
    }
    if let Some(output) = &report.output {
        println!("  Snapshot:      {}", output.display().to_string().cyan());
    }
    if let Some(rotated) = &report.rotated {
        println!("  Previous:      {}", rotated.display().to_string().cyan());
    }
    for line in report.summary_lines() {
        println!("  {}", line);
    }

    if report.stats.suspicious > 0 {
        println!(
            "\n{} {} suspicious file(s), see the log for details",
            "Warning:".yellow().bold(),
            report.stats.suspicious
        );
    }

    Ok(())
}

/// Print selected records and the summary of a snapshot archive
fn cmd_dump(
    archive: &Path,
    filter: &DumpFilter,
    password: Option<&str>,
    entry: Option<&str>,
) -> Result<()> {
    let bytes = ArchiveStore::new().read(archive, entry, password)?;
    let report = inspect(&bytes, filter)?;

    for record in &report.selected {
        println!("{}", record.display());
    }
    if !report.selected.is_empty() {
        println!();
    }
    print!("{}", report.summary());

    Ok(())
}

/// Delete all but the newest `retain` archives of the family named by `base`
fn cmd_prune(base: &Path, retain: usize, force: bool) -> Result<()> {
    let manager = RetentionManager::new(retain).with_force(force);
    manager.validate()?;

    let deleted = manager.prune(base)?;
    if deleted.is_empty() {
        println!("{} Nothing to delete", "✓".green().bold());
        return Ok(());
    }

    for path in &deleted {
        println!("  {} {}", "deleted".red(), path.display());
    }
    println!(
        "{} Deleted {} archive(s), kept {}",
        "✓".green().bold(),
        deleted.len().to_string().yellow(),
        retain
    );
    Ok(())
}
