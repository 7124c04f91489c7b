//! Integration tests for complete scan runs
//!
//! Builds realistic trees, mutates them between runs and checks the counters,
//! the archive family on disk and the stored findings.

use ::filecrc::types::ProgressInfo;
use ::filecrc::*;
use filetime::FileTime;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;
use tracing::info;

/// Test harness owning a scanned tree and its archive location
pub struct ScanTestHarness {
    pub temp_dir: TempDir,
    pub data_dir: PathBuf,
    pub zip_path: PathBuf,
    pub config: Config,
    pub file_generator: FileGenerator,
}

impl ScanTestHarness {
    /// Create a harness with an empty data directory
    pub fn new() -> Self {
        Self::with_config("")
    }

    /// Create a harness, appending `extra` JSON members to the configuration
    pub fn with_config(extra: &str) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        fs::create_dir_all(&data_dir).unwrap();
        let zip_path = temp_dir.path().join("files.zip");

        let config = Config::from_json(&format!(
            r#"{{ "rootdirs": [{:?}], "zipname": {:?} {} }}"#,
            data_dir.to_string_lossy(),
            zip_path.to_string_lossy(),
            extra
        ))
        .unwrap();

        Self {
            temp_dir,
            data_dir,
            zip_path,
            config,
            file_generator: FileGenerator::new(42),
        }
    }

    /// Generate a directory tree below the data directory
    pub fn generate_project(&mut self, config: ProjectConfig) -> anyhow::Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for dir_depth in 1..=config.max_depth {
            for dir_idx in 0..config.dirs_per_level {
                let mut path = self.data_dir.clone();
                for level in 0..dir_depth {
                    path = path.join(format!("dir_{}_{}", level, dir_idx));
                }
                fs::create_dir_all(&path)?;

                for file_idx in 0..config.files_per_dir {
                    let file_path = path.join(format!("file_{}.txt", file_idx));
                    let content = self
                        .file_generator
                        .generate_file_content(config.file_size_range.clone());
                    fs::write(&file_path, &content)?;
                    files.push(file_path);
                }
            }
        }

        files.sort();
        Ok(files)
    }

    /// Modify, delete and add files; each existing file is touched at most once
    ///
    /// Modified files get a modification time well past the previous one so
    /// the change reads as an ordinary edit.
    pub fn mutate_files(
        &mut self,
        files: &[PathBuf],
        mutation: MutationConfig,
    ) -> anyhow::Result<Vec<FileChange>> {
        let mut changes = Vec::new();
        let later = FileTime::from_system_time(SystemTime::now() + Duration::from_secs(7200));

        let (to_modify, rest) = files.split_at(mutation.modify.min(files.len()));
        let to_delete = &rest[..mutation.delete.min(rest.len())];

        for path in to_modify {
            let mut content = fs::read(path)?;
            content.extend_from_slice(b" -- edited");
            fs::write(path, &content)?;
            filetime::set_file_mtime(path, later)?;
            changes.push(FileChange::Modified(path.clone()));
        }

        for path in to_delete {
            fs::remove_file(path)?;
            changes.push(FileChange::Deleted(path.clone()));
        }

        for idx in 0..mutation.add {
            let path = self.data_dir.join(format!("added_{}.bin", idx));
            let size = self.file_generator.rng.random_range(1..4096);
            let content = self.file_generator.generate_binary_content(size);
            fs::write(&path, content)?;
            changes.push(FileChange::Added(path));
        }

        info!("Applied {} mutations", changes.len());
        Ok(changes)
    }

    /// Run a normal job
    pub fn run(&self) -> Result<RunReport> {
        self.run_with(|builder| builder)
    }

    /// Run a job after adjusting its builder
    pub fn run_with(&self, adjust: impl FnOnce(JobBuilder) -> JobBuilder) -> Result<RunReport> {
        adjust(JobBuilder::new(self.config.clone()))
            .build()?
            .run(None::<fn(ProgressInfo)>)
    }

    /// Decode the snapshot stored in `archive`, keeping its flags
    pub fn stored_snapshot(&self, archive: &Path) -> Result<Snapshot> {
        let bytes = ArchiveStore::new().read(archive, None, self.config.password())?;
        Snapshot::load(&bytes, false)
    }

    /// Archive `files<n>.zip` next to the current one
    pub fn member(&self, n: u64) -> PathBuf {
        self.temp_dir.path().join(format!("files{}.zip", n))
    }
}

impl Default for ScanTestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// File generator for test data
pub struct FileGenerator {
    rng: StdRng,
}

impl FileGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Generate realistic file content
    pub fn generate_file_content(&mut self, size_range: std::ops::Range<usize>) -> Vec<u8> {
        let size = self.rng.random_range(size_range);
        let mut content = Vec::with_capacity(size);

        let words = ["the", "quick", "brown", "fox", "jumps", "over", "lazy", "dog", "lorem", "ipsum"];
        while content.len() < size {
            let word = words[self.rng.random_range(0..words.len())];
            content.extend_from_slice(word.as_bytes());
            content.push(b' ');
        }

        content.truncate(size);
        content
    }

    /// Generate binary file content
    pub fn generate_binary_content(&mut self, size: usize) -> Vec<u8> {
        let mut content = vec![0u8; size];
        self.rng.fill(&mut content[..]);
        content
    }
}

#[derive(Debug, Clone)]
pub struct ProjectConfig {
    pub max_depth: usize,
    pub dirs_per_level: usize,
    pub files_per_dir: usize,
    pub file_size_range: std::ops::Range<usize>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            max_depth: 3,
            dirs_per_level: 4,
            files_per_dir: 5,
            file_size_range: 100..10_000,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MutationConfig {
    pub modify: usize,
    pub delete: usize,
    pub add: usize,
}

#[derive(Debug)]
pub enum FileChange {
    Added(PathBuf),
    Modified(PathBuf),
    Deleted(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_mutations_are_counted() {
        let mut harness = ScanTestHarness::new();
        let files = harness.generate_project(ProjectConfig::default()).unwrap();
        assert_eq!(files.len(), 60);

        let first = harness.run().unwrap();
        assert_eq!(first.stats.added, 60);
        assert_eq!(first.stats.bytes_read, files.iter().map(|f| fs::metadata(f).unwrap().len()).sum::<u64>());

        harness
            .mutate_files(
                &files,
                MutationConfig {
                    modify: 7,
                    delete: 5,
                    add: 3,
                },
            )
            .unwrap();

        let second = harness.run().unwrap();
        let stats = &second.stats;
        assert_eq!(stats.mismatched, 7);
        assert_eq!(stats.deleted, 5);
        assert_eq!(stats.added, 3);
        assert_eq!(stats.suspicious, 0);
        assert_eq!(stats.total_files, 58);

        // every baseline record is accounted for exactly once
        assert_eq!(stats.unchanged + stats.mismatched + stats.suspicious + stats.deleted, 60);
        assert_eq!(stats.classified(), stats.total_files);

        // the rotated archive still holds the first run
        let previous = harness.stored_snapshot(&harness.member(1)).unwrap();
        assert_eq!(previous.len(), 60);
        assert!(previous.records().all(|r| r.flags == StatusFlags::INSERTED));

        let current = harness.stored_snapshot(&harness.zip_path).unwrap();
        assert_eq!(current.len(), 58);
        assert_eq!(
            current.records().filter(|r| r.flags == StatusFlags::MISMATCHED).count(),
            7
        );
    }

    #[test]
    fn test_parallel_and_sequential_agree() {
        let mut harness = ScanTestHarness::with_config(r#", "debug": { "workers": 1 }"#);
        harness.generate_project(ProjectConfig::default()).unwrap();

        let sequential = harness.run().unwrap();
        let sequential_snapshot = harness.stored_snapshot(&harness.zip_path).unwrap();

        harness.config.debug.workers = Some(4);
        fs::remove_file(&harness.zip_path).unwrap();
        let parallel = harness.run().unwrap();
        let parallel_snapshot = harness.stored_snapshot(&harness.zip_path).unwrap();

        assert_eq!(sequential.stats, parallel.stats);
        assert_eq!(sequential_snapshot, parallel_snapshot);
    }

    #[test]
    fn test_excludes_prune_subtrees() {
        let harness = ScanTestHarness::with_config(r#", "exclude": ["^\\.git$", "\\.tmp$"]"#);
        fs::create_dir_all(harness.data_dir.join(".git/objects")).unwrap();
        fs::write(harness.data_dir.join(".git/objects/abc"), "blob").unwrap();
        fs::write(harness.data_dir.join("Scratch.TMP"), "scratch").unwrap();
        fs::write(harness.data_dir.join("kept.txt"), "kept").unwrap();

        let report = harness.run().unwrap();
        assert_eq!(report.stats.total_files, 1);

        let snapshot = harness.stored_snapshot(&harness.zip_path).unwrap();
        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.keys().all(|k| k.ends_with("kept.txt")));

        let verify = harness.run_with(|b| b.verify_excludes(true)).unwrap();
        assert_eq!(verify.skipped_dirs, 1);
        assert_eq!(verify.skipped_files, 1);
    }

    #[test]
    fn test_nested_roots_count_each_file_once() {
        // one worker, so the two reads of the file restore its atime in turn
        let mut harness = ScanTestHarness::with_config(r#", "debug": { "workers": 1 }"#);
        let sub = harness.data_dir.join("sub");
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("shared.txt"), "seen twice").unwrap();
        harness
            .config
            .root_dirs
            .push(sub.to_string_lossy().into_owned());

        let first = harness.run().unwrap();
        assert_eq!(first.stats.total_files, 1);
        assert_eq!(first.stats.added, 1);

        let second = harness.run().unwrap();
        let stats = &second.stats;
        assert_eq!(stats.total_files, 1);
        assert_eq!(stats.unchanged, 1);
        assert_eq!(stats.deleted, 0);
        assert_eq!(
            stats.unchanged + stats.mismatched + stats.suspicious + stats.deleted,
            harness.stored_snapshot(&harness.member(1)).unwrap().len()
        );
    }

    #[test]
    fn test_size_only_change_with_custom_provider() {
        use filecrc::fingerprint::{FileMetadataProvider, FileStat};
        use std::sync::atomic::{AtomicU64, Ordering};
        use std::sync::Arc;
        use std::time::UNIX_EPOCH;

        // reports a fixed clock and a size the test controls
        struct FrozenProvider {
            size: AtomicU64,
        }

        impl FileMetadataProvider for FrozenProvider {
            fn stat(&self, _path: &Path) -> Result<FileStat> {
                let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
                Ok(FileStat {
                    size: self.size.load(Ordering::SeqCst),
                    created: t,
                    accessed: t,
                    modified: t,
                })
            }

            fn restore_accessed(&self, _path: &Path, _accessed: SystemTime) -> Result<()> {
                Ok(())
            }
        }

        let harness = ScanTestHarness::new();
        fs::write(harness.data_dir.join("db.bin"), "stable content").unwrap();
        let provider = Arc::new(FrozenProvider {
            size: AtomicU64::new(100),
        });

        harness
            .run_with(|b| b.metadata_provider(provider.clone()))
            .unwrap();

        provider.size.store(150, Ordering::SeqCst);
        let report = harness
            .run_with(|b| b.metadata_provider(provider.clone()))
            .unwrap();
        assert_eq!(report.stats.suspicious, 1);

        let stored = harness.stored_snapshot(&harness.zip_path).unwrap();
        let record = stored.records().next().unwrap();
        assert_eq!(record.flags.to_prefix(), "S--");
        assert_eq!(record.size, 150);
    }

    #[test]
    fn test_base_mode_writes_temporary_name() {
        let harness = ScanTestHarness::new();
        fs::write(harness.data_dir.join("a.txt"), "alpha").unwrap();

        harness.run().unwrap();
        harness.run().unwrap();
        assert!(harness.member(1).is_file());

        let report = harness
            .run_with(|b| b.base(Some(harness.member(1))))
            .unwrap();
        let expected = harness.temp_dir.path().join("files1-Tmp1.zip");
        assert_eq!(report.output.as_deref(), Some(expected.as_path()));
        assert_eq!(report.baseline.as_deref(), Some(harness.member(1).as_path()));
        assert_eq!(report.stats.unchanged, 1);
        assert!(!harness.member(2).exists());
    }

    #[test]
    fn test_encrypted_run_and_wrong_password() {
        let harness = ScanTestHarness::with_config(r#", "password": "p@ss""#);
        fs::write(harness.data_dir.join("a.txt"), "alpha").unwrap();
        harness.run().unwrap();

        let plain = ArchiveStore::new().read(&harness.zip_path, None, Some("p@ss")).unwrap();
        assert_eq!(Snapshot::load(&plain, false).unwrap().len(), 1);

        let err = ArchiveStore::new()
            .read(&harness.zip_path, None, Some("guess"))
            .unwrap_err();
        assert!(matches!(err, FileCrcError::InvalidPassword { .. }));

        let err = ArchiveStore::new().read(&harness.zip_path, None, None).unwrap_err();
        assert!(matches!(err, FileCrcError::InvalidPassword { .. }));
    }

    #[test]
    fn test_failed_read_leaves_previous_archive() {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            let harness = ScanTestHarness::new();
            let locked = harness.data_dir.join("locked.txt");
            fs::write(&locked, "secret").unwrap();
            harness.run().unwrap();
            let before = fs::read(&harness.zip_path).unwrap();

            fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
            if fs::read(&locked).is_ok() {
                // running as root, permissions are not enforced
                return;
            }

            let err = harness.run().unwrap_err();
            assert!(matches!(err, FileCrcError::FileIo { .. }));
            assert_eq!(fs::read(&harness.zip_path).unwrap(), before);
            assert!(!harness.member(1).exists());

            fs::set_permissions(&locked, fs::Permissions::from_mode(0o644)).unwrap();
        }
    }
}
