//! Main test module for filecrc
//!
//! This module includes all test suites:
//! - Integration tests for complete scan runs
//! - Property-based tests for codec and classification invariants

pub mod integration;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::filecrc::types::ProgressInfo;
    use ::filecrc::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_for(root: &std::path::Path, zip: &std::path::Path) -> Config {
        Config::from_json(&format!(
            r#"{{ "rootdirs": [{:?}], "zipname": {:?} }}"#,
            root.to_string_lossy(),
            zip.to_string_lossy()
        ))
        .unwrap()
    }

    #[test]
    fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("empty");
        fs::create_dir_all(&root).unwrap();
        let zip = temp_dir.path().join("files.zip");

        let report = JobBuilder::new(config_for(&root, &zip))
            .build()
            .unwrap()
            .run(None::<fn(ProgressInfo)>)
            .unwrap();

        assert_eq!(report.stats.total_files, 0);
        let bytes = ArchiveStore::new().read(&zip, None, None).unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn test_special_filenames() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("data");
        fs::create_dir_all(&root).unwrap();
        let zip = temp_dir.path().join("files.zip");

        let special_names = vec![
            "file with spaces.txt",
            "file-with-dashes.txt",
            "file.with.dots.txt",
            "file@with#special$chars.txt",
            "file(with)parens.txt",
            "file[with]brackets.txt",
            "файл.txt",
            "文件.txt",
        ];

        let mut created = 0;
        for name in &special_names {
            if fs::write(root.join(name), format!("Content of {}", name)).is_ok() {
                created += 1;
            }
        }

        let config = config_for(&root, &zip);
        let first = JobBuilder::new(config.clone())
            .build()
            .unwrap()
            .run(None::<fn(ProgressInfo)>)
            .unwrap();
        assert_eq!(first.stats.added, created);

        // every stored line decodes back, so the second run finds them all
        let second = JobBuilder::new(config)
            .build()
            .unwrap()
            .run(None::<fn(ProgressInfo)>)
            .unwrap();
        assert_eq!(second.stats.unchanged, created);
        assert_eq!(second.stats.deleted, 0);
    }

    #[test]
    fn test_pipe_in_filename_keeps_previous_archive() {
        #[cfg(unix)]
        {
            let temp_dir = TempDir::new().unwrap();
            let root = temp_dir.path().join("data");
            fs::create_dir_all(&root).unwrap();
            fs::write(root.join("ok.txt"), "fine").unwrap();
            let zip = temp_dir.path().join("files.zip");
            let config = config_for(&root, &zip);
            let run = || {
                JobBuilder::new(config.clone())
                    .build()
                    .unwrap()
                    .run(None::<fn(ProgressInfo)>)
            };

            run().unwrap();
            let before = fs::read(&zip).unwrap();

            // the separator has no representation in a snapshot line
            fs::write(root.join("a|b.txt"), "x").unwrap();
            let err = run().unwrap_err();
            assert!(matches!(err, FileCrcError::UnstorablePath(ref p) if p.ends_with("a|b.txt")));
            assert_eq!(fs::read(&zip).unwrap(), before);
            assert!(!temp_dir.path().join("files1.zip").exists());
            assert!(!temp_dir.path().join("files-Tmp1.zip").exists());

            // the stored archive is still a usable baseline
            fs::remove_file(root.join("a|b.txt")).unwrap();
            let report = run().unwrap();
            assert_eq!(report.stats.unchanged, 1);
            assert_eq!(report.stats.added, 0);
        }
    }

    #[test]
    fn test_symlinks_are_skipped() {
        #[cfg(unix)]
        {
            let temp_dir = TempDir::new().unwrap();
            let root = temp_dir.path().join("data");
            fs::create_dir_all(&root).unwrap();
            fs::write(root.join("target.txt"), "Target content").unwrap();
            if std::os::unix::fs::symlink(root.join("target.txt"), root.join("link.txt")).is_err() {
                return;
            }

            let report = JobBuilder::new(config_for(&root, &temp_dir.path().join("files.zip")))
                .analyze_only(true)
                .build()
                .unwrap()
                .run(None::<fn(ProgressInfo)>)
                .unwrap();
            assert_eq!(report.stats.total_files, 1);
        }
    }
}

// Re-export test utilities for use in integration tests
pub use integration::{FileGenerator, ScanTestHarness};
