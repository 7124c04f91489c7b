//! Property-based testing for filecrc
//!
//! Uses proptest to verify codec and classification invariants across
//! randomly generated records and snapshots.

use ::filecrc::snapshot::{decode, encode};
use ::filecrc::*;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;
use std::collections::BTreeMap;

/// Generate timestamps with nanosecond precision across a wide range
fn time_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    (0i64..4_102_444_800, 0u32..1_000_000_000)
        .prop_map(|(secs, nanos)| Utc.timestamp_opt(secs, nanos).unwrap())
}

/// Generate snapshot-safe paths (no `|`, no line breaks)
fn path_strategy() -> impl Strategy<Value = String> {
    let component = prop_oneof![
        "[a-z]{1,10}".prop_map(|s| s),
        "dir[0-9]{1,3}".prop_map(|s| s),
        "[A-Za-z0-9 _.-]{1,12}".prop_map(|s| s),
        "[äöüéß文件]{1,4}".prop_map(|s| s),
    ];

    prop::collection::vec(component, 1..=5).prop_map(|parts| format!("/{}", parts.join("/")))
}

fn flags_strategy() -> impl Strategy<Value = StatusFlags> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(s, m, n)| {
        let mut flags = StatusFlags::empty();
        if s {
            flags.insert(StatusFlags::SUSPICIOUS);
        }
        if m {
            flags.insert(StatusFlags::MISMATCHED);
        }
        if n {
            flags.insert(StatusFlags::INSERTED);
        }
        flags
    })
}

fn record_strategy() -> impl Strategy<Value = FileRecord> {
    (
        path_strategy(),
        any::<u64>(),
        any::<u64>(),
        time_strategy(),
        time_strategy(),
        time_strategy(),
        flags_strategy(),
    )
        .prop_map(|(path, size, hash, created, accessed, modified, flags)| {
            let mut record = FileRecord::new(path, size, hash, created, accessed, modified);
            record.flags = flags;
            record
        })
}

/// A current record derived from a prior one by changing some dimensions
fn pair_strategy() -> impl Strategy<Value = (FileRecord, FileRecord)> {
    (
        record_strategy(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(prior, size, hash, accessed, modified)| {
            let mut current = prior.clone();
            current.flags = StatusFlags::empty();
            if size {
                current.size = current.size.wrapping_add(1);
            }
            if hash {
                current.content_hash = current.content_hash.wrapping_add(1);
            }
            if accessed {
                current.accessed += chrono::Duration::seconds(1);
            }
            if modified {
                current.modified += chrono::Duration::seconds(1);
            }
            (current, prior)
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_codec_round_trip(record in record_strategy()) {
        let line = encode(&record).unwrap();
        prop_assert!(line.ends_with('\n'));
        prop_assert_eq!(decode(&line).unwrap(), record);
    }

    #[test]
    fn prop_classification_is_deterministic(
        (current, prior) in pair_strategy(),
        hashing in any::<bool>(),
    ) {
        let classifier = ChangeClassifier::new(hashing);
        let first = classifier.evaluate(&current, Some(&prior));
        let second = classifier.evaluate(&current, Some(&prior));
        prop_assert_eq!(first, second);
        prop_assert_eq!(
            first.reason().map(|r| r.to_string()),
            second.reason().map(|r| r.to_string())
        );

        // exactly one flag is ever set by a classification
        let mut flagged = current.clone();
        let class = classifier.classify(&mut flagged, Some(&prior));
        prop_assert_eq!(flagged.flags, class.flags());
        prop_assert!(class.flags().bits().count_ones() <= 1);
    }

    #[test]
    fn prop_without_hash_no_suspicion(
        (current, prior) in pair_strategy(),
    ) {
        let class = ChangeClassifier::new(false).evaluate(&current, Some(&prior));
        prop_assert!(class.reason().is_none());
        let unchanged = current.size == prior.size && current.times_equal(&prior);
        prop_assert_eq!(class == Classification::Unchanged, unchanged);
    }

    #[test]
    fn prop_order_independence(
        pairs in prop::collection::vec(pair_strategy(), 1..30),
        seed in any::<u64>(),
    ) {
        // unique paths so each current record has one prior counterpart
        let mut prior = Snapshot::new();
        let mut current = Vec::new();
        for (i, (mut cur, mut pri)) in pairs.into_iter().enumerate() {
            let path = format!("/tree/{}/{}", i, cur.path.trim_start_matches('/'));
            cur.path = path.clone();
            pri.path = path;
            if i % 4 != 0 {
                prior.insert(pri);
            }
            current.push(cur);
        }

        let classify_all = |records: &[FileRecord]| {
            let mut context = RunContext::new(ChangeClassifier::new(true), prior.clone());
            let outcome: BTreeMap<String, Option<Classification>> = records
                .iter()
                .map(|r| (r.key(), context.record(r.clone())))
                .collect();
            let (_, stats) = context.finish();
            (outcome, stats)
        };

        let mut shuffled = current.clone();
        let len = shuffled.len();
        let mut state = seed;
        for i in (1..len).rev() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            shuffled.swap(i, (state >> 33) as usize % (i + 1));
        }

        prop_assert_eq!(classify_all(&current), classify_all(&shuffled));
    }

    #[test]
    fn prop_counter_identity(
        pairs in prop::collection::vec(pair_strategy(), 0..40),
        keep_prior in prop::collection::vec(any::<bool>(), 40),
        keep_current in prop::collection::vec(any::<bool>(), 40),
    ) {
        let mut prior = Snapshot::new();
        let mut current = Vec::new();
        for (i, (mut cur, mut pri)) in pairs.into_iter().enumerate() {
            cur.path = format!("/f{}", i);
            pri.path = cur.path.clone();
            if keep_prior[i] {
                prior.insert(pri);
            }
            if keep_current[i] || !keep_prior[i] {
                current.push(cur);
            }
        }
        let prior_len = prior.len();

        let mut context = RunContext::new(ChangeClassifier::new(true), prior);
        for record in current {
            context.record(record);
        }
        let (snapshot, stats) = context.finish();

        prop_assert_eq!(stats.classified(), stats.total_files);
        prop_assert_eq!(snapshot.len(), stats.total_files);
        prop_assert_eq!(
            stats.unchanged + stats.mismatched + stats.suspicious + stats.deleted,
            prior_len
        );
    }
}
