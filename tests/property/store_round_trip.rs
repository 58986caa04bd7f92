//! Property-based round-trip tests for the change log stores.
//!
//! Uses proptest to verify:
//! 1. Any change set stored under a fresh record reads back unchanged, in
//!    memory and on disk.
//! 2. Overwriting a record keeps its handle and only the latest write is
//!    visible, also after reopening and compacting the file.

#![allow(clippy::expect_used)]

use lessonsync_proto::{Change, Record, UserChanges};
use lessonsync_store::{ChangeLog, FileChangeLog, InMemoryChangeLog};
use proptest::prelude::*;

// --- Strategies ---

fn arb_path() -> impl Strategy<Value = String> {
    "[a-z]{1,8}(/[a-z]{1,8})?\\.[a-z]{1,3}"
}

/// Strategy for generating arbitrary `Change` values of every kind.
fn arb_change() -> impl Strategy<Value = Change> {
    prop_oneof![
        (arb_path(), ".{0,64}").prop_map(|(path, text)| Change::AddFile { path, text }),
        arb_path().prop_map(|path| Change::RemoveFile { path }),
        (arb_path(), ".{0,64}").prop_map(|(path, text)| Change::ChangeFile { path, text }),
        (arb_path(), ".{0,64}")
            .prop_map(|(path, text)| Change::AddUserCreatedTaskFile { path, text }),
        arb_path().prop_map(|path| Change::RemoveTaskFile { path }),
    ]
}

/// Strategy for generating arbitrary `UserChanges` values, including empty ones.
fn arb_user_changes() -> impl Strategy<Value = UserChanges> {
    prop::collection::vec(arb_change(), 0..8).prop_map(UserChanges::new)
}

/// Reads back `record`, failing the case on a store error.
fn read(store: &impl ChangeLog, record: Record) -> UserChanges {
    store
        .get_user_changes(Some(record))
        .expect("get should succeed")
}

/// Writes every change set under a fresh record and checks the handles.
fn store_all(store: &impl ChangeLog, sets: &[UserChanges]) -> Result<Vec<Record>, TestCaseError> {
    let mut records = Vec::with_capacity(sets.len());
    for changes in sets {
        let record = store
            .update_and_force(None, changes)
            .expect("update should succeed");
        prop_assert!(!records.contains(&record), "fresh record {record} was reused");
        records.push(record);
    }
    Ok(records)
}

// --- Property tests ---

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// `get(update(None, c)) == c` in memory.
    #[test]
    fn in_memory_round_trip(sets in prop::collection::vec(arb_user_changes(), 1..6)) {
        let store = InMemoryChangeLog::new();
        let records = store_all(&store, &sets)?;
        for (record, changes) in records.iter().zip(&sets) {
            prop_assert_eq!(&read(&store, *record), changes);
        }
    }

    /// `get(update(None, c)) == c` on disk, before and after reopening.
    #[test]
    fn file_round_trip(sets in prop::collection::vec(arb_user_changes(), 1..6)) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("storage");

        let store = FileChangeLog::open(&path).expect("open should succeed");
        let records = store_all(&store, &sets)?;
        for (record, changes) in records.iter().zip(&sets) {
            prop_assert_eq!(&read(&store, *record), changes);
        }
        drop(store);

        let reopened = FileChangeLog::open(&path).expect("reopen should succeed");
        prop_assert_eq!(reopened.record_count(), sets.len());
        for (record, changes) in records.iter().zip(&sets) {
            prop_assert_eq!(&read(&reopened, *record), changes);
        }
    }

    /// Overwrites keep the handle; the latest write survives reopen and compaction.
    #[test]
    fn file_overwrite_keeps_latest(
        first in arb_user_changes(),
        second in arb_user_changes(),
        other in arb_user_changes(),
    ) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("storage");

        let store = FileChangeLog::open(&path).expect("open should succeed");
        let record = store
            .update_and_force(None, &first)
            .expect("update should succeed");
        let other_record = store
            .update_and_force(None, &other)
            .expect("update should succeed");
        let updated = store
            .update_and_force(Some(record), &second)
            .expect("update should succeed");
        prop_assert_eq!(updated, record);
        drop(store);

        let reopened = FileChangeLog::open(&path).expect("reopen should succeed");
        reopened.compact().expect("compact should succeed");
        prop_assert_eq!(read(&reopened, record), second);
        prop_assert_eq!(read(&reopened, other_record), other);
    }
}
