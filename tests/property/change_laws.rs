//! Property-based tests for the change model.
//!
//! Uses proptest to verify:
//! 1. Applying `calculate_changes(a, b)` to `a` always yields `b`.
//! 2. Diffing a state against itself yields no changes.
//! 3. Every emitted change is consistent with the baseline it was computed
//!    against (edits and removals name existing paths, additions new ones).
//! 4. Rebasing keeps the content of every touched path and stays consistent
//!    with the new baseline.
//! 5. Random bytes never cause a panic when decoded as a framed change set.

use lessonsync_proto::codec;
use lessonsync_proto::{Change, FileState, UserChanges, calculate_changes};
use proptest::prelude::*;

// --- Strategies ---

/// Paths drawn from a small alphabet so that independently generated states
/// overlap often.
fn arb_path() -> impl Strategy<Value = String> {
    "[a-c]{1,2}(/[a-c]\\.txt)?"
}

/// Strategy for generating arbitrary `FileState` values.
fn arb_state() -> impl Strategy<Value = FileState> {
    prop::collection::btree_map(arb_path(), ".{0,16}", 0..8)
}

/// Asserts the baseline consistency rule for every change in `changes`.
fn assert_consistent(baseline: &FileState, changes: &UserChanges) -> Result<(), TestCaseError> {
    for change in changes {
        match change {
            Change::AddFile { path, .. } => prop_assert!(!baseline.contains_key(path)),
            Change::ChangeFile { path, .. } | Change::RemoveFile { path } => {
                prop_assert!(baseline.contains_key(path));
            }
            Change::AddUserCreatedTaskFile { .. } | Change::RemoveTaskFile { .. } => {
                prop_assert!(false, "diff never emits structural changes: {change}");
            }
        }
    }
    Ok(())
}

// --- Property tests ---

proptest! {
    /// `apply(a, diff(a, b)) == b`.
    #[test]
    fn diff_then_apply_reaches_target(a in arb_state(), b in arb_state()) {
        let changes = calculate_changes(&a, &b);
        prop_assert_eq!(changes.applied_to(&a), b);
    }

    /// `diff(a, a)` is empty.
    #[test]
    fn diff_against_self_is_empty(a in arb_state()) {
        prop_assert!(calculate_changes(&a, &a).is_empty());
    }

    /// Diff output agrees with its baseline and is deterministic.
    #[test]
    fn diff_is_consistent_with_baseline(a in arb_state(), b in arb_state()) {
        let changes = calculate_changes(&a, &b);
        assert_consistent(&a, &changes)?;
        prop_assert_eq!(changes, calculate_changes(&a, &b));
    }

    /// Every path touched by a change set ends up with the same content after
    /// rebasing onto any other baseline.
    #[test]
    fn rebase_preserves_touched_paths(
        a in arb_state(),
        b in arb_state(),
        new_initial in arb_state(),
    ) {
        let changes = calculate_changes(&a, &b);
        let rebased = changes.rebase(&new_initial);
        assert_consistent(&new_initial, &rebased)?;

        let result = rebased.applied_to(&new_initial);
        for change in &changes {
            prop_assert_eq!(result.get(change.path()), b.get(change.path()));
        }
    }

    /// Random bytes never cause a panic when decoded as a framed change set.
    #[test]
    fn random_bytes_decode_framed_no_panic(bytes in prop::collection::vec(any::<u8>(), 0..512)) {
        let _ = codec::decode_framed::<UserChanges>(&bytes);
    }
}
