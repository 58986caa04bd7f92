//! Property-based tests for lesson navigation.
//!
//! Uses proptest to verify:
//! 1. Moving to the next task and straight back, without further edits,
//!    restores the learner's files, for template and staged lessons.
//! 2. Moving forward always materializes the target task's files in a
//!    template lesson.

#![allow(clippy::expect_used)]

use lessonsync::lesson::{FileClassifier, Lesson, LessonKind, LessonNavigator, Resolution, Task};
use lessonsync::workspace::InMemoryWorkspace;
use lessonsync_proto::FileState;
use lessonsync_store::InMemoryChangeLog;
use proptest::prelude::*;

// --- Strategies ---

fn arb_path() -> impl Strategy<Value = String> {
    prop_oneof!["[a-c]\\.txt", "test/[a-c]\\.txt", "src/[a-c]\\.txt"]
}

fn arb_state() -> impl Strategy<Value = FileState> {
    prop::collection::btree_map(arb_path(), "[a-z]{0,8}", 0..6)
}

/// A learner's edit of `files`: some files rewritten, some deleted.
fn arb_edit(files: FileState) -> impl Strategy<Value = FileState> {
    let len = files.len();
    prop::collection::vec((any::<bool>(), any::<bool>(), "[a-z]{0,8}"), len).prop_map(
        move |edits| {
            files
                .iter()
                .zip(edits)
                .filter(|(_, (keep, _, _))| *keep)
                .map(|((path, text), (_, rewrite, new_text))| {
                    let text = if rewrite { new_text } else { text.clone() };
                    (path.clone(), text)
                })
                .collect()
        },
    )
}

/// Canonical files of the current task, the learner's edit of them, and the
/// canonical files of the next task.
fn arb_scenario() -> impl Strategy<Value = (FileState, FileState, FileState)> {
    (arb_state(), arb_state()).prop_flat_map(|(current, next)| {
        let edit = arb_edit(current.clone());
        (Just(current), edit, Just(next))
    })
}

fn arb_kind() -> impl Strategy<Value = LessonKind> {
    prop_oneof![Just(LessonKind::Template), Just(LessonKind::Staged)]
}

fn arb_resolution() -> impl Strategy<Value = Resolution> {
    prop_oneof![Just(Resolution::Keep), Just(Resolution::Replace)]
}

fn lesson(kind: LessonKind, current: FileState, next: FileState) -> Lesson {
    let classifier =
        FileClassifier::new(vec!["test/".to_string()], None).expect("valid classifier");
    Lesson::new(
        "lesson",
        kind,
        classifier,
        vec![Task::new("first", current), Task::new("second", next)],
    )
}

// --- Property tests ---

proptest! {
    /// Next then previous without edits restores the learner's files.
    #[test]
    fn next_then_previous_restores_files(
        (current, edited, next) in arb_scenario(),
        kind in arb_kind(),
        resolution in arb_resolution(),
    ) {
        let navigator =
            LessonNavigator::new(InMemoryChangeLog::new()).with_default_resolution(resolution);
        let mut lesson = lesson(kind, current, next);
        let mut workspace = InMemoryWorkspace::new(edited.clone());

        navigator
            .prepare_next_task(&mut lesson, &mut workspace, None)
            .expect("next task exists");
        navigator
            .prepare_prev_task(&mut lesson, &mut workspace)
            .expect("previous task exists");

        prop_assert_eq!(lesson.current_task_index(), 0);
        prop_assert_eq!(workspace.files(), &edited);
    }

    /// In a template lesson the next task is materialized as last seen.
    #[test]
    fn template_next_materializes_target((current, edited, next) in arb_scenario()) {
        let navigator = LessonNavigator::new(InMemoryChangeLog::new());
        let mut lesson = lesson(LessonKind::Template, current, next.clone());
        let mut workspace = InMemoryWorkspace::new(edited);

        navigator
            .prepare_next_task(&mut lesson, &mut workspace, None)
            .expect("next task exists");

        prop_assert_eq!(workspace.files(), &next);
    }
}
