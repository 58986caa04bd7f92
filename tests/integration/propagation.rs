//! Integration tests for forward propagation in staged lessons.
//!
//! Covers the three propagation branches (first visit, identical task files,
//! conflict) both directly through `resolve_propagation` and end to end
//! through `LessonNavigator` with a task directory.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use lessonsync::lesson::{
    Conflict, FileClassifier, Lesson, LessonKind, LessonNavigator, Resolution,
    resolve_propagation,
};
use lessonsync::workspace::{InMemoryWorkspace, TaskWorkspace};
use lessonsync_proto::{Change, FileState, Record, UserChanges};
use lessonsync_store::InMemoryChangeLog;

// ---------------------------------------------------------------------------
// Helper functions
// ---------------------------------------------------------------------------

fn state(entries: &[(&str, &str)]) -> FileState {
    entries
        .iter()
        .map(|(p, t)| ((*p).to_string(), (*t).to_string()))
        .collect()
}

/// Classifier with `t.txt` as the course's default test file.
fn classifier() -> FileClassifier {
    FileClassifier::new(Vec::new(), Some("t.txt".to_string())).unwrap()
}

fn conflict() -> Conflict {
    Conflict::new("Stage 1", "Stage 2")
}

fn staged_lesson(stage1: FileState, stage2: FileState) -> Lesson {
    Lesson::new(
        "Project",
        LessonKind::Staged,
        classifier(),
        vec![
            lessonsync::lesson::Task::new("Stage 1", stage1),
            lessonsync::lesson::Task::new("Stage 2", stage2),
        ],
    )
}

// ===========================================================================
// resolve_propagation
// ===========================================================================

#[test]
fn first_visit_adds_user_created_files() {
    let changes = resolve_propagation(
        &state(&[("a.txt", "hello")]),
        &FileState::new(),
        None,
        &classifier(),
        &conflict(),
        &mut Resolution::Replace,
    );

    assert_eq!(
        changes,
        UserChanges::new(vec![Change::AddUserCreatedTaskFile {
            path: "a.txt".to_string(),
            text: "hello".to_string(),
        }])
    );
}

#[test]
fn identical_task_files_only_touch_test_file() {
    let current = state(&[("a.txt", "same"), ("t.txt", "old")]);
    let target = state(&[("a.txt", "same"), ("t.txt", "new")]);
    let mut prompts = 0;

    let changes = resolve_propagation(
        &current,
        &target,
        Some(Record::from_index(0)),
        &classifier(),
        &conflict(),
        &mut |_: &Conflict| {
            prompts += 1;
            Resolution::Replace
        },
    );

    assert_eq!(prompts, 0);
    assert_eq!(
        changes,
        UserChanges::new(vec![Change::ChangeFile {
            path: "t.txt".to_string(),
            text: "new".to_string(),
        }])
    );
}

#[test]
fn conflict_keep_leaves_target_content() {
    let current = state(&[("a.txt", "v2")]);
    let target = state(&[("a.txt", "v1")]);

    let changes = resolve_propagation(
        &current,
        &target,
        Some(Record::from_index(0)),
        &classifier(),
        &conflict(),
        &mut Resolution::Keep,
    );

    assert_eq!(
        changes.applied_to(&current).get("a.txt").map(String::as_str),
        Some("v1")
    );
}

#[test]
fn conflict_replace_carries_current_content() {
    let current = state(&[("a.txt", "v2")]);
    let target = state(&[("a.txt", "v1")]);

    let changes = resolve_propagation(
        &current,
        &target,
        Some(Record::from_index(0)),
        &classifier(),
        &conflict(),
        &mut Resolution::Replace,
    );

    assert_eq!(
        changes.applied_to(&current).get("a.txt").map(String::as_str),
        Some("v2")
    );
}

// ===========================================================================
// End to end through the navigator
// ===========================================================================

#[test]
fn first_forward_move_carries_learner_files() {
    let navigator = LessonNavigator::new(InMemoryChangeLog::new());
    let mut lesson = staged_lesson(
        state(&[("a.txt", "stub"), ("t.txt", "test 1")]),
        state(&[
            ("a.txt", "stage 2 stub"),
            ("old.txt", "o"),
            ("t.txt", "test 2"),
        ]),
    );
    let mut workspace = InMemoryWorkspace::new(lesson.tasks()[0].files.clone());
    workspace.write("a.txt", "solution");
    workspace.write("b.txt", "ignored, not a task file");

    navigator
        .prepare_next_task(&mut lesson, &mut workspace, None)
        .unwrap();

    assert_eq!(
        workspace.read_file("a.txt").unwrap().as_deref(),
        Some("solution")
    );
    assert_eq!(
        workspace.read_file("t.txt").unwrap().as_deref(),
        Some("test 2")
    );
    assert_eq!(workspace.read_file("old.txt").unwrap(), None);
    // The stage's task file set follows the learner's.
    let keys: Vec<&str> = lesson.tasks()[1].files.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["a.txt", "t.txt"]);
}

#[test]
fn diverged_stages_ask_once_and_respect_the_answer() {
    let navigator = LessonNavigator::new(InMemoryChangeLog::new());
    let mut lesson = staged_lesson(
        state(&[("a.txt", "stub"), ("t.txt", "test 1")]),
        state(&[("a.txt", "stub"), ("t.txt", "test 2")]),
    );
    let mut workspace = InMemoryWorkspace::new(lesson.tasks()[0].files.clone());

    // Visit stage 2 once and edit it, then go back and edit stage 1.
    navigator
        .prepare_next_task(&mut lesson, &mut workspace, None)
        .unwrap();
    workspace.write("a.txt", "stage 2 work");
    navigator
        .prepare_prev_task(&mut lesson, &mut workspace)
        .unwrap();
    workspace.write("a.txt", "stage 1 work");

    let mut prompts = Vec::new();
    let mut resolver = |c: &Conflict| {
        prompts.push(c.prompt());
        Resolution::Keep
    };
    navigator
        .prepare_next_task(&mut lesson, &mut workspace, Some(&mut resolver))
        .unwrap();

    assert_eq!(prompts.len(), 1);
    assert_eq!(
        workspace.read_file("a.txt").unwrap().as_deref(),
        Some("stage 2 work")
    );
    assert_eq!(
        workspace.read_file("t.txt").unwrap().as_deref(),
        Some("test 2")
    );
}

#[test]
fn default_resolution_applies_without_resolver() {
    let navigator = LessonNavigator::new(InMemoryChangeLog::new())
        .with_default_resolution(Resolution::Replace);
    let mut lesson = staged_lesson(
        state(&[("a.txt", "stub"), ("t.txt", "test 1")]),
        state(&[("a.txt", "stub"), ("t.txt", "test 2")]),
    );
    let mut workspace = InMemoryWorkspace::new(lesson.tasks()[0].files.clone());

    navigator
        .prepare_next_task(&mut lesson, &mut workspace, None)
        .unwrap();
    workspace.write("a.txt", "stage 2 work");
    navigator
        .prepare_prev_task(&mut lesson, &mut workspace)
        .unwrap();
    workspace.write("a.txt", "stage 1 work");
    navigator
        .prepare_next_task(&mut lesson, &mut workspace, None)
        .unwrap();

    assert_eq!(
        workspace.read_file("a.txt").unwrap().as_deref(),
        Some("stage 1 work")
    );
}

#[test]
fn backward_move_never_propagates() {
    let navigator = LessonNavigator::new(InMemoryChangeLog::new());
    let mut lesson = staged_lesson(
        state(&[("a.txt", "stub 1")]),
        state(&[("a.txt", "stub 2")]),
    );
    let mut workspace = InMemoryWorkspace::new(lesson.tasks()[0].files.clone());
    let mut never_asked = |_: &Conflict| -> Resolution { panic!("no prompt on backward moves") };

    navigator
        .prepare_next_task(&mut lesson, &mut workspace, Some(&mut never_asked))
        .unwrap();
    workspace.write("a.txt", "stage 2 work");
    navigator
        .prepare_prev_task(&mut lesson, &mut workspace)
        .unwrap();

    assert_eq!(
        workspace.files(),
        &state(&[("a.txt", "stub 1")])
    );
}
