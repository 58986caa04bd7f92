//! Forward propagation of learner edits in stage-based lessons.
//!
//! When a learner moves to the next stage of a staged project, the files
//! they wrote should follow them. Three cases are distinguished:
//!
//! 1. The next stage was never visited: its task file set is aligned with
//!    the learner's (user-created files join it, deleted files leave it) and
//!    only test files are rewritten.
//! 2. Both stages hold identical task files: only test files are rewritten.
//! 3. Both stages diverged: a [`ConflictResolver`] chooses between keeping
//!    the next stage's content and replacing it with the current files.

use lessonsync_proto::{Change, FileState, Record, UserChanges, calculate_changes};
use serde::Deserialize;

use super::classify::{FileClassifier, SplitState};

/// Answer to a propagation conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    /// Keep the target task's content.
    #[default]
    Keep,
    /// Replace the target task's files with the current ones.
    Replace,
}

impl std::fmt::Display for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Keep => write!(f, "keep"),
            Self::Replace => write!(f, "replace"),
        }
    }
}

/// Two tasks whose task files were edited independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conflict {
    /// Task the learner is leaving.
    pub current_task: String,
    /// Task the learner is entering.
    pub target_task: String,
}

impl Conflict {
    /// Creates a conflict between two named tasks.
    #[must_use]
    pub fn new(current_task: impl Into<String>, target_task: impl Into<String>) -> Self {
        Self {
            current_task: current_task.into(),
            target_task: target_task.into(),
        }
    }

    /// Question to show a learner who must resolve this conflict.
    #[must_use]
    pub fn prompt(&self) -> String {
        format!(
            "Changes from {current} conflict with the changes made on {target}.\n\
             Keep content of {target} or replace with the changes from {current}?",
            current = self.current_task,
            target = self.target_task,
        )
    }
}

/// Decides propagation conflicts.
///
/// A [`Resolution`] is itself a resolver that always gives the same answer;
/// any `FnMut(&Conflict) -> Resolution` works as an interactive one.
pub trait ConflictResolver {
    /// Chooses how to resolve `conflict`.
    fn resolve(&mut self, conflict: &Conflict) -> Resolution;
}

impl ConflictResolver for Resolution {
    fn resolve(&mut self, _conflict: &Conflict) -> Resolution {
        *self
    }
}

impl<F> ConflictResolver for F
where
    F: FnMut(&Conflict) -> Resolution,
{
    fn resolve(&mut self, conflict: &Conflict) -> Resolution {
        self(conflict)
    }
}

/// Returns the changes that carry `current_state` into the target task.
///
/// `target_state` is the target task's last known files and
/// `target_record` its change log handle. The resolver is only consulted
/// when both sides hold diverging task files.
#[must_use]
pub fn resolve_propagation(
    current_state: &FileState,
    target_state: &FileState,
    target_record: Option<Record>,
    classifier: &FileClassifier,
    conflict: &Conflict,
    resolver: &mut dyn ConflictResolver,
) -> UserChanges {
    let current = classifier.split(current_state);
    let target = classifier.split(target_state);

    if target_record.is_none() {
        tracing::debug!(target = %conflict.target_task, "initializing task from previous stage");
        return structural_changes(&current, &target);
    }

    if current.task_files == target.task_files {
        return calculate_changes(&current.test_files, &target.test_files);
    }

    let resolution = resolver.resolve(conflict);
    tracing::info!(
        current = %conflict.current_task,
        target = %conflict.target_task,
        %resolution,
        "resolved conflicting task changes"
    );
    match resolution {
        Resolution::Keep => calculate_changes(current_state, target_state),
        Resolution::Replace => structural_changes(&current, &target),
    }
}

/// Test file diff plus the task file set alignment, leaving task file
/// contents as they are in `current`.
fn structural_changes(current: &SplitState, target: &SplitState) -> UserChanges {
    let mut changes = calculate_changes(&current.test_files, &target.test_files);

    changes.extend(
        current
            .task_files
            .iter()
            .filter(|(path, _)| !target.task_files.contains_key(*path))
            .map(|(path, text)| Change::AddUserCreatedTaskFile {
                path: path.clone(),
                text: text.clone(),
            }),
    );
    changes.extend(
        target
            .task_files
            .keys()
            .filter(|path| !current.task_files.contains_key(*path))
            .map(|path| Change::RemoveTaskFile { path: path.clone() }),
    );

    changes
}
