//! File-level change model for framework lessons.
//!
//! A [`Change`] is one atomic edit of a task file. [`UserChanges`] is the
//! ordered list of edits a learner made on top of a task's canonical files;
//! replaying it onto those files reproduces the learner's state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Complete materialized content of a task's files: relative path -> text.
///
/// Ordered so that every change list derived from it is deterministic.
pub type FileState = BTreeMap<String, String>;

/// A single file-level edit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Change {
    /// The file did not exist in the baseline and must be created.
    AddFile {
        /// Relative path of the file.
        path: String,
        /// Full text of the new file.
        text: String,
    },
    /// The file existed in the baseline and must be deleted.
    RemoveFile {
        /// Relative path of the file.
        path: String,
    },
    /// The file existed in the baseline with different text.
    ChangeFile {
        /// Relative path of the file.
        path: String,
        /// Full replacement text.
        text: String,
    },
    /// A learner-created file that joins the target task's canonical file set.
    AddUserCreatedTaskFile {
        /// Relative path of the file.
        path: String,
        /// Full text of the file.
        text: String,
    },
    /// A canonical task file the learner deleted; it leaves the target task's file set.
    RemoveTaskFile {
        /// Relative path of the file.
        path: String,
    },
}

impl Change {
    /// Returns the relative path this change touches.
    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::AddFile { path, .. }
            | Self::RemoveFile { path }
            | Self::ChangeFile { path, .. }
            | Self::AddUserCreatedTaskFile { path, .. }
            | Self::RemoveTaskFile { path } => path,
        }
    }

    /// Returns the text this change writes, or `None` for removals.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::AddFile { text, .. }
            | Self::ChangeFile { text, .. }
            | Self::AddUserCreatedTaskFile { text, .. } => Some(text),
            Self::RemoveFile { .. } | Self::RemoveTaskFile { .. } => None,
        }
    }

    /// Whether this change alters a task's canonical file set.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::AddUserCreatedTaskFile { .. } | Self::RemoveTaskFile { .. }
        )
    }

    /// Applies this change to a file state.
    pub fn apply(&self, state: &mut FileState) {
        match self {
            Self::AddFile { path, text }
            | Self::ChangeFile { path, text }
            | Self::AddUserCreatedTaskFile { path, text } => {
                state.insert(path.clone(), text.clone());
            }
            Self::RemoveFile { path } | Self::RemoveTaskFile { path } => {
                state.remove(path);
            }
        }
    }
}

impl std::fmt::Display for Change {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AddFile { path, .. } => write!(f, "add {path}"),
            Self::RemoveFile { path } => write!(f, "remove {path}"),
            Self::ChangeFile { path, .. } => write!(f, "change {path}"),
            Self::AddUserCreatedTaskFile { path, .. } => write!(f, "add task file {path}"),
            Self::RemoveTaskFile { path } => write!(f, "remove task file {path}"),
        }
    }
}

/// Ordered sequence of [`Change`]s, applied as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserChanges(Vec<Change>);

impl UserChanges {
    /// Creates a change list from its items.
    #[must_use]
    pub const fn new(changes: Vec<Change>) -> Self {
        Self(changes)
    }

    /// Creates an empty change list.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Number of changes in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the list has no changes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over the changes in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Change> {
        self.0.iter()
    }

    /// Appends a change.
    pub fn push(&mut self, change: Change) {
        self.0.push(change);
    }

    /// Replays every change onto `state`.
    pub fn apply(&self, state: &mut FileState) {
        for change in &self.0 {
            change.apply(state);
        }
    }

    /// Returns `base` with every change replayed onto it.
    #[must_use]
    pub fn applied_to(&self, base: &FileState) -> FileState {
        let mut state = base.clone();
        self.apply(&mut state);
        state
    }

    /// Applies only the structural changes to a task's canonical file set.
    ///
    /// Plain file edits leave the canonical files untouched.
    pub fn apply_to_task_files(&self, task_files: &mut FileState) {
        for change in self.0.iter().filter(|c| c.is_structural()) {
            change.apply(task_files);
        }
    }

    /// Re-expresses these changes against a new initial state.
    ///
    /// Used after a task's canonical files were replaced: additions of paths
    /// that now exist become overwrites, overwrites of paths that no longer
    /// exist become additions, and removals of paths that are already gone
    /// are dropped.
    #[must_use]
    pub fn rebase(&self, new_initial: &FileState) -> Self {
        let changes = self
            .0
            .iter()
            .filter_map(|change| match change {
                Change::AddFile { path, text } if new_initial.contains_key(path) => {
                    Some(Change::ChangeFile {
                        path: path.clone(),
                        text: text.clone(),
                    })
                }
                Change::RemoveFile { path } if !new_initial.contains_key(path) => None,
                Change::ChangeFile { path, text } if !new_initial.contains_key(path) => {
                    Some(Change::AddFile {
                        path: path.clone(),
                        text: text.clone(),
                    })
                }
                other => Some(other.clone()),
            })
            .collect();
        Self(changes)
    }
}

impl From<Vec<Change>> for UserChanges {
    fn from(changes: Vec<Change>) -> Self {
        Self(changes)
    }
}

impl FromIterator<Change> for UserChanges {
    fn from_iter<I: IntoIterator<Item = Change>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Change> for UserChanges {
    fn extend<I: IntoIterator<Item = Change>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for UserChanges {
    type Item = Change;
    type IntoIter = std::vec::IntoIter<Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a UserChanges {
    type Item = &'a Change;
    type IntoIter = std::slice::Iter<'a, Change>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
