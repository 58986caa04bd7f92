//! Framework lesson model and navigation.
//!
//! A [`Lesson`] holds an ordered list of [`Task`]s and the index of the task
//! the learner is viewing. Moving between tasks is done by the
//! [`LessonNavigator`], which persists the outgoing task's edits and computes
//! the changes that turn the task directory into the incoming task.

pub mod classify;
pub mod navigator;
pub mod propagation;

pub use classify::{ClassificationError, FileClassifier, SplitState};
pub use navigator::LessonNavigator;
pub use propagation::{Conflict, ConflictResolver, Resolution, resolve_propagation};

use lessonsync_proto::{FileState, Record};
use thiserror::Error;

use crate::workspace::WorkspaceError;

/// Errors that can occur during lesson navigation.
#[derive(Debug, Error)]
pub enum NavError {
    /// There is no task in the requested direction.
    #[error("no {direction} task from index {current} (lesson has {len} tasks)")]
    IndexOutOfRange {
        /// Index of the task the learner is on.
        current: usize,
        /// Requested direction.
        direction: Direction,
        /// Number of tasks in the lesson.
        len: usize,
    },
    /// Only single steps forward or backward are supported.
    #[error("unsupported navigation delta {0}")]
    UnsupportedDelta(i32),
    /// Reading or materializing the task directory failed.
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
}

/// How tasks of a lesson relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LessonKind {
    /// Ordinary framework lesson: every transition restores the target
    /// task's last known files.
    #[default]
    Template,
    /// Stage-based project: moving forward carries the learner's own task
    /// files into the next stage.
    Staged,
}

/// Navigation step between neighbouring tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// To the following task.
    Next,
    /// To the preceding task.
    Previous,
}

impl Direction {
    /// Index offset of this step.
    #[must_use]
    pub const fn delta(self) -> isize {
        match self {
            Self::Next => 1,
            Self::Previous => -1,
        }
    }
}

impl TryFrom<i32> for Direction {
    type Error = NavError;

    fn try_from(delta: i32) -> Result<Self, Self::Error> {
        match delta {
            1 => Ok(Self::Next),
            -1 => Ok(Self::Previous),
            other => Err(NavError::UnsupportedDelta(other)),
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Next => write!(f, "next"),
            Self::Previous => write!(f, "previous"),
        }
    }
}

/// One step of a framework lesson.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Display name of the task.
    pub name: String,
    /// One-based position inside the lesson.
    pub index: usize,
    /// Canonical files of the task.
    pub files: FileState,
    /// Change log handle; `None` until the task's edits are first persisted.
    pub record: Option<Record>,
}

impl Task {
    /// Creates a task that has never been persisted.
    #[must_use]
    pub fn new(name: impl Into<String>, files: FileState) -> Self {
        Self {
            name: name.into(),
            index: 0,
            files,
            record: None,
        }
    }
}

/// An ordered sequence of tasks sharing one task directory.
#[derive(Debug, Clone)]
pub struct Lesson {
    /// Display name of the lesson.
    pub name: String,
    /// Navigation rules of the lesson.
    pub kind: LessonKind,
    /// Task/test file partition of the course.
    pub classifier: FileClassifier,
    tasks: Vec<Task>,
    current_task_index: usize,
}

impl Lesson {
    /// Creates a lesson positioned on its first task.
    ///
    /// Task indices are renumbered from one in list order.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: LessonKind,
        classifier: FileClassifier,
        mut tasks: Vec<Task>,
    ) -> Self {
        for (i, task) in tasks.iter_mut().enumerate() {
            task.index = i + 1;
        }
        Self {
            name: name.into(),
            kind,
            classifier,
            tasks,
            current_task_index: 0,
        }
    }

    /// Tasks in lesson order.
    #[must_use]
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Returns the task at `index` mutably.
    pub fn task_mut(&mut self, index: usize) -> Option<&mut Task> {
        self.tasks.get_mut(index)
    }

    /// Index of the task the learner is viewing.
    #[must_use]
    pub const fn current_task_index(&self) -> usize {
        self.current_task_index
    }

    /// The task the learner is viewing.
    #[must_use]
    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.get(self.current_task_index)
    }

    /// Moves the current position without touching any files, e.g. when
    /// restoring saved metadata.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::IndexOutOfRange`] if `index` is not a task of
    /// this lesson.
    pub fn set_current_task_index(&mut self, index: usize) -> Result<(), NavError> {
        if index >= self.tasks.len() {
            return Err(NavError::IndexOutOfRange {
                current: index,
                direction: Direction::Next,
                len: self.tasks.len(),
            });
        }
        self.current_task_index = index;
        Ok(())
    }

    /// Whether there is a task after the current one.
    #[must_use]
    pub fn has_next(&self) -> bool {
        self.target_index(Direction::Next).is_ok()
    }

    /// Whether there is a task before the current one.
    #[must_use]
    pub fn has_previous(&self) -> bool {
        self.target_index(Direction::Previous).is_ok()
    }

    /// Index of the neighbouring task in `direction`.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::IndexOutOfRange`] if the current task or its
    /// neighbour does not exist.
    pub fn target_index(&self, direction: Direction) -> Result<usize, NavError> {
        let len = self.tasks.len();
        let current = self.current_task_index;
        current
            .checked_add_signed(direction.delta())
            .filter(|&target| current < len && target < len)
            .ok_or(NavError::IndexOutOfRange {
                current,
                direction,
                len,
            })
    }
}

/// Receives lesson and task metadata whenever navigation mutates it.
///
/// Stands in for the course metadata files: the navigator reports the new
/// current index before touching any files, and every reassigned record.
pub trait MetadataSink: Send + Sync {
    /// Persists the lesson's current task index.
    fn save_lesson(&self, lesson: &Lesson);

    /// Persists a task's record handle and canonical files.
    fn save_task(&self, task: &Task);
}

/// A [`MetadataSink`] that discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetadataSink;

impl MetadataSink for NoopMetadataSink {
    fn save_lesson(&self, _lesson: &Lesson) {}

    fn save_task(&self, _task: &Task) {}
}
