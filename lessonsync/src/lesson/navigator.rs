//! Forward/backward navigation through a framework lesson.
//!
//! `LessonNavigator` owns the change log for a session. A transition:
//!
//! 1. moves the lesson's current index to the target and reports it,
//! 2. diffs the on-disk files of the current task against its canonical
//!    files and persists the result (update + flush as one unit),
//! 3. loads the target task's stored changes,
//! 4. computes the changes that turn the current files into the target's,
//!    either as a plain diff or, moving forward in a staged lesson, through
//!    [`resolve_propagation`].
//!
//! Store failures never block navigation: they are logged and the affected
//! change set is treated as empty.

use lessonsync_proto::{Change, FileState, UserChanges, calculate_changes};
use lessonsync_store::{ChangeLog, FileChangeLog, StoreError};

use super::propagation::{Conflict, ConflictResolver, Resolution, resolve_propagation};
use super::{Direction, Lesson, LessonKind, MetadataSink, NavError, NoopMetadataSink, Task};
use crate::config::SyncConfig;
use crate::workspace::{TaskWorkspace, capture_state};

/// Moves learners between the tasks of framework lessons.
pub struct LessonNavigator<S: ChangeLog> {
    store: S,
    metadata: Box<dyn MetadataSink>,
    default_resolution: Resolution,
}

impl<S: ChangeLog> LessonNavigator<S> {
    /// Creates a navigator over `store` that discards metadata updates and
    /// keeps the target's content on unresolved conflicts.
    #[must_use]
    pub fn new(store: S) -> Self {
        Self {
            store,
            metadata: Box::new(NoopMetadataSink),
            default_resolution: Resolution::Keep,
        }
    }

    /// Reports lesson and task metadata changes to `sink`.
    #[must_use]
    pub fn with_metadata_sink(mut self, sink: impl MetadataSink + 'static) -> Self {
        self.metadata = Box::new(sink);
        self
    }

    /// Answer used when a conflict arises and the caller supplied no resolver.
    #[must_use]
    pub const fn with_default_resolution(mut self, resolution: Resolution) -> Self {
        self.default_resolution = resolution;
        self
    }

    /// The underlying change log.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Moves to the next task and materializes it in `workspace`.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::IndexOutOfRange`] if there is no next task, or
    /// [`NavError::Workspace`] if the changes cannot be materialized.
    pub fn prepare_next_task<W: TaskWorkspace + ?Sized>(
        &self,
        lesson: &mut Lesson,
        workspace: &mut W,
        resolver: Option<&mut dyn ConflictResolver>,
    ) -> Result<UserChanges, NavError> {
        self.prepare(lesson, Direction::Next, workspace, resolver)
    }

    /// Moves to the previous task and materializes it in `workspace`.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::IndexOutOfRange`] if there is no previous task, or
    /// [`NavError::Workspace`] if the changes cannot be materialized.
    pub fn prepare_prev_task<W: TaskWorkspace + ?Sized>(
        &self,
        lesson: &mut Lesson,
        workspace: &mut W,
    ) -> Result<UserChanges, NavError> {
        self.prepare(lesson, Direction::Previous, workspace, None)
    }

    fn prepare<W: TaskWorkspace + ?Sized>(
        &self,
        lesson: &mut Lesson,
        direction: Direction,
        workspace: &mut W,
        resolver: Option<&mut dyn ConflictResolver>,
    ) -> Result<UserChanges, NavError> {
        lesson.target_index(direction)?;
        let on_disk = lesson
            .current_task()
            .map(|task| capture_state(&*workspace, task.files.keys()))
            .unwrap_or_default();

        let changes = self.transition(lesson, direction, &on_disk, resolver)?;
        workspace.apply_changes(&changes)?;
        Ok(changes)
    }

    /// Performs one transition and returns the changes that turn `on_disk`
    /// (the current task's files as the learner left them) into the target
    /// task's files.
    ///
    /// The caller materializes the returned changes. `resolver` is consulted
    /// only for conflicts in staged lessons; without one the navigator's
    /// default resolution applies.
    ///
    /// # Errors
    ///
    /// Returns [`NavError::IndexOutOfRange`] if the target task does not
    /// exist; nothing is modified in that case.
    pub fn transition(
        &self,
        lesson: &mut Lesson,
        direction: Direction,
        on_disk: &FileState,
        resolver: Option<&mut dyn ConflictResolver>,
    ) -> Result<UserChanges, NavError> {
        let current_index = lesson.current_task_index;
        let target_index = lesson.target_index(direction)?;

        lesson.current_task_index = target_index;
        self.metadata.save_lesson(lesson);

        let current_task = &mut lesson.tasks[current_index];
        let user_changes = calculate_changes(&current_task.files, on_disk);
        let saved = self
            .store
            .update_and_force(current_task.record, &user_changes);
        let current_changes = match saved {
            Ok(record) => {
                current_task.record = Some(record);
                user_changes
            }
            Err(e) => {
                tracing::error!(
                    task = %current_task.name,
                    error = %e,
                    "failed to save user changes"
                );
                UserChanges::empty()
            }
        };
        self.metadata.save_task(&lesson.tasks[current_index]);

        let current_task = &lesson.tasks[current_index];
        let target_task = &lesson.tasks[target_index];
        let target_changes = self.load_changes(target_task);

        let current_state = current_changes.applied_to(&current_task.files);
        let target_state = target_changes.applied_to(&target_task.files);

        let changes = if direction == Direction::Next && lesson.kind == LessonKind::Staged {
            let conflict = Conflict::new(&current_task.name, &target_task.name);
            let mut fallback = self.default_resolution;
            resolve_propagation(
                &current_state,
                &target_state,
                target_task.record,
                &lesson.classifier,
                &conflict,
                resolver.unwrap_or(&mut fallback),
            )
        } else {
            calculate_changes(&current_state, &target_state)
        };

        tracing::debug!(
            lesson = %lesson.name,
            from = current_index,
            to = target_index,
            changes = changes.len(),
            "computed transition"
        );

        if changes.iter().any(Change::is_structural) {
            let target_task = &mut lesson.tasks[target_index];
            changes.apply_to_task_files(&mut target_task.files);
            self.metadata.save_task(target_task);
        }

        Ok(changes)
    }

    /// Stores an externally supplied solution (for example one downloaded
    /// from a submission history) as the task's user changes.
    ///
    /// Only task files are taken from `external_state`; test files keep
    /// their canonical content.
    pub fn save_external_changes(
        &self,
        task: &mut Task,
        classifier: &super::FileClassifier,
        external_state: &FileState,
    ) {
        let task_files = classifier.split(&task.files).task_files;
        let external_task_files = classifier.split(external_state).task_files;
        let changes = calculate_changes(&task_files, &external_task_files);

        match self.store.update_user_changes(task.record, &changes) {
            Ok(record) => task.record = Some(record),
            Err(e) => {
                tracing::error!(task = %task.name, error = %e, "failed to save external solution");
            }
        }
        self.metadata.save_task(task);
    }

    /// Re-expresses a task's stored changes against `new_initial_state`,
    /// after its canonical files were replaced by a course update.
    ///
    /// The task's own `files` are left for the caller to replace.
    pub fn rebase_user_changes(&self, task: &Task, new_initial_state: &FileState) {
        let Some(record) = task.record else {
            return;
        };

        let changes = match self.store.get_user_changes(Some(record)) {
            Ok(changes) => changes,
            Err(e) => {
                tracing::error!(task = %task.name, error = %e, "failed to get user changes");
                return;
            }
        };

        let rebased = changes.rebase(new_initial_state);
        if let Err(e) = self.store.update_user_changes(Some(record), &rebased) {
            tracing::error!(task = %task.name, error = %e, "failed to update user changes");
        }
    }

    fn load_changes(&self, task: &Task) -> UserChanges {
        self.store
            .get_user_changes(task.record)
            .unwrap_or_else(|e| {
                tracing::error!(task = %task.name, error = %e, "failed to get user changes");
                UserChanges::empty()
            })
    }
}

impl LessonNavigator<FileChangeLog> {
    /// Opens the change log named by `config` and applies its defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the change log cannot be opened.
    pub fn open(config: &SyncConfig) -> Result<Self, StoreError> {
        let store = FileChangeLog::open(&config.store_path)?;
        Ok(Self::new(store).with_default_resolution(config.default_resolution))
    }
}
