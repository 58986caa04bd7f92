//! Task directory access.
//!
//! The navigator never touches the file system directly: it reads the
//! learner's current files through a [`TaskWorkspace`] and hands back the
//! [`UserChanges`] to materialize.

use std::path::{Component, Path, PathBuf};

use lessonsync_proto::{FileState, UserChanges};

/// Errors that can occur while reading or writing a task directory.
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// The path is absolute or leaves the task directory.
    #[error("path {0} escapes the task directory")]
    InvalidPath(String),

    /// A file could not be read.
    #[error("failed to read {path}: {source}")]
    Read {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A file could not be written or deleted.
    #[error("failed to write {path}: {source}")]
    Write {
        /// File that was being written.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

/// Source and sink of a task directory's files.
pub trait TaskWorkspace {
    /// Returns the current text of `path`, or `None` if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] if the file exists but cannot be read.
    fn read_file(&self, path: &str) -> Result<Option<String>, WorkspaceError>;

    /// Materializes `changes`: creates, overwrites and deletes files.
    ///
    /// # Errors
    ///
    /// Returns [`WorkspaceError`] on the first change that cannot be applied.
    fn apply_changes(&mut self, changes: &UserChanges) -> Result<(), WorkspaceError>;
}

/// Reads the current text of every path in `paths`.
///
/// Missing files are left out of the result; unreadable files are logged and
/// left out as well.
pub fn capture_state<W, I, S>(workspace: &W, paths: I) -> FileState
where
    W: TaskWorkspace + ?Sized,
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut state = FileState::new();
    for path in paths {
        let path = path.as_ref();
        match workspace.read_file(path) {
            Ok(Some(text)) => {
                state.insert(path.to_string(), text);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(path, error = %e, "skipping unreadable task file"),
        }
    }
    state
}

/// A task directory held in memory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InMemoryWorkspace {
    files: FileState,
}

impl InMemoryWorkspace {
    /// Creates a workspace holding `files`.
    #[must_use]
    pub const fn new(files: FileState) -> Self {
        Self { files }
    }

    /// Current files.
    #[must_use]
    pub const fn files(&self) -> &FileState {
        &self.files
    }

    /// Writes a single file, as a learner's edit would.
    pub fn write(&mut self, path: impl Into<String>, text: impl Into<String>) {
        self.files.insert(path.into(), text.into());
    }

    /// Deletes a single file, as a learner would.
    pub fn delete(&mut self, path: &str) {
        self.files.remove(path);
    }
}

impl TaskWorkspace for InMemoryWorkspace {
    fn read_file(&self, path: &str) -> Result<Option<String>, WorkspaceError> {
        Ok(self.files.get(path).cloned())
    }

    fn apply_changes(&mut self, changes: &UserChanges) -> Result<(), WorkspaceError> {
        changes.apply(&mut self.files);
        Ok(())
    }
}

/// A task directory on disk.
#[derive(Debug, Clone)]
pub struct DirWorkspace {
    root: PathBuf,
}

impl DirWorkspace {
    /// Creates a workspace rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> Result<PathBuf, WorkspaceError> {
        let relative = Path::new(path);
        let is_plain = relative.components().next().is_some()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(WorkspaceError::InvalidPath(path.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

impl TaskWorkspace for DirWorkspace {
    fn read_file(&self, path: &str) -> Result<Option<String>, WorkspaceError> {
        let full = self.resolve(path)?;
        match std::fs::read_to_string(&full) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WorkspaceError::Read {
                path: full,
                source: e,
            }),
        }
    }

    fn apply_changes(&mut self, changes: &UserChanges) -> Result<(), WorkspaceError> {
        for change in changes {
            let full = self.resolve(change.path())?;
            let write_error = |source| WorkspaceError::Write {
                path: full.clone(),
                source,
            };

            if let Some(text) = change.text() {
                if let Some(parent) = full.parent() {
                    std::fs::create_dir_all(parent).map_err(write_error)?;
                }
                std::fs::write(&full, text).map_err(write_error)?;
            } else {
                match std::fs::remove_file(&full) {
                    Ok(()) => {}
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                    Err(e) => return Err(write_error(e)),
                }
            }
            tracing::debug!(root = %self.root.display(), %change, "materialized change");
        }
        Ok(())
    }
}
