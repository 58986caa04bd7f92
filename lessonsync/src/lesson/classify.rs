//! Partition of a task's files into exercise files and test files.

use lessonsync_proto::FileState;

/// Errors raised for an unusable test-file classification.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ClassificationError {
    /// An empty test directory would classify every file as a test.
    #[error("test directory entry is empty")]
    EmptyTestDir,
    /// Task paths are relative, so an absolute test directory never matches.
    #[error("test directory {0} is not relative")]
    AbsoluteTestDir(String),
}

/// A file state split by [`FileClassifier::split`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SplitState {
    /// Exercise files the learner works on.
    pub task_files: FileState,
    /// Files under a test directory, or the default test file.
    pub test_files: FileState,
}

/// Decides which task files are tests.
///
/// A path is a test file when it equals the course's default test file name
/// or starts with one of its test directories. The default classifier has no
/// tests: everything is a task file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileClassifier {
    test_dirs: Vec<String>,
    test_file_name: Option<String>,
}

impl FileClassifier {
    /// Creates a classifier from the course's test directories and default
    /// test file name.
    ///
    /// # Errors
    ///
    /// Returns [`ClassificationError`] if a test directory is empty or absolute.
    pub fn new(
        test_dirs: Vec<String>,
        test_file_name: Option<String>,
    ) -> Result<Self, ClassificationError> {
        for dir in &test_dirs {
            if dir.is_empty() {
                return Err(ClassificationError::EmptyTestDir);
            }
            if dir.starts_with('/') || dir.starts_with('\\') {
                return Err(ClassificationError::AbsoluteTestDir(dir.clone()));
            }
        }
        Ok(Self {
            test_dirs,
            test_file_name: test_file_name.filter(|name| !name.is_empty()),
        })
    }

    /// Like [`new`](Self::new), but an unusable classification is logged
    /// and replaced by one that treats every file as a task file.
    #[must_use]
    pub fn or_all_task_files(test_dirs: Vec<String>, test_file_name: Option<String>) -> Self {
        Self::new(test_dirs, test_file_name).unwrap_or_else(|e| {
            tracing::warn!(
                error = %e,
                "unusable test classification, treating all files as task files"
            );
            Self::default()
        })
    }

    /// Whether `path` is a test file.
    #[must_use]
    pub fn is_test_file(&self, path: &str) -> bool {
        self.test_file_name.as_deref() == Some(path)
            || self.test_dirs.iter().any(|dir| path.starts_with(dir.as_str()))
    }

    /// Splits a file state into task files and test files.
    #[must_use]
    pub fn split(&self, state: &FileState) -> SplitState {
        let mut split = SplitState::default();
        for (path, text) in state {
            let target = if self.is_test_file(path) {
                &mut split.test_files
            } else {
                &mut split.task_files
            };
            target.insert(path.clone(), text.clone());
        }
        split
    }
}
