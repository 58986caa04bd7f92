//! Change log store for framework lessons.
//!
//! Each task of a framework lesson owns one [`Record`] in the store. The
//! record holds the latest accumulated [`UserChanges`] of that task relative
//! to its canonical files. Two implementations are provided:
//!
//! - [`FileChangeLog`]: a single append-only file, durable across sessions
//! - [`InMemoryChangeLog`]: a process-local arena for tests and throwaway sessions

pub mod file;
pub mod memory;

use std::path::PathBuf;

use lessonsync_proto::{Record, UserChanges};

pub use file::{CompactStats, FileChangeLog};
pub use memory::InMemoryChangeLog;

/// Errors that can occur during change log operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The record handle was never allocated by this store.
    #[error("unknown record {0}")]
    UnknownRecord(Record),

    /// A stored record could not be read back.
    #[error("failed to read record {record}: {reason}")]
    Read {
        /// Record that was being read.
        record: Record,
        /// Description of the failure.
        reason: String,
    },

    /// Appending to or flushing the log failed.
    #[error("failed to write change log: {0}")]
    Write(String),

    /// Every record handle is already in use.
    #[error("record space exhausted")]
    RecordSpaceExhausted,

    /// The backing file could not be opened.
    #[error("failed to open change log {path}: {source}")]
    Open {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The backing file does not hold a valid change log.
    #[error("change log {path} is corrupt at offset {offset}: {reason}")]
    Corrupt {
        /// Path of the backing file.
        path: PathBuf,
        /// Byte offset where decoding failed.
        offset: u64,
        /// Description of the failure.
        reason: String,
    },
}

impl StoreError {
    /// Whether this error was raised while reading stored changes.
    #[must_use]
    pub const fn is_read(&self) -> bool {
        matches!(
            self,
            Self::UnknownRecord(_) | Self::Read { .. } | Self::Corrupt { .. } | Self::Open { .. }
        )
    }

    /// Whether this error was raised while persisting changes.
    #[must_use]
    pub const fn is_write(&self) -> bool {
        matches!(self, Self::Write(_) | Self::RecordSpaceExhausted)
    }
}

/// Persistent mapping from [`Record`] handles to the latest [`UserChanges`] of a task.
///
/// Implementations serialize access internally: one writer at a time, and
/// [`update_and_force`](Self::update_and_force) runs as a single critical
/// section so no read of the same record can interleave with it.
pub trait ChangeLog: Send + Sync {
    /// Returns the changes stored under `record`.
    ///
    /// A task that was never persisted (`None`) has no changes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnknownRecord`] for a handle this store never
    /// issued, or [`StoreError::Read`] if the stored data is unreadable.
    fn get_user_changes(&self, record: Option<Record>) -> Result<UserChanges, StoreError>;

    /// Stores `changes` as the latest state of `record`, allocating a new
    /// record when `record` is `None`.
    ///
    /// Returns the handle now holding the changes. On error nothing was
    /// stored and the caller keeps its previous handle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] on I/O failure, or
    /// [`StoreError::UnknownRecord`] for a handle this store never issued.
    fn update_user_changes(
        &self,
        record: Option<Record>,
        changes: &UserChanges,
    ) -> Result<Record, StoreError>;

    /// Durably flushes every pending write.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Write`] if the flush fails.
    fn force(&self) -> Result<(), StoreError>;

    /// Updates `record` and flushes as one unit.
    ///
    /// If the flush fails, stores that can undo the update do so, so a
    /// later read of `record` still returns its previous changes.
    ///
    /// # Errors
    ///
    /// Returns any error of [`update_user_changes`](Self::update_user_changes)
    /// or [`force`](Self::force).
    fn update_and_force(
        &self,
        record: Option<Record>,
        changes: &UserChanges,
    ) -> Result<Record, StoreError> {
        let record = self.update_user_changes(record, changes)?;
        self.force()?;
        Ok(record)
    }

    /// Number of records allocated so far.
    fn record_count(&self) -> usize;
}
