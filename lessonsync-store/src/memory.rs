//! In-memory change log.

use parking_lot::Mutex;

use lessonsync_proto::{Record, UserChanges};

use crate::{ChangeLog, StoreError};

/// Arena of change sets indexed by [`Record`], lost when dropped.
#[derive(Debug, Default)]
pub struct InMemoryChangeLog {
    records: Mutex<Vec<UserChanges>>,
}

impl InMemoryChangeLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChangeLog for InMemoryChangeLog {
    fn get_user_changes(&self, record: Option<Record>) -> Result<UserChanges, StoreError> {
        let Some(record) = record else {
            return Ok(UserChanges::empty());
        };
        self.records
            .lock()
            .get(record.as_usize())
            .cloned()
            .ok_or(StoreError::UnknownRecord(record))
    }

    fn update_user_changes(
        &self,
        record: Option<Record>,
        changes: &UserChanges,
    ) -> Result<Record, StoreError> {
        let mut records = self.records.lock();
        if let Some(record) = record {
            let slot = records
                .get_mut(record.as_usize())
                .ok_or(StoreError::UnknownRecord(record))?;
            *slot = changes.clone();
            return Ok(record);
        }
        let index = u32::try_from(records.len()).map_err(|_| StoreError::RecordSpaceExhausted)?;
        records.push(changes.clone());
        drop(records);
        Ok(Record::from_index(index))
    }

    fn force(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn record_count(&self) -> usize {
        self.records.lock().len()
    }
}
