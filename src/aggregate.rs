use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::domain::RankRecord;
use crate::error::RankscanError;
use crate::persist::Persister;
use crate::sort::sort_by_rank;

/// Shared result set for a run. Every read and write goes through one lock,
/// so an insert is either fully visible or not visible at all.
#[derive(Debug, Default)]
pub struct Aggregator {
    records: Mutex<Vec<RankRecord>>,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `record` and returns the number of records held afterwards.
    pub fn insert(&self, record: RankRecord) -> usize {
        let mut records = self.lock();
        records.push(record);
        records.len()
    }

    /// Appends `record` and hands it to `persister` while the lock is held, so
    /// appended lines land in the artifact in insertion order.
    pub fn insert_and_append(
        &self,
        record: RankRecord,
        persister: &dyn Persister,
    ) -> Result<usize, RankscanError> {
        let mut records = self.lock();
        persister.append(&record)?;
        records.push(record);
        Ok(records.len())
    }

    pub fn snapshot(&self) -> Vec<RankRecord> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Sorts the held records by rank and writes them out, all under the lock.
    /// Returns how many records were written.
    pub fn sort_and_flush(&self, persister: &dyn Persister) -> Result<usize, RankscanError> {
        let mut records = self.lock();
        sort_by_rank(&mut records);
        persister.flush(&records)?;
        Ok(records.len())
    }

    /// Sorted copy of the held records.
    pub fn sorted_snapshot(&self) -> Vec<RankRecord> {
        let mut records = self.lock();
        sort_by_rank(&mut records);
        records.clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<RankRecord>> {
        // A panicking producer cannot leave a half-pushed Vec behind.
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
