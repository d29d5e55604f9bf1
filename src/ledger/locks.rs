use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type Table = HashMap<i64, Arc<Mutex<()>>>;

/// Table of per-category mutexes.
///
/// Entries are created on first use and dropped when the last [`LockSet`]
/// naming them goes away, so ids that never existed, and deleted
/// categories, leave nothing behind.
#[derive(Default)]
pub(crate) struct CategoryLocks {
    table: Mutex<Table>,
}

/// The mutexes for one operation, sorted by category id.
pub(crate) struct LockSet<'a> {
    table: &'a Mutex<Table>,
    ids: Vec<i64>,
    mutexes: Vec<Arc<Mutex<()>>>,
}

impl CategoryLocks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Collect the mutexes for `ids` in ascending id order, duplicates removed.
    pub(crate) fn set_for(&self, ids: &[i64]) -> LockSet<'_> {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();

        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        let mutexes = ids
            .iter()
            .map(|id| Arc::clone(table.entry(*id).or_default()))
            .collect();
        LockSet {
            table: &self.table,
            ids,
            mutexes,
        }
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl LockSet<'_> {
    pub(crate) fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Block until every mutex in the set is held. Acquisition follows the
    /// sorted order, so two sets sharing categories cannot deadlock.
    pub(crate) fn acquire(&self) -> Vec<MutexGuard<'_, ()>> {
        self.mutexes
            .iter()
            .map(|m| m.lock().unwrap_or_else(PoisonError::into_inner))
            .collect()
    }
}

impl Drop for LockSet<'_> {
    fn drop(&mut self) {
        // Every clone is handed out under the table lock, so a count of one
        // here means no other set holds or waits on the mutex.
        let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
        for (id, mutex) in self.ids.iter().zip(self.mutexes.drain(..)) {
            drop(mutex);
            if table.get(id).is_some_and(|m| Arc::strong_count(m) == 1) {
                table.remove(id);
            }
        }
    }
}
