//! Persistence boundary for slot records.
//!
//! The engine does not know where records live. The `keyslot` binary plugs
//! in the SQLite repository; tests use [`MemoryStore`].

use crate::error::Result;
use keyslot_core::{LockId, SlotRecord};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub trait SlotStore: Send + Sync + 'static {
    /// Every stored record of one lock.
    fn load(&self, lock: &LockId) -> impl Future<Output = Result<Vec<SlotRecord>>> + Send;

    /// Insert or replace records.
    fn save(&self, records: &[SlotRecord]) -> impl Future<Output = Result<()>> + Send;

    /// Forget a lock entirely. Returns the number of records removed.
    fn delete(&self, lock: &LockId) -> impl Future<Output = Result<u64>> + Send;
}

/// In-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: Mutex<BTreeMap<(LockId, u16), SlotRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-existing records, as if left by an earlier run.
    pub fn with_records(records: impl IntoIterator<Item = SlotRecord>) -> Self {
        let store = Self::new();
        {
            let mut map = store.records();
            for record in records {
                map.insert((record.lock_id.clone(), record.slot_index), record);
            }
        }
        store
    }

    fn records(&self) -> MutexGuard<'_, BTreeMap<(LockId, u16), SlotRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, lock: &LockId, slot_index: u16) -> Option<SlotRecord> {
        self.records().get(&(lock.clone(), slot_index)).cloned()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }
}

impl SlotStore for MemoryStore {
    async fn load(&self, lock: &LockId) -> Result<Vec<SlotRecord>> {
        Ok(self
            .records()
            .values()
            .filter(|record| &record.lock_id == lock)
            .cloned()
            .collect())
    }

    async fn save(&self, records: &[SlotRecord]) -> Result<()> {
        let mut map = self.records();
        for record in records {
            map.insert((record.lock_id.clone(), record.slot_index), record.clone());
        }
        Ok(())
    }

    async fn delete(&self, lock: &LockId) -> Result<u64> {
        let mut map = self.records();
        let before = map.len();
        map.retain(|(id, _), _| id != lock);
        Ok((before - map.len()) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyslot_core::SlotState;

    #[tokio::test]
    async fn test_memory_store_round_trip() {
        let a = LockId::new("lock.a").unwrap();
        let b = LockId::new("lock.b").unwrap();
        let store = MemoryStore::new();

        store
            .save(&[
                SlotRecord::new(a.clone(), 1),
                SlotRecord::new(a.clone(), 2).with_state(SlotState::Enabled),
                SlotRecord::new(b.clone(), 1),
            ])
            .await
            .unwrap();

        assert_eq!(store.load(&a).await.unwrap().len(), 2);
        assert_eq!(store.get(&a, 2).unwrap().state, SlotState::Enabled);

        assert_eq!(store.delete(&a).await.unwrap(), 2);
        assert!(store.load(&a).await.unwrap().is_empty());
        assert_eq!(store.len(), 1);
    }
}
