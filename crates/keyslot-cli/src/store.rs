//! SQLite-backed [`SlotStore`] for the `keyslot` binary.

use keyslot_core::{LockId, SlotRecord};
use keyslot_engine::{EngineError, SlotStore};
use keyslot_storage::{SlotRepository, SqliteSlotRepository};

#[derive(Debug, Clone)]
pub struct SqliteStore {
    repository: SqliteSlotRepository,
}

impl SqliteStore {
    pub fn new(repository: SqliteSlotRepository) -> Self {
        Self { repository }
    }
}

impl SlotStore for SqliteStore {
    async fn load(&self, lock: &LockId) -> keyslot_engine::Result<Vec<SlotRecord>> {
        self.repository
            .find_by_lock(lock)
            .await
            .map_err(EngineError::storage)
    }

    async fn save(&self, records: &[SlotRecord]) -> keyslot_engine::Result<()> {
        self.repository
            .upsert_all(records)
            .await
            .map_err(EngineError::storage)
    }

    async fn delete(&self, lock: &LockId) -> keyslot_engine::Result<u64> {
        self.repository
            .delete_by_lock(lock)
            .await
            .map_err(EngineError::storage)
    }
}
