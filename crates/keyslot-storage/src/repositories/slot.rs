#![allow(async_fn_in_trait)]

use crate::error::StorageResult;
use crate::models::SlotRow;
use keyslot_core::{LockId, SlotRecord};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

/// Data access for code slot records.
///
/// Records are keyed by `(lock_id, slot_index)`. Every read validates the
/// stored row; a corrupt row is an error, never a default.
pub trait SlotRepository: Send + Sync {
    /// Find one slot's record
    async fn find(&self, lock_id: &LockId, slot_index: u16) -> StorageResult<Option<SlotRecord>>;

    /// All records of a lock, ordered by slot index
    async fn find_by_lock(&self, lock_id: &LockId) -> StorageResult<Vec<SlotRecord>>;

    /// Insert or replace one record
    async fn upsert(&self, record: &SlotRecord) -> StorageResult<()>;

    /// Insert or replace several records atomically
    async fn upsert_all(&self, records: &[SlotRecord]) -> StorageResult<()>;

    /// Delete every record of a lock, returning how many were removed
    async fn delete_by_lock(&self, lock_id: &LockId) -> StorageResult<u64>;

    async fn count_by_lock(&self, lock_id: &LockId) -> StorageResult<i64>;
}

const SELECT_COLUMNS: &str = "SELECT lock_id, slot_index, state, settings, desired_code, \
                              usage_count, created_at, updated_at FROM code_slots";

const UPSERT: &str = r#"
    INSERT INTO code_slots (lock_id, slot_index, state, settings, desired_code, usage_count)
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT (lock_id, slot_index) DO UPDATE SET
        state = excluded.state,
        settings = excluded.settings,
        desired_code = excluded.desired_code,
        usage_count = excluded.usage_count,
        updated_at = datetime('now')
"#;

/// SQLite implementation of [`SlotRepository`]
#[derive(Debug, Clone)]
pub struct SqliteSlotRepository {
    pool: SqlitePool,
}

impl SqliteSlotRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn upsert_in(tx: &mut Transaction<'_, Sqlite>, record: &SlotRecord) -> StorageResult<()> {
        let columns = SlotRow::columns(record)?;
        sqlx::query(UPSERT)
            .bind(columns.lock_id)
            .bind(columns.slot_index)
            .bind(columns.state)
            .bind(columns.settings)
            .bind(columns.desired_code)
            .bind(columns.usage_count)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }
}

impl SlotRepository for SqliteSlotRepository {
    async fn find(&self, lock_id: &LockId, slot_index: u16) -> StorageResult<Option<SlotRecord>> {
        let row = sqlx::query_as::<_, SlotRow>(&format!(
            "{SELECT_COLUMNS} WHERE lock_id = ? AND slot_index = ?"
        ))
        .bind(lock_id.as_str())
        .bind(i64::from(slot_index))
        .fetch_optional(&self.pool)
        .await?;

        row.map(SlotRecord::try_from).transpose()
    }

    async fn find_by_lock(&self, lock_id: &LockId) -> StorageResult<Vec<SlotRecord>> {
        let rows = sqlx::query_as::<_, SlotRow>(&format!(
            "{SELECT_COLUMNS} WHERE lock_id = ? ORDER BY slot_index"
        ))
        .bind(lock_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(SlotRecord::try_from).collect()
    }

    async fn upsert(&self, record: &SlotRecord) -> StorageResult<()> {
        self.upsert_all(std::slice::from_ref(record)).await
    }

    async fn upsert_all(&self, records: &[SlotRecord]) -> StorageResult<()> {
        if records.is_empty() {
            return Ok(());
        }

        let mut tx = self.pool.begin().await?;
        for record in records {
            Self::upsert_in(&mut tx, record).await?;
        }
        tx.commit().await?;

        debug!(count = records.len(), "Slot records saved");
        Ok(())
    }

    async fn delete_by_lock(&self, lock_id: &LockId) -> StorageResult<u64> {
        let result = sqlx::query("DELETE FROM code_slots WHERE lock_id = ?")
            .bind(lock_id.as_str())
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    async fn count_by_lock(&self, lock_id: &LockId) -> StorageResult<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM code_slots WHERE lock_id = ?")
            .bind(lock_id.as_str())
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::Database;
    use crate::error::StorageError;
    use keyslot_core::{AccessCode, AccessCountRule, PolicySettings, SlotState};

    fn lock(id: &str) -> LockId {
        LockId::new(id).unwrap()
    }

    async fn setup() -> SqliteSlotRepository {
        let db = Database::in_memory().await.unwrap();
        SqliteSlotRepository::new(db.pool().clone())
    }

    #[tokio::test]
    async fn test_upsert_and_find() {
        let repo = setup().await;
        let record = SlotRecord::new(lock("lock.front"), 2)
            .with_state(SlotState::Enabled)
            .with_desired_code(AccessCode::new(1234).unwrap())
            .with_usage_count(1)
            .with_settings(
                PolicySettings::new(true)
                    .with_user_name("Dana")
                    .with_access_count(AccessCountRule::new(true, 10)),
            );

        repo.upsert(&record).await.unwrap();

        let found = repo.find(&lock("lock.front"), 2).await.unwrap().unwrap();
        assert_eq!(found, record);
        assert!(repo.find(&lock("lock.front"), 3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let repo = setup().await;
        let id = lock("lock.front");

        repo.upsert(&SlotRecord::new(id.clone(), 1)).await.unwrap();
        repo.upsert(
            &SlotRecord::new(id.clone(), 1)
                .with_state(SlotState::Enabled)
                .with_usage_count(4),
        )
        .await
        .unwrap();

        assert_eq!(repo.count_by_lock(&id).await.unwrap(), 1);
        let found = repo.find(&id, 1).await.unwrap().unwrap();
        assert_eq!(found.state, SlotState::Enabled);
        assert_eq!(found.usage_count, 4);
        assert!(found.settings.is_none());
    }

    #[tokio::test]
    async fn test_find_by_lock_is_ordered_and_scoped() {
        let repo = setup().await;
        let front = lock("lock.front");

        repo.upsert_all(&[
            SlotRecord::new(front.clone(), 3),
            SlotRecord::new(front.clone(), 1),
            SlotRecord::new(lock("lock.back"), 1),
        ])
        .await
        .unwrap();

        let indexes: Vec<u16> = repo
            .find_by_lock(&front)
            .await
            .unwrap()
            .iter()
            .map(|r| r.slot_index)
            .collect();
        assert_eq!(indexes, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_delete_by_lock() {
        let repo = setup().await;
        let front = lock("lock.front");

        repo.upsert_all(&[
            SlotRecord::new(front.clone(), 1),
            SlotRecord::new(front.clone(), 2),
            SlotRecord::new(lock("lock.back"), 1),
        ])
        .await
        .unwrap();

        assert_eq!(repo.delete_by_lock(&front).await.unwrap(), 2);
        assert_eq!(repo.count_by_lock(&front).await.unwrap(), 0);
        assert_eq!(repo.count_by_lock(&lock("lock.back")).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_corrupt_settings_surface_as_error() {
        let db = Database::in_memory().await.unwrap();
        let repo = SqliteSlotRepository::new(db.pool().clone());

        sqlx::query(
            "INSERT INTO code_slots (lock_id, slot_index, state, settings) VALUES (?, ?, ?, ?)",
        )
        .bind("lock.front")
        .bind(1_i64)
        .bind("enabled")
        .bind("{\"enabled\": tru")
        .execute(db.pool())
        .await
        .unwrap();

        let result = repo.find_by_lock(&lock("lock.front")).await;
        assert!(matches!(result, Err(StorageError::Serialization(_))));
    }
}
