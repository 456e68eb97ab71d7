//! Loaded locks of one process.
//!
//! The registry owns a [`LockCoordinator`] and a [`PollScheduler`] per lock
//! and routes events and management requests to them by lock id. Unloading a
//! lock stops its poll task, cancels its timers and saves its slots.

use crate::config::EngineConfig;
use crate::coordinator::{AlarmOutcome, LockCoordinator};
use crate::error::{EngineError, Result};
use crate::scheduler::{PollScheduler, flush};
use crate::slot::SlotSnapshot;
use crate::store::SlotStore;
use keyslot_core::{Clock, LockConfig, LockId};
use keyslot_link::{LockLink, Notifier};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

struct LoadedLock<L: LockLink, N: Notifier> {
    coordinator: Arc<LockCoordinator<L, N>>,
    scheduler: PollScheduler,
}

pub struct LockRegistry<L: LockLink, N: Notifier, S: SlotStore> {
    engine: EngineConfig,
    link: Arc<L>,
    notifier: Arc<N>,
    store: Arc<S>,
    clock: Arc<dyn Clock>,
    locks: Mutex<BTreeMap<LockId, LoadedLock<L, N>>>,
}

impl<L: LockLink, N: Notifier, S: SlotStore> LockRegistry<L, N, S> {
    pub fn new(
        engine: EngineConfig,
        link: Arc<L>,
        notifier: Arc<N>,
        store: Arc<S>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            engine,
            link,
            notifier,
            store,
            clock,
            locks: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn engine_config(&self) -> &EngineConfig {
        &self.engine
    }

    /// Start managing a lock: restore its stored slots, re-evaluate them and
    /// start polling.
    ///
    /// # Errors
    /// - `EngineError::Core` if the configuration is invalid
    /// - `EngineError::AlreadyLoaded` if the lock is already managed
    /// - `EngineError::Storage` if stored records could not be read
    pub async fn load(&self, config: LockConfig) -> Result<Arc<LockCoordinator<L, N>>> {
        config.validate()?;

        let mut locks = self.locks.lock().await;
        if locks.contains_key(&config.lock_id) {
            return Err(EngineError::AlreadyLoaded(config.lock_id));
        }

        let lock_id = config.lock_id.clone();
        let records = self.store.load(&lock_id).await?;

        let coordinator = Arc::new(LockCoordinator::new(
            config,
            self.engine.clone(),
            Arc::clone(&self.link),
            Arc::clone(&self.notifier),
            Arc::clone(&self.clock),
        ));
        let restored = coordinator.restore(records).await;
        flush(coordinator.as_ref(), self.store.as_ref()).await?;

        let scheduler = PollScheduler::spawn(
            Arc::clone(&coordinator),
            Arc::clone(&self.store),
            self.engine.poll_interval_value(),
        );

        info!(
            %lock_id,
            vendor = ?coordinator.vendor(),
            slots = %coordinator.config().slots,
            restored,
            "Lock loaded"
        );

        locks.insert(
            lock_id,
            LoadedLock {
                coordinator: Arc::clone(&coordinator),
                scheduler,
            },
        );
        Ok(coordinator)
    }

    /// Stop managing a lock. Its stored records are kept.
    ///
    /// # Errors
    /// Returns `EngineError::LockNotLoaded` if the lock is not managed, or
    /// `EngineError::Storage` if the final save failed.
    pub async fn unload(&self, lock_id: &LockId) -> Result<()> {
        let loaded = self
            .locks
            .lock()
            .await
            .remove(lock_id)
            .ok_or_else(|| EngineError::LockNotLoaded(lock_id.clone()))?;

        self.stop(loaded).await
    }

    /// Stop managing a lock and delete its stored records.
    ///
    /// Returns the number of records deleted.
    pub async fn remove(&self, lock_id: &LockId) -> Result<u64> {
        self.unload(lock_id).await?;
        let deleted = self.store.delete(lock_id).await?;
        info!(%lock_id, deleted, "Lock removed");
        Ok(deleted)
    }

    /// Unload every lock. Keeps going past failures and returns the first.
    pub async fn unload_all(&self) -> Result<()> {
        let loaded = std::mem::take(&mut *self.locks.lock().await);

        let mut first_error = None;
        for (lock_id, lock) in loaded {
            if let Err(e) = self.stop(lock).await {
                warn!(%lock_id, error = %e, "Failed to unload lock cleanly");
                first_error.get_or_insert(e);
            }
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn stop(&self, loaded: LoadedLock<L, N>) -> Result<()> {
        let LoadedLock {
            coordinator,
            scheduler,
        } = loaded;

        let stopped = scheduler.shutdown().await;
        coordinator.shutdown();
        flush(coordinator.as_ref(), self.store.as_ref()).await?;

        info!(lock_id = %coordinator.lock_id(), "Lock unloaded");
        stopped
    }

    /// Save every loaded lock's changed slots.
    pub async fn flush(&self) -> Result<usize> {
        let coordinators = self.coordinators().await;
        let mut saved = 0;
        for coordinator in coordinators {
            saved += flush(coordinator.as_ref(), self.store.as_ref()).await?;
        }
        Ok(saved)
    }

    pub async fn get(&self, lock_id: &LockId) -> Option<Arc<LockCoordinator<L, N>>> {
        self.locks
            .lock()
            .await
            .get(lock_id)
            .map(|loaded| Arc::clone(&loaded.coordinator))
    }

    /// # Errors
    /// Returns `EngineError::LockNotLoaded` if the lock is not managed.
    pub async fn require(&self, lock_id: &LockId) -> Result<Arc<LockCoordinator<L, N>>> {
        self.get(lock_id)
            .await
            .ok_or_else(|| EngineError::LockNotLoaded(lock_id.clone()))
    }

    pub async fn find_slot(&self, lock_id: &LockId, slot_index: u16) -> Option<SlotSnapshot> {
        self.get(lock_id).await?.slot(slot_index).await
    }

    pub async fn lock_ids(&self) -> Vec<LockId> {
        self.locks.lock().await.keys().cloned().collect()
    }

    /// Whether the lock's poll task is still running; it stops by itself once
    /// the link is disabled. `None` if the lock is not loaded.
    pub async fn is_polling(&self, lock_id: &LockId) -> Option<bool> {
        self.locks
            .lock()
            .await
            .get(lock_id)
            .map(|loaded| !loaded.scheduler.is_finished())
    }

    async fn coordinators(&self) -> Vec<Arc<LockCoordinator<L, N>>> {
        self.locks
            .lock()
            .await
            .values()
            .map(|loaded| Arc::clone(&loaded.coordinator))
            .collect()
    }

    // ------------------------------------------------------------------
    // Event routing
    // ------------------------------------------------------------------

    pub async fn on_lock_event(&self, lock_id: &LockId) -> Result<()> {
        self.require(lock_id).await?.on_lock_event();
        Ok(())
    }

    pub async fn on_door_event(&self, lock_id: &LockId, opened: bool) -> Result<()> {
        self.require(lock_id).await?.on_door_event(opened).await;
        Ok(())
    }

    pub async fn on_alarm_event(
        &self,
        lock_id: &LockId,
        alarm_type: u32,
        alarm_level: u32,
    ) -> Result<AlarmOutcome> {
        let coordinator = self.require(lock_id).await?;
        Ok(coordinator.on_alarm_event(alarm_type, alarm_level).await)
    }
}
