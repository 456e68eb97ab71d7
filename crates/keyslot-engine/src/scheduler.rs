//! Periodic poll task of one lock.
//!
//! The scheduler polls its coordinator on a fixed interval and saves the
//! slot records that changed after each poll. Ticks missed while a poll was
//! slow are skipped rather than replayed. The task stops on shutdown or once
//! the coordinator disables its link.

use crate::coordinator::{LockCoordinator, PollOutcome};
use crate::error::{EngineError, Result};
use crate::store::SlotStore;
use keyslot_link::{LockLink, Notifier};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

/// How the poll task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskTermination {
    /// Stopped on request.
    Stopped,
    /// Stopped itself after the link was disabled.
    LinkDisabled,
    Cancelled,
    Panic,
}

/// Handle of a running poll loop. Dropping it stops the loop.
pub struct PollScheduler {
    cancel: DropGuard,
    task: JoinHandle<TaskTermination>,
}

impl PollScheduler {
    /// Spawn the poll loop. The first poll runs immediately.
    pub fn spawn<L, N, S>(
        coordinator: Arc<LockCoordinator<L, N>>,
        store: Arc<S>,
        interval: Duration,
    ) -> Self
    where
        L: LockLink,
        N: Notifier,
        S: SlotStore,
    {
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => return TaskTermination::Stopped,
                    _ = ticker.tick() => {}
                }

                let outcome = tokio::select! {
                    _ = token.cancelled() => return TaskTermination::Stopped,
                    outcome = coordinator.poll() => outcome,
                };

                match outcome {
                    Ok(PollOutcome::LinkDisabled) => {
                        warn!(lock_id = %coordinator.lock_id(), "Polling stopped, link disabled");
                        return TaskTermination::LinkDisabled;
                    }
                    Ok(outcome) => debug!(lock_id = %coordinator.lock_id(), ?outcome, "Poll tick"),
                    Err(e) => debug!(lock_id = %coordinator.lock_id(), error = %e, "Poll tick failed"),
                }

                if let Err(e) = flush(coordinator.as_ref(), store.as_ref()).await {
                    error!(lock_id = %coordinator.lock_id(), error = %e, "Failed to save slot records");
                }
            }
        });

        Self {
            cancel: cancel.drop_guard(),
            task,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop and wait for it to end.
    ///
    /// # Errors
    /// Returns `EngineError::Task` if the poll task panicked.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.disarm().cancel();

        match classify(self.task.await) {
            TaskTermination::Panic => Err(EngineError::Task("poll task panicked".to_string())),
            termination => {
                info!(?termination, "Poll scheduler stopped");
                Ok(())
            }
        }
    }
}

fn classify(result: std::result::Result<TaskTermination, JoinError>) -> TaskTermination {
    match result {
        Ok(termination) => termination,
        Err(e) if e.is_cancelled() => TaskTermination::Cancelled,
        Err(_) => TaskTermination::Panic,
    }
}

/// Save the records changed since the last flush. Returns how many were
/// saved.
pub async fn flush<L, N, S>(coordinator: &LockCoordinator<L, N>, store: &S) -> Result<usize>
where
    L: LockLink,
    N: Notifier,
    S: SlotStore,
{
    let records = coordinator.take_unsaved().await;
    if records.is_empty() {
        return Ok(0);
    }

    if let Err(e) = store.save(&records).await {
        coordinator.mark_unsaved(&records).await;
        return Err(e);
    }
    debug!(lock_id = %coordinator.lock_id(), saved = records.len(), "Slot records saved");
    Ok(records.len())
}
