//! Background periodic connectivity check and catch-up sync.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::status::SyncStatus;

/// Handle to the periodic check. Dropping it aborts the task.
#[derive(Debug)]
pub struct PeriodicCheck {
    shutdown: Arc<Notify>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicCheck {
    /// On each tick: refresh connectivity, then sync if online and the
    /// mirror is missing or older than `stale_after`.
    ///
    /// The first tick fires immediately. Missed ticks are skipped.
    pub fn spawn(status: Arc<SyncStatus>, every: Duration, stale_after: Duration) -> Self {
        let shutdown = Arc::new(Notify::new());
        let stop = shutdown.clone();

        let handle = tokio::spawn(async move {
            tracing::info!(?every, ?stale_after, "periodic sync check started");

            let mut interval = tokio::time::interval(every);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = stop.notified() => {
                        tracing::info!("periodic sync check received shutdown signal");
                        break;
                    }
                    _ = interval.tick() => {
                        run_check(&status, stale_after).await;
                    }
                }
            }

            tracing::info!("periodic sync check stopped");
        });

        Self {
            shutdown,
            handle: Some(handle),
        }
    }

    /// Ask the task to stop after its current tick and wait for it.
    pub async fn shutdown(mut self) {
        self.shutdown.notify_one();
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }
}

impl Drop for PeriodicCheck {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn run_check(status: &SyncStatus, stale_after: Duration) {
    if status.context().session().is_none() {
        tracing::debug!("skipping periodic check - not signed in");
        return;
    }

    let connectivity = status.refresh_connectivity().await;
    if !connectivity.can_sync() {
        tracing::debug!(state = ?connectivity.state, "skipping sync - cannot reach backend");
        return;
    }

    if status.refresh_local().await.is_err() {
        return;
    }

    if !status.snapshot().has_local_data || status.needs_sync_nudge(stale_after) {
        tracing::info!("mirror missing or stale, syncing");
        let report = status.trigger_sync().await;
        tracing::debug!(outcome = ?report.outcome, "periodic sync finished");
    }
}
