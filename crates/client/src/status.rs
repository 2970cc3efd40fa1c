//! Observable sync status for UI consumption.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::context::ClientContext;
use crate::mirror::MirrorError;
use crate::network::NetworkSignal;
use crate::sync::SyncError;
use crate::types::{ConnectivityError, ConnectivityReport, ConnectivityState, SyncOutcome, SyncReport};

/// Everything a status bar needs, in one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    pub connectivity: ConnectivityState,
    pub connectivity_error: Option<ConnectivityError>,
    pub is_online: bool,
    pub is_syncing: bool,
    pub progress: u8,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_display: String,
    pub has_local_data: bool,
    pub last_error: Option<String>,
}

impl Default for StatusSnapshot {
    fn default() -> Self {
        Self {
            connectivity: ConnectivityState::Checking,
            connectivity_error: None,
            is_online: false,
            is_syncing: false,
            progress: 0,
            last_sync_at: None,
            last_sync_display: format_relative(None, Utc::now()),
            has_local_data: false,
            last_error: None,
        }
    }
}

impl StatusSnapshot {
    fn apply_connectivity(&mut self, report: &ConnectivityReport) {
        self.connectivity = report.state;
        self.is_online = report.is_online();
        self.connectivity_error = report.error.clone();
    }
}

/// Human rendering of a last-sync instant relative to `now`.
pub fn format_relative(at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(at) = at else {
        return "never".to_string();
    };

    let minutes = now.signed_duration_since(at).num_minutes();
    if minutes < 1 {
        return "just now".to_string();
    }

    let (value, unit) = if minutes < 60 {
        (minutes, "minute")
    } else if minutes < 60 * 24 {
        (minutes / 60, "hour")
    } else {
        (minutes / (60 * 24), "day")
    };
    let plural = if value == 1 { "" } else { "s" };
    format!("{value} {unit}{plural} ago")
}

/// Never synced, or synced longer than `max_age` ago.
pub fn is_stale(at: Option<DateTime<Utc>>, now: DateTime<Utc>, max_age: Duration) -> bool {
    match at {
        None => true,
        Some(at) => now
            .signed_duration_since(at)
            .to_std()
            .is_ok_and(|age| age > max_age),
    }
}

/// Facade combining connectivity, sync progress and local-mirror state.
pub struct SyncStatus {
    ctx: Arc<ClientContext>,
    snapshot: Arc<watch::Sender<StatusSnapshot>>,
    link_task: JoinHandle<()>,
}

impl SyncStatus {
    /// Must be called inside a tokio runtime: the facade keeps a task that
    /// marks the snapshot offline as soon as the link drops.
    pub fn new(ctx: Arc<ClientContext>) -> Arc<Self> {
        let (snapshot, _) = watch::channel(StatusSnapshot::default());
        let snapshot = Arc::new(snapshot);
        let link_task = spawn_link_watch(ctx.network(), snapshot.clone());
        Arc::new(Self {
            ctx,
            snapshot,
            link_task,
        })
    }

    pub fn context(&self) -> &Arc<ClientContext> {
        &self.ctx
    }

    /// Current snapshot, with the display string recomputed against now.
    pub fn snapshot(&self) -> StatusSnapshot {
        let mut snapshot = self.snapshot.borrow().clone();
        snapshot.last_sync_display = format_relative(snapshot.last_sync_at, Utc::now());
        snapshot
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.snapshot.subscribe()
    }

    fn update(&self, f: impl FnOnce(&mut StatusSnapshot)) {
        self.snapshot.send_modify(f);
    }

    /// Mark `Checking`, probe, then publish the result.
    pub async fn refresh_connectivity(&self) -> ConnectivityReport {
        self.update(|s| s.connectivity = ConnectivityState::Checking);

        let session = self.ctx.session();
        let report = self.ctx.orchestrator().prober().probe(session.as_ref()).await;
        tracing::debug!(state = ?report.state, "connectivity refreshed");

        self.update(|s| s.apply_connectivity(&report));
        report
    }

    /// Re-read `has_local_data` and the last-sync instant from the mirror.
    pub async fn refresh_local(&self) -> Result<(), MirrorError> {
        let Some(identity) = self.ctx.identity() else {
            self.update(|s| {
                s.has_local_data = false;
                s.last_sync_at = None;
                s.last_sync_display = format_relative(None, Utc::now());
            });
            return Ok(());
        };

        let store = self.ctx.store();
        let local = async {
            let has_data = store.has_data(identity.user_id).await?;
            let last_sync = store.last_sync(identity.user_id).await?;
            Ok::<_, MirrorError>((has_data, last_sync))
        }
        .await;

        match local {
            Ok((has_data, last_sync)) => {
                self.update(|s| {
                    s.has_local_data = has_data;
                    s.last_sync_at = last_sync;
                    s.last_sync_display = format_relative(last_sync, Utc::now());
                });
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to read local mirror state");
                self.update(|s| s.last_error = Some(err.to_string()));
                Err(err)
            }
        }
    }

    /// Run a full sync for the current session, if any.
    ///
    /// Safe to call concurrently: only one sync runs, the others come back
    /// as `AlreadySyncing`.
    pub async fn trigger_sync(&self) -> SyncReport {
        let Some((session, epoch)) = self.ctx.session_in_epoch() else {
            let report = SyncReport::failed(SyncError::NotSignedIn, Utc::now());
            self.update(|s| s.last_error = Some(SyncError::NotSignedIn.to_string()));
            return report;
        };
        let identity = session.identity();
        let orchestrator = self.ctx.orchestrator();

        let mut progress = orchestrator.watch_progress();
        let sync = orchestrator.sync_in_epoch(&session, &identity, epoch);
        tokio::pin!(sync);

        let report = loop {
            tokio::select! {
                report = &mut sync => break report,
                Ok(()) = progress.changed() => {
                    let percent = *progress.borrow_and_update();
                    self.update(|s| {
                        s.is_syncing = true;
                        s.progress = percent;
                    });
                }
            }
        };

        if report.outcome == SyncOutcome::AlreadySyncing {
            return report;
        }

        self.update(|s| {
            s.is_syncing = false;
            s.progress = 0;
            s.last_error = report.error.as_ref().map(ToString::to_string);
            match &report.error {
                Some(SyncError::Offline(reason)) => {
                    s.apply_connectivity(&ConnectivityReport::offline(reason.clone()));
                }
                Some(SyncError::Permission(reason)) => {
                    s.apply_connectivity(&ConnectivityReport::permission_denied(reason.clone()));
                }
                _ if !self.ctx.network().is_up() => {
                    s.apply_connectivity(&ConnectivityReport::offline(LINK_DOWN));
                }
                _ => s.apply_connectivity(&ConnectivityReport::online()),
            }
        });

        // The report is already complete; a failed re-read only affects display.
        let _ = self.refresh_local().await;
        report
    }

    /// Whether the UI should suggest syncing: never synced or older than `max_age`.
    pub fn needs_sync_nudge(&self, max_age: Duration) -> bool {
        is_stale(self.snapshot.borrow().last_sync_at, Utc::now(), max_age)
    }

    /// Sign out, clear the user's mirror and reset local state.
    pub async fn sign_out(&self) -> Result<(), MirrorError> {
        self.ctx.sign_out().await?;
        self.update(|s| {
            let connectivity = s.connectivity;
            *s = StatusSnapshot {
                connectivity,
                is_online: s.is_online,
                ..StatusSnapshot::default()
            };
        });
        Ok(())
    }
}

impl Drop for SyncStatus {
    fn drop(&mut self) {
        self.link_task.abort();
    }
}

const LINK_DOWN: &str = "network link is down";

/// Mark the snapshot offline on every up→down edge of the link. Coming back
/// up is left to a probe.
fn spawn_link_watch(
    network: &NetworkSignal,
    snapshot: Arc<watch::Sender<StatusSnapshot>>,
) -> JoinHandle<()> {
    let mut rx = network.subscribe();

    tokio::spawn(async move {
        let mut seen = *rx.borrow_and_update();
        if !seen.up {
            snapshot.send_modify(|s| s.apply_connectivity(&ConnectivityReport::offline(LINK_DOWN)));
        }
        while rx.changed().await.is_ok() {
            let now = *rx.borrow_and_update();
            let dropped = !now.up && (seen.up || now.drops != seen.drops);
            seen = now;
            if dropped {
                tracing::debug!("link down, marking status offline");
                snapshot.send_modify(|s| s.apply_connectivity(&ConnectivityReport::offline(LINK_DOWN)));
            }
        }
    })
}
