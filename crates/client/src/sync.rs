//! Full sync: pull complete remote tables and replace the local mirror.
//!
//! One-directional (remote → local). Customers are fetched and written
//! before products. A failure on one kind leaves that kind's previous
//! snapshot in place and does not roll back the other kind.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast, watch};

use salesdesk_auth::{IdentityContext, Session};
use salesdesk_core::{EntityKind, RecordSchema, UserId};
use salesdesk_parties::CUSTOMER_SCHEMA;
use salesdesk_products::PRODUCT_SCHEMA;

use crate::backend::{Backend, BackendError, TableQuery};
use crate::connectivity::ConnectivityProber;
use crate::mirror::{MirrorError, MirrorStore};
use crate::types::{ConnectivityError, SyncCounts, SyncEvent, SyncOutcome, SyncReport};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    /// No network route; recovers on reconnect.
    #[error("no connection to the server: {0}")]
    Offline(String),
    /// Backend refused the account; the user should contact an administrator.
    #[error("access denied by the server, contact an administrator: {0}")]
    Permission(String),
    #[error("not signed in")]
    NotSignedIn,
    /// One kind failed after the other succeeded.
    #[error("{failed} could not be synced: {source}")]
    PartialSync {
        failed: EntityKind,
        source: Box<SyncError>,
    },
    /// Timeout or transport error during a bulk fetch. Not retried here.
    #[error("fetching {kind} failed: {message}")]
    TransientFetch { kind: EntityKind, message: String },
    #[error("local store error: {0}")]
    Store(String),
}

impl SyncError {
    fn from_fetch(kind: EntityKind, err: BackendError) -> Self {
        if err.is_permission() {
            SyncError::Permission(err.to_string())
        } else {
            SyncError::TransientFetch {
                kind,
                message: err.to_string(),
            }
        }
    }

    /// Errors that go away by themselves once the link comes back.
    pub fn is_offline(&self) -> bool {
        matches!(self, SyncError::Offline(_))
    }
}

/// Default capacity of the notification channel.
const EVENT_CAPACITY: usize = 64;

/// Resets the in-flight flag when dropped, so an early return or a panic
/// cannot leave syncing locked.
struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

struct KindSynced {
    written: usize,
    skipped: usize,
}

pub struct SyncOrchestrator {
    backend: Arc<dyn Backend>,
    store: Arc<dyn MirrorStore>,
    prober: ConnectivityProber,
    in_flight: AtomicBool,
    /// Bumped on every sign-in/out; a sync only writes under the epoch it
    /// started with.
    epoch: AtomicU64,
    /// Held around every mirror write and around the sign-out clear.
    store_lock: Mutex<()>,
    progress: watch::Sender<u8>,
    events: broadcast::Sender<SyncEvent>,
}

impl SyncOrchestrator {
    pub fn new(
        backend: Arc<dyn Backend>,
        store: Arc<dyn MirrorStore>,
        prober: ConnectivityProber,
    ) -> Self {
        let (progress, _) = watch::channel(0);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            backend,
            store,
            prober,
            in_flight: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            store_lock: Mutex::new(()),
            progress,
            events,
        }
    }

    pub fn prober(&self) -> &ConnectivityProber {
        &self.prober
    }

    pub fn is_syncing(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Current progress, 0–100. Back to 0 once a sync ends.
    pub fn progress(&self) -> u8 {
        *self.progress.borrow()
    }

    pub fn watch_progress(&self) -> watch::Receiver<u8> {
        self.progress.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// Make any sync already in flight drop its remaining writes.
    pub(crate) fn invalidate(&self) {
        self.epoch.fetch_add(1, Ordering::AcqRel);
    }

    /// Invalidate in-flight syncs, then clear `user`'s mirror.
    ///
    /// A write that was already under way finishes before the clear runs;
    /// no write of the old epoch can land after it.
    pub(crate) async fn clear_user(&self, user: UserId) -> Result<(), MirrorError> {
        self.invalidate();
        let _lock = self.store_lock.lock().await;
        self.store.clear(user).await
    }

    pub(crate) fn current_epoch(&self) -> u64 {
        self.epoch.load(Ordering::Acquire)
    }

    fn try_acquire(&self) -> Option<InFlightGuard<'_>> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                flag: &self.in_flight,
            })
    }

    fn emit(&self, event: SyncEvent) {
        // No subscribers is fine; notifications are best-effort.
        let _ = self.events.send(event);
    }

    fn set_progress(&self, percent: u8) {
        self.progress.send_replace(percent);
        self.emit(SyncEvent::Progress { percent });
    }

    /// Pull both catalogs for `identity` and overwrite the local mirror.
    ///
    /// Never fails: every error is folded into the returned report. A call
    /// made while another sync is in flight returns `AlreadySyncing` without
    /// touching the backend or the store.
    pub async fn sync(&self, session: &Session, identity: &IdentityContext) -> SyncReport {
        self.sync_in_epoch(session, identity, self.current_epoch()).await
    }

    /// Like [`sync`](Self::sync), for a session read at `epoch`. Writes are
    /// dropped once the epoch has moved on.
    pub(crate) async fn sync_in_epoch(
        &self,
        session: &Session,
        identity: &IdentityContext,
        epoch: u64,
    ) -> SyncReport {
        let Some(_guard) = self.try_acquire() else {
            tracing::debug!(user = %identity.user_id, "sync already in flight");
            self.emit(SyncEvent::AlreadySyncing);
            return SyncReport::already_syncing();
        };

        let started_at = Utc::now();
        tracing::info!(user = %identity.user_id, dataset = ?identity.dataset, "starting full sync");
        self.emit(SyncEvent::Started {
            user_id: identity.user_id,
        });

        let report = self.run(session, identity, started_at, epoch).await;
        self.progress.send_replace(0);

        match (&report.outcome, &report.error) {
            (SyncOutcome::Completed, _) => {
                tracing::info!(
                    customers = ?report.counts.customers,
                    products = ?report.counts.products,
                    skipped = report.counts.skipped,
                    elapsed_ms = report.elapsed().num_milliseconds(),
                    "sync completed"
                );
                self.emit(SyncEvent::Completed {
                    counts: report.counts,
                    elapsed_ms: report.elapsed().num_milliseconds(),
                });
            }
            (SyncOutcome::Partial, Some(err)) => {
                tracing::warn!(error = %err, "sync partially completed");
                self.emit(SyncEvent::Partial {
                    counts: report.counts,
                    error: err.to_string(),
                });
            }
            (_, err) => {
                let error = err
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| "unknown error".to_string());
                tracing::warn!(%error, "sync failed");
                self.emit(SyncEvent::Failed { error });
            }
        }

        report
    }

    async fn run(
        &self,
        session: &Session,
        identity: &IdentityContext,
        started_at: chrono::DateTime<Utc>,
        epoch: u64,
    ) -> SyncReport {
        self.set_progress(0);

        let connectivity = self.prober.probe(Some(session)).await;
        let online = connectivity.is_online();
        match connectivity.error {
            Some(ConnectivityError::Offline(reason)) => {
                return SyncReport::failed(SyncError::Offline(reason), started_at);
            }
            Some(ConnectivityError::Permission(reason)) => {
                return SyncReport::failed(SyncError::Permission(reason), started_at);
            }
            None if !online => {
                return SyncReport::failed(SyncError::Offline("unreachable".into()), started_at);
            }
            None => {}
        }

        let tables = identity.tables();
        let mut counts = SyncCounts::default();
        let mut failures: Vec<(EntityKind, SyncError)> = Vec::new();

        for (index, kind) in EntityKind::ALL.into_iter().enumerate() {
            // Progress is split 50/50 between the two kinds.
            let base = (index as u8) * 50;
            let query = TableQuery {
                table: tables.table_for(kind),
                owner_column: tables.owner_column,
                owner: identity.user_id,
            };

            match self.sync_kind(session, kind, query, base, epoch).await {
                Err(SyncError::NotSignedIn) => {
                    tracing::info!(%kind, "session ended during sync, dropping results");
                    return SyncReport::failed(SyncError::NotSignedIn, started_at);
                }
                Ok(done) => {
                    counts.set(kind, done.written);
                    counts.skipped += done.skipped;
                }
                Err(err) => {
                    tracing::warn!(%kind, error = %err, "kind left at previous snapshot");
                    failures.push((kind, err));
                }
            }
            self.set_progress(base + 50);
        }

        let (outcome, error) = match failures.len() {
            0 => (SyncOutcome::Completed, None),
            1 => {
                let (failed, source) = failures.remove(0);
                (
                    SyncOutcome::Partial,
                    Some(SyncError::PartialSync {
                        failed,
                        source: Box::new(source),
                    }),
                )
            }
            _ => (SyncOutcome::Failed, Some(failures.remove(0).1)),
        };

        SyncReport {
            outcome,
            counts,
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn sync_kind(
        &self,
        session: &Session,
        kind: EntityKind,
        query: TableQuery,
        progress_base: u8,
        epoch: u64,
    ) -> Result<KindSynced, SyncError> {
        let rows = self
            .backend
            .fetch_all(session, query)
            .await
            .map_err(|err| SyncError::from_fetch(kind, err))?;
        self.set_progress(progress_base + 25);

        let (records, skipped) = normalize_rows(schema_for(kind), &rows, query.owner);
        let written = records.len();

        let _lock = self.store_lock.lock().await;
        if self.current_epoch() != epoch {
            return Err(SyncError::NotSignedIn);
        }
        self.store
            .write(kind, query.owner, records)
            .await
            .map_err(|err| SyncError::Store(err.to_string()))?;

        tracing::debug!(%kind, written, skipped, "snapshot replaced");
        Ok(KindSynced { written, skipped })
    }
}

fn schema_for(kind: EntityKind) -> &'static RecordSchema {
    match kind {
        EntityKind::Customers => &CUSTOMER_SCHEMA,
        EntityKind::Products => &PRODUCT_SCHEMA,
    }
}

/// Apply the kind's schema to every row, dropping rows it rejects.
fn normalize_rows(schema: &RecordSchema, rows: &[Value], owner: UserId) -> (Vec<Value>, usize) {
    let mut skipped = 0;
    let records = rows
        .iter()
        .filter_map(|row| match schema.normalize(row) {
            Ok(record) => Some(Value::Object(record)),
            Err(err) => {
                skipped += 1;
                tracing::warn!(kind = %schema.kind, %owner, error = %err, "skipping remote row");
                None
            }
        })
        .collect();
    (records, skipped)
}

/// Log every sync event until the channel closes. Returns how many were logged.
///
/// Falling behind only skips the missed events.
pub async fn log_events(mut events: broadcast::Receiver<SyncEvent>) -> usize {
    let mut logged = 0;
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "event log fell behind");
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => return logged,
        };
        match serde_json::to_string(&event) {
            Ok(line) => tracing::info!(event = %line, "sync event"),
            Err(err) => tracing::warn!(error = %err, "unrenderable sync event"),
        }
        logged += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn guard_resets_flag_on_drop() {
        let flag = AtomicBool::new(true);
        {
            let _guard = InFlightGuard { flag: &flag };
        }
        assert!(!flag.load(Ordering::Acquire));
    }

    #[test]
    fn rows_failing_the_schema_are_counted_not_fatal() {
        let rows = vec![
            json!({ "id": 1, "name": "Bodega Sur" }),
            json!({ "name": "no id" }),
            json!("not an object"),
        ];
        let (records, skipped) = normalize_rows(&CUSTOMER_SCHEMA, &rows, UserId::new());
        assert_eq!(records.len(), 1);
        assert_eq!(skipped, 2);
        assert_eq!(records[0]["contact_person"], json!(""));
    }

    #[test]
    fn forbidden_fetch_maps_to_permission() {
        let err = SyncError::from_fetch(
            EntityKind::Products,
            BackendError::Unauthorized {
                status: 401,
                message: "jwt expired".into(),
            },
        );
        assert!(matches!(err, SyncError::Permission(_)));

        let err = SyncError::from_fetch(EntityKind::Products, BackendError::Timeout);
        assert!(matches!(
            err,
            SyncError::TransientFetch {
                kind: EntityKind::Products,
                ..
            }
        ));
    }

    #[test]
    fn partial_error_names_the_failed_kind() {
        let err = SyncError::PartialSync {
            failed: EntityKind::Products,
            source: Box::new(SyncError::Store("disk full".into())),
        };
        assert_eq!(
            err.to_string(),
            "products could not be synced: local store error: disk full"
        );
    }

    #[tokio::test]
    async fn event_log_survives_falling_behind() {
        let (tx, rx) = broadcast::channel(2);
        for percent in [0, 25, 50, 75] {
            tx.send(SyncEvent::Progress { percent }).unwrap();
        }

        let log = tokio::spawn(log_events(rx));
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        tx.send(SyncEvent::AlreadySyncing).unwrap();
        drop(tx);

        assert_eq!(log.await.unwrap(), 3);
    }
}
