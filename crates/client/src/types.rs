//! Shared types for the sync subsystem and whatever UI consumes it.
//!
//! Everything here is plain data (serializable, no tokio/sqlx handles) so a
//! frontend can receive it as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use salesdesk_core::{EntityKind, UserId};

use crate::sync::SyncError;

/// Connectivity state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectivityState {
    /// A probe is in progress.
    Checking,
    /// The backend answered the probe.
    Online,
    /// Network unreachable or backend unavailable.
    Offline,
}

/// Why the last probe did not come back clean.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "class", content = "message", rename_all = "lowercase")]
pub enum ConnectivityError {
    /// No route to the backend (link down, DNS, timeout, 5xx).
    #[error("no connectivity: {0}")]
    Offline(String),
    /// Backend reachable but refused the request for this account.
    #[error("insufficient permissions: {0}")]
    Permission(String),
}

/// Outcome of one connectivity probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectivityReport {
    pub state: ConnectivityState,
    pub error: Option<ConnectivityError>,
    pub checked_at: DateTime<Utc>,
}

impl ConnectivityReport {
    pub fn online() -> Self {
        Self {
            state: ConnectivityState::Online,
            error: None,
            checked_at: Utc::now(),
        }
    }

    pub fn offline(reason: impl Into<String>) -> Self {
        Self {
            state: ConnectivityState::Offline,
            error: Some(ConnectivityError::Offline(reason.into())),
            checked_at: Utc::now(),
        }
    }

    /// Connected, but the account may not read the data.
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self {
            state: ConnectivityState::Online,
            error: Some(ConnectivityError::Permission(reason.into())),
            checked_at: Utc::now(),
        }
    }

    pub fn is_online(&self) -> bool {
        self.state == ConnectivityState::Online
    }

    /// Online with no permission problem.
    pub fn can_sync(&self) -> bool {
        self.is_online() && self.error.is_none()
    }
}

/// Per-kind counts of a sync. `None` means that kind was not written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCounts {
    pub customers: Option<usize>,
    pub products: Option<usize>,
    /// Remote rows rejected by the record schema (missing required fields).
    pub skipped: usize,
}

impl SyncCounts {
    pub fn get(&self, kind: EntityKind) -> Option<usize> {
        match kind {
            EntityKind::Customers => self.customers,
            EntityKind::Products => self.products,
        }
    }

    pub(crate) fn set(&mut self, kind: EntityKind, count: usize) {
        match kind {
            EntityKind::Customers => self.customers = Some(count),
            EntityKind::Products => self.products = Some(count),
        }
    }
}

/// How a sync call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    /// Both kinds fetched and written.
    Completed,
    /// One kind written, the other left at its previous snapshot.
    Partial,
    /// Nothing written.
    Failed,
    /// Another sync was in flight; this call did nothing.
    AlreadySyncing,
}

/// Result of a sync call. Sync never returns `Err`; failures live here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub outcome: SyncOutcome,
    pub counts: SyncCounts,
    pub error: Option<SyncError>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    pub fn success(&self) -> bool {
        self.outcome == SyncOutcome::Completed
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at.signed_duration_since(self.started_at)
    }

    pub(crate) fn already_syncing() -> Self {
        let now = Utc::now();
        Self {
            outcome: SyncOutcome::AlreadySyncing,
            counts: SyncCounts::default(),
            error: None,
            started_at: now,
            finished_at: now,
        }
    }

    pub(crate) fn failed(error: SyncError, started_at: DateTime<Utc>) -> Self {
        Self {
            outcome: SyncOutcome::Failed,
            counts: SyncCounts::default(),
            error: Some(error),
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// User-facing notifications emitted while syncing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SyncEvent {
    Started { user_id: UserId },
    Progress { percent: u8 },
    Completed { counts: SyncCounts, elapsed_ms: i64 },
    Partial { counts: SyncCounts, error: String },
    Failed { error: String },
    AlreadySyncing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_report_is_online_but_cannot_sync() {
        let report = ConnectivityReport::permission_denied("403");
        assert!(report.is_online());
        assert!(!report.can_sync());
    }

    #[test]
    fn connectivity_error_serializes_with_class() {
        let json = serde_json::to_value(ConnectivityError::Permission("nope".into())).unwrap();
        assert_eq!(json, serde_json::json!({ "class": "permission", "message": "nope" }));
    }

    #[test]
    fn counts_are_indexed_by_kind() {
        let mut counts = SyncCounts::default();
        counts.set(EntityKind::Products, 4);
        assert_eq!(counts.get(EntityKind::Products), Some(4));
        assert_eq!(counts.get(EntityKind::Customers), None);
    }
}
