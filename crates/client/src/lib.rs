//! `salesdesk-client`
//!
//! **Responsibility:** Offline-capable client sync for the sales catalogs.
//!
//! This crate provides:
//! - Connectivity detection (link flag + authenticated probe)
//! - A per-user local mirror of customers and products (SQLite or in-memory)
//! - Full remote → local sync with partial-failure isolation
//! - An observable status facade plus reconnect, periodic and realtime triggers
//!
//! The backend stays the source of truth; the mirror is read-only offline.

pub mod backend;
pub mod cache;
pub mod config;
pub mod connectivity;
pub mod context;
pub mod mirror;
pub mod network;
pub mod realtime;
pub mod reconnect;
pub mod rest;
pub mod status;
pub mod sync;
pub mod types;
pub mod worker;

pub use backend::{Backend, BackendError, RemoteRow, TableQuery};
pub use cache::SqliteMirrorStore;
pub use config::{ClientConfig, ConfigError};
pub use connectivity::ConnectivityProber;
pub use context::ClientContext;
pub use mirror::{InMemoryMirrorStore, MirrorError, MirrorStore};
pub use network::NetworkSignal;
pub use realtime::{ChangeEvent, ChangeFeed, ChangeKind, RefreshOnChange, Subscription};
pub use reconnect::ReconnectListener;
pub use rest::RestBackend;
pub use status::{StatusSnapshot, SyncStatus, format_relative};
pub use sync::{SyncError, SyncOrchestrator, log_events};
pub use types::{
    ConnectivityError, ConnectivityReport, ConnectivityState, SyncCounts, SyncEvent, SyncOutcome,
    SyncReport,
};
pub use worker::PeriodicCheck;
