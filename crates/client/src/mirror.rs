//! Local mirror of the signed-in user's catalogs.
//!
//! One snapshot per `(user, kind)` plus one last-sync instant per user.
//! Writes replace the whole snapshot (last write wins); readers never see a
//! half-written list.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use salesdesk_core::{EntityKind, UserId};
use salesdesk_parties::CustomerRecord;
use salesdesk_products::ProductRecord;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MirrorError {
    #[error("storage error: {0}")]
    Storage(String),
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<anyhow::Error> for MirrorError {
    fn from(err: anyhow::Error) -> Self {
        MirrorError::Storage(format!("{err:#}"))
    }
}

#[async_trait]
pub trait MirrorStore: Send + Sync {
    /// Replace the `(kind, user)` snapshot and stamp the user's last sync.
    ///
    /// Returns the instant recorded as the last sync.
    async fn write(
        &self,
        kind: EntityKind,
        user: UserId,
        records: Vec<Value>,
    ) -> Result<DateTime<Utc>, MirrorError>;

    /// Last-written snapshot, or empty if none exists.
    async fn read(&self, kind: EntityKind, user: UserId) -> Result<Vec<Value>, MirrorError>;

    /// Both customers and products snapshots are non-empty.
    async fn has_data(&self, user: UserId) -> Result<bool, MirrorError> {
        for kind in EntityKind::ALL {
            if self.read(kind, user).await?.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Remove both snapshots and the timestamp (sign-out).
    async fn clear(&self, user: UserId) -> Result<(), MirrorError>;

    async fn last_sync(&self, user: UserId) -> Result<Option<DateTime<Utc>>, MirrorError>;
}

async fn read_typed<T: DeserializeOwned>(
    store: &dyn MirrorStore,
    kind: EntityKind,
    user: UserId,
) -> Result<Vec<T>, MirrorError> {
    store
        .read(kind, user)
        .await?
        .into_iter()
        .map(|v| serde_json::from_value(v).map_err(|e| MirrorError::Serialization(e.to_string())))
        .collect()
}

/// Cached customers for offline display.
pub async fn customers(
    store: &dyn MirrorStore,
    user: UserId,
) -> Result<Vec<CustomerRecord>, MirrorError> {
    read_typed(store, EntityKind::Customers, user).await
}

/// Cached products for offline display.
pub async fn products(
    store: &dyn MirrorStore,
    user: UserId,
) -> Result<Vec<ProductRecord>, MirrorError> {
    read_typed(store, EntityKind::Products, user).await
}

/// Cached customers that can take new orders.
pub async fn orderable_customers(
    store: &dyn MirrorStore,
    user: UserId,
) -> Result<Vec<CustomerRecord>, MirrorError> {
    let mut records = customers(store, user).await?;
    records.retain(CustomerRecord::can_order);
    Ok(records)
}

/// Cached products that are active and priced.
pub async fn sellable_products(
    store: &dyn MirrorStore,
    user: UserId,
) -> Result<Vec<ProductRecord>, MirrorError> {
    let mut records = products(store, user).await?;
    records.retain(ProductRecord::can_be_sold);
    Ok(records)
}

#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<(UserId, EntityKind), Vec<Value>>,
    last_sync: HashMap<UserId, DateTime<Utc>>,
}

/// In-memory mirror for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryMirrorStore {
    inner: RwLock<Inner>,
}

impl InMemoryMirrorStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> MirrorError {
        MirrorError::Storage("in-memory mirror lock poisoned".to_string())
    }
}

#[async_trait]
impl MirrorStore for InMemoryMirrorStore {
    async fn write(
        &self,
        kind: EntityKind,
        user: UserId,
        records: Vec<Value>,
    ) -> Result<DateTime<Utc>, MirrorError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        let now = Utc::now();
        inner.entries.insert((user, kind), records);
        inner.last_sync.insert(user, now);
        Ok(now)
    }

    async fn read(&self, kind: EntityKind, user: UserId) -> Result<Vec<Value>, MirrorError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner.entries.get(&(user, kind)).cloned().unwrap_or_default())
    }

    async fn clear(&self, user: UserId) -> Result<(), MirrorError> {
        let mut inner = self.inner.write().map_err(|_| Self::poisoned())?;
        inner.entries.retain(|(owner, _), _| *owner != user);
        inner.last_sync.remove(&user);
        Ok(())
    }

    async fn last_sync(&self, user: UserId) -> Result<Option<DateTime<Utc>>, MirrorError> {
        let inner = self.inner.read().map_err(|_| Self::poisoned())?;
        Ok(inner.last_sync.get(&user).copied())
    }
}
