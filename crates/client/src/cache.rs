//! SQLite-backed local mirror (offline support).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tokio::sync::Mutex;

use salesdesk_core::{EntityKind, UserId};

use crate::mirror::{MirrorError, MirrorStore};

/// SQLite mirror store.
///
/// Each `(user, kind)` snapshot is one row holding the JSON array of records,
/// so replacing a snapshot is a single-row upsert. The snapshot and the user's
/// last-sync instant are written in one transaction.
#[derive(Debug, Clone)]
pub struct SqliteMirrorStore {
    path: PathBuf,
    /// Lazily-initialised pool, shared by all clones of the handle.
    pool: Arc<Mutex<Option<SqlitePool>>>,
}

impl SqliteMirrorStore {
    /// Create a store at `path` (the database is opened on first use).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool: Arc::new(Mutex::new(None)),
        }
    }

    /// Store at `{app_data_dir}/salesdesk/mirror.db`.
    pub fn at_default_location() -> anyhow::Result<Self> {
        Ok(Self::new(mirror_db_path()?))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn ensure_initialized(&self) -> anyhow::Result<SqlitePool> {
        let mut pool_guard = self.pool.lock().await;
        if let Some(pool) = pool_guard.as_ref() {
            return Ok(pool.clone());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create mirror directory at {:?}", parent))?;
        }

        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await
            .with_context(|| format!("failed to open SQLite mirror at {:?}", self.path))?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mirror_entries (
                user_id      TEXT NOT NULL,
                kind         TEXT NOT NULL,
                data         TEXT NOT NULL,
                record_count INTEGER NOT NULL,
                written_at   TEXT NOT NULL,
                PRIMARY KEY (user_id, kind)
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create mirror_entries table")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sync_state (
                user_id      TEXT PRIMARY KEY NOT NULL,
                last_sync_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .context("failed to create sync_state table")?;

        *pool_guard = Some(pool.clone());
        Ok(pool)
    }

    async fn write_snapshot(
        &self,
        kind: EntityKind,
        user: UserId,
        records: &[Value],
    ) -> anyhow::Result<DateTime<Utc>> {
        let pool = self.ensure_initialized().await?;

        let payload =
            serde_json::to_string(records).context("failed to serialize snapshot for mirror")?;
        let now = Utc::now();
        let stamp = now.to_rfc3339_opts(SecondsFormat::Nanos, true);
        let key_user = user.to_string();

        let mut tx = pool.begin().await.context("failed to begin mirror write")?;

        sqlx::query(
            r#"
            INSERT INTO mirror_entries (user_id, kind, data, record_count, written_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(user_id, kind)
            DO UPDATE SET
                data = excluded.data,
                record_count = excluded.record_count,
                written_at = excluded.written_at
            "#,
        )
        .bind(&key_user)
        .bind(kind.as_str())
        .bind(&payload)
        .bind(records.len() as i64)
        .bind(&stamp)
        .execute(&mut *tx)
        .await
        .context("failed to upsert mirror snapshot")?;

        sqlx::query(
            r#"
            INSERT INTO sync_state (user_id, last_sync_at)
            VALUES (?1, ?2)
            ON CONFLICT(user_id)
            DO UPDATE SET last_sync_at = excluded.last_sync_at
            "#,
        )
        .bind(&key_user)
        .bind(&stamp)
        .execute(&mut *tx)
        .await
        .context("failed to update last sync timestamp")?;

        tx.commit().await.context("failed to commit mirror write")?;
        Ok(now)
    }

    async fn read_snapshot(&self, kind: EntityKind, user: UserId) -> anyhow::Result<Vec<Value>> {
        let pool = self.ensure_initialized().await?;

        let row = sqlx::query(
            r#"
            SELECT data
            FROM mirror_entries
            WHERE user_id = ?1
              AND kind = ?2
            "#,
        )
        .bind(user.to_string())
        .bind(kind.as_str())
        .fetch_optional(&pool)
        .await
        .context("failed to fetch mirror snapshot")?;

        let row = match row {
            Some(row) => row,
            None => return Ok(Vec::new()),
        };

        let data: String = row.try_get("data")?;
        serde_json::from_str(&data).context("failed to deserialize mirror snapshot")
    }
}

#[async_trait]
impl MirrorStore for SqliteMirrorStore {
    async fn write(
        &self,
        kind: EntityKind,
        user: UserId,
        records: Vec<Value>,
    ) -> Result<DateTime<Utc>, MirrorError> {
        self.write_snapshot(kind, user, &records).await.map_err(|err| {
            tracing::error!(%kind, %user, "failed to write mirror snapshot: {err:?}");
            MirrorError::from(err)
        })
    }

    async fn read(&self, kind: EntityKind, user: UserId) -> Result<Vec<Value>, MirrorError> {
        Ok(self.read_snapshot(kind, user).await?)
    }

    async fn has_data(&self, user: UserId) -> Result<bool, MirrorError> {
        let pool = self.ensure_initialized().await?;

        let populated = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM mirror_entries
            WHERE user_id = ?1
              AND record_count > 0
            "#,
        )
        .bind(user.to_string())
        .fetch_one(&pool)
        .await
        .context("failed to count mirror snapshots")?;

        Ok(populated as usize == EntityKind::ALL.len())
    }

    async fn clear(&self, user: UserId) -> Result<(), MirrorError> {
        let pool = self.ensure_initialized().await?;
        let key_user = user.to_string();

        let result = async {
            let mut tx = pool.begin().await?;
            sqlx::query("DELETE FROM mirror_entries WHERE user_id = ?1")
                .bind(&key_user)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM sync_state WHERE user_id = ?1")
                .bind(&key_user)
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok::<(), anyhow::Error>(())
        }
        .await;

        result
            .context("failed to clear mirror for user")
            .map_err(MirrorError::from)
    }

    async fn last_sync(&self, user: UserId) -> Result<Option<DateTime<Utc>>, MirrorError> {
        let pool = self.ensure_initialized().await?;

        let stamp: Option<String> =
            sqlx::query_scalar::<_, String>("SELECT last_sync_at FROM sync_state WHERE user_id = ?1")
                .bind(user.to_string())
                .fetch_optional(&pool)
                .await
                .context("failed to fetch last sync timestamp")?;

        stamp
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|dt| dt.with_timezone(&Utc))
                    .context("invalid last_sync_at timestamp in mirror")
            })
            .transpose()
            .map_err(MirrorError::from)
    }
}

/// Resolve the path to the SQLite mirror database:
/// `{app_data_dir}/salesdesk/mirror.db`.
fn mirror_db_path() -> anyhow::Result<PathBuf> {
    let base = dirs::data_dir()
        .or_else(|| {
            dirs::home_dir().map(|mut h| {
                h.push(".local");
                h.push("share");
                h
            })
        })
        .context("failed to resolve OS app data directory - tried data_dir() and home_dir()/.local/share")?;

    let mut dir = base;
    dir.push("salesdesk");
    dir.push("mirror.db");
    Ok(dir)
}
