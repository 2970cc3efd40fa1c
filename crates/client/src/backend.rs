//! Seam to the hosted backend.
//!
//! The sync subsystem only needs two primitives: an authenticated probe and
//! "fetch every row of table T owned by user U". Anything that can answer
//! those (the REST adapter, a test double) implements [`Backend`].

use async_trait::async_trait;
use thiserror::Error;

use salesdesk_auth::Session;
use salesdesk_core::UserId;

/// A raw row as the backend returns it.
pub type RemoteRow = serde_json::Value;

/// An owner-filtered full-table read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableQuery {
    pub table: &'static str,
    pub owner_column: &'static str,
    pub owner: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("request timed out")]
    Timeout,
    #[error("not authorized ({status}): {message}")]
    Unauthorized { status: u16, message: String },
    #[error("backend error ({0}): {1}")]
    Status(u16, String),
    #[error("decode error: {0}")]
    Decode(String),
}

impl BackendError {
    /// The backend was reached but refused this account.
    pub fn is_permission(&self) -> bool {
        matches!(self, BackendError::Unauthorized { .. })
    }

    /// The backend could not be reached (or is down).
    pub fn is_connectivity(&self) -> bool {
        match self {
            BackendError::Transport(_) | BackendError::Timeout => true,
            BackendError::Status(code, _) => *code >= 500,
            BackendError::Unauthorized { .. } | BackendError::Decode(_) => false,
        }
    }
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Lightweight authenticated round-trip. Callers bound it with a timeout.
    async fn probe(&self, session: &Session) -> Result<(), BackendError>;

    /// Single bulk read of every row matching `query`; no pagination cursor.
    async fn fetch_all(
        &self,
        session: &Session,
        query: TableQuery,
    ) -> Result<Vec<RemoteRow>, BackendError>;
}
