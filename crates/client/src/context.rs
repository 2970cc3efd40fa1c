//! Explicitly constructed client state, shared as `Arc<ClientContext>`.

use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::broadcast;

use salesdesk_auth::{IdentityContext, Session, SessionError};
use salesdesk_core::UserId;

use crate::backend::Backend;
use crate::config::ClientConfig;
use crate::connectivity::ConnectivityProber;
use crate::mirror::{MirrorError, MirrorStore};
use crate::network::NetworkSignal;
use crate::realtime::ChangeFeed;
use crate::sync::SyncOrchestrator;
use crate::types::SyncEvent;

/// Everything the sync subsystem needs, owned in one place.
///
/// There is at most one signed-in session at a time; every read of the
/// mirror is scoped to that session's user.
pub struct ClientContext {
    config: ClientConfig,
    backend: Arc<dyn Backend>,
    store: Arc<dyn MirrorStore>,
    network: NetworkSignal,
    session: RwLock<Option<Session>>,
    orchestrator: SyncOrchestrator,
    changes: ChangeFeed,
}

impl ClientContext {
    pub fn new(
        config: ClientConfig,
        backend: Arc<dyn Backend>,
        store: Arc<dyn MirrorStore>,
        network: NetworkSignal,
    ) -> Self {
        let prober = ConnectivityProber::new(backend.clone(), network.clone(), config.probe_timeout);
        let orchestrator = SyncOrchestrator::new(backend.clone(), store.clone(), prober);

        Self {
            config,
            backend,
            store,
            network,
            session: RwLock::new(None),
            orchestrator,
            changes: ChangeFeed::default(),
        }
    }

    /// Install `session` as the current one, replacing any previous session.
    pub fn sign_in(&self, session: Session) -> Result<(), SessionError> {
        session.validate(Utc::now())?;
        tracing::info!(user = %session.user_id, dataset = ?session.dataset, "signed in");
        let mut current = self.session.write().unwrap_or_else(|e| e.into_inner());
        self.orchestrator.invalidate();
        *current = Some(session);
        Ok(())
    }

    /// Drop the session and clear the signed-out user's mirror.
    ///
    /// A sync still running for that session stops writing; the mirror is
    /// empty once this returns. Returns the user that was signed out, if any.
    pub async fn sign_out(&self) -> Result<Option<UserId>, MirrorError> {
        let previous = {
            let mut current = self.session.write().unwrap_or_else(|e| e.into_inner());
            self.orchestrator.invalidate();
            current.take()
        };

        let Some(session) = previous else {
            return Ok(None);
        };

        self.orchestrator.clear_user(session.user_id).await?;
        tracing::info!(user = %session.user_id, "signed out, local mirror cleared");
        Ok(Some(session.user_id))
    }

    pub fn session(&self) -> Option<Session> {
        self.session
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// The current session with the sync epoch it belongs to.
    pub(crate) fn session_in_epoch(&self) -> Option<(Session, u64)> {
        let current = self.session.read().unwrap_or_else(|e| e.into_inner());
        current
            .clone()
            .map(|session| (session, self.orchestrator.current_epoch()))
    }

    pub fn identity(&self) -> Option<IdentityContext> {
        self.session().map(|s| s.identity())
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn store(&self) -> &Arc<dyn MirrorStore> {
        &self.store
    }

    pub fn network(&self) -> &NetworkSignal {
        &self.network
    }

    pub fn orchestrator(&self) -> &SyncOrchestrator {
        &self.orchestrator
    }

    pub fn changes(&self) -> &ChangeFeed {
        &self.changes
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SyncEvent> {
        self.orchestrator.subscribe()
    }
}
