//! Connectivity detection: ambient link flag + authenticated probe.

use std::sync::Arc;
use std::time::Duration;

use salesdesk_auth::Session;

use crate::backend::{Backend, BackendError};
use crate::network::NetworkSignal;
use crate::types::ConnectivityReport;

/// Classifies backend reachability for the signed-in session.
#[derive(Clone)]
pub struct ConnectivityProber {
    backend: Arc<dyn Backend>,
    network: NetworkSignal,
    timeout: Duration,
}

impl ConnectivityProber {
    pub fn new(backend: Arc<dyn Backend>, network: NetworkSignal, timeout: Duration) -> Self {
        Self {
            backend,
            network,
            timeout,
        }
    }

    pub fn network(&self) -> &NetworkSignal {
        &self.network
    }

    /// Probe the backend.
    ///
    /// With the link down this returns `Offline` without touching the
    /// network. Transport failures and timeouts map to `Offline` (error text
    /// kept for display); 401/403 map to `Online` with a permission error.
    pub async fn probe(&self, session: Option<&Session>) -> ConnectivityReport {
        if !self.network.is_up() {
            tracing::debug!("network link down; skipping probe");
            return ConnectivityReport::offline("network link is down");
        }

        let Some(session) = session else {
            return ConnectivityReport::offline("not signed in");
        };

        let result = match tokio::time::timeout(self.timeout, self.backend.probe(session)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(timeout = ?self.timeout, "connectivity probe timed out");
                return ConnectivityReport::offline(format!(
                    "probe timed out after {} ms",
                    self.timeout.as_millis()
                ));
            }
        };

        match result {
            Ok(()) => ConnectivityReport::online(),
            Err(err @ BackendError::Unauthorized { .. }) => {
                tracing::warn!(error = %err, "backend reachable but access denied");
                ConnectivityReport::permission_denied(err.to_string())
            }
            Err(err) => {
                tracing::warn!(error = %err, "connectivity probe failed");
                ConnectivityReport::offline(err.to_string())
            }
        }
    }
}
