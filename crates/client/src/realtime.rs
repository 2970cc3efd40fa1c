//! Realtime change notifications.
//!
//! A backend adapter (websocket, SSE, a test) publishes row-change events
//! into a [`ChangeFeed`]. [`RefreshOnChange`] turns events on mirrored tables
//! into debounced re-syncs, so a burst of changes costs one full sync.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::status::SyncStatus;

const FEED_CAPACITY: usize = 256;

/// Table name meaning "something changed, unknown where".
pub const ANY_TABLE: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: String,
    pub change: ChangeKind,
}

impl ChangeEvent {
    pub fn new(table: impl Into<String>, change: ChangeKind) -> Self {
        Self {
            table: table.into(),
            change,
        }
    }
}

/// In-process broadcast hub for change events.
#[derive(Debug, Clone)]
pub struct ChangeFeed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeFeed {
    fn default() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Self { tx }
    }
}

impl ChangeFeed {
    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: ChangeEvent) -> usize {
        tracing::trace!(table = %event.table, change = ?event.change, "change published");
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end of a [`ChangeFeed`]; dropping it unsubscribes.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Next event, or `None` once the feed is gone.
    ///
    /// If this subscriber fell behind and events were dropped, a single
    /// wildcard event on [`ANY_TABLE`] stands in for them.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        match self.rx.recv().await {
            Ok(event) => Some(event),
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "change subscription lagged");
                Some(ChangeEvent::new(ANY_TABLE, ChangeKind::Update))
            }
            Err(broadcast::error::RecvError::Closed) => None,
        }
    }
}

/// Background task re-syncing when a mirrored table changes.
#[derive(Debug)]
pub struct RefreshOnChange {
    handle: JoinHandle<()>,
}

impl RefreshOnChange {
    pub fn spawn(feed: &ChangeFeed, status: Arc<SyncStatus>, debounce: Duration) -> Self {
        let mut subscription = feed.subscribe();

        let handle = tokio::spawn(async move {
            tracing::debug!(?debounce, "refresh-on-change started");

            'outer: loop {
                let Some(event) = subscription.recv().await else {
                    break;
                };
                if !is_mirrored(&status, &event) {
                    continue;
                }

                // Absorb the rest of the burst.
                let deadline = tokio::time::Instant::now() + debounce;
                let mut closed = false;
                loop {
                    match tokio::time::timeout_at(deadline, subscription.recv()).await {
                        Ok(Some(_)) => continue,
                        Ok(None) => {
                            closed = true;
                            break;
                        }
                        Err(_) => break,
                    }
                }

                tracing::info!(table = %event.table, "remote change, re-syncing");
                let report = status.trigger_sync().await;
                tracing::debug!(outcome = ?report.outcome, "change-driven sync finished");

                if closed {
                    break 'outer;
                }
            }

            tracing::debug!("refresh-on-change stopped");
        });

        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for RefreshOnChange {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn is_mirrored(status: &SyncStatus, event: &ChangeEvent) -> bool {
    if event.table == ANY_TABLE {
        return true;
    }
    status
        .context()
        .identity()
        .is_some_and(|identity| identity.tables().kind_for(&event.table).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropping_a_subscription_unsubscribes() {
        let feed = ChangeFeed::default();
        let sub = feed.subscribe();
        assert_eq!(feed.receiver_count(), 1);
        drop(sub);
        assert_eq!(feed.receiver_count(), 0);
        assert_eq!(feed.publish(ChangeEvent::new("customers", ChangeKind::Insert)), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_gets_a_wildcard() {
        let (tx, _) = broadcast::channel(1);
        let feed = ChangeFeed { tx };
        let mut sub = feed.subscribe();

        feed.publish(ChangeEvent::new("customers", ChangeKind::Insert));
        feed.publish(ChangeEvent::new("products", ChangeKind::Delete));

        let first = sub.recv().await.unwrap();
        assert_eq!(first.table, ANY_TABLE);
        let second = sub.recv().await.unwrap();
        assert_eq!(second, ChangeEvent::new("products", ChangeKind::Delete));
    }

    #[tokio::test]
    async fn closed_feed_ends_the_subscription() {
        let feed = ChangeFeed::default();
        let mut sub = feed.subscribe();
        drop(feed);
        assert_eq!(sub.recv().await, None);
    }
}
