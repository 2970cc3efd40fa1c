//! Fire a callback when the network link comes back.

use std::future::Future;

use tokio::task::JoinHandle;

use crate::network::NetworkSignal;

/// Handle to a running listener. Dropping it stops the listener.
#[derive(Debug)]
pub struct ReconnectListener {
    handle: JoinHandle<()>,
}

impl ReconnectListener {
    /// Call `on_online` once now if the link is already up, then once per
    /// down→up transition. Calls never overlap: the listener awaits each one
    /// before looking at the link again.
    ///
    /// A drop and recovery that both happen while a call is running is
    /// seen through the link's drop counter and fires once afterwards.
    pub fn spawn<F, Fut>(signal: &NetworkSignal, on_online: F) -> Self
    where
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut rx = signal.subscribe();

        let handle = tokio::spawn(async move {
            let mut seen = *rx.borrow_and_update();
            if seen.up {
                tracing::debug!("network up at start");
                on_online().await;
            }

            while rx.changed().await.is_ok() {
                let now = *rx.borrow_and_update();
                let reconnected = now.up && (!seen.up || now.drops != seen.drops);
                seen = now;
                if reconnected {
                    tracing::info!(drops = now.drops, "network reconnected");
                    on_online().await;
                }
            }
        });

        Self { handle }
    }

    pub fn stop(self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl Drop for ReconnectListener {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> std::future::Ready<()> + Send + 'static) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, move || {
            c.fetch_add(1, Ordering::SeqCst);
            std::future::ready(())
        })
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    #[tokio::test]
    async fn fires_at_start_when_up() {
        let signal = NetworkSignal::new(true);
        let (count, cb) = counter();
        let _listener = ReconnectListener::spawn(&signal, cb);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fires_once_per_reconnect() {
        let signal = NetworkSignal::new(false);
        let (count, cb) = counter();
        let _listener = ReconnectListener::spawn(&signal, cb);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);

        signal.set(true);
        settle().await;
        signal.set(true);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        signal.set(false);
        settle().await;
        signal.set(true);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn flap_during_a_slow_callback_fires_again() {
        let signal = NetworkSignal::new(true);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        let _listener = ReconnectListener::spawn(&signal, move || {
            c.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(60))
        });
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // Both edges land while the first call is still sleeping.
        signal.set(false);
        signal.set(true);
        tokio::time::sleep(Duration::from_millis(120)).await;

        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn dropped_listener_stops_firing() {
        let signal = NetworkSignal::new(false);
        let (count, cb) = counter();
        let listener = ReconnectListener::spawn(&signal, cb);
        settle().await;
        drop(listener);

        signal.set(true);
        settle().await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }
}
