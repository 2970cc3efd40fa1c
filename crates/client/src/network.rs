//! Ambient "network available" flag.
//!
//! The host platform (OS reachability API, browser `navigator.onLine`, a
//! test) owns the truth and calls [`NetworkSignal::set`]; the sync subsystem
//! only reads it and watches its transitions.

use std::sync::Arc;

use tokio::sync::watch;

/// Current link state plus how many times it has gone down.
///
/// `watch` only keeps the latest value, so a quick down→up flap can be
/// merged into one update. `drops` still moves in that case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkState {
    pub up: bool,
    pub drops: u64,
}

#[derive(Debug, Clone)]
pub struct NetworkSignal {
    tx: Arc<watch::Sender<LinkState>>,
}

impl NetworkSignal {
    pub fn new(initially_up: bool) -> Self {
        let (tx, _rx) = watch::channel(LinkState {
            up: initially_up,
            drops: 0,
        });
        Self { tx: Arc::new(tx) }
    }

    pub fn is_up(&self) -> bool {
        self.tx.borrow().up
    }

    /// Record the link state. Watchers are only woken on an actual change.
    pub fn set(&self, up: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if current.up == up {
                return false;
            }
            current.up = up;
            if !up {
                current.drops += 1;
            }
            true
        });

        if changed {
            tracing::info!(up, "network link changed");
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.tx.subscribe()
    }
}

impl Default for NetworkSignal {
    fn default() -> Self {
        Self::new(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn redundant_sets_do_not_wake_watchers() {
        let signal = NetworkSignal::new(true);
        let mut rx = signal.subscribe();

        signal.set(true);
        assert!(!rx.has_changed().unwrap());

        signal.set(false);
        assert!(rx.has_changed().unwrap());
        assert!(!rx.borrow_and_update().up);
        assert!(!signal.is_up());
    }

    #[tokio::test]
    async fn merged_flap_still_counts_the_drop() {
        let signal = NetworkSignal::new(true);
        let mut rx = signal.subscribe();

        signal.set(false);
        signal.set(true);

        let state = *rx.borrow_and_update();
        assert_eq!(state, LinkState { up: true, drops: 1 });
    }
}
