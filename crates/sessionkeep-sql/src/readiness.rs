//! One-shot readiness barrier
//!
//! Every store operation waits here before touching the database. The
//! barrier is created together with the store: already open when cleanup is
//! disabled, otherwise opened by the cleanup task once its first sweep has
//! finished, successfully or not.

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// First sweep still running
    Pending,
    /// First sweep succeeded, or no sweep was configured
    Ready,
    /// First sweep failed or never reported; operations proceed anyway
    Degraded,
}

/// Waiting side of the barrier, shared by all store clones
#[derive(Debug, Clone)]
pub struct ReadinessBarrier {
    rx: watch::Receiver<Readiness>,
}

/// Opening side of the barrier, consumed by the first signal
#[derive(Debug)]
pub struct ReadinessSignal {
    tx: watch::Sender<Readiness>,
}

impl ReadinessBarrier {
    /// A barrier that is open from the start
    pub fn ready() -> Self {
        let (_tx, rx) = watch::channel(Readiness::Ready);
        Self { rx }
    }

    /// A closed barrier and the signal that opens it
    pub fn pending() -> (Self, ReadinessSignal) {
        let (tx, rx) = watch::channel(Readiness::Pending);
        (Self { rx }, ReadinessSignal { tx })
    }

    /// Current state without waiting
    pub fn state(&self) -> Readiness {
        *self.rx.borrow()
    }

    /// Wait until the barrier opens
    ///
    /// If the signal is dropped without being sent (the cleanup task was
    /// aborted or its runtime shut down) the barrier opens as `Degraded`.
    pub async fn wait(&self) -> Readiness {
        let mut rx = self.rx.clone();
        match rx.wait_for(|state| *state != Readiness::Pending).await {
            Ok(state) => *state,
            Err(_) => {
                tracing::warn!("Session cleanup ended before its first sweep; continuing without it");
                Readiness::Degraded
            }
        }
    }
}

impl ReadinessSignal {
    pub fn open(self, state: Readiness) {
        self.tx.send_replace(state);
    }
}
