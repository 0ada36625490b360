//! One-shot initial-sync completion signal.
//!
//! Consumers that need a consistent baseline (every room's initial state
//! loaded) wait on the gate instead of polling. The gate resolves once; the
//! first payload is kept and later signals are ignored. Waiters created
//! after resolution see the payload immediately.

use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

/// Gate errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    /// The gate was dropped without ever resolving.
    #[error("Initial sync gate closed before completion")]
    Closed,
}

/// Single-resolution completion signal carrying a payload.
#[derive(Debug)]
pub struct InitialSyncGate<P> {
    tx: watch::Sender<Option<P>>,
}

impl<P: Clone> InitialSyncGate<P> {
    /// Create an unresolved gate.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx }
    }

    /// Resolve the gate with `payload`.
    ///
    /// Returns `true` if this call resolved it, `false` if it was already
    /// resolved (the payload is discarded).
    pub fn signal_complete(&self, payload: P) -> bool {
        let mut payload = Some(payload);
        let resolved = self.tx.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = payload.take();
            true
        });

        if resolved {
            info!(waiters = self.tx.receiver_count(), "Initial sync complete");
        } else {
            debug!("Initial sync already complete, ignoring signal");
        }
        resolved
    }

    /// Check whether the gate has resolved.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.tx.borrow().is_some()
    }

    /// Get a handle that yields the payload once the gate resolves.
    #[must_use]
    pub fn waiter(&self) -> SyncWaiter<P> {
        SyncWaiter {
            rx: self.tx.subscribe(),
        }
    }
}

impl<P: Clone> Default for InitialSyncGate<P> {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle on an [`InitialSyncGate`].
#[derive(Debug, Clone)]
pub struct SyncWaiter<P> {
    rx: watch::Receiver<Option<P>>,
}

impl<P: Clone> SyncWaiter<P> {
    /// Wait for the gate to resolve and return its payload.
    ///
    /// # Errors
    ///
    /// Returns [`GateError::Closed`] if the gate is dropped unresolved.
    pub async fn completed(&mut self) -> Result<P, GateError> {
        let slot = self
            .rx
            .wait_for(Option::is_some)
            .await
            .map_err(|_| GateError::Closed)?;
        slot.as_ref().cloned().ok_or(GateError::Closed)
    }

    /// Get the payload without waiting.
    #[must_use]
    pub fn try_get(&self) -> Option<P> {
        self.rx.borrow().clone()
    }
}
