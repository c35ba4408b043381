//! Run cancellation
//!
//! A [`CancelHandle`] flips a `watch` channel; every [`Cancellation`] clone
//! observes it. A cancellation may also carry a deadline. Both are only
//! polled between corrections, never while a provider call is in flight.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Create a linked handle/token pair
pub fn cancellation() -> (CancelHandle, Cancellation) {
    let (tx, rx) = watch::channel(false);
    (
        CancelHandle { tx },
        Cancellation {
            rx: Some(rx),
            deadline: None,
        },
    )
}

/// Operator side: requests cancellation
#[derive(Debug, Clone)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Request cancellation; idempotent
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Worker side: polled between corrections
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    rx: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// A token that is never cancelled
    pub fn never() -> Self {
        Self::default()
    }

    /// Also cancel once `timeout` has elapsed from now
    pub fn with_deadline(mut self, timeout: Duration) -> Self {
        let at = Instant::now() + timeout;
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(at),
            None => at,
        });
        self
    }

    /// Whether work that has not started yet should be skipped
    pub fn is_cancelled(&self) -> bool {
        let requested = self.rx.as_ref().is_some_and(|rx| *rx.borrow());
        let expired = self.deadline.is_some_and(|at| Instant::now() >= at);
        requested || expired
    }
}
