//! Cooperative cancellation primitives.
//!
//! A [`CancelHandle`] owns the cancel signal; any number of cloned
//! [`CancelToken`]s observe it. Cancellation is cooperative: the collector
//! checks its token at loop checkpoints and during the inter-page sleep, and
//! storage sinks watch the token inside their streaming loops.
//!
//! Dropping the handle without cancelling never cancels outstanding tokens;
//! waiters simply park forever, which keeps `select!` arms well-behaved.

use tokio::sync::watch;

/// Owning side of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Creates a fresh, uncancelled signal.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// Returns a token observing this handle.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Fires the signal. Idempotent.
    pub fn cancel(&self) {
        // send_replace never fails even with no live receivers.
        let _ = self.tx.send_replace(true);
    }

    /// Returns true if `cancel` has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Observer side of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Returns true if the signal has fired.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves when the signal fires.
    ///
    /// If the handle is dropped without cancelling, this future never
    /// resolves, so it is safe to race against work in `select!`.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        if *rx.borrow() {
            return;
        }
        while rx.changed().await.is_ok() {
            if *rx.borrow() {
                return;
            }
        }
        // Handle dropped uncancelled: park forever.
        std::future::pending::<()>().await;
    }
}
