//! One-way close flag that tasks can wait on.

use std::sync::Arc;
use tokio::sync::watch;

/// A flag that starts open and can be closed exactly once.
///
/// Clones share the same flag. Waiting on [`CloseLatch::closed`] is cancel-safe,
/// so it can sit in a `tokio::select!` next to the work it interrupts.
#[derive(Debug, Clone)]
pub struct CloseLatch {
    tx: Arc<watch::Sender<bool>>,
}

impl CloseLatch {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Closes the latch. Returns `true` only for the call that closed it.
    pub fn close(&self) -> bool {
        self.tx.send_if_modified(|closed| {
            if *closed {
                false
            } else {
                *closed = true;
                true
            }
        })
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }

    /// Resolves once the latch is closed. Returns immediately if it already is.
    pub async fn closed(&self) {
        let mut rx = self.tx.subscribe();
        loop {
            let closed = *rx.borrow_and_update();
            if closed {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

impl Default for CloseLatch {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::time::timeout;

    #[test]
    fn test_close_reports_first_caller_only() {
        let latch = CloseLatch::new();
        assert!(!latch.is_closed());
        assert!(latch.close());
        assert!(!latch.close());
        assert!(latch.clone().is_closed());
    }

    #[tokio::test]
    async fn test_waiters_wake_on_close() {
        let latch = CloseLatch::new();
        let waiter = {
            let latch = latch.clone();
            tokio::spawn(async move { latch.closed().await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        latch.close();
        timeout(Duration::from_secs(1), waiter)
            .await
            .expect("waiter should wake")
            .unwrap();

        // Already closed: resolves without blocking.
        timeout(Duration::from_millis(50), latch.closed())
            .await
            .expect("closed latch should resolve immediately");
    }
}
