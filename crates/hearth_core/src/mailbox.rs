//! Single-slot rendezvous mailbox used to hand negotiated players to `Accept`.
//!
//! A send does not complete until a receiver has taken the item, so at most
//! one item is ever in flight and nothing queues up behind an absent
//! receiver. Senders are served in the order they started waiting.

use crate::latch::CloseLatch;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, Mutex};

/// The mailbox was closed before the hand-off completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("mailbox closed")]
pub struct MailboxClosed;

struct Delivery<T> {
    item: T,
    taken: oneshot::Sender<()>,
}

/// Unbuffered hand-off between producer tasks and blocking receivers.
pub struct Mailbox<T> {
    tx: mpsc::Sender<Delivery<T>>,
    rx: Mutex<mpsc::Receiver<Delivery<T>>>,
    latch: CloseLatch,
}

impl<T: Send> Mailbox<T> {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::channel(1);
        Self {
            tx,
            rx: Mutex::new(rx),
            latch: CloseLatch::new(),
        }
    }

    /// Hands `item` to a receiver, waiting until one takes it.
    ///
    /// Fails if the mailbox is closed before a receiver takes the item. The
    /// item is dropped in that case.
    pub async fn send(&self, item: T) -> Result<(), MailboxClosed> {
        if self.latch.is_closed() {
            return Err(MailboxClosed);
        }

        let permit = tokio::select! {
            biased;
            _ = self.latch.closed() => return Err(MailboxClosed),
            permit = self.tx.reserve() => permit.map_err(|_| MailboxClosed)?,
        };

        let (taken, on_taken) = oneshot::channel();
        permit.send(Delivery { item, taken });

        tokio::select! {
            biased;
            result = on_taken => result.map_err(|_| MailboxClosed),
            _ = self.latch.closed() => Err(MailboxClosed),
        }
    }

    /// Waits for the next item. Returns immediately once the mailbox is closed.
    pub async fn recv(&self) -> Result<T, MailboxClosed> {
        if self.latch.is_closed() {
            return Err(MailboxClosed);
        }

        let mut rx = self.rx.lock().await;
        tokio::select! {
            biased;
            _ = self.latch.closed() => Err(MailboxClosed),
            delivery = rx.recv() => {
                let Delivery { item, taken } = delivery.ok_or(MailboxClosed)?;
                // The sender gives up only when the mailbox closes.
                taken.send(()).map_err(|_| MailboxClosed)?;
                Ok(item)
            }
        }
    }

    /// Closes the mailbox. Pending and future sends and receives fail.
    /// Returns `true` for the call that actually closed it.
    pub fn close(&self) -> bool {
        self.latch.close()
    }

    pub fn is_closed(&self) -> bool {
        self.latch.is_closed()
    }
}

impl<T: Send> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
