//! # Subscription
//!
//! Defines the listening side of the bus.

use crate::envelope::Envelope;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::debug;
use uuid::Uuid;

/// A listener on one channel handle.
///
/// Skips envelopes published by its own handle and ends once that handle
/// closes.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<Envelope>,

    /// Handle this subscription belongs to.
    owner: Uuid,

    /// Close signal of the owning handle.
    closed: watch::Receiver<bool>,

    /// Listener count of the owning handle (for cleanup).
    own_listeners: Arc<AtomicUsize>,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<Envelope>,
        owner: Uuid,
        closed: watch::Receiver<bool>,
        own_listeners: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            receiver,
            owner,
            closed,
            own_listeners,
        }
    }

    /// Receive the next envelope published by another handle.
    ///
    /// # Returns
    ///
    /// - `Some(envelope)` - The next message from a peer
    /// - `None` - The owning handle was closed
    pub async fn recv(&mut self) -> Option<Envelope> {
        loop {
            if *self.closed.borrow() {
                return None;
            }

            let envelope = tokio::select! {
                biased;
                changed = self.closed.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                    continue;
                }
                received = self.receiver.recv() => match received {
                    Ok(envelope) => envelope,
                    Err(broadcast::error::RecvError::Closed) => return None,
                    Err(broadcast::error::RecvError::Lagged(count)) => {
                        debug!(lagged = count, "Listener lagged, some messages dropped");
                        continue;
                    }
                },
            };

            if envelope.origin != self.owner {
                return Some(envelope);
            }
            // Own message, keep waiting
        }
    }

    /// Try to receive the next peer envelope without waiting.
    ///
    /// # Returns
    ///
    /// - `Some(envelope)` - A peer message was available
    /// - `None` - Nothing available, or the handle was closed
    pub fn try_recv(&mut self) -> Option<Envelope> {
        loop {
            if *self.closed.borrow() {
                return None;
            }

            let envelope = match self.receiver.try_recv() {
                Ok(envelope) => envelope,
                Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => return None,
            };

            if envelope.origin != self.owner {
                return Some(envelope);
            }
        }
    }

    /// Handle this subscription listens for.
    #[must_use]
    pub fn owner(&self) -> Uuid {
        self.owner
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.own_listeners.fetch_sub(1, Ordering::Relaxed);
        debug!(handle = %self.owner, "Subscription dropped");
    }
}
