//! # Broadcast Hub and Channels
//!
//! Defines the publishing side of the bus.

use crate::envelope::Envelope;
use crate::subscriber::Subscription;
use crate::DEFAULT_CHANNEL_CAPACITY;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::debug;
use uuid::Uuid;

/// Per-name state kept by the hub.
struct ChannelSlot {
    sender: broadcast::Sender<Envelope>,
    open_handles: usize,
}

/// Namespace of broadcast channels shared by every context of one origin.
///
/// Uses one `tokio::sync::broadcast` channel per name for multi-producer,
/// multi-consumer semantics. A name disappears once its last handle closes.
pub struct BroadcastHub {
    /// Live channels by name.
    channels: RwLock<HashMap<String, ChannelSlot>>,

    /// Total messages published across all channels.
    messages_published: AtomicU64,

    /// Per-listener buffer size.
    capacity: usize,
}

impl BroadcastHub {
    /// Create a new hub with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new hub with the given per-listener capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: RwLock::new(HashMap::new()),
            messages_published: AtomicU64::new(0),
            capacity: capacity.max(1),
        }
    }

    /// Open a handle on the named channel.
    #[must_use]
    pub fn open(self: &Arc<Self>, name: &str) -> BroadcastChannel {
        let sender = {
            let mut channels = self.channels.write();
            let slot = channels.entry(name.to_string()).or_insert_with(|| ChannelSlot {
                sender: broadcast::channel(self.capacity).0,
                open_handles: 0,
            });
            slot.open_handles += 1;
            slot.sender.clone()
        };

        let channel = BroadcastChannel {
            id: Uuid::new_v4(),
            name: name.to_string(),
            sender,
            closed: watch::channel(false).0,
            own_listeners: Arc::new(AtomicUsize::new(0)),
            hub: Arc::clone(self),
        };
        debug!(channel = name, handle = %channel.id, "Broadcast channel opened");
        channel
    }

    /// Number of handles currently open on `name`.
    #[must_use]
    pub fn open_channels(&self, name: &str) -> usize {
        self.channels
            .read()
            .get(name)
            .map_or(0, |slot| slot.open_handles)
    }

    /// Total messages published through this hub.
    #[must_use]
    pub fn messages_published(&self) -> u64 {
        self.messages_published.load(Ordering::Relaxed)
    }

    /// Per-listener capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn release(&self, name: &str, sender: &broadcast::Sender<Envelope>) {
        let mut channels = self.channels.write();
        let Some(slot) = channels.get_mut(name) else {
            return;
        };
        if !slot.sender.same_channel(sender) {
            return;
        }
        slot.open_handles = slot.open_handles.saturating_sub(1);
        if slot.open_handles == 0 {
            channels.remove(name);
            debug!(channel = name, "Last handle closed, channel removed");
        }
    }
}

impl Default for BroadcastHub {
    fn default() -> Self {
        Self::new()
    }
}

/// One context's handle on a named channel.
///
/// Closed on drop.
pub struct BroadcastChannel {
    id: Uuid,
    name: String,
    sender: broadcast::Sender<Envelope>,
    closed: watch::Sender<bool>,
    /// Listeners created from this handle; excluded from publish counts.
    own_listeners: Arc<AtomicUsize>,
    hub: Arc<BroadcastHub>,
}

impl BroadcastChannel {
    /// Identifier stamped on every envelope this handle publishes.
    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Channel name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Publish `payload` to every other handle currently listening.
    ///
    /// # Returns
    ///
    /// The number of listeners on other handles the message was handed to.
    /// Always `0` once this handle is closed.
    pub fn publish(&self, payload: Vec<u8>) -> usize {
        if self.is_closed() {
            debug!(channel = %self.name, handle = %self.id, "Publish on closed channel ignored");
            return 0;
        }

        self.hub.messages_published.fetch_add(1, Ordering::Relaxed);

        match self.sender.send(Envelope::new(self.id, &self.name, payload)) {
            Ok(receivers) => {
                let others = receivers.saturating_sub(self.own_listeners.load(Ordering::Relaxed));
                debug!(channel = %self.name, receivers = others, "Message published");
                others
            }
            Err(_) => {
                // No listeners at all - message is dropped
                debug!(channel = %self.name, "Message dropped (no listeners)");
                0
            }
        }
    }

    /// Start listening for messages published by other handles.
    ///
    /// Only messages published after this call are delivered.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.own_listeners.fetch_add(1, Ordering::Relaxed);
        Subscription::new(
            self.sender.subscribe(),
            self.id,
            self.closed.subscribe(),
            Arc::clone(&self.own_listeners),
        )
    }

    /// Stop delivery to and from this handle.
    ///
    /// Returns `true` only for the call that actually closed it.
    pub fn close(&self) -> bool {
        if self.closed.send_replace(true) {
            return false;
        }
        self.hub.release(&self.name, &self.sender);
        debug!(channel = %self.name, handle = %self.id, "Broadcast channel closed");
        true
    }

    /// Whether `close()` has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }
}

impl Drop for BroadcastChannel {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_no_peers() {
        let hub = Arc::new(BroadcastHub::new());
        let channel = hub.open("room");

        assert_eq!(channel.publish(b"hi".to_vec()), 0);
        assert_eq!(hub.messages_published(), 1);
    }

    #[tokio::test]
    async fn test_publish_excludes_own_listener() {
        let hub = Arc::new(BroadcastHub::new());
        let a = hub.open("room");
        let b = hub.open("room");

        let _own = a.subscribe();
        let _peer = b.subscribe();

        assert_eq!(a.publish(b"hi".to_vec()), 1);
        assert_eq!(hub.open_channels("room"), 2);
    }

    #[tokio::test]
    async fn test_names_are_isolated() {
        let hub = Arc::new(BroadcastHub::new());
        let a = hub.open("room-a");
        let b = hub.open("room-b");
        let _listener = b.subscribe();

        assert_eq!(a.publish(b"hi".to_vec()), 0);
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let hub = Arc::new(BroadcastHub::new());
        let a = hub.open("room");
        let _b = hub.open("room");

        assert!(a.close());
        assert!(!a.close());
        assert!(a.is_closed());
        assert_eq!(hub.open_channels("room"), 1);
        assert_eq!(a.publish(b"late".to_vec()), 0);
    }

    #[test]
    fn test_last_close_removes_channel() {
        let hub = Arc::new(BroadcastHub::new());
        {
            let _a = hub.open("room");
            let _b = hub.open("room");
            assert_eq!(hub.open_channels("room"), 2);
        }

        assert_eq!(hub.open_channels("room"), 0);
    }

    #[test]
    fn test_custom_capacity() {
        let hub = BroadcastHub::with_capacity(16);
        assert_eq!(hub.capacity(), 16);
        assert_eq!(BroadcastHub::default().capacity(), DEFAULT_CHANNEL_CAPACITY);
    }
}
