//! # Envelope
//!
//! The unit carried by a broadcast channel. The bus never looks inside
//! `payload`; encoding is the publisher's business.

use std::sync::Arc;
use uuid::Uuid;

/// A published message as seen by listeners.
#[derive(Debug, Clone)]
pub struct Envelope {
    /// Handle that published the message.
    pub origin: Uuid,

    /// Channel name the message was published on.
    pub channel: String,

    /// Opaque message bytes, shared between all listeners.
    pub payload: Arc<[u8]>,
}

impl Envelope {
    pub(crate) fn new(origin: Uuid, channel: &str, payload: Vec<u8>) -> Self {
        Self {
            origin,
            channel: channel.to_string(),
            payload: payload.into(),
        }
    }

    /// Borrow the payload bytes.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Length of the payload in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.payload.len()
    }

    /// True when the payload is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}
