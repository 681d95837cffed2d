//! # Synchronization Protocol
//!
//! Decides what an instance does with an inbound message given its status.
//! The decision is pure; the engine applies it under its state lock.
//!
//! | Message | `initializing` | `ready` | `destroyed` |
//! |---------|----------------|---------|-------------|
//! | `REQUEST_INIT_STATE` | ignore | reply with value | discard |
//! | `RESPONSE_INIT_STATE` | adopt + promote | ignore | discard |
//! | `STATE_UPDATE` | adopt + promote | adopt | discard |
//!
//! Messages carrying this instance's own id are discarded before anything else.

use crate::domain::message::StoreMessage;
use crate::domain::status::StoreStatus;
use uuid::Uuid;

/// What to do with one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    /// Self-originated, or the instance is destroyed.
    Discard,
    /// Valid message with nothing to do in the current status.
    Ignore,
    /// Answer with `RESPONSE_INIT_STATE` carrying the current value.
    Reply,
    /// Replace the value with the payload; `promote` when this also ends
    /// initialization.
    Adopt { promote: bool },
}

/// Decide the reaction to `message` for an instance `own_id` in `status`.
#[must_use]
pub fn react<T>(status: StoreStatus, own_id: Uuid, message: &StoreMessage<T>) -> Reaction {
    if message.sender_id() == own_id || status == StoreStatus::Destroyed {
        return Reaction::Discard;
    }

    let initializing = status == StoreStatus::Initializing;
    match message {
        // Nothing authoritative to offer yet
        StoreMessage::RequestInitState { .. } if initializing => Reaction::Ignore,
        StoreMessage::RequestInitState { .. } => Reaction::Reply,
        StoreMessage::ResponseInitState { .. } if initializing => Reaction::Adopt { promote: true },
        StoreMessage::ResponseInitState { .. } => Reaction::Ignore,
        StoreMessage::StateUpdate { .. } => Reaction::Adopt {
            promote: initializing,
        },
    }
}
