//! # Broadcast Messages
//!
//! The closed set of messages exchanged between instances of one store.
//!
//! ## Wire Format (JSON)
//!
//! | Variant | Encoding |
//! |---------|----------|
//! | `RequestInitState` | `{"type":"REQUEST_INIT_STATE","senderId":"…"}` |
//! | `ResponseInitState` | `{"type":"RESPONSE_INIT_STATE","senderId":"…","payload":…}` |
//! | `StateUpdate` | `{"type":"STATE_UPDATE","senderId":"…","payload":…}` |

use crate::domain::errors::ChannelStateError;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A message sent between instances sharing a channel name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreMessage<T> {
    /// A new instance asks ready peers for their current value.
    #[serde(rename_all = "camelCase")]
    RequestInitState { sender_id: Uuid },

    /// A ready peer answers a request with its current value.
    #[serde(rename_all = "camelCase")]
    ResponseInitState { sender_id: Uuid, payload: T },

    /// A local write being propagated.
    #[serde(rename_all = "camelCase")]
    StateUpdate { sender_id: Uuid, payload: T },
}

/// The part of every message that does not depend on `T`.
#[derive(Deserialize)]
struct Header {
    #[serde(rename = "senderId")]
    sender_id: Uuid,
}

impl<T> StoreMessage<T> {
    /// Read the sender without decoding the payload.
    #[must_use]
    pub fn peek_sender(bytes: &[u8]) -> Option<Uuid> {
        serde_json::from_slice::<Header>(bytes)
            .ok()
            .map(|header| header.sender_id)
    }

    /// Instance that sent the message.
    #[must_use]
    pub fn sender_id(&self) -> Uuid {
        match self {
            StoreMessage::RequestInitState { sender_id }
            | StoreMessage::ResponseInitState { sender_id, .. }
            | StoreMessage::StateUpdate { sender_id, .. } => *sender_id,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            StoreMessage::RequestInitState { .. } => "REQUEST_INIT_STATE",
            StoreMessage::ResponseInitState { .. } => "RESPONSE_INIT_STATE",
            StoreMessage::StateUpdate { .. } => "STATE_UPDATE",
        }
    }

    /// Take the carried value, if any.
    #[must_use]
    pub fn into_payload(self) -> Option<T> {
        match self {
            StoreMessage::RequestInitState { .. } => None,
            StoreMessage::ResponseInitState { payload, .. }
            | StoreMessage::StateUpdate { payload, .. } => Some(payload),
        }
    }
}

impl<T: Serialize> StoreMessage<T> {
    /// Encode for the broadcast channel.
    pub fn encode(&self) -> Result<Vec<u8>, ChannelStateError> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl<T: DeserializeOwned> StoreMessage<T> {
    /// Decode bytes received from the broadcast channel.
    pub fn decode(bytes: &[u8]) -> Result<Self, ChannelStateError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
