//! # Domain Errors
//!
//! Error types for the engine and its durable-store adapters.
//!
//! No error is fatal to a store instance: durable-store failures fall back to
//! peer synchronization, and transport loss is masked by the init timeout.

use thiserror::Error;

/// Failures reported by a [`PersistentStore`](crate::ports::PersistentStore)
/// or one of its handles.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The store could not be opened.
    #[error("Failed to open store {name}: {message}")]
    Open { name: String, message: String },

    /// Reading a key failed.
    #[error("Failed to read key {key}: {message}")]
    Read { key: String, message: String },

    /// Writing a key failed.
    #[error("Failed to write key {key}: {message}")]
    Write { key: String, message: String },

    /// The handle was already closed.
    #[error("Store handle is closed")]
    Closed,

    /// Stored bytes could not be decoded.
    #[error("Encoding error: {message}")]
    Encoding { message: String },
}

/// Errors surfaced by a [`ChannelStore`](crate::ChannelStore).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelStateError {
    /// The operation requires a live instance.
    #[error("ChannelStore is destroyed")]
    Destroyed,

    /// Store names must be non-empty.
    #[error("Invalid store name: {0:?}")]
    InvalidName(String),

    /// Construction happened outside a tokio runtime.
    #[error("No tokio runtime available: {0}")]
    NoRuntime(String),

    /// The durable store rejected a write.
    #[error("Persistent store error: {0}")]
    Store(#[from] StoreError),

    /// The value could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The pending write was abandoned before it completed.
    #[error("Write cancelled before completion")]
    Cancelled,
}

impl From<serde_json::Error> for ChannelStateError {
    fn from(e: serde_json::Error) -> Self {
        ChannelStateError::Serialization(e.to_string())
    }
}
