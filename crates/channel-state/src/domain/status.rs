//! # Lifecycle State Machine
//!
//! ```text
//! initializing ──(local write | durable read | peer response | timeout)──→ ready
//!      │                                                                   │
//!      └────────────────────────── destroy() ──────────────→ destroyed ←───┘
//! ```
//!
//! Transitions are monotonic: nothing leads back to `initializing`, and
//! `destroyed` is terminal.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Phase of a store instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    /// Waiting for a durable read, a peer response, a local write or the timeout.
    Initializing,
    /// Holding a value it treats as authoritative.
    Ready,
    /// Torn down; no further mutation or I/O.
    Destroyed,
}

impl StoreStatus {
    /// Lowercase name as used on the wire.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            StoreStatus::Initializing => "initializing",
            StoreStatus::Ready => "ready",
            StoreStatus::Destroyed => "destroyed",
        }
    }
}

impl fmt::Display for StoreStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tracks and gates the status of one instance.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    status: StoreStatus,
}

impl Lifecycle {
    /// A fresh lifecycle in `initializing`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            status: StoreStatus::Initializing,
        }
    }

    /// Current status.
    #[must_use]
    pub fn status(&self) -> StoreStatus {
        self.status
    }

    #[must_use]
    pub fn is_initializing(&self) -> bool {
        self.status == StoreStatus::Initializing
    }

    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.status == StoreStatus::Ready
    }

    #[must_use]
    pub fn is_destroyed(&self) -> bool {
        self.status == StoreStatus::Destroyed
    }

    /// `initializing → ready`.
    ///
    /// Returns `true` only when the transition happened.
    pub fn promote(&mut self) -> bool {
        if self.status != StoreStatus::Initializing {
            return false;
        }
        self.status = StoreStatus::Ready;
        true
    }

    /// `any → destroyed`.
    ///
    /// Returns `true` only for the first call.
    pub fn destroy(&mut self) -> bool {
        if self.status == StoreStatus::Destroyed {
            return false;
        }
        self.status = StoreStatus::Destroyed;
        true
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_initializing() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.status(), StoreStatus::Initializing);
        assert!(lifecycle.is_initializing());
    }

    #[test]
    fn test_promote_once() {
        let mut lifecycle = Lifecycle::new();
        assert!(lifecycle.promote());
        assert!(!lifecycle.promote());
        assert!(lifecycle.is_ready());
    }

    #[test]
    fn test_destroy_is_terminal() {
        let mut lifecycle = Lifecycle::new();
        assert!(lifecycle.destroy());
        assert!(!lifecycle.destroy());
        assert!(!lifecycle.promote());
        assert_eq!(lifecycle.status(), StoreStatus::Destroyed);
    }

    #[test]
    fn test_destroy_from_ready() {
        let mut lifecycle = Lifecycle::new();
        lifecycle.promote();
        assert!(lifecycle.destroy());
        assert!(lifecycle.is_destroyed());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(StoreStatus::Initializing.to_string(), "initializing");
        assert_eq!(
            serde_json::to_string(&StoreStatus::Destroyed).unwrap(),
            "\"destroyed\""
        );
    }
}
