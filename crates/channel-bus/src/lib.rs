//! # Channel Bus - Named Broadcast Channels
//!
//! An in-process stand-in for the browser's `BroadcastChannel`: every context
//! of one origin shares a [`BroadcastHub`], opens a [`BroadcastChannel`] by
//! name, and receives what the *other* handles with that name publish.
//!
//! ```text
//! ┌──────────────┐                    ┌──────────────┐
//! │  Context A   │                    │  Context B   │
//! │              │    publish()       │              │
//! │              │ ──────┐            │              │
//! └──────────────┘       │            └──────────────┘
//!                        ▼                    ↑
//!                  ┌──────────────┐          │
//!                  │ BroadcastHub │          │
//!                  │  (per name)  │ ─────────┘
//!                  └──────────────┘  subscribe()
//! ```
//!
//! ## Delivery Contract
//!
//! - Unordered across senders, at most once per listener, no delivery guarantee
//! - A handle never receives its own messages
//! - Handles opened after a publish never see it
//! - `close()` is idempotent and stops delivery in both directions

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod envelope;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use envelope::Envelope;
pub use publisher::{BroadcastChannel, BroadcastHub};
pub use subscriber::Subscription;

/// Messages buffered per listener before the slowest one starts losing them.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
