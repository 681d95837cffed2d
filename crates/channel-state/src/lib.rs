//! # Channel State
//!
//! Keeps one logical value consistent across independent contexts that share
//! nothing but a best-effort broadcast channel and, optionally, a durable
//! key/value store.
//!
//! ## Architecture
//!
//! ```text
//!  Context A                      Context B                    Context C
//! ┌────────────┐                ┌────────────┐              ┌────────────┐
//! │ChannelStore│ ─STATE_UPDATE─→│ChannelStore│              │ChannelStore│
//! │  (ready)   │ ←─REQUEST────  │  (ready)   │  ←─REQUEST── │  (init)    │
//! │            │ ──RESPONSE───→ │            │  ──RESPONSE─→│            │
//! └─────┬──────┘                └─────┬──────┘              └─────┬──────┘
//!       │                             │                           │
//!       └────────── PersistentStore (one key per store name) ─────┘
//! ```
//!
//! ## Lifecycle
//!
//! `Initializing → Ready → Destroyed`. The first of these promotes an instance
//! to `Ready`: a local write, a durable value, a peer's value, or the init
//! timeout (500 ms by default). `Destroyed` is terminal.
//!
//! ## Crate Structure (Hexagonal Architecture)
//!
//! - `domain/` - Lifecycle, wire messages, protocol decisions, subscribers
//! - `ports/` - Durable store traits
//! - `adapters/` - Store implementations and reactive bindings
//! - `service/` - The engine (`ChannelStore`)
//!
//! ## Usage
//!
//! ```ignore
//! use channel_state::{ChannelContext, ChannelStore, ChannelStoreOptions};
//!
//! let ctx = ChannelContext::in_memory();
//! let theme = ChannelStore::new(&ctx, ChannelStoreOptions::new("theme", "light".to_string()).persist(true))?;
//!
//! let unsubscribe = theme.subscribe(|value| println!("theme is now {value}"))?;
//! theme.set("dark".to_string()).await?;
//! unsubscribe.unsubscribe();
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod service;

// Re-export key types for convenience
pub use adapters::{
    BindingStream, FileBackedPersistentStore, InMemoryPersistentStore, StateBinding,
    StatusBinding,
};
pub use domain::config::{ChannelStoreOptions, DEFAULT_INIT_TIMEOUT};
pub use domain::errors::{ChannelStateError, StoreError};
pub use domain::message::StoreMessage;
pub use domain::status::StoreStatus;
pub use ports::outbound::{PersistentStore, StoreHandle};
pub use service::{ChannelContext, ChannelStore, StateValue, Unsubscribe, WriteCompletion};
