//! # Ports Layer
//!
//! - `outbound.rs` - Driven ports (the durable store the engine depends on)

pub mod outbound;

pub use outbound::{PersistentStore, StoreHandle};
