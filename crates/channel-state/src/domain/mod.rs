//! # Domain Layer
//!
//! Pure types and decision logic. No I/O and no async in this layer.
//!
//! ## Modules
//!
//! - `status` - Lifecycle state machine
//! - `message` - Broadcast message variants and their wire encoding
//! - `protocol` - Reaction to inbound messages per status
//! - `subscribers` - Ordered listener registry
//! - `config` - Construction options and protocol constants
//! - `errors` - Domain error types

pub mod config;
pub mod errors;
pub mod message;
pub mod protocol;
pub mod status;
pub mod subscribers;

pub use config::*;
pub use errors::*;
pub use message::*;
pub use protocol::*;
pub use status::*;
pub use subscribers::*;
