//! # Channel-State Test Suite
//!
//! Multi-instance flows that need more than one store, more than one hub, or a
//! real durable store on disk.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── flows.rs        # Convergence, late joiners, origin isolation
//!     └── persistence.rs  # File-backed sessions across restarts
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p channel-state-tests
//! cargo test -p channel-state-tests integration::persistence::
//! ```

#![allow(dead_code)]

pub mod integration;
