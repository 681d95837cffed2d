//! # Adapters Module
//!
//! ## Modules
//!
//! - `storage`: `PersistentStore` implementations (in-memory, file-backed)
//! - `binding`: watch-channel views of a store for reactive consumers

pub mod binding;
pub mod storage;

pub use binding::{BindingStream, StateBinding, StatusBinding};
pub use storage::{
    FileBackedPersistentStore, FileStoreHandle, InMemoryPersistentStore, InMemoryStoreHandle,
};
