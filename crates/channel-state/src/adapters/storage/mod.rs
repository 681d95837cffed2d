//! Storage Adapters
//!
//! Implementations of the `PersistentStore` port.

mod file;
mod memory;

pub use file::{FileBackedPersistentStore, FileStoreHandle};
pub use memory::{InMemoryPersistentStore, InMemoryStoreHandle};
