//! # Outbound Ports (Driven Ports)
//!
//! The durable store the engine depends on. Implementations must be shared by
//! every instance of one origin so that a value written by one is visible to
//! instances constructed later.
//!
//! Production: `FileBackedPersistentStore`
//! Testing: `InMemoryPersistentStore`

use crate::domain::errors::StoreError;
use async_trait::async_trait;

/// Origin-scoped durable key/value storage.
#[async_trait]
pub trait PersistentStore: Send + Sync {
    /// Open (creating if needed) the store called `name`.
    async fn open(&self, name: &str) -> Result<Box<dyn StoreHandle>, StoreError>;
}

/// One instance's open connection to a named store.
#[async_trait]
pub trait StoreHandle: Send + Sync {
    /// Read a key.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(bytes))` - The stored value
    /// - `Ok(None)` - Nothing stored under `key`
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Write a key, replacing any previous value.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;

    /// Release the handle. Idempotent; later reads and writes fail with
    /// `StoreError::Closed`.
    async fn close(&self);
}
