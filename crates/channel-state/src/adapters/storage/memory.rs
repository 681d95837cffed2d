use crate::domain::errors::StoreError;
use crate::ports::outbound::{PersistentStore, StoreHandle};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

type Tables = HashMap<String, HashMap<String, Vec<u8>>>;

/// In-memory durable store for tests and ephemeral origins.
///
/// Clones share the same data, so every instance built from one origin sees
/// what the others wrote. Data lives as long as any clone does.
#[derive(Clone, Default)]
pub struct InMemoryPersistentStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemoryPersistentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a key directly, bypassing any handle.
    #[must_use]
    pub fn peek(&self, name: &str, key: &str) -> Option<Vec<u8>> {
        self.tables.read().get(name)?.get(key).cloned()
    }

    /// Seed a key directly, as if written by an earlier session.
    pub fn seed(&self, name: &str, key: &str, value: impl Into<Vec<u8>>) {
        self.tables
            .write()
            .entry(name.to_string())
            .or_default()
            .insert(key.to_string(), value.into());
    }

    /// Number of named stores that have been opened or seeded.
    #[must_use]
    pub fn store_count(&self) -> usize {
        self.tables.read().len()
    }
}

#[async_trait]
impl PersistentStore for InMemoryPersistentStore {
    async fn open(&self, name: &str) -> Result<Box<dyn StoreHandle>, StoreError> {
        self.tables.write().entry(name.to_string()).or_default();
        Ok(Box::new(InMemoryStoreHandle {
            name: name.to_string(),
            tables: Arc::clone(&self.tables),
            closed: AtomicBool::new(false),
        }))
    }
}

/// Handle returned by [`InMemoryPersistentStore::open`].
pub struct InMemoryStoreHandle {
    name: String,
    tables: Arc<RwLock<Tables>>,
    closed: AtomicBool,
}

impl InMemoryStoreHandle {
    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(StoreError::Closed);
        }
        Ok(())
    }
}

#[async_trait]
impl StoreHandle for InMemoryStoreHandle {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.ensure_open()?;
        let tables = self.tables.read();
        Ok(tables.get(&self.name).and_then(|table| table.get(key).cloned()))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.tables
            .write()
            .entry(self.name.clone())
            .or_default()
            .insert(key.to_string(), value.to_vec());
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::Release);
    }
}
