//! # Channel Store Service
//!
//! The synchronization engine. One [`ChannelStore`] is one instance of a
//! logical store inside one context.
//!
//! ## Architecture
//!
//! This service:
//! 1. Seeds the value and opens the broadcast channel for the store's name
//! 2. Initializes from the durable store, then from peers, then by timeout
//! 3. Applies local writes immediately and broadcasts them
//! 4. Persists local writes in call order on a background task
//!
//! Background tasks hold weak references, so dropping the last
//! `ChannelStore` tears the instance down.

mod completion;
mod engine;
mod persistence;

pub use completion::WriteCompletion;
pub(crate) use engine::Shared;

use crate::adapters::storage::InMemoryPersistentStore;
use crate::domain::config::ChannelStoreOptions;
use crate::domain::errors::ChannelStateError;
use crate::domain::status::StoreStatus;
use crate::ports::outbound::PersistentStore;
use channel_bus::BroadcastHub;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Weak};
use tokio::runtime::Handle;
use uuid::Uuid;

/// Values a [`ChannelStore`] can hold.
pub trait StateValue: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> StateValue for T where T: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {}

/// Collaborators shared by every store of one origin.
#[derive(Clone)]
pub struct ChannelContext {
    hub: Arc<BroadcastHub>,
    storage: Arc<dyn PersistentStore>,
}

impl ChannelContext {
    pub fn new(hub: Arc<BroadcastHub>, storage: Arc<dyn PersistentStore>) -> Self {
        Self { hub, storage }
    }

    /// A fresh hub and an in-memory durable store.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(BroadcastHub::new()),
            Arc::new(InMemoryPersistentStore::new()),
        )
    }

    pub fn hub(&self) -> &Arc<BroadcastHub> {
        &self.hub
    }

    pub fn storage(&self) -> &Arc<dyn PersistentStore> {
        &self.storage
    }
}

impl fmt::Debug for ChannelContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelContext")
            .field("hub_capacity", &self.hub.capacity())
            .finish_non_exhaustive()
    }
}

/// Removes one subscriber. Calling it more than once is a no-op.
///
/// Dropping it does not unsubscribe.
pub struct Unsubscribe {
    action: Box<dyn Fn() + Send + Sync>,
}

impl Unsubscribe {
    pub(crate) fn new(action: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            action: Box::new(action),
        }
    }

    pub fn unsubscribe(&self) {
        (self.action)();
    }
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Unsubscribe")
    }
}

/// One instance of a synchronized store.
///
/// ```ignore
/// let ctx = ChannelContext::in_memory();
/// let counter = ChannelStore::new(&ctx, ChannelStoreOptions::new("counter", 0_u32))?;
/// counter.set(5);
/// assert_eq!(counter.get(), 5);
/// ```
pub struct ChannelStore<T: StateValue> {
    shared: Arc<Shared<T>>,
}

impl<T: StateValue> ChannelStore<T> {
    /// Create an instance and start initializing it.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - `ChannelStateError::InvalidName` - The name is empty or whitespace
    /// - `ChannelStateError::NoRuntime` - Called outside a tokio runtime
    pub fn new(
        ctx: &ChannelContext,
        options: ChannelStoreOptions<T>,
    ) -> Result<Self, ChannelStateError> {
        options.validate()?;
        let runtime =
            Handle::try_current().map_err(|e| ChannelStateError::NoRuntime(e.to_string()))?;

        let prefixed_name = options.prefixed_name();
        let channel = ctx.hub.open(&prefixed_name);
        // Listen before asking, so no reply can slip past
        let subscription = channel.subscribe();

        let shared = Arc::new(Shared::new(
            options.name,
            prefixed_name,
            options.initial,
            options.persist,
            options.init_timeout,
            runtime,
            channel,
        ));

        tracing::info!(
            store = %shared.name,
            instance = %shared.instance_id,
            persist = shared.persist,
            "Channel store created"
        );

        let storage = shared.persist.then(|| Arc::clone(&ctx.storage));
        shared.start(subscription, storage);

        Ok(Self { shared })
    }

    /// Current in-memory value.
    pub fn get(&self) -> T {
        self.shared.value()
    }

    pub fn status(&self) -> StoreStatus {
        self.shared.status()
    }

    /// Logical name, without the channel prefix.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn instance_id(&self) -> Uuid {
        self.shared.instance_id
    }

    pub fn is_persistent(&self) -> bool {
        self.shared.persist
    }

    /// Replace the value.
    ///
    /// The in-memory change, the broadcast and the notifications happen before
    /// this returns. The returned completion reports the durable write.
    /// No-op on a destroyed store.
    pub fn set(&self, value: T) -> WriteCompletion {
        self.shared.write_local(value, "set")
    }

    /// Replace the value with a copy of the initial value.
    pub fn reset(&self) -> WriteCompletion {
        self.shared.write_local(self.shared.initial.clone(), "reset")
    }

    /// Register a value listener. Not called with the current value.
    pub fn subscribe<F>(&self, callback: F) -> Result<Unsubscribe, ChannelStateError>
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.shared.subscribe_value(Arc::new(callback))
    }

    /// Register a status listener. Not called with the current status.
    pub fn subscribe_status<F>(&self, callback: F) -> Result<Unsubscribe, ChannelStateError>
    where
        F: Fn(&StoreStatus) + Send + Sync + 'static,
    {
        self.shared.subscribe_status(Arc::new(callback))
    }

    /// Tear the instance down. Idempotent.
    pub fn destroy(&self) {
        self.shared.destroy();
    }

    pub(crate) fn downgrade(&self) -> Weak<Shared<T>> {
        Arc::downgrade(&self.shared)
    }
}

impl<T: StateValue> Drop for ChannelStore<T> {
    fn drop(&mut self) {
        self.shared.destroy();
    }
}

impl<T: StateValue + fmt::Debug> fmt::Debug for ChannelStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelStore")
            .field("name", &self.shared.name)
            .field("instance_id", &self.shared.instance_id)
            .field("status", &self.shared.status())
            .field("value", &self.shared.value())
            .finish()
    }
}
