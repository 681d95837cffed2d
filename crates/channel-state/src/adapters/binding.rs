//! # Reactive Bindings
//!
//! Mirror a store into a `tokio::sync::watch` channel so UI-style consumers can
//! await changes or stream them. Each notification re-reads the store, so a
//! binding always holds a value the store actually had.
//!
//! Bindings do no protocol work and unsubscribe when dropped.

use crate::domain::errors::ChannelStateError;
use crate::domain::status::StoreStatus;
use crate::service::{ChannelStore, Shared, StateValue, Unsubscribe, WriteCompletion};
use std::pin::Pin;
use std::sync::Weak;
use std::task::{Context, Poll};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;
use tokio_stream::Stream;

/// Unsubscribes when dropped.
struct SubscriptionGuard(Unsubscribe);

impl Drop for SubscriptionGuard {
    fn drop(&mut self) {
        self.0.unsubscribe();
    }
}

/// Live view of a store's value.
pub struct StateBinding<T: StateValue> {
    store: Weak<Shared<T>>,
    receiver: watch::Receiver<T>,
    guard: SubscriptionGuard,
}

impl<T: StateValue> StateBinding<T> {
    /// Bind to `store`, starting from its current value.
    ///
    /// # Errors
    ///
    /// - `ChannelStateError::Destroyed` - The store is destroyed
    pub fn new(store: &ChannelStore<T>) -> Result<Self, ChannelStateError> {
        let (sender, receiver) = watch::channel(store.get());
        let weak = store.downgrade();

        let source = weak.clone();
        let unsubscribe = store.subscribe(move |_: &T| {
            if let Some(shared) = source.upgrade() {
                sender.send_replace(shared.value());
            }
        })?;

        Ok(Self {
            store: weak,
            receiver,
            guard: SubscriptionGuard(unsubscribe),
        })
    }

    /// Last value seen.
    pub fn current(&self) -> T {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change. `None` once the store is destroyed.
    pub async fn changed(&mut self) -> Option<T> {
        self.receiver.changed().await.ok()?;
        Some(self.receiver.borrow_and_update().clone())
    }

    /// Forward a write to the store. No-op if the store is gone.
    pub fn set(&self, value: T) -> WriteCompletion {
        match self.store.upgrade() {
            Some(shared) => shared.write_local(value, "set"),
            None => WriteCompletion::done(),
        }
    }

    /// Current value followed by every change.
    pub fn into_stream(self) -> BindingStream<T> {
        BindingStream {
            inner: WatchStream::new(self.receiver),
            _guard: self.guard,
        }
    }
}

/// Live view of a store's status.
pub struct StatusBinding {
    receiver: watch::Receiver<StoreStatus>,
    guard: SubscriptionGuard,
}

impl StatusBinding {
    /// # Errors
    ///
    /// - `ChannelStateError::Destroyed` - The store is destroyed
    pub fn new<T: StateValue>(store: &ChannelStore<T>) -> Result<Self, ChannelStateError> {
        let (sender, receiver) = watch::channel(store.status());
        let source = store.downgrade();

        let unsubscribe = store.subscribe_status(move |_: &StoreStatus| {
            let status = source
                .upgrade()
                .map_or(StoreStatus::Destroyed, |shared| shared.status());
            sender.send_replace(status);
        })?;

        Ok(Self {
            receiver,
            guard: SubscriptionGuard(unsubscribe),
        })
    }

    pub fn current(&self) -> StoreStatus {
        *self.receiver.borrow()
    }

    /// Wait for the next transition. `None` after `Destroyed` was observed.
    pub async fn changed(&mut self) -> Option<StoreStatus> {
        self.receiver.changed().await.ok()?;
        Some(*self.receiver.borrow_and_update())
    }

    /// Wait until the store leaves `Initializing`.
    pub async fn ready(&mut self) -> StoreStatus {
        match self
            .receiver
            .wait_for(|status| *status != StoreStatus::Initializing)
            .await
        {
            Ok(status) => *status,
            Err(_) => StoreStatus::Destroyed,
        }
    }

    pub fn into_stream(self) -> BindingStream<StoreStatus> {
        BindingStream {
            inner: WatchStream::new(self.receiver),
            _guard: self.guard,
        }
    }
}

/// Stream of binding values; ends when the store is destroyed.
pub struct BindingStream<T> {
    inner: WatchStream<T>,
    _guard: SubscriptionGuard,
}

impl<T: Clone + Send + Sync + 'static> Stream for BindingStream<T> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<T>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}
