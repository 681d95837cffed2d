//! # Persistence Task
//!
//! One task per persistent instance owns the store handle:
//!
//! 1. Open the named store.
//! 2. If the instance is still initializing, read the stored value and hand
//!    the outcome to the engine.
//! 3. Apply queued writes in call order until the instance is destroyed.
//! 4. Close the handle.
//!
//! Writes queued before the open finished are flushed after step 2.

use super::completion::WriteRequest;
use super::engine::Shared;
use super::StateValue;
use crate::domain::config::STATE_KEY;
use crate::domain::errors::{ChannelStateError, StoreError};
use crate::ports::outbound::{PersistentStore, StoreHandle};
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, watch};
use tracing::{debug, warn};

pub(crate) async fn run<T: StateValue>(
    shared: Weak<Shared<T>>,
    storage: Arc<dyn PersistentStore>,
    name: String,
    mut writes: mpsc::UnboundedReceiver<WriteRequest>,
    mut shutdown: watch::Receiver<bool>,
) {
    let opened = tokio::select! {
        biased;
        _ = shutdown.wait_for(|stop| *stop) => None,
        opened = storage.open(&name) => Some(opened),
    };

    let handle = match opened {
        // Destroyed while opening; dropping the queue cancels pending writes
        None => return,
        Some(Ok(handle)) => handle,
        Some(Err(e)) => {
            warn!(store = %name, error = %e, "Failed to open durable store");
            if let Some(shared) = shared.upgrade() {
                shared.request_initial_state();
            }
            fail_pending(&mut writes, e).await;
            return;
        }
    };
    debug!(store = %name, "Durable store opened");

    let initializing = shared
        .upgrade()
        .is_some_and(|shared| shared.is_initializing());

    if initializing {
        let read = tokio::select! {
            biased;
            _ = shutdown.wait_for(|stop| *stop) => None,
            read = handle.get(STATE_KEY) => Some(read),
        };

        match (read, shared.upgrade()) {
            (Some(read), Some(shared)) => shared.finish_durable_read(read),
            _ => {
                handle.close().await;
                return;
            }
        }
    }

    drain_writes(&name, handle.as_ref(), &mut writes).await;
    handle.close().await;
    debug!(store = %name, "Durable store closed");
}

/// Apply writes until the engine drops its sender.
async fn drain_writes(
    name: &str,
    handle: &dyn StoreHandle,
    writes: &mut mpsc::UnboundedReceiver<WriteRequest>,
) {
    while let Some(request) = writes.recv().await {
        let result = handle
            .put(STATE_KEY, &request.bytes)
            .await
            .map_err(ChannelStateError::from);

        match &result {
            Ok(()) => debug!(store = name, bytes = request.bytes.len(), "Persisted value"),
            Err(e) => warn!(store = name, error = %e, "Durable write failed"),
        }
        // The caller may have dropped its completion
        let _ = request.done.send(result);
    }
}

/// Complete every write with the open error until the engine drops its sender.
async fn fail_pending(writes: &mut mpsc::UnboundedReceiver<WriteRequest>, error: StoreError) {
    while let Some(request) = writes.recv().await {
        let _ = request.done.send(Err(ChannelStateError::Store(error.clone())));
    }
}
