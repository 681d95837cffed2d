//! # Engine Internals
//!
//! State shared between a [`ChannelStore`](super::ChannelStore) and its
//! background tasks.
//!
//! ## Locking and Delivery
//!
//! `state` is the only lock and is never held while callbacks run.
//!
//! Every change queues its notifications in the same critical section that
//! applies it, so the queue is in change order. Whoever finds no drain in
//! progress drains the queue; everyone else returns at once. A callback that
//! writes to its own store therefore sees its notice delivered after it
//! returns, and callbacks crossing between stores on different threads never
//! wait on each other.

use super::completion::{WriteCompletion, WriteRequest};
use super::StateValue;
use crate::domain::config::STATE_KEY;
use crate::domain::errors::{ChannelStateError, StoreError};
use crate::domain::message::StoreMessage;
use crate::domain::protocol::{react, Reaction};
use crate::domain::status::{Lifecycle, StoreStatus};
use crate::domain::subscribers::{Callback, SubscriberRegistry};
use crate::ports::outbound::PersistentStore;
use channel_bus::{BroadcastChannel, Envelope, Subscription};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Sending side of the persistence task.
struct PersistenceLink {
    writes: mpsc::UnboundedSender<WriteRequest>,
    shutdown: watch::Sender<bool>,
}

/// Mutable state of one instance.
struct EngineState<T> {
    value: T,
    lifecycle: Lifecycle,
    value_subscribers: SubscriberRegistry<T>,
    status_subscribers: SubscriberRegistry<StoreStatus>,
    /// Exists only while initializing and waiting on peers.
    init_timer: Option<AbortHandle>,
    listener: Option<AbortHandle>,
    persistence: Option<PersistenceLink>,
    outbox: VecDeque<Notice<T>>,
    /// Someone is draining `outbox`.
    draining: bool,
}

impl<T: Clone> EngineState<T> {
    fn value_notice(&self) -> Option<Notice<T>> {
        if self.value_subscribers.is_empty() {
            return None;
        }
        Some(Notice::Value(self.value.clone(), self.value_subscribers.snapshot()))
    }

    fn status_notice(&self) -> Option<Notice<T>> {
        if self.status_subscribers.is_empty() {
            return None;
        }
        Some(Notice::Status(
            self.lifecycle.status(),
            self.status_subscribers.snapshot(),
        ))
    }

    /// Queue notices and claim the drain if nobody holds it.
    fn queue<const N: usize>(&mut self, notices: [Option<Notice<T>>; N]) -> bool {
        self.outbox.extend(notices.into_iter().flatten());
        if self.draining || self.outbox.is_empty() {
            return false;
        }
        self.draining = true;
        true
    }

    fn cancel_init_timer(&mut self) {
        if let Some(timer) = self.init_timer.take() {
            timer.abort();
        }
    }
}

/// One notification round, captured under the state lock and delivered
/// after it is released.
enum Notice<T> {
    Value(T, Vec<Callback<T>>),
    Status(StoreStatus, Vec<Callback<StoreStatus>>),
}

pub(crate) struct Shared<T> {
    pub(crate) instance_id: Uuid,
    pub(crate) name: String,
    pub(crate) prefixed_name: String,
    pub(crate) persist: bool,
    pub(crate) initial: T,
    init_timeout: Duration,
    runtime: Handle,
    channel: BroadcastChannel,
    state: Mutex<EngineState<T>>,
}

impl<T: StateValue> Shared<T> {
    pub(crate) fn new(
        name: String,
        prefixed_name: String,
        initial: T,
        persist: bool,
        init_timeout: Duration,
        runtime: Handle,
        channel: BroadcastChannel,
    ) -> Self {
        Self {
            instance_id: Uuid::new_v4(),
            name,
            prefixed_name,
            persist,
            state: Mutex::new(EngineState {
                value: initial.clone(),
                lifecycle: Lifecycle::new(),
                value_subscribers: SubscriberRegistry::new(),
                status_subscribers: SubscriberRegistry::new(),
                init_timer: None,
                listener: None,
                persistence: None,
                outbox: VecDeque::new(),
                draining: false,
            }),
            initial,
            init_timeout,
            runtime,
            channel,
        }
    }

    /// Spawn the listener and kick off initialization.
    pub(crate) fn start(
        self: &Arc<Self>,
        subscription: Subscription,
        storage: Option<Arc<dyn PersistentStore>>,
    ) {
        let listener = self
            .runtime
            .spawn(listen(Arc::downgrade(self), subscription));

        let mut state = self.state.lock();
        state.listener = Some(listener.abort_handle());

        let Some(storage) = storage else {
            drop(state);
            self.request_initial_state();
            return;
        };

        let (writes, write_queue) = mpsc::unbounded_channel();
        let (shutdown, shutdown_signal) = watch::channel(false);
        state.persistence = Some(PersistenceLink { writes, shutdown });
        drop(state);

        self.runtime.spawn(super::persistence::run(
            Arc::downgrade(self),
            storage,
            self.prefixed_name.clone(),
            write_queue,
            shutdown_signal,
        ));
    }

    // =========================================================================
    // READS
    // =========================================================================

    pub(crate) fn value(&self) -> T {
        self.state.lock().value.clone()
    }

    pub(crate) fn status(&self) -> StoreStatus {
        self.state.lock().lifecycle.status()
    }

    pub(crate) fn is_initializing(&self) -> bool {
        self.state.lock().lifecycle.is_initializing()
    }

    // =========================================================================
    // INITIALIZATION
    // =========================================================================

    /// Ask ready peers for their value and arm the bounded wait.
    pub(crate) fn request_initial_state(self: &Arc<Self>) {
        let mut state = self.state.lock();
        if !state.lifecycle.is_initializing() {
            return;
        }

        self.publish(&StoreMessage::<T>::RequestInitState {
            sender_id: self.instance_id,
        });

        let shared = Arc::downgrade(self);
        let timeout = self.init_timeout;
        let _entered = self.runtime.enter();
        // Deadline counts from the request, not from the first poll
        let delay = tokio::time::sleep(timeout);
        let timer = self.runtime.spawn(async move {
            delay.await;
            if let Some(shared) = shared.upgrade() {
                shared.on_init_timeout();
            }
        });

        state.cancel_init_timer();
        state.init_timer = Some(timer.abort_handle());
        debug!(
            store = %self.name,
            instance = %self.instance_id,
            ?timeout,
            "Requested initial state from peers"
        );
    }

    fn on_init_timeout(&self) {
        let drain = {
            let mut state = self.state.lock();
            // The timer is the running task; dropping the handle is enough
            state.init_timer = None;
            if !state.lifecycle.promote() {
                return;
            }
            info!(
                store = %self.name,
                instance = %self.instance_id,
                "No peer answered in time, ready with held value"
            );
            let notice = state.status_notice();
            state.queue([notice])
        };
        if drain {
            self.drain();
        }
    }

    /// Apply the outcome of the durable read performed at startup.
    pub(crate) fn finish_durable_read(
        self: &Arc<Self>,
        read: Result<Option<Vec<u8>>, StoreError>,
    ) {
        match read {
            Ok(Some(bytes)) => match serde_json::from_slice::<T>(&bytes) {
                Ok(value) => {
                    if !self.adopt_stored(value) {
                        debug!(store = %self.name, "Durable value arrived after initialization, ignored");
                    }
                }
                Err(e) => {
                    warn!(store = %self.name, key = STATE_KEY, error = %e, "Stored value undecodable, asking peers");
                    self.request_initial_state();
                }
            },
            Ok(None) => {
                debug!(store = %self.name, "No durable value, asking peers");
                self.request_initial_state();
            }
            Err(e) => {
                warn!(store = %self.name, error = %e, "Durable read failed, asking peers");
                self.request_initial_state();
            }
        }
    }

    fn adopt_stored(&self, value: T) -> bool {
        let drain = {
            let mut state = self.state.lock();
            if !state.lifecycle.is_initializing() {
                return false;
            }
            state.value = value;
            state.lifecycle.promote();
            state.cancel_init_timer();
            info!(store = %self.name, instance = %self.instance_id, "Ready with durable value");
            let notices = [state.value_notice(), state.status_notice()];
            state.queue(notices)
        };
        if drain {
            self.drain();
        }
        true
    }

    // =========================================================================
    // INBOUND MESSAGES
    // =========================================================================

    pub(crate) fn handle_envelope(&self, envelope: &Envelope) {
        if StoreMessage::<T>::peek_sender(envelope.payload()) == Some(self.instance_id) {
            debug!(store = %self.name, "Discarding own message");
            return;
        }

        let message = match StoreMessage::<T>::decode(envelope.payload()) {
            Ok(message) => message,
            Err(e) => {
                warn!(store = %self.name, origin = %envelope.origin, error = %e, "Dropping undecodable message");
                return;
            }
        };

        let drain = {
            let mut state = self.state.lock();
            let reaction = react(state.lifecycle.status(), self.instance_id, &message);
            let kind = message.kind();

            match reaction {
                Reaction::Discard | Reaction::Ignore => {
                    debug!(store = %self.name, kind, ?reaction, status = %state.lifecycle.status(), "Message not applied");
                    return;
                }
                Reaction::Reply => {
                    self.publish(&StoreMessage::ResponseInitState {
                        sender_id: self.instance_id,
                        payload: &state.value,
                    });
                    debug!(store = %self.name, to = %message.sender_id(), "Answered initial state request");
                    return;
                }
                Reaction::Adopt { promote } => {
                    let sender = message.sender_id();
                    let Some(payload) = message.into_payload() else {
                        return;
                    };
                    state.value = payload;
                    debug!(store = %self.name, kind, from = %sender, "Adopted peer value");

                    if promote {
                        state.lifecycle.promote();
                        state.cancel_init_timer();
                        info!(store = %self.name, instance = %self.instance_id, from = %sender, "Ready with peer value");
                        let notices = [state.value_notice(), state.status_notice()];
                        state.queue(notices)
                    } else {
                        let notice = state.value_notice();
                        state.queue([notice])
                    }
                }
            }
        };
        if drain {
            self.drain();
        }
    }

    // =========================================================================
    // LOCAL WRITES
    // =========================================================================

    /// Replace the value, persist it (if enabled), broadcast it and notify.
    pub(crate) fn write_local(&self, value: T, operation: &'static str) -> WriteCompletion {
        let (completion, drain) = {
            let mut state = self.state.lock();
            if state.lifecycle.is_destroyed() {
                debug!(store = %self.name, operation, "Write on destroyed store ignored");
                return WriteCompletion::done();
            }

            let promoted = state.lifecycle.promote();
            if promoted {
                state.cancel_init_timer();
                info!(store = %self.name, instance = %self.instance_id, operation, "Local write pre-empted initialization");
            }

            state.value = value;
            let completion = self.enqueue_write(&state);
            self.publish(&StoreMessage::StateUpdate {
                sender_id: self.instance_id,
                payload: &state.value,
            });

            let status = if promoted { state.status_notice() } else { None };
            let notices = [status, state.value_notice()];
            (completion, state.queue(notices))
        };
        if drain {
            self.drain();
        }
        completion
    }

    fn enqueue_write(&self, state: &EngineState<T>) -> WriteCompletion {
        let Some(link) = state.persistence.as_ref() else {
            return WriteCompletion::done();
        };

        let bytes = match serde_json::to_vec(&state.value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(store = %self.name, error = %e, "Value not serializable, skipping durable write");
                return WriteCompletion::failed(e.into());
            }
        };

        let (done, receiver) = oneshot::channel();
        if link.writes.send(WriteRequest { bytes, done }).is_err() {
            return WriteCompletion::failed(ChannelStateError::Cancelled);
        }
        WriteCompletion::pending(receiver)
    }

    // =========================================================================
    // SUBSCRIPTIONS
    // =========================================================================

    pub(crate) fn subscribe_value(
        self: &Arc<Self>,
        callback: Callback<T>,
    ) -> Result<super::Unsubscribe, ChannelStateError> {
        let mut state = self.state.lock();
        if state.lifecycle.is_destroyed() {
            return Err(ChannelStateError::Destroyed);
        }
        let id = state.value_subscribers.insert(callback);

        let shared = Arc::downgrade(self);
        Ok(super::Unsubscribe::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.state.lock().value_subscribers.remove(id);
            }
        }))
    }

    pub(crate) fn subscribe_status(
        self: &Arc<Self>,
        callback: Callback<StoreStatus>,
    ) -> Result<super::Unsubscribe, ChannelStateError> {
        let mut state = self.state.lock();
        if state.lifecycle.is_destroyed() {
            return Err(ChannelStateError::Destroyed);
        }
        let id = state.status_subscribers.insert(callback);

        let shared = Arc::downgrade(self);
        Ok(super::Unsubscribe::new(move || {
            if let Some(shared) = shared.upgrade() {
                shared.state.lock().status_subscribers.remove(id);
            }
        }))
    }

    // =========================================================================
    // TEARDOWN
    // =========================================================================

    pub(crate) fn destroy(&self) {
        let drain = {
            let mut state = self.state.lock();
            if !state.lifecycle.destroy() {
                return;
            }

            state.cancel_init_timer();
            if let Some(listener) = state.listener.take() {
                listener.abort();
            }
            if let Some(link) = state.persistence.take() {
                // Queued writes still drain; dropping `writes` ends the queue
                link.shutdown.send_replace(true);
            }
            self.channel.close();

            let callbacks = state.status_subscribers.snapshot();
            state.value_subscribers.clear();
            state.status_subscribers.clear();
            info!(store = %self.name, instance = %self.instance_id, "Store destroyed");
            state.queue([Some(Notice::Status(StoreStatus::Destroyed, callbacks))])
        };
        if drain {
            self.drain();
        }
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    fn publish<P: Serialize>(&self, message: &StoreMessage<P>) {
        match message.encode() {
            Ok(bytes) => {
                let receivers = self.channel.publish(bytes);
                debug!(store = %self.name, kind = message.kind(), receivers, "Broadcast");
            }
            Err(e) => warn!(store = %self.name, kind = message.kind(), error = %e, "Failed to encode message"),
        }
    }

    /// Deliver queued notices until the queue is empty.
    ///
    /// Only the caller that claimed the drain in [`EngineState::queue`] runs
    /// this. Notices queued by callbacks are picked up by the same loop.
    fn drain(&self) {
        let mut claim = DrainClaim {
            shared: self,
            released: false,
        };
        loop {
            let notice = {
                let mut state = self.state.lock();
                match state.outbox.pop_front() {
                    Some(notice) => notice,
                    None => {
                        state.draining = false;
                        break;
                    }
                }
            };
            self.deliver(notice);
        }
        claim.released = true;
    }

    /// Value callbacks stop once the store is destroyed, which can happen
    /// from inside an earlier callback.
    fn deliver(&self, notice: Notice<T>) {
        match notice {
            Notice::Value(value, callbacks) => {
                for callback in callbacks {
                    if self.state.lock().lifecycle.is_destroyed() {
                        return;
                    }
                    callback(&value);
                }
            }
            Notice::Status(status, callbacks) => {
                for callback in callbacks {
                    callback(&status);
                }
            }
        }
    }
}

/// Gives the drain back if a callback unwinds through [`Shared::drain`].
struct DrainClaim<'a, T> {
    shared: &'a Shared<T>,
    released: bool,
}

impl<T> Drop for DrainClaim<'_, T> {
    fn drop(&mut self) {
        if !self.released {
            self.shared.state.lock().draining = false;
        }
    }
}

/// Feed peer messages into the engine until the channel closes or the
/// store goes away.
async fn listen<T: StateValue>(shared: Weak<Shared<T>>, mut subscription: Subscription) {
    while let Some(envelope) = subscription.recv().await {
        let Some(shared) = shared.upgrade() else {
            break;
        };
        shared.handle_envelope(&envelope);
    }
}
