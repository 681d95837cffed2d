//! # Store Options
//!
//! Construction-time configuration of a store instance.

use crate::domain::errors::ChannelStateError;
use std::time::Duration;

/// Bounded wait for a peer response before falling back to the initial value.
pub const DEFAULT_INIT_TIMEOUT: Duration = Duration::from_millis(500);

/// Prefix shared by the broadcast channel name and the durable store name.
pub const CHANNEL_PREFIX: &str = "channel-state__";

/// The single key under which a store persists its value.
pub const STATE_KEY: &str = "state";

/// Options for one [`ChannelStore`](crate::ChannelStore).
#[derive(Debug, Clone)]
pub struct ChannelStoreOptions<T> {
    /// Logical name shared by every instance that must stay in sync.
    pub name: String,
    /// Value held until initialization finds something better.
    pub initial: T,
    /// Whether the value is mirrored into the durable store.
    pub persist: bool,
    /// How long to wait for a peer response.
    pub init_timeout: Duration,
}

impl<T> ChannelStoreOptions<T> {
    /// Non-persistent options with the default init timeout.
    pub fn new(name: impl Into<String>, initial: T) -> Self {
        Self {
            name: name.into(),
            initial,
            persist: false,
            init_timeout: DEFAULT_INIT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn persist(mut self, persist: bool) -> Self {
        self.persist = persist;
        self
    }

    #[must_use]
    pub fn init_timeout(mut self, timeout: Duration) -> Self {
        self.init_timeout = timeout;
        self
    }

    /// Name used for both the broadcast channel and the durable store.
    #[must_use]
    pub fn prefixed_name(&self) -> String {
        format!("{CHANNEL_PREFIX}{}", self.name)
    }

    /// Reject options no instance can be built from.
    ///
    /// # Errors
    ///
    /// - `ChannelStateError::InvalidName` - The name is empty or whitespace
    pub fn validate(&self) -> Result<(), ChannelStateError> {
        if self.name.trim().is_empty() {
            return Err(ChannelStateError::InvalidName(self.name.clone()));
        }
        Ok(())
    }
}
