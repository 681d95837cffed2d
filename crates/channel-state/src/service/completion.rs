//! # Write Completion
//!
//! Completion signal of one `set`/`reset`. The in-memory effect and the
//! broadcast have already happened by the time the caller holds one; awaiting
//! it only reports whether the durable write went through.

use crate::domain::errors::ChannelStateError;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::oneshot;

pub(crate) type WriteResult = Result<(), ChannelStateError>;

/// A queued durable write.
pub(crate) struct WriteRequest {
    pub(crate) bytes: Vec<u8>,
    pub(crate) done: oneshot::Sender<WriteResult>,
}

/// Resolves once the durable write of one local write finishes.
///
/// Dropping it does not cancel the write.
#[derive(Debug)]
pub struct WriteCompletion {
    state: CompletionState,
}

#[derive(Debug)]
enum CompletionState {
    Done(Option<WriteResult>),
    Pending(oneshot::Receiver<WriteResult>),
}

impl WriteCompletion {
    /// Nothing to persist.
    pub(crate) fn done() -> Self {
        Self {
            state: CompletionState::Done(Some(Ok(()))),
        }
    }

    pub(crate) fn failed(error: ChannelStateError) -> Self {
        Self {
            state: CompletionState::Done(Some(Err(error))),
        }
    }

    pub(crate) fn pending(receiver: oneshot::Receiver<WriteResult>) -> Self {
        Self {
            state: CompletionState::Pending(receiver),
        }
    }

    /// Whether a durable write is behind this completion.
    #[must_use]
    pub fn is_persisting(&self) -> bool {
        matches!(self.state, CompletionState::Pending(_))
    }
}

impl Future for WriteCompletion {
    type Output = WriteResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match &mut self.state {
            CompletionState::Done(result) => Poll::Ready(result.take().unwrap_or(Ok(()))),
            CompletionState::Pending(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|received| received.unwrap_or(Err(ChannelStateError::Cancelled))),
        }
    }
}
