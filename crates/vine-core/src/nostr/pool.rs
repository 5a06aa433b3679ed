//! Event stream primitive
//!
//! A [`RelayPool`] turns a filter set into a [`Subscription`]: a push-based,
//! non-restartable stream of [`RelayEvent`]s. The subscription owns the
//! release of its relay-side resources and runs it exactly once, whether the
//! caller closes it, drops it, or the relays complete the stream.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::future::BoxFuture;
use futures::stream::{BoxStream, Stream, StreamExt};

use crate::models::{EventFilter, RelayEvent};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Invalid filter: {0}")]
    InvalidFilter(String),

    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    #[error("Publish failed: {0}")]
    Publish(String),

    #[error("Relay connection failed: {0}")]
    Connect(String),
}

/// Relay capability consumed by the query layer. Implementations must be
/// safe to share across concurrent queries.
pub trait RelayPool: Send + Sync {
    /// Open a live subscription. Returns immediately; events are pushed as
    /// relays deliver them, in any order and possibly more than once.
    fn subscribe(&self, filters: Vec<EventFilter>) -> Result<Subscription, RelayError>;

    fn publish(&self, event: RelayEvent) -> BoxFuture<'_, Result<(), RelayError>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Closed,
}

type ReleaseHook = Box<dyn FnOnce() + Send>;

pub struct Subscription {
    events: BoxStream<'static, RelayEvent>,
    state: SubscriptionState,
    release: Vec<ReleaseHook>,
}

impl Subscription {
    pub fn new<S>(events: S) -> Self
    where
        S: Stream<Item = RelayEvent> + Send + 'static,
    {
        Self {
            events: events.boxed(),
            state: SubscriptionState::Active,
            release: Vec::new(),
        }
    }

    /// A subscription that closes without emitting anything
    pub fn empty() -> Self {
        Self::new(futures::stream::empty())
    }

    /// Register work to run when the subscription closes. Hooks run in
    /// registration order.
    pub fn on_release<F>(mut self, hook: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        if self.state == SubscriptionState::Closed {
            hook();
        } else {
            self.release.push(Box::new(hook));
        }
        self
    }

    pub fn state(&self) -> SubscriptionState {
        self.state
    }

    pub fn close(&mut self) {
        if self.state == SubscriptionState::Closed {
            return;
        }
        self.state = SubscriptionState::Closed;
        for hook in self.release.drain(..) {
            hook();
        }
    }
}

impl Stream for Subscription {
    type Item = RelayEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<RelayEvent>> {
        let this = self.get_mut();
        if this.state == SubscriptionState::Closed {
            return Poll::Ready(None);
        }

        match this.events.poll_next_unpin(cx) {
            Poll::Ready(None) => {
                this.close();
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("state", &self.state)
            .field("release_hooks", &self.release.len())
            .finish()
    }
}
