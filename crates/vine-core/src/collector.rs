//! Deduplicating collector
//!
//! Drains a [`Subscription`] for a bounded window and keeps the first event
//! seen per derived key. Whatever has been gathered when the window elapses,
//! the stream ends, or the owning service cancels is the result; none of
//! those is an error.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;
use tracing::debug;

use crate::models::RelayEvent;
use crate::nostr::Subscription;

/// Cancellation side of a service shutdown signal. Fires when the flag flips
/// to `true` or the sender is dropped.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// A signal that never fires
    pub fn never() -> Self {
        Self::default()
    }

    pub fn is_cancelled(&self) -> bool {
        match &self.rx {
            Some(rx) => *rx.borrow() || rx.has_changed().is_err(),
            None => false,
        }
    }

    pub async fn cancelled(&mut self) {
        let Some(rx) = self.rx.as_mut() else {
            return std::future::pending().await;
        };
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectOutcome {
    /// Relays completed the stream before the window elapsed
    StreamClosed,
    WindowElapsed,
    Cancelled,
}

#[derive(Debug)]
pub struct Collection<K> {
    entries: HashMap<K, RelayEvent>,
    outcome: CollectOutcome,
    received: usize,
}

impl<K: Eq + Hash> Collection<K> {
    pub fn outcome(&self) -> CollectOutcome {
        self.outcome
    }

    /// Events pulled off the stream, relevant or not
    pub fn received(&self) -> usize {
        self.received
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First event seen for `key`
    pub fn get(&self, key: &K) -> Option<&RelayEvent> {
        self.entries.get(key)
    }

    pub fn into_keys(self) -> HashSet<K> {
        self.entries.into_keys().collect()
    }

    pub fn into_entries(self) -> HashMap<K, RelayEvent> {
        self.entries
    }
}

/// Collect relevant events from `subscription` until the window elapses, the
/// stream ends, or `cancel` fires. The subscription is closed on return.
pub async fn collect<K, R, D>(
    mut subscription: Subscription,
    mut is_relevant: R,
    mut derive_key: D,
    window: Duration,
    cancel: &mut CancelSignal,
) -> Collection<K>
where
    K: Eq + Hash,
    R: FnMut(&RelayEvent) -> bool,
    D: FnMut(&RelayEvent) -> K,
{
    let mut entries = HashMap::new();
    let mut received = 0;

    let deadline = tokio::time::sleep(window);
    tokio::pin!(deadline);

    let outcome = loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break CollectOutcome::Cancelled,
            _ = &mut deadline => break CollectOutcome::WindowElapsed,
            next = subscription.next() => match next {
                Some(event) => {
                    received += 1;
                    if !is_relevant(&event) {
                        continue;
                    }
                    if let Entry::Vacant(slot) = entries.entry(derive_key(&event)) {
                        slot.insert(event);
                    }
                }
                None => break CollectOutcome::StreamClosed,
            },
        }
    };

    subscription.close();
    debug!(?outcome, received, kept = entries.len(), ?window, "Collection finished");

    Collection {
        entries,
        outcome,
        received,
    }
}

/// [`collect`] reduced to the set of derived keys
pub async fn collect_keys<K, R, D>(
    subscription: Subscription,
    is_relevant: R,
    derive_key: D,
    window: Duration,
    cancel: &mut CancelSignal,
) -> HashSet<K>
where
    K: Eq + Hash,
    R: FnMut(&RelayEvent) -> bool,
    D: FnMut(&RelayEvent) -> K,
{
    collect(subscription, is_relevant, derive_key, window, cancel)
        .await
        .into_keys()
}
