//! In-process relay pool
//!
//! Replays stored events that match a subscription, then keeps the
//! subscription live so later [`MemoryRelayPool::push`] calls reach it. Used
//! by the tests and for offline runs of the CLI.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures::future::BoxFuture;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::pool::{RelayError, RelayPool, Subscription};
use crate::models::{EventFilter, RelayEvent};

struct LiveSubscription {
    filters: Vec<EventFilter>,
    tx: mpsc::UnboundedSender<RelayEvent>,
}

#[derive(Default)]
struct MemoryState {
    stored: Vec<RelayEvent>,
    published: Vec<RelayEvent>,
    live: HashMap<u64, LiveSubscription>,
    active: HashSet<u64>,
    next_id: u64,
    opened: u64,
}

#[derive(Clone, Default)]
pub struct MemoryRelayPool {
    state: Arc<Mutex<MemoryState>>,
    close_after_replay: bool,
}

fn matches_any(filters: &[EventFilter], event: &RelayEvent) -> bool {
    filters.iter().any(|filter| filter.matches(event))
}

impl MemoryRelayPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscriptions end right after the stored events are replayed, like a
    /// relay that closes on EOSE.
    pub fn closing_after_replay() -> Self {
        Self {
            close_after_replay: true,
            ..Self::default()
        }
    }

    pub fn with_events(self, events: impl IntoIterator<Item = RelayEvent>) -> Self {
        self.state.lock().stored.extend(events);
        self
    }

    /// Store an event and deliver it to every live subscription it matches
    pub fn push(&self, event: RelayEvent) {
        let mut state = self.state.lock();
        // Drop senders whose receiver is gone
        state.live.retain(|_, live| {
            !matches_any(&live.filters, &event) || live.tx.send(event.clone()).is_ok()
        });
        state.stored.push(event);
    }

    /// End every live stream, as if all relays closed their side
    pub fn close_all(&self) {
        self.state.lock().live.clear();
    }

    /// Subscriptions handed out and not yet released
    pub fn active_subscriptions(&self) -> usize {
        self.state.lock().active.len()
    }

    pub fn opened_subscriptions(&self) -> u64 {
        self.state.lock().opened
    }

    pub fn published(&self) -> Vec<RelayEvent> {
        self.state.lock().published.clone()
    }
}

impl RelayPool for MemoryRelayPool {
    fn subscribe(&self, filters: Vec<EventFilter>) -> Result<Subscription, RelayError> {
        let (tx, rx) = mpsc::unbounded_channel();

        let id = {
            let mut state = self.state.lock();
            let id = state.next_id;
            state.next_id += 1;
            state.opened += 1;
            state.active.insert(id);

            for event in state.stored.iter().filter(|e| matches_any(&filters, e)) {
                let _ = tx.send(event.clone());
            }
            if !self.close_after_replay {
                state.live.insert(id, LiveSubscription { filters, tx });
            }
            id
        };

        let events = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });

        let state = self.state.clone();
        Ok(Subscription::new(events).on_release(move || {
            let mut state = state.lock();
            state.live.remove(&id);
            state.active.remove(&id);
        }))
    }

    fn publish(&self, event: RelayEvent) -> BoxFuture<'_, Result<(), RelayError>> {
        Box::pin(async move {
            self.state.lock().published.push(event.clone());
            self.push(event);
            Ok(())
        })
    }
}
