//! nostr-sdk backed relay pool
//!
//! Each [`EventFilter`] becomes one relay subscription with a generated id.
//! A forwarding task per [`Subscription`] copies matching pool notifications
//! into a channel and unsubscribes every id once the consumer goes away, the
//! pool shuts down, or the notification channel closes.

use std::time::Duration;

use futures::future::BoxFuture;
use nostr_sdk::prelude::*;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use super::pool::{RelayError, RelayPool, Subscription};
use crate::models::{EventFilter, RelayEvent};

#[derive(Clone)]
pub struct NostrRelayPool {
    client: Client,
}

impl NostrRelayPool {
    /// Add the relays and connect, giving up after `timeout`.
    pub async fn connect(relay_urls: &[String], timeout: Duration) -> Result<Self, RelayError> {
        let client = Client::default();
        for url in relay_urls {
            client
                .add_relay(url)
                .await
                .map_err(|e| RelayError::Connect(format!("{}: {}", url, e)))?;
        }

        let connect_start = std::time::Instant::now();
        if tokio::time::timeout(timeout, client.connect()).await.is_err() {
            return Err(RelayError::Connect(format!(
                "timed out after {:?}",
                connect_start.elapsed()
            )));
        }
        info!(relays = relay_urls.len(), elapsed = ?connect_start.elapsed(), "Connected to relays");

        Ok(Self { client })
    }

    pub async fn disconnect(&self) {
        self.client.disconnect().await;
    }
}

/// Parse hex values, skipping invalid ones. A non-empty input with nothing
/// valid is an error: dropping the constraint would widen the filter.
fn parse_all<T, E: std::fmt::Display>(
    field: &str,
    values: &std::collections::BTreeSet<String>,
    parse: impl Fn(&str) -> Result<T, E>,
) -> Result<Vec<T>, RelayError> {
    let mut parsed = Vec::with_capacity(values.len());
    for value in values {
        match parse(value) {
            Ok(v) => parsed.push(v),
            Err(e) => debug!(field, value = %value, error = %e, "Skipping invalid filter value"),
        }
    }
    if parsed.is_empty() && !values.is_empty() {
        return Err(RelayError::InvalidFilter(format!("no valid {}", field)));
    }
    Ok(parsed)
}

pub fn to_nostr_filter(filter: &EventFilter) -> Result<Filter, RelayError> {
    let mut nostr_filter = Filter::new();

    if !filter.kinds.is_empty() {
        nostr_filter = nostr_filter.kinds(filter.kinds.iter().map(|k| Kind::from(*k)));
    }
    if !filter.ids.is_empty() {
        nostr_filter = nostr_filter.ids(parse_all("ids", &filter.ids, |v| EventId::from_hex(v))?);
    }
    if !filter.authors.is_empty() {
        nostr_filter =
            nostr_filter.authors(parse_all("authors", &filter.authors, |v| {
                PublicKey::from_hex(v)
            })?);
    }
    for (letter, values) in &filter.tags {
        let tag = SingleLetterTag::from_char(*letter)
            .map_err(|e| RelayError::InvalidFilter(format!("#{}: {}", letter, e)))?;
        nostr_filter = nostr_filter.custom_tags(tag, values.iter().cloned());
    }
    if let Some(limit) = filter.limit {
        nostr_filter = nostr_filter.limit(limit);
    }

    Ok(nostr_filter)
}

/// Send one REQ per filter, stopping as soon as the consumer is gone.
/// Returns how many REQs were attempted.
async fn send_requests(
    client: &Client,
    ids: &[SubscriptionId],
    filters: Vec<Filter>,
    tx: &mpsc::UnboundedSender<RelayEvent>,
) -> usize {
    let mut attempted = 0;
    for (id, filter) in ids.iter().zip(filters) {
        if tx.is_closed() {
            debug!(subscription = %id, "Consumer gone, skipping remaining requests");
            break;
        }
        attempted += 1;
        tokio::select! {
            _ = tx.closed() => break,
            result = client.subscribe_with_id(id.clone(), filter, None) => {
                if let Err(e) = result {
                    warn!(subscription = %id, error = %e, "Failed to subscribe");
                }
            }
        }
    }
    attempted
}

impl RelayPool for NostrRelayPool {
    /// Must be called from within a Tokio runtime.
    fn subscribe(&self, filters: Vec<EventFilter>) -> Result<Subscription, RelayError> {
        let mut nostr_filters = Vec::with_capacity(filters.len());
        let mut last_error = None;
        for filter in &filters {
            match to_nostr_filter(filter) {
                Ok(nostr_filter) => nostr_filters.push(nostr_filter),
                Err(e) => {
                    warn!(filter = %filter.to_json(), error = %e, "Dropping unusable filter");
                    last_error = Some(e);
                }
            }
        }
        if nostr_filters.is_empty() {
            return match last_error {
                Some(e) => Err(e),
                None => Ok(Subscription::empty()),
            };
        }

        // Take the receiver before any REQ goes out so no event is missed
        let mut notifications = self.client.notifications();
        let (tx, rx) = mpsc::unbounded_channel::<RelayEvent>();
        let client = self.client.clone();
        let ids: Vec<SubscriptionId> = nostr_filters
            .iter()
            .map(|_| SubscriptionId::generate())
            .collect();

        tokio::spawn(async move {
            send_requests(&client, &ids, nostr_filters, &tx).await;

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    result = notifications.recv() => match result {
                        Ok(RelayPoolNotification::Event { relay_url, subscription_id, event }) => {
                            if !ids.contains(&subscription_id) {
                                continue;
                            }
                            debug!(kind = event.kind.as_u16(), id = %event.id, relay = %relay_url, "Received event");
                            if tx.send(RelayEvent::from(&*event)).is_err() {
                                break;
                            }
                        }
                        Ok(RelayPoolNotification::Shutdown) => {
                            debug!("Relay pool shut down, ending subscription");
                            break;
                        }
                        Ok(_) => {}
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            warn!(skipped, "Notification receiver lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }

            for id in &ids {
                client.unsubscribe(id).await;
            }
            debug!(count = ids.len(), "Released relay subscriptions");
        });

        let events = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|event| (event, rx))
        });
        Ok(Subscription::new(events))
    }

    fn publish(&self, event: RelayEvent) -> BoxFuture<'_, Result<(), RelayError>> {
        Box::pin(async move {
            let event = Event::from_json(event.to_json())
                .map_err(|e| RelayError::InvalidEvent(e.to_string()))?;

            let output = self
                .client
                .send_event(&event)
                .await
                .map_err(|e| RelayError::Publish(e.to_string()))?;

            if output.success.is_empty() {
                let reasons: Vec<String> = output.failed.values().cloned().collect();
                return Err(RelayError::Publish(format!(
                    "no relay accepted {}: {}",
                    event.id,
                    reasons.join("; ")
                )));
            }
            Ok(())
        })
    }
}
