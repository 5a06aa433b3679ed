use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::nostr::Subscription;

/// Subscription bookkeeping for a service
#[derive(Debug, Default, Clone)]
pub struct SubscriptionStats {
    pub opened: u64,
    pub closed: u64,
    /// Subscriptions opened per query name
    pub by_query: HashMap<&'static str, u64>,
}

impl SubscriptionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_open(&mut self, query: &'static str) {
        self.opened += 1;
        *self.by_query.entry(query).or_insert(0) += 1;
    }

    pub fn record_close(&mut self) {
        self.closed += 1;
    }

    /// Subscriptions opened and not yet released
    pub fn active(&self) -> u64 {
        self.opened.saturating_sub(self.closed)
    }
}

/// Thread-safe wrapper for subscription stats
#[derive(Debug, Clone)]
pub struct SharedSubscriptionStats {
    inner: Arc<RwLock<SubscriptionStats>>,
}

impl Default for SharedSubscriptionStats {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedSubscriptionStats {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(SubscriptionStats::new())),
        }
    }

    pub fn record_open(&self, query: &'static str) {
        if let Ok(mut stats) = self.inner.write() {
            stats.record_open(query);
        }
    }

    pub fn record_close(&self) {
        if let Ok(mut stats) = self.inner.write() {
            stats.record_close();
        }
    }

    /// Count `subscription` as opened by `query` and closed when it releases
    pub fn track(&self, query: &'static str, subscription: Subscription) -> Subscription {
        self.record_open(query);
        let stats = self.clone();
        subscription.on_release(move || stats.record_close())
    }

    pub fn snapshot(&self) -> SubscriptionStats {
        self.inner.read().map(|s| s.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_tracks_open_minus_closed() {
        let stats = SharedSubscriptionStats::new();
        stats.record_open("reposters");
        stats.record_open("reposters");
        stats.record_open("trending-fetch");
        stats.record_close();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.active(), 2);
        assert_eq!(snapshot.by_query.get("reposters"), Some(&2));
    }

    #[test]
    fn test_track_counts_release() {
        let stats = SharedSubscriptionStats::new();
        let subscription = stats.track("reposters", Subscription::empty());
        assert_eq!(stats.snapshot().active(), 1);
        drop(subscription);
        assert_eq!(stats.snapshot().active(), 0);
    }
}
