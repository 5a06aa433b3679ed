//! Ranked feed merge
//!
//! The ranking source decides order, local knowledge only decides presence.
//! Ranked ids the caller does not hold are fetched once, within a bounded
//! window; whatever is still missing afterwards is dropped from the feed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::ranking::RankingSource;
use crate::collector::{collect, CancelSignal};
use crate::models::{AddressableId, EventFilter, RelayEvent, VideoEvent};
use crate::nostr::RelayPool;
use crate::stats::SharedSubscriptionStats;

/// Object that can take part in a ranked feed
pub trait RankedObject: Clone + Send + Sync {
    fn from_event(event: &RelayEvent) -> Option<Self>;

    /// Identifiers a ranking source may use for this object. The first one is
    /// its primary id.
    fn identifiers(&self) -> Vec<String>;
}

impl RankedObject for VideoEvent {
    fn from_event(event: &RelayEvent) -> Option<Self> {
        VideoEvent::from_event(event)
    }

    fn identifiers(&self) -> Vec<String> {
        VideoEvent::identifiers(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedMode {
    /// Ordered by the ranking source
    Ranked,
    /// Ranking unavailable; local objects in their original order
    LocalFallback,
}

#[derive(Debug, Clone)]
pub struct CuratedFeed<T> {
    pub items: Vec<T>,
    pub mode: FeedMode,
    /// Ranked ids that were neither local nor fetched in time
    pub unresolved: Vec<String>,
    /// Objects fetched from relays during this refresh
    pub fetched: usize,
}

impl<T: Clone> CuratedFeed<T> {
    fn local_fallback(local: &[T]) -> Self {
        Self {
            items: local.to_vec(),
            mode: FeedMode::LocalFallback,
            unresolved: Vec::new(),
            fetched: 0,
        }
    }
}

/// Filters covering `missing`: one `ids` filter for plain event ids, one
/// kind/author/d-tag filter per addressable coordinate.
pub fn missing_filters(missing: &[String]) -> Vec<EventFilter> {
    let mut event_ids = Vec::new();
    let mut filters = Vec::new();

    for id in missing {
        match AddressableId::parse(id) {
            Some(address) => filters.push(
                EventFilter::new()
                    .kind(address.kind)
                    .author(address.pubkey)
                    .reference('d', address.d_tag),
            ),
            None => event_ids.push(id.clone()),
        }
    }

    if !event_ids.is_empty() {
        filters.insert(0, EventFilter::new().ids(event_ids).limit(missing.len()));
    }
    filters
}

/// First identifier of the object in `event` that is still wanted
fn matched_identifier<T: RankedObject>(
    event: &RelayEvent,
    wanted: &HashSet<&str>,
) -> Option<String> {
    T::from_event(event)?
        .identifiers()
        .into_iter()
        .find(|id| wanted.contains(id.as_str()))
}

pub struct CurationMerge {
    pool: Arc<dyn RelayPool>,
    ranking: Arc<dyn RankingSource>,
    fetch_window: Duration,
    ranking_timeout: Duration,
    limit: usize,
    stats: SharedSubscriptionStats,
    cancel: CancelSignal,
}

impl CurationMerge {
    pub fn new(
        pool: Arc<dyn RelayPool>,
        ranking: Arc<dyn RankingSource>,
        fetch_window: Duration,
        ranking_timeout: Duration,
        limit: usize,
    ) -> Self {
        Self {
            pool,
            ranking,
            fetch_window,
            ranking_timeout,
            limit,
            stats: SharedSubscriptionStats::new(),
            cancel: CancelSignal::never(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_stats(mut self, stats: SharedSubscriptionStats) -> Self {
        self.stats = stats;
        self
    }

    async fn ranked_ids(&self) -> Option<Vec<String>> {
        let fetch = self.ranking.fetch_ranked(self.limit);
        let mut cancel = self.cancel.clone();
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Ranking wait cancelled, using local order");
                None
            }
            result = tokio::time::timeout(self.ranking_timeout, fetch) => match result {
                Ok(Ok(ids)) => {
                    let mut seen = HashSet::new();
                    Some(ids.into_iter().filter(|id| seen.insert(id.clone())).collect())
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Ranking source failed, using local order");
                    None
                }
                Err(_) => {
                    warn!(timeout = ?self.ranking_timeout, "Ranking source timed out, using local order");
                    None
                }
            },
        }
    }

    /// Merge the current ranking with `local`
    pub async fn refresh_ranked<T: RankedObject>(&self, local: &[T]) -> CuratedFeed<T> {
        let Some(ranked) = self.ranked_ids().await else {
            return CuratedFeed::local_fallback(local);
        };

        let mut local_index: HashMap<String, usize> = HashMap::new();
        for (position, object) in local.iter().enumerate() {
            for id in object.identifiers() {
                local_index.entry(id).or_insert(position);
            }
        }

        let missing: Vec<String> = ranked
            .iter()
            .filter(|id| !local_index.contains_key(id.as_str()))
            .cloned()
            .collect();
        let resolved = if missing.is_empty() {
            HashMap::new()
        } else {
            self.fetch_missing::<T>(&missing).await
        };

        let mut items = Vec::new();
        let mut unresolved = Vec::new();
        let mut emitted = HashSet::new();
        for id in &ranked {
            let object = match local_index.get(id) {
                Some(&position) => &local[position],
                None => match resolved.get(id) {
                    Some(object) => object,
                    None => {
                        unresolved.push(id.clone());
                        continue;
                    }
                },
            };
            // An id and a coordinate can both point at the same object
            let primary = object.identifiers().into_iter().next().unwrap_or_default();
            if emitted.insert(primary) {
                items.push(object.clone());
            }
        }

        let fetched: HashSet<String> = resolved
            .values()
            .filter_map(|object| object.identifiers().into_iter().next())
            .collect();

        info!(
            ranked = ranked.len(),
            items = items.len(),
            fetched = fetched.len(),
            unresolved = unresolved.len(),
            "Refreshed ranked feed"
        );

        CuratedFeed {
            items,
            mode: FeedMode::Ranked,
            unresolved,
            fetched: fetched.len(),
        }
    }

    /// Fetch objects for `missing` in one bounded subscription, keyed by every
    /// missing identifier they satisfy.
    async fn fetch_missing<T: RankedObject>(&self, missing: &[String]) -> HashMap<String, T> {
        let subscription = match self.pool.subscribe(missing_filters(missing)) {
            Ok(subscription) => self.stats.track("ranked-fetch", subscription),
            Err(e) => {
                warn!(error = %e, missing = missing.len(), "Fetch of ranked ids failed");
                return HashMap::new();
            }
        };

        let wanted: HashSet<&str> = missing.iter().map(String::as_str).collect();
        let collection = collect(
            subscription,
            |event| matched_identifier::<T>(event, &wanted).is_some(),
            |event| matched_identifier::<T>(event, &wanted).unwrap_or_default(),
            self.fetch_window,
            &mut self.cancel.clone(),
        )
        .await;
        debug!(
            outcome = ?collection.outcome(),
            received = collection.received(),
            matched = collection.len(),
            "Fetched missing ranked objects"
        );

        let mut resolved = HashMap::new();
        for event in collection.into_entries().into_values() {
            let Some(object) = T::from_event(&event) else {
                continue;
            };
            for id in object.identifiers() {
                if wanted.contains(id.as_str()) {
                    resolved.entry(id).or_insert_with(|| object.clone());
                }
            }
        }
        resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curation::ranking::{RankingError, StaticRanking};
    use crate::models::EventTag;
    use crate::nostr::MemoryRelayPool;
    use futures::future::BoxFuture;

    fn video(id: &str, kind: u16, d_tag: Option<&str>) -> RelayEvent {
        let mut tags = vec![EventTag::parse(vec!["title".into(), format!("video {}", id)])];
        if let Some(d) = d_tag {
            tags.push(EventTag::parse(vec!["d".into(), d.into()]));
        }
        RelayEvent {
            id: id.to_string(),
            author: "pk".to_string(),
            kind,
            tags,
            content: String::new(),
            created_at: 1,
            sig: None,
        }
    }

    fn local(events: &[RelayEvent]) -> Vec<VideoEvent> {
        events.iter().filter_map(VideoEvent::from_event).collect()
    }

    fn ids(feed: &CuratedFeed<VideoEvent>) -> Vec<&str> {
        feed.items.iter().map(|v| v.id.as_str()).collect()
    }

    fn merge(pool: &MemoryRelayPool, ranking: StaticRanking) -> CurationMerge {
        CurationMerge::new(
            Arc::new(pool.clone()),
            Arc::new(ranking),
            Duration::from_millis(50),
            Duration::from_secs(1),
            50,
        )
    }

    #[test]
    fn test_missing_filters_split_ids_and_coordinates() {
        let filters = missing_filters(&["x".to_string(), "34236:pk:slug".to_string()]);
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].to_json(), serde_json::json!({"ids": ["x"], "limit": 2}));
        assert_eq!(
            filters[1].to_json(),
            serde_json::json!({"authors": ["pk"], "kinds": [34236], "#d": ["slug"]})
        );
    }

    #[tokio::test]
    async fn test_ranked_order_kept_and_unresolved_dropped() {
        // z is on the relay, x never arrives
        let pool = MemoryRelayPool::new().with_events([video("z", 22, None)]);
        let merge = merge(&pool, StaticRanking::new(["x", "y", "z"]));

        let feed = merge.refresh_ranked(&local(&[video("y", 22, None)])).await;

        assert_eq!(feed.mode, FeedMode::Ranked);
        assert_eq!(ids(&feed), vec!["y", "z"]);
        assert_eq!(feed.unresolved, vec!["x"]);
        assert_eq!(feed.fetched, 1);
        assert_eq!(pool.active_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_local_presence_never_changes_order() {
        let pool = MemoryRelayPool::new();
        let merge = merge(&pool, StaticRanking::new(["c", "a", "b", "a"]));

        let feed = merge
            .refresh_ranked(&local(&[
                video("a", 22, None),
                video("b", 22, None),
                video("c", 22, None),
            ]))
            .await;

        assert_eq!(ids(&feed), vec!["c", "a", "b"]);
        assert!(feed.unresolved.is_empty());
        // Everything was local, so nothing was fetched
        assert_eq!(pool.opened_subscriptions(), 0);
    }

    #[tokio::test]
    async fn test_ranking_failure_falls_back_to_local_order() {
        let pool = MemoryRelayPool::new();
        let merge = merge(&pool, StaticRanking::failing("analytics down"));

        let feed = merge
            .refresh_ranked(&local(&[video("b", 22, None), video("a", 22, None)]))
            .await;

        assert_eq!(feed.mode, FeedMode::LocalFallback);
        assert_eq!(ids(&feed), vec!["b", "a"]);
    }

    struct SlowRanking;

    impl RankingSource for SlowRanking {
        fn fetch_ranked(&self, _limit: usize) -> BoxFuture<'_, Result<Vec<String>, RankingError>> {
            Box::pin(futures::future::pending())
        }
    }

    #[tokio::test]
    async fn test_ranking_timeout_falls_back() {
        let pool = MemoryRelayPool::new();
        let merge = CurationMerge::new(
            Arc::new(pool),
            Arc::new(SlowRanking),
            Duration::from_millis(50),
            Duration::from_millis(20),
            50,
        );

        let feed = merge.refresh_ranked(&local(&[video("a", 22, None)])).await;
        assert_eq!(feed.mode, FeedMode::LocalFallback);
        assert_eq!(ids(&feed), vec!["a"]);
    }

    #[tokio::test]
    async fn test_cancel_ends_ranking_wait() {
        let (tx, rx) = tokio::sync::watch::channel(false);
        let merge = CurationMerge::new(
            Arc::new(MemoryRelayPool::new()),
            Arc::new(SlowRanking),
            Duration::from_millis(50),
            Duration::from_secs(30),
            50,
        )
        .with_cancel(CancelSignal::new(rx));

        let held = local(&[video("a", 22, None)]);
        let refresh = merge.refresh_ranked(&held);
        tokio::pin!(refresh);
        assert!(tokio::time::timeout(Duration::from_millis(20), &mut refresh)
            .await
            .is_err());

        tx.send_replace(true);
        let feed = tokio::time::timeout(Duration::from_millis(500), refresh)
            .await
            .expect("cancel should end the ranking wait");
        assert_eq!(feed.mode, FeedMode::LocalFallback);
        assert_eq!(ids(&feed), vec!["a"]);
    }

    #[tokio::test]
    async fn test_coordinate_ranked_ids_resolve_from_relay() {
        let pool = MemoryRelayPool::new().with_events([
            video("v1", 34236, Some("slug")),
            video("v2", 34236, Some("other")),
        ]);
        let merge = merge(&pool, StaticRanking::new(["34236:pk:slug", "v1"]));

        let feed = merge.refresh_ranked::<VideoEvent>(&[]).await;

        // Both ranked ids name the same video; it appears once
        assert_eq!(ids(&feed), vec!["v1"]);
        assert!(feed.unresolved.is_empty());
    }

    #[tokio::test]
    async fn test_local_coordinate_counts_as_present() {
        let pool = MemoryRelayPool::new();
        let merge = merge(&pool, StaticRanking::new(["34236:pk:slug"]));

        let feed = merge
            .refresh_ranked(&local(&[video("v1", 34236, Some("slug"))]))
            .await;

        assert_eq!(ids(&feed), vec!["v1"]);
        assert_eq!(pool.opened_subscriptions(), 0);
    }
}
