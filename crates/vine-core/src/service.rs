//! Curation service
//!
//! Owns the relay pool, the ranking source and the shutdown signal shared by
//! every query it starts. Shutting the service down ends all in-flight
//! collections at once; each returns what it had gathered so far.

use std::collections::HashSet;
use std::sync::Arc;

use tokio::sync::watch;
use tracing::info;

use crate::collector::CancelSignal;
use crate::config::CoreConfig;
use crate::curation::{CuratedFeed, CurationMerge, RankedObject, RankingSource};
use crate::models::{RelayEvent, VideoEvent};
use crate::nostr::{Identity, RelayPool};
use crate::reposts::{RepostError, RepostQuery};
use crate::stats::{SharedSubscriptionStats, SubscriptionStats};

pub struct CurationService {
    pool: Arc<dyn RelayPool>,
    ranking: Arc<dyn RankingSource>,
    config: CoreConfig,
    shutdown_tx: watch::Sender<bool>,
    stats: SharedSubscriptionStats,
}

impl CurationService {
    pub fn new(
        pool: Arc<dyn RelayPool>,
        ranking: Arc<dyn RankingSource>,
        config: CoreConfig,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            pool,
            ranking,
            config,
            shutdown_tx,
            stats: SharedSubscriptionStats::new(),
        }
    }

    fn cancel_signal(&self) -> CancelSignal {
        CancelSignal::new(self.shutdown_tx.subscribe())
    }

    fn repost_query(&self) -> RepostQuery {
        RepostQuery::new(
            self.pool.clone(),
            self.config.repost_kind,
            self.config.repost_window(),
        )
        .with_stats(self.stats.clone())
        .with_cancel(self.cancel_signal())
    }

    fn merge(&self) -> CurationMerge {
        CurationMerge::new(
            self.pool.clone(),
            self.ranking.clone(),
            self.config.fetch_window(),
            self.config.ranking_timeout(),
            self.config.trending_limit,
        )
        .with_stats(self.stats.clone())
        .with_cancel(self.cancel_signal())
    }

    pub async fn reposters_for(&self, subject: &str) -> HashSet<String> {
        self.repost_query().reposters_for(subject).await
    }

    pub async fn reposted_by(&self, author: &str) -> HashSet<String> {
        self.repost_query().reposted_by(author).await
    }

    pub async fn has_reposted(&self, subject: &str, author: &str) -> bool {
        self.repost_query().has_reposted(subject, author).await
    }

    pub async fn publish_repost(
        &self,
        video: &VideoEvent,
        identity: &dyn Identity,
        created_at: u64,
    ) -> Result<RelayEvent, RepostError> {
        self.repost_query()
            .publish_repost(video, identity, created_at)
            .await
    }

    /// Trending feed: the ranking source's order merged with `local`
    pub async fn refresh_trending<T: RankedObject>(&self, local: &[T]) -> CuratedFeed<T> {
        self.merge().refresh_ranked(local).await
    }

    /// Cancel every outstanding query. Queries started afterwards return
    /// immediately with empty results.
    pub fn shutdown(&self) {
        if !*self.shutdown_tx.borrow() {
            info!(active = self.stats.snapshot().active(), "Shutting down curation service");
        }
        self.shutdown_tx.send_replace(true);
    }

    pub fn is_shut_down(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub fn subscription_stats(&self) -> SubscriptionStats {
        self.stats.snapshot()
    }
}

impl Drop for CurationService {
    fn drop(&mut self) {
        self.shutdown_tx.send_replace(true);
    }
}
