//! Repost resolution queries
//!
//! Each query builds one filter, opens one subscription and folds it through
//! the deduplicating collector. Subscribe failures degrade to an empty
//! result; nothing here is fatal to the caller.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::collector::{collect_keys, CancelSignal};
use crate::models::{is_relevant, AddressableId, EventFilter, Repost, VideoEvent};
use crate::nostr::{
    Identity, IdentityError, RelayError, RelayPool, Subscription, UnsignedEvent,
};
use crate::stats::SharedSubscriptionStats;

#[derive(Debug, thiserror::Error)]
pub enum RepostError {
    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error(transparent)]
    Relay(#[from] RelayError),
}

/// Filter for reposts of `subject`: `#a` for addressable ids, `#e` otherwise
pub fn subject_filter(repost_kind: u16, subject: &str) -> EventFilter {
    let letter = if AddressableId::parse(subject).is_some() {
        'a'
    } else {
        'e'
    };
    EventFilter::new().kind(repost_kind).reference(letter, subject)
}

/// Unsigned repost of `video`, referencing it by id and, when addressable,
/// by coordinate.
pub fn build_repost(video: &VideoEvent, repost_kind: u16, created_at: u64) -> UnsignedEvent {
    let mut tags = vec![vec!["e".to_string(), video.id.clone()]];
    if let Some(coordinate) = video.coordinate() {
        tags.push(vec!["a".to_string(), coordinate.to_string()]);
    }
    tags.push(vec!["p".to_string(), video.pubkey.clone()]);
    tags.push(vec!["k".to_string(), video.kind.to_string()]);

    UnsignedEvent {
        kind: repost_kind,
        tags,
        content: String::new(),
        created_at,
    }
}

#[derive(Clone)]
pub struct RepostQuery {
    pool: Arc<dyn RelayPool>,
    repost_kind: u16,
    window: Duration,
    stats: SharedSubscriptionStats,
    cancel: CancelSignal,
}

impl RepostQuery {
    pub fn new(pool: Arc<dyn RelayPool>, repost_kind: u16, window: Duration) -> Self {
        Self {
            pool,
            repost_kind,
            window,
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

    fn open(&self, query: &'static str, filter: EventFilter) -> Option<Subscription> {
        match self.pool.subscribe(vec![filter]) {
            Ok(subscription) => Some(self.stats.track(query, subscription)),
            Err(e) => {
                warn!(query, error = %e, "Subscribe failed, returning empty result");
                None
            }
        }
    }

    /// Identities that reposted `subject`, in no particular order
    pub async fn reposters_for(&self, subject: &str) -> HashSet<String> {
        let Some(subscription) = self.open("reposters", subject_filter(self.repost_kind, subject))
        else {
            return HashSet::new();
        };

        let kind = self.repost_kind;
        let reposters = collect_keys(
            subscription,
            |event| is_relevant(event, kind, subject),
            |event| event.author.clone(),
            self.window,
            &mut self.cancel.clone(),
        )
        .await;

        debug!(subject, count = reposters.len(), "Resolved reposters");
        reposters
    }

    /// Subjects (event ids or coordinates) that `author` has reposted
    pub async fn reposted_by(&self, author: &str) -> HashSet<String> {
        let filter = EventFilter::new().kind(self.repost_kind).author(author);
        let Some(subscription) = self.open("reposted-by", filter) else {
            return HashSet::new();
        };

        let kind = self.repost_kind;
        let subjects = collect_keys(
            subscription,
            |event| event.author == author && Repost::from_event(event, kind).is_some(),
            |event| {
                Repost::from_event(event, kind)
                    .map(|repost| repost.subject)
                    .unwrap_or_default()
            },
            self.window,
            &mut self.cancel.clone(),
        )
        .await;

        debug!(author, count = subjects.len(), "Resolved reposted subjects");
        subjects
    }

    pub async fn has_reposted(&self, subject: &str, author: &str) -> bool {
        let filter = subject_filter(self.repost_kind, subject).author(author);
        let Some(subscription) = self.open("has-reposted", filter) else {
            return false;
        };

        let kind = self.repost_kind;
        let found = collect_keys(
            subscription,
            |event| event.author == author && is_relevant(event, kind, subject),
            |event| event.author.clone(),
            self.window,
            &mut self.cancel.clone(),
        )
        .await;

        !found.is_empty()
    }

    /// Sign a repost of `video` with `identity` and publish it
    pub async fn publish_repost(
        &self,
        video: &VideoEvent,
        identity: &dyn Identity,
        created_at: u64,
    ) -> Result<crate::models::RelayEvent, RepostError> {
        let unsigned = build_repost(video, self.repost_kind, created_at);
        let signed = identity.sign(unsigned).await?;
        self.pool.publish(signed.clone()).await?;
        debug!(id = %signed.id, video = %video.id, "Published repost");
        Ok(signed)
    }
}
