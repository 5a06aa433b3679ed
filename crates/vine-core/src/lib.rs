pub mod collector;
pub mod config;
pub mod constants;
pub mod curation;
pub mod models;
pub mod nostr;
pub mod reposts;
pub mod service;
pub mod stats;

pub use collector::{collect, collect_keys, CancelSignal, CollectOutcome, Collection};
pub use config::{ConfigError, CoreConfig};
pub use curation::{
    CuratedFeed, CurationMerge, FeedMode, HttpRankingSource, RankedObject, RankingError,
    RankingSource, StaticRanking,
};
pub use reposts::{RepostError, RepostQuery};
pub use service::CurationService;
pub use stats::{SharedSubscriptionStats, SubscriptionStats};
