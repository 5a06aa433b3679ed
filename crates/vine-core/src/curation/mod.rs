pub mod merge;
pub mod ranking;

pub use merge::{missing_filters, CuratedFeed, CurationMerge, FeedMode, RankedObject};
pub use ranking::{parse_ranking, HttpRankingSource, RankingError, RankingSource, StaticRanking};
