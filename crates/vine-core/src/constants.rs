//! Application-wide constants
//!
//! Centralized location for relay URLs, endpoints and default windows
//! shared by the query components and the config layer.

/// Default Nostr relay URL
pub const RELAY_URL: &str = "wss://relay.divine.video";

/// Default analytics endpoint serving the trending ranking
pub const RANKING_URL: &str = "https://api.openvine.co/analytics/trending/vines";

/// How long a repost query listens before returning what it has
pub const DEFAULT_REPOST_WINDOW_MS: u64 = 5_000;

/// How long the curation merge waits for missing objects
pub const DEFAULT_FETCH_WINDOW_MS: u64 = 5_000;

/// Upper bound on the out-of-process ranking call
pub const DEFAULT_RANKING_TIMEOUT_MS: u64 = 10_000;

/// Number of ranked identifiers requested from the ranking source
pub const DEFAULT_TRENDING_LIMIT: usize = 50;

// Nostr event kinds used by the curation engine
pub mod kinds {
    /// Repost of a text note (NIP-18)
    pub const REPOST: u16 = 6;
    /// Regular video
    pub const VIDEO: u16 = 21;
    /// Regular short-form video
    pub const SHORT_VIDEO: u16 = 22;
    /// Addressable video (NIP-71)
    pub const ADDRESSABLE_VIDEO: u16 = 34235;
    /// Addressable short-form video (NIP-71)
    pub const ADDRESSABLE_SHORT_VIDEO: u16 = 34236;

    /// Kinds that decode into a `VideoEvent`
    pub const VIDEO_KINDS: [u16; 4] = [VIDEO, SHORT_VIDEO, ADDRESSABLE_VIDEO, ADDRESSABLE_SHORT_VIDEO];

    /// Addressable (parameterized replaceable) range per NIP-01
    pub fn is_addressable(kind: u16) -> bool {
        (30_000..40_000).contains(&kind)
    }
}
