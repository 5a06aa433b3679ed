use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    self, kinds, DEFAULT_FETCH_WINDOW_MS, DEFAULT_RANKING_TIMEOUT_MS, DEFAULT_REPOST_WINDOW_MS,
    DEFAULT_TRENDING_LIMIT,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Engine configuration, loadable from a camelCase JSON file. Every field has
/// a default so a partial file is enough.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoreConfig {
    pub relays: Vec<String>,
    pub repost_kind: u16,
    pub repost_window_ms: u64,
    pub fetch_window_ms: u64,
    pub ranking_url: String,
    pub ranking_timeout_ms: u64,
    pub trending_limit: usize,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            relays: vec![constants::RELAY_URL.to_string()],
            repost_kind: kinds::REPOST,
            repost_window_ms: DEFAULT_REPOST_WINDOW_MS,
            fetch_window_ms: DEFAULT_FETCH_WINDOW_MS,
            ranking_url: constants::RANKING_URL.to_string(),
            ranking_timeout_ms: DEFAULT_RANKING_TIMEOUT_MS,
            trending_limit: DEFAULT_TRENDING_LIMIT,
        }
    }
}

impl CoreConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn repost_window(&self) -> Duration {
        Duration::from_millis(self.repost_window_ms)
    }

    pub fn fetch_window(&self) -> Duration {
        Duration::from_millis(self.fetch_window_ms)
    }

    pub fn ranking_timeout(&self) -> Duration {
        Duration::from_millis(self.ranking_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_config_minimal() {
        let config = CoreConfig::from_json("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.repost_window(), Duration::from_secs(5));
        assert_eq!(config.repost_kind, 6);
    }

    #[test]
    fn test_parse_config_overrides() {
        let json = r#"{
            "relays": ["wss://a", "wss://b"],
            "repostKind": 16,
            "repostWindowMs": 1500,
            "rankingTimeoutMs": 250
        }"#;
        let config = CoreConfig::from_json(json).unwrap();
        assert_eq!(config.relays, vec!["wss://a", "wss://b"]);
        assert_eq!(config.repost_kind, 16);
        assert_eq!(config.repost_window(), Duration::from_millis(1500));
        assert_eq!(config.ranking_timeout(), Duration::from_millis(250));
        assert_eq!(config.fetch_window_ms, DEFAULT_FETCH_WINDOW_MS);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"trendingLimit": 7}}"#).unwrap();

        let config = CoreConfig::load(file.path()).unwrap();
        assert_eq!(config.trending_limit, 7);
    }

    #[test]
    fn test_load_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = CoreConfig::load(dir.path().join("missing.json"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(matches!(
            CoreConfig::from_json("{not json"),
            Err(ConfigError::Parse(_))
        ));
    }
}
