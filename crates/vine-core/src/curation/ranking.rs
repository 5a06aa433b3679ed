//! External ranking sources
//!
//! A ranking source returns an ordered list of object identifiers: event ids
//! or `kind:pubkey:d-tag` coordinates. It knows nothing about the objects
//! themselves.

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum RankingError {
    #[error("Ranking request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Ranking API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Failed to parse ranking response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Ranking unavailable: {0}")]
    Unavailable(String),
}

pub trait RankingSource: Send + Sync {
    /// Up to `limit` identifiers, best first
    fn fetch_ranked(&self, limit: usize) -> BoxFuture<'_, Result<Vec<String>, RankingError>>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RankedEntry {
    Id(String),
    Object {
        #[serde(rename = "eventId", alias = "event_id", alias = "id")]
        event_id: String,
    },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RankingResponse {
    Wrapped {
        #[serde(alias = "videos")]
        vines: Vec<RankedEntry>,
    },
    Bare(Vec<RankedEntry>),
}

/// Accepts `{"vines": [{"eventId": ..}, ..]}` or a bare array of ids/objects
pub fn parse_ranking(body: &str) -> Result<Vec<String>, RankingError> {
    let entries = match serde_json::from_str(body)? {
        RankingResponse::Wrapped { vines } => vines,
        RankingResponse::Bare(entries) => entries,
    };
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            RankedEntry::Id(id) => id,
            RankedEntry::Object { event_id } => event_id,
        })
        .filter(|id| !id.is_empty())
        .collect())
}

/// Ranking fetched over HTTP from an analytics endpoint
pub struct HttpRankingSource {
    url: String,
    client: reqwest::Client,
}

impl HttpRankingSource {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    async fn fetch(&self, limit: usize) -> Result<Vec<String>, RankingError> {
        let response = self
            .client
            .get(&self.url)
            .query(&[("limit", limit)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(RankingError::Status { status, body });
        }

        let body = response.text().await?;
        let ids = parse_ranking(&body)?;
        debug!(url = %self.url, count = ids.len(), "Fetched ranking");
        Ok(ids)
    }
}

impl RankingSource for HttpRankingSource {
    fn fetch_ranked(&self, limit: usize) -> BoxFuture<'_, Result<Vec<String>, RankingError>> {
        Box::pin(self.fetch(limit))
    }
}

/// Fixed ranking, or a fixed failure
#[derive(Debug, Clone)]
pub struct StaticRanking {
    result: Result<Vec<String>, String>,
}

impl StaticRanking {
    pub fn new<S: Into<String>>(ids: impl IntoIterator<Item = S>) -> Self {
        Self {
            result: Ok(ids.into_iter().map(Into::into).collect()),
        }
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            result: Err(message.into()),
        }
    }
}

impl RankingSource for StaticRanking {
    fn fetch_ranked(&self, limit: usize) -> BoxFuture<'_, Result<Vec<String>, RankingError>> {
        let result = match &self.result {
            Ok(ids) => Ok(ids.iter().take(limit).cloned().collect()),
            Err(message) => Err(RankingError::Unavailable(message.clone())),
        };
        Box::pin(async move { result })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_response() {
        let body = r#"{"vines":[{"eventId":"a","viewCount":10},{"eventId":"b"}],"period":"24h"}"#;
        assert_eq!(parse_ranking(body).unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_bare_arrays() {
        assert_eq!(
            parse_ranking(r#"["x", "34236:pk:slug"]"#).unwrap(),
            vec!["x", "34236:pk:slug"]
        );
        assert_eq!(
            parse_ranking(r#"[{"id":"y"},"z",{"eventId":""}]"#).unwrap(),
            vec!["y", "z"]
        );
    }

    #[test]
    fn test_parse_rejects_unknown_shape() {
        assert!(matches!(
            parse_ranking(r#"{"items":[]}"#),
            Err(RankingError::Parse(_))
        ));
    }

    #[tokio::test]
    async fn test_static_ranking_respects_limit() {
        let ranking = StaticRanking::new(["a", "b", "c"]);
        assert_eq!(ranking.fetch_ranked(2).await.unwrap(), vec!["a", "b"]);

        let failing = StaticRanking::failing("offline");
        assert!(matches!(
            failing.fetch_ranked(2).await,
            Err(RankingError::Unavailable(_))
        ));
    }

    #[tokio::test]
    #[ignore] // Requires network access
    async fn test_fetch_live_trending() {
        let source = HttpRankingSource::new(crate::constants::RANKING_URL);
        let ids = source.fetch_ranked(5).await.unwrap();
        assert!(ids.len() <= 5);
    }
}
