use std::path::Path;

use anyhow::{Context, Result};
use serde_json::{json, Value};
use tracing::warn;
use vine_core::models::{RelayEvent, VideoEvent};
use vine_core::nostr::Identity;
use vine_core::{CurationService, FeedMode};

/// A resolved command, ready to run against a service
#[derive(Debug, Clone)]
pub enum CliCommand {
    Reposters { subject: String },
    RepostedBy { pubkey: String },
    HasReposted { subject: String, pubkey: String },
    Trending { local: Vec<VideoEvent> },
    Repost { video: VideoEvent },
}

/// Read videos from a file of wire events, one JSON object per line. Lines
/// that are not valid video events are skipped.
pub fn load_local_videos(path: &Path) -> Result<Vec<VideoEvent>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read events file: {}", path.display()))?;

    let mut videos = Vec::new();
    for (line_number, line) in content.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match RelayEvent::from_json(line) {
            Ok(event) => match VideoEvent::from_event(&event) {
                Some(video) => videos.push(video),
                None => warn!(line = line_number + 1, id = %event.id, "Skipping non-video event"),
            },
            Err(e) => warn!(line = line_number + 1, error = %e, "Skipping unparseable event"),
        }
    }
    Ok(videos)
}

fn sorted(values: impl IntoIterator<Item = String>) -> Vec<String> {
    let mut values: Vec<String> = values.into_iter().collect();
    values.sort();
    values
}

pub async fn run_command(
    service: &CurationService,
    command: CliCommand,
    identity: Option<&dyn Identity>,
) -> Result<Value> {
    let output = match command {
        CliCommand::Reposters { subject } => {
            let reposters = sorted(service.reposters_for(&subject).await);
            json!({ "subject": subject, "count": reposters.len(), "reposters": reposters })
        }
        CliCommand::RepostedBy { pubkey } => {
            let subjects = sorted(service.reposted_by(&pubkey).await);
            json!({ "pubkey": pubkey, "count": subjects.len(), "subjects": subjects })
        }
        CliCommand::HasReposted { subject, pubkey } => {
            let reposted = service.has_reposted(&subject, &pubkey).await;
            json!({ "subject": subject, "pubkey": pubkey, "reposted": reposted })
        }
        CliCommand::Trending { local } => {
            let feed = service.refresh_trending(&local).await;
            let mode = match feed.mode {
                FeedMode::Ranked => "ranked",
                FeedMode::LocalFallback => "localFallback",
            };
            json!({
                "mode": mode,
                "fetched": feed.fetched,
                "unresolved": feed.unresolved,
                "videos": feed.items,
            })
        }
        CliCommand::Repost { video } => {
            let identity = identity.context("Reposting requires credentials in the config")?;
            let created_at = nostr_sdk::Timestamp::now().as_secs();
            let event = service
                .publish_repost(&video, identity, created_at)
                .await
                .context("Failed to publish repost")?;
            json!({ "id": event.id, "video": video.id, "pubkey": event.author })
        }
    };
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Arc;
    use vine_core::models::EventTag;
    use vine_core::nostr::{KeysIdentity, MemoryRelayPool};
    use vine_core::{CoreConfig, StaticRanking};

    fn repost(id: &str, author: &str, subject: &str) -> RelayEvent {
        RelayEvent {
            id: id.to_string(),
            author: author.to_string(),
            kind: 6,
            tags: vec![EventTag::parse(vec!["e".into(), subject.into()])],
            content: String::new(),
            created_at: 1,
            sig: None,
        }
    }

    fn service(pool: &MemoryRelayPool, ranking: StaticRanking) -> CurationService {
        CurationService::new(Arc::new(pool.clone()), Arc::new(ranking), CoreConfig::default())
    }

    #[test]
    fn test_load_local_videos_skips_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"{{"id":"v1","pubkey":"pk","kind":22,"tags":[],"content":"","created_at":1}}"#
        )
        .unwrap();
        writeln!(file, "not json").unwrap();
        writeln!(file).unwrap();
        writeln!(
            file,
            r#"{{"id":"n1","pubkey":"pk","kind":1,"tags":[],"content":"","created_at":1}}"#
        )
        .unwrap();
        writeln!(
            file,
            r#"{{"id":"v2","pubkey":"pk","kind":34236,"tags":[["d","slug"]],"content":"","created_at":2}}"#
        )
        .unwrap();

        let videos = load_local_videos(file.path()).unwrap();
        let ids: Vec<_> = videos.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["v1", "v2"]);
    }

    #[test]
    fn test_load_local_videos_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_local_videos(&dir.path().join("none.jsonl")).is_err());
    }

    #[tokio::test]
    async fn test_reposters_output_is_sorted() {
        let pool = MemoryRelayPool::closing_after_replay().with_events([
            repost("1", "bob", "video"),
            repost("2", "alice", "video"),
            repost("3", "bob", "video"),
        ]);
        let service = service(&pool, StaticRanking::new(Vec::<String>::new()));

        let output = run_command(
            &service,
            CliCommand::Reposters {
                subject: "video".to_string(),
            },
            None,
        )
        .await
        .unwrap();

        assert_eq!(
            output,
            json!({"subject": "video", "count": 2, "reposters": ["alice", "bob"]})
        );
    }

    #[tokio::test]
    async fn test_trending_fallback_reports_mode() {
        let pool = MemoryRelayPool::closing_after_replay();
        let service = service(&pool, StaticRanking::failing("down"));

        let output = run_command(&service, CliCommand::Trending { local: Vec::new() }, None)
            .await
            .unwrap();
        assert_eq!(output["mode"], "localFallback");
    }

    #[tokio::test]
    async fn test_repost_requires_identity() {
        let pool = MemoryRelayPool::closing_after_replay();
        let service = service(&pool, StaticRanking::new(Vec::<String>::new()));
        let event = RelayEvent::from_json(
            r#"{"id":"v1","pubkey":"pk","kind":22,"tags":[],"content":"","created_at":1}"#,
        )
        .unwrap();
        let video = VideoEvent::from_event(&event).unwrap();

        let result = run_command(
            &service,
            CliCommand::Repost {
                video: video.clone(),
            },
            None,
        )
        .await;
        assert!(result.is_err());

        let identity = KeysIdentity::new(nostr_sdk::Keys::generate());
        let output = run_command(&service, CliCommand::Repost { video }, Some(&identity))
            .await
            .unwrap();
        assert_eq!(output["video"], "v1");
        assert_eq!(output["pubkey"], identity.public_key());
        assert_eq!(pool.published().len(), 1);
    }
}
