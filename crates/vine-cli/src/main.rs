use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use vine_cli::cli::{init_tracing, load_local_videos, run_command, CliCommand, CliConfig};
use vine_core::nostr::{Identity, KeysIdentity, NostrRelayPool};
use vine_core::{CurationService, HttpRankingSource};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Parser)]
#[command(name = "vine-cli")]
#[command(about = "Repost lookups and trending feeds over nostr relays")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (relays, windows, ranking endpoint, credentials)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Relay URL, replaces the configured relays (can be specified multiple times)
    #[arg(long, short = 'r')]
    relay: Vec<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List identities that reposted an event id or `kind:pubkey:d-tag` coordinate
    Reposters {
        subject: String,
    },

    /// List everything a pubkey has reposted
    RepostedBy {
        /// Hex public key
        pubkey: String,
    },

    /// Check whether a pubkey reposted a subject
    HasReposted {
        subject: String,
        /// Hex public key
        pubkey: String,
    },

    /// Trending videos in ranked order
    Trending {
        /// File of already-known video events, one JSON event per line
        #[arg(long, short = 'l')]
        local: Option<PathBuf>,
    },

    /// Repost a video (requires credentials in the config)
    Repost {
        /// File holding the video event as JSON
        event: PathBuf,
    },
}

impl Commands {
    fn resolve(self) -> Result<CliCommand> {
        let command = match self {
            Commands::Reposters { subject } => CliCommand::Reposters { subject },
            Commands::RepostedBy { pubkey } => CliCommand::RepostedBy { pubkey },
            Commands::HasReposted { subject, pubkey } => {
                CliCommand::HasReposted { subject, pubkey }
            }
            Commands::Trending { local } => CliCommand::Trending {
                local: match local {
                    Some(path) => load_local_videos(&path)?,
                    None => Vec::new(),
                },
            },
            Commands::Repost { event } => {
                let video = load_local_videos(&event)?
                    .into_iter()
                    .next()
                    .with_context(|| format!("No video event found in {}", event.display()))?;
                CliCommand::Repost { video }
            }
        };
        Ok(command)
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    init_tracing()?;

    let config = match &cli.config {
        Some(path) => CliConfig::load(path)?,
        None => CliConfig::default(),
    }
    .with_relays(cli.relay);

    let identity: Option<Box<dyn Identity>> = match &config.credentials {
        Some(credentials) => Some(Box::new(KeysIdentity::new(credentials.keys()?))),
        None => None,
    };

    let command = cli.command.resolve()?;

    let pool = NostrRelayPool::connect(&config.core.relays, CONNECT_TIMEOUT)
        .await
        .context("Failed to connect to relays")?;
    let pool = Arc::new(pool);
    info!(relays = ?config.core.relays, "Connected");

    let ranking = HttpRankingSource::new(config.core.ranking_url.clone());
    let service = CurationService::new(pool.clone(), Arc::new(ranking), config.core.clone());

    let result = run_command(&service, command, identity.as_deref()).await;
    service.shutdown();
    pool.disconnect().await;

    let output = result?;
    let rendered = if cli.pretty {
        serde_json::to_string_pretty(&output)?
    } else {
        serde_json::to_string(&output)?
    };
    println!("{}", rendered);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_relay_overrides() {
        let cli = Cli::parse_from([
            "vine-cli",
            "--relay",
            "wss://a",
            "-r",
            "wss://b",
            "reposters",
            "34236:pk:slug",
        ]);
        assert_eq!(cli.relay, vec!["wss://a", "wss://b"]);
        assert!(matches!(
            cli.command,
            Commands::Reposters { ref subject } if subject == "34236:pk:slug"
        ));
    }

    #[test]
    fn test_trending_without_local_file() {
        let cli = Cli::parse_from(["vine-cli", "trending"]);
        let command = cli.command.resolve().unwrap();
        assert!(matches!(command, CliCommand::Trending { ref local } if local.is_empty()));
    }
}
