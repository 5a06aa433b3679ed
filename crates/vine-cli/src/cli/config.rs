use std::path::Path;

use anyhow::{Context, Result};
use nostr_sdk::nips::nip49::EncryptedSecretKey;
use nostr_sdk::{FromBech32, Keys, SecretKey};
use serde::{Deserialize, Serialize};
use vine_core::CoreConfig;

/// CLI configuration: engine settings plus optional signing credentials
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct CliConfig {
    #[serde(flatten)]
    pub core: CoreConfig,

    /// Credentials used to sign reposts
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials: Option<Credentials>,
}

/// Nostr credentials configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// nsec (unencrypted) or ncryptsec (encrypted) key
    pub key: String,

    /// Password for ncryptsec decryption (optional)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl Credentials {
    pub fn keys(&self) -> Result<Keys> {
        let secret_key = if self.key.starts_with("ncryptsec") {
            let password = self
                .password
                .as_deref()
                .context("Password required for ncryptsec but not provided in config")?;
            let encrypted = EncryptedSecretKey::from_bech32(&self.key)?;
            encrypted.decrypt(password)?
        } else if self.key.starts_with("nsec") {
            SecretKey::from_bech32(&self.key)?
        } else {
            anyhow::bail!("Invalid key format: expected nsec or ncryptsec");
        };
        Ok(Keys::new(secret_key))
    }
}

impl CliConfig {
    /// Load config from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize config")
    }

    /// Replace the configured relays when any were given on the command line
    pub fn with_relays(mut self, relays: Vec<String>) -> Self {
        if !relays.is_empty() {
            self.core.relays = relays;
        }
        self
    }
}
