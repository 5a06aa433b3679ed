//! Narrow identity capability: who we are and how to sign.
//!
//! Key storage and signing live outside this crate; the query layer only
//! needs the current public key and a way to turn a template into a signed
//! event.

use futures::future::BoxFuture;
use nostr_sdk::prelude::*;

use crate::models::RelayEvent;

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("Invalid tag {tag:?}: {message}")]
    InvalidTag { tag: Vec<String>, message: String },

    #[error("Signing failed: {0}")]
    Signing(String),
}

/// Event template awaiting a signature
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedEvent {
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub created_at: u64,
}

pub trait Identity: Send + Sync {
    /// Hex public key of the current identity
    fn public_key(&self) -> String;

    fn sign(&self, unsigned: UnsignedEvent) -> BoxFuture<'_, Result<RelayEvent, IdentityError>>;
}

/// Identity backed by in-memory nostr keys
pub struct KeysIdentity {
    keys: Keys,
}

impl KeysIdentity {
    pub fn new(keys: Keys) -> Self {
        Self { keys }
    }
}

impl Identity for KeysIdentity {
    fn public_key(&self) -> String {
        self.keys.public_key().to_hex()
    }

    fn sign(&self, unsigned: UnsignedEvent) -> BoxFuture<'_, Result<RelayEvent, IdentityError>> {
        Box::pin(async move {
            let mut tags = Vec::with_capacity(unsigned.tags.len());
            for values in unsigned.tags {
                let tag = Tag::parse(values.clone()).map_err(|e| IdentityError::InvalidTag {
                    tag: values,
                    message: e.to_string(),
                })?;
                tags.push(tag);
            }

            let event = EventBuilder::new(Kind::from(unsigned.kind), unsigned.content)
                .tags(tags)
                .custom_created_at(Timestamp::from(unsigned.created_at))
                .sign_with_keys(&self.keys)
                .map_err(|e| IdentityError::Signing(e.to_string()))?;

            Ok(RelayEvent::from(&event))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_round_trips_through_wire_json() {
        let identity = KeysIdentity::new(Keys::generate());
        let unsigned = UnsignedEvent {
            kind: 6,
            tags: vec![vec!["e".to_string(), "c".repeat(64)]],
            content: String::new(),
            created_at: 1_700_000_000,
        };

        let signed = identity.sign(unsigned).await.unwrap();
        assert_eq!(signed.author, identity.public_key());
        assert_eq!(signed.created_at, 1_700_000_000);

        // The wire form must verify as a real nostr event
        let event = Event::from_json(signed.to_json()).unwrap();
        assert!(event.verify().is_ok());
    }

    #[tokio::test]
    async fn test_empty_tag_is_rejected() {
        let identity = KeysIdentity::new(Keys::generate());
        let unsigned = UnsignedEvent {
            kind: 6,
            tags: vec![vec![]],
            content: String::new(),
            created_at: 1,
        };
        assert!(matches!(
            identity.sign(unsigned).await,
            Err(IdentityError::InvalidTag { .. })
        ));
    }
}
