//! Typed event record parsed once at the relay boundary.
//!
//! Relays hand us loosely typed tag arrays. Everything downstream works on
//! [`RelayEvent`] and [`EventTag`], so malformed tags are classified here and
//! never re-checked by the query components.

use serde::Deserialize;
use serde_json::{json, Value};

use super::coordinate::AddressableId;

#[derive(Debug, thiserror::Error)]
pub enum EventParseError {
    #[error("Invalid event JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Event is missing its {0} field")]
    MissingField(&'static str),
}

/// Whether a reference points at the thread root (uppercase tag) or the
/// direct parent (lowercase tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceScope {
    Root,
    Direct,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Content-hash event id (`e` / `E`)
    Event,
    /// Addressable coordinate (`a` / `A`)
    Address,
}

/// A well-formed `e`/`E`/`a`/`A` tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectReference {
    pub scope: ReferenceScope,
    pub kind: ReferenceKind,
    pub value: String,
    /// Relay hint, marker and anything else after the value
    pub extra: Vec<String>,
}

impl ObjectReference {
    pub fn letter(&self) -> &'static str {
        match (self.kind, self.scope) {
            (ReferenceKind::Event, ReferenceScope::Direct) => "e",
            (ReferenceKind::Event, ReferenceScope::Root) => "E",
            (ReferenceKind::Address, ReferenceScope::Direct) => "a",
            (ReferenceKind::Address, ReferenceScope::Root) => "A",
        }
    }

    pub fn address(&self) -> Option<AddressableId> {
        match self.kind {
            ReferenceKind::Address => AddressableId::parse(&self.value),
            ReferenceKind::Event => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTag {
    Reference(ObjectReference),
    /// `d` tag of an addressable event
    Identifier(String),
    /// Any other tag, including malformed references, kept verbatim
    Other(Vec<String>),
}

impl EventTag {
    /// Classify a raw tag array. Never fails: what cannot be typed stays `Other`.
    pub fn parse(values: Vec<String>) -> Self {
        let Some(name) = values.first() else {
            return EventTag::Other(values);
        };
        let value = values.get(1).filter(|v| !v.is_empty());

        let reference = match name.as_str() {
            "e" => Some((ReferenceKind::Event, ReferenceScope::Direct)),
            "E" => Some((ReferenceKind::Event, ReferenceScope::Root)),
            "a" => Some((ReferenceKind::Address, ReferenceScope::Direct)),
            "A" => Some((ReferenceKind::Address, ReferenceScope::Root)),
            _ => None,
        };

        match (name.as_str(), reference, value) {
            (_, Some((kind, scope)), Some(value)) => {
                if kind == ReferenceKind::Address && AddressableId::parse(value).is_none() {
                    return EventTag::Other(values);
                }
                let value = value.clone();
                let extra = values[2..].to_vec();
                EventTag::Reference(ObjectReference {
                    scope,
                    kind,
                    value,
                    extra,
                })
            }
            ("d", None, _) if values.len() >= 2 => EventTag::Identifier(values[1].clone()),
            _ => EventTag::Other(values),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            EventTag::Reference(reference) => reference.letter(),
            EventTag::Identifier(_) => "d",
            EventTag::Other(values) => values.first().map(String::as_str).unwrap_or(""),
        }
    }

    /// First value after the tag name
    pub fn value(&self) -> Option<&str> {
        match self {
            EventTag::Reference(reference) => Some(&reference.value),
            EventTag::Identifier(d) => Some(d),
            EventTag::Other(values) => values.get(1).map(String::as_str),
        }
    }

    pub fn to_values(&self) -> Vec<String> {
        match self {
            EventTag::Reference(reference) => {
                let mut values = vec![reference.letter().to_string(), reference.value.clone()];
                values.extend(reference.extra.iter().cloned());
                values
            }
            EventTag::Identifier(d) => vec!["d".to_string(), d.clone()],
            EventTag::Other(values) => values.clone(),
        }
    }
}

/// Immutable event as received from a relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayEvent {
    pub id: String,
    pub author: String,
    pub kind: u16,
    pub tags: Vec<EventTag>,
    pub content: String,
    pub created_at: u64,
    pub sig: Option<String>,
}

#[derive(Deserialize)]
struct WireEvent {
    id: Option<String>,
    pubkey: Option<String>,
    kind: Option<u16>,
    #[serde(default)]
    tags: Vec<Vec<Value>>,
    #[serde(default)]
    content: String,
    #[serde(alias = "createdAt")]
    created_at: Option<u64>,
    #[serde(default)]
    sig: Option<String>,
}

impl RelayEvent {
    pub fn from_json(json: &str) -> Result<Self, EventParseError> {
        let wire: WireEvent = serde_json::from_str(json)?;

        let tags = wire
            .tags
            .into_iter()
            .map(|raw| {
                let well_typed = raw.iter().all(Value::is_string);
                let values: Vec<String> = raw
                    .into_iter()
                    .map(|v| match v {
                        Value::String(s) => s,
                        other => other.to_string(),
                    })
                    .collect();
                if well_typed {
                    EventTag::parse(values)
                } else {
                    EventTag::Other(values)
                }
            })
            .collect();

        Ok(Self {
            id: wire.id.ok_or(EventParseError::MissingField("id"))?,
            author: wire.pubkey.ok_or(EventParseError::MissingField("pubkey"))?,
            kind: wire.kind.ok_or(EventParseError::MissingField("kind"))?,
            tags,
            content: wire.content,
            created_at: wire
                .created_at
                .ok_or(EventParseError::MissingField("created_at"))?,
            sig: wire.sig,
        })
    }

    /// NIP-01 wire representation
    pub fn to_json(&self) -> String {
        let tags: Vec<Vec<String>> = self.tags.iter().map(EventTag::to_values).collect();
        let mut value = json!({
            "id": self.id,
            "pubkey": self.author,
            "kind": self.kind,
            "tags": tags,
            "content": self.content,
            "created_at": self.created_at,
        });
        if let Some(sig) = &self.sig {
            value["sig"] = Value::String(sig.clone());
        }
        value.to_string()
    }

    pub fn references(&self) -> impl Iterator<Item = &ObjectReference> {
        self.tags.iter().filter_map(|tag| match tag {
            EventTag::Reference(reference) => Some(reference),
            _ => None,
        })
    }

    pub fn identifier(&self) -> Option<&str> {
        self.tags.iter().find_map(|tag| match tag {
            EventTag::Identifier(d) => Some(d.as_str()),
            _ => None,
        })
    }

    /// First value of the first tag with the given name
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|tag| tag.name() == name)
            .and_then(EventTag::value)
    }

    /// `kind:pubkey:d-tag` for addressable events that carry a d-tag
    pub fn coordinate(&self) -> Option<AddressableId> {
        if !crate::constants::kinds::is_addressable(self.kind) {
            return None;
        }
        self.identifier()
            .map(|d| AddressableId::new(self.kind, self.author.clone(), d))
    }
}

impl From<&nostr_sdk::Event> for RelayEvent {
    fn from(event: &nostr_sdk::Event) -> Self {
        Self {
            id: event.id.to_hex(),
            author: event.pubkey.to_hex(),
            kind: event.kind.as_u16(),
            tags: event
                .tags
                .iter()
                .map(|tag| EventTag::parse(tag.as_slice().to_vec()))
                .collect(),
            content: event.content.clone(),
            created_at: event.created_at.as_secs(),
            sig: Some(event.sig.to_string()),
        }
    }
}
