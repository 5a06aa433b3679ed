use std::fmt;

/// Composite `kind:pubkey:d-tag` identifier for addressable events.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AddressableId {
    pub kind: u16,
    pub pubkey: String,
    pub d_tag: String,
}

impl AddressableId {
    pub fn new(kind: u16, pubkey: impl Into<String>, d_tag: impl Into<String>) -> Self {
        Self {
            kind,
            pubkey: pubkey.into(),
            d_tag: d_tag.into(),
        }
    }

    /// Parse a coordinate. The d-tag is everything after the second colon, so
    /// it may contain colons itself. Anything malformed yields `None`.
    pub fn parse(value: &str) -> Option<Self> {
        let mut parts = value.splitn(3, ':');
        let kind = parts.next()?.parse::<u16>().ok()?;
        let pubkey = parts.next()?;
        let d_tag = parts.next()?;

        if pubkey.is_empty() {
            return None;
        }

        Some(Self::new(kind, pubkey, d_tag))
    }
}

impl fmt::Display for AddressableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind, self.pubkey, self.d_tag)
    }
}
