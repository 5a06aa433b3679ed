use std::collections::{BTreeMap, BTreeSet};

use serde_json::{Map, Value};

use super::event::RelayEvent;

/// Request descriptor submitted to relays. Built per query and not mutated
/// once handed to a pool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub kinds: BTreeSet<u16>,
    pub ids: BTreeSet<String>,
    pub authors: BTreeSet<String>,
    /// Tag references keyed by single-letter tag name (`e` is sent as `#e`)
    pub tags: BTreeMap<char, BTreeSet<String>>,
    pub limit: Option<usize>,
}

impl EventFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kind(mut self, kind: u16) -> Self {
        self.kinds.insert(kind);
        self
    }

    pub fn kinds(mut self, kinds: impl IntoIterator<Item = u16>) -> Self {
        self.kinds.extend(kinds);
        self
    }

    pub fn ids<S: Into<String>>(mut self, ids: impl IntoIterator<Item = S>) -> Self {
        self.ids.extend(ids.into_iter().map(Into::into));
        self
    }

    pub fn author(mut self, author: impl Into<String>) -> Self {
        self.authors.insert(author.into());
        self
    }

    pub fn reference(mut self, letter: char, value: impl Into<String>) -> Self {
        self.tags.entry(letter).or_default().insert(value.into());
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Local evaluation of NIP-01 matching rules
    pub fn matches(&self, event: &RelayEvent) -> bool {
        if !self.kinds.is_empty() && !self.kinds.contains(&event.kind) {
            return false;
        }
        if !self.ids.is_empty() && !self.ids.contains(&event.id) {
            return false;
        }
        if !self.authors.is_empty() && !self.authors.contains(&event.author) {
            return false;
        }

        self.tags.iter().all(|(letter, values)| {
            event.tags.iter().any(|tag| {
                let mut name = tag.name().chars();
                name.next() == Some(*letter)
                    && name.next().is_none()
                    && tag.value().is_some_and(|value| values.contains(value))
            })
        })
    }

    /// NIP-01 wire shape, e.g. `{"kinds":[6],"#e":["..."]}`
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        if !self.ids.is_empty() {
            map.insert("ids".into(), Value::from(self.ids.iter().cloned().collect::<Vec<_>>()));
        }
        if !self.authors.is_empty() {
            map.insert(
                "authors".into(),
                Value::from(self.authors.iter().cloned().collect::<Vec<_>>()),
            );
        }
        if !self.kinds.is_empty() {
            map.insert("kinds".into(), Value::from(self.kinds.iter().copied().collect::<Vec<_>>()));
        }
        for (letter, values) in &self.tags {
            map.insert(
                format!("#{}", letter),
                Value::from(values.iter().cloned().collect::<Vec<_>>()),
            );
        }
        if let Some(limit) = self.limit {
            map.insert("limit".into(), Value::from(limit));
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventTag;

    fn repost(id: &str, author: &str, kind: u16, subject: &str) -> RelayEvent {
        RelayEvent {
            id: id.to_string(),
            author: author.to_string(),
            kind,
            tags: vec![EventTag::parse(vec!["e".into(), subject.into()])],
            content: String::new(),
            created_at: 1,
            sig: None,
        }
    }

    #[test]
    fn test_matches_kind_and_reference() {
        let filter = EventFilter::new().kind(6).reference('e', "video");

        assert!(filter.matches(&repost("1", "alice", 6, "video")));
        assert!(!filter.matches(&repost("2", "alice", 7, "video")));
        assert!(!filter.matches(&repost("3", "alice", 6, "other")));
    }

    #[test]
    fn test_matches_ids_and_authors() {
        let filter = EventFilter::new().ids(["1"]).author("alice");

        assert!(filter.matches(&repost("1", "alice", 6, "video")));
        assert!(!filter.matches(&repost("1", "bob", 6, "video")));
        assert!(!filter.matches(&repost("2", "alice", 6, "video")));
    }

    #[test]
    fn test_matches_single_letter_tags_by_exact_name() {
        let mut event = repost("1", "pk", 34236, "video");
        event.tags = vec![
            EventTag::parse(vec!["d".into(), "slug".into()]),
            EventTag::parse(vec!["dd".into(), "other".into()]),
            EventTag::parse(vec!["A".into(), "34236:pk:root".into()]),
        ];

        assert!(EventFilter::new().reference('d', "slug").matches(&event));
        assert!(!EventFilter::new().reference('d', "other").matches(&event));
        assert!(EventFilter::new().reference('A', "34236:pk:root").matches(&event));
        assert!(!EventFilter::new().reference('a', "34236:pk:root").matches(&event));
        assert!(!EventFilter::new()
            .reference('d', "slug")
            .reference('e', "video")
            .matches(&event));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(EventFilter::new().matches(&repost("1", "alice", 1, "x")));
    }

    #[test]
    fn test_wire_shape() {
        let filter = EventFilter::new()
            .kind(6)
            .reference('a', "34236:pk:slug")
            .limit(10);

        assert_eq!(
            filter.to_json(),
            serde_json::json!({"kinds": [6], "#a": ["34236:pk:slug"], "limit": 10})
        );
    }
}
