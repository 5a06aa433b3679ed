use super::event::RelayEvent;
use super::tag_utils::resolve_subject;

/// A decoded repost: who rebroadcast which object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repost {
    pub id: String,
    pub reposter: String,
    /// Event id or addressable coordinate of the reposted object
    pub subject: String,
    pub created_at: u64,
}

impl Repost {
    pub fn from_event(event: &RelayEvent, repost_kind: u16) -> Option<Self> {
        if event.kind != repost_kind {
            return None;
        }

        let subject = resolve_subject(&event.tags)?;

        Some(Repost {
            id: event.id.clone(),
            reposter: event.author.clone(),
            subject: subject.value.clone(),
            created_at: event.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_event() {
        let json = r#"{"id":"r1","pubkey":"alice","kind":6,"tags":[["e","vid"],["A","34236:pk:slug"]],"content":"","created_at":3}"#;
        let event = RelayEvent::from_json(json).unwrap();

        let repost = Repost::from_event(&event, 6).unwrap();
        assert_eq!(repost.reposter, "alice");
        assert_eq!(repost.subject, "34236:pk:slug");
        assert!(Repost::from_event(&event, 16).is_none());
    }

    #[test]
    fn test_without_reference_is_none() {
        let json = r#"{"id":"r1","pubkey":"alice","kind":6,"tags":[["e"]],"content":"","created_at":3}"#;
        let event = RelayEvent::from_json(json).unwrap();
        assert!(Repost::from_event(&event, 6).is_none());
    }
}
