//! Relevance predicates over typed event tags
//!
//! Pure helpers shared by the collector call sites; none of them allocate or
//! fail on malformed input.

use super::event::{EventTag, ObjectReference, ReferenceScope, RelayEvent};

/// True iff the event has the expected kind and references `subject_id`
/// through an `e`/`E`/`a`/`A` tag.
pub fn is_relevant(event: &RelayEvent, expected_kind: u16, subject_id: &str) -> bool {
    event.kind == expected_kind && references_subject(event, subject_id)
}

pub fn references_subject(event: &RelayEvent, subject_id: &str) -> bool {
    event.references().any(|reference| reference.value == subject_id)
}

/// The object an event is about. A root (uppercase) reference wins over a
/// direct (lowercase) one; otherwise the first reference in tag order.
pub fn resolve_subject(tags: &[EventTag]) -> Option<&ObjectReference> {
    let mut direct = None;
    for tag in tags {
        if let EventTag::Reference(reference) = tag {
            match reference.scope {
                ReferenceScope::Root => return Some(reference),
                ReferenceScope::Direct => {
                    direct.get_or_insert(reference);
                }
            }
        }
    }
    direct
}
