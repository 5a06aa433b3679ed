pub mod coordinate;
pub mod event;
pub mod filter;
pub mod repost;
pub mod tag_utils;
pub mod video;

pub use coordinate::AddressableId;
pub use event::{
    EventParseError, EventTag, ObjectReference, ReferenceKind, ReferenceScope, RelayEvent,
};
pub use filter::EventFilter;
pub use repost::Repost;
pub use tag_utils::{is_relevant, references_subject, resolve_subject};
pub use video::VideoEvent;
