use serde::Serialize;

use super::coordinate::AddressableId;
use super::event::{EventTag, RelayEvent};
use crate::constants::kinds;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoEvent {
    pub id: String,
    pub pubkey: String,
    pub kind: u16,
    pub created_at: u64,
    pub d_tag: Option<String>,
    pub title: Option<String>,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub hashtags: Vec<String>,
    pub content: String,
}

impl VideoEvent {
    pub fn from_event(event: &RelayEvent) -> Option<Self> {
        if !kinds::VIDEO_KINDS.contains(&event.kind) {
            return None;
        }

        let mut title = None;
        let mut video_url = None;
        let mut thumbnail_url = None;
        let mut hashtags = Vec::new();

        for tag in &event.tags {
            let EventTag::Other(values) = tag else {
                continue;
            };
            let value = values.get(1).cloned();
            match values.first().map(String::as_str) {
                Some("title") => title = title.or(value),
                Some("url") => video_url = video_url.or(value),
                Some("thumb") | Some("image") => thumbnail_url = thumbnail_url.or(value),
                Some("t") => hashtags.extend(value),
                Some("imeta") => {
                    // NIP-92: each entry is "<key> <value>"
                    for entry in &values[1..] {
                        match entry.split_once(' ') {
                            Some(("url", url)) if video_url.is_none() => {
                                video_url = Some(url.to_string());
                            }
                            Some(("image", image)) if thumbnail_url.is_none() => {
                                thumbnail_url = Some(image.to_string());
                            }
                            _ => {}
                        }
                    }
                }
                _ => {}
            }
        }

        let d_tag = event.identifier().map(str::to_string);
        // Addressable videos without a d-tag cannot be addressed or replaced
        if kinds::is_addressable(event.kind) && d_tag.is_none() {
            return None;
        }

        Some(VideoEvent {
            id: event.id.clone(),
            pubkey: event.author.clone(),
            kind: event.kind,
            created_at: event.created_at,
            d_tag,
            title,
            video_url,
            thumbnail_url,
            hashtags,
            content: event.content.clone(),
        })
    }

    pub fn coordinate(&self) -> Option<AddressableId> {
        if !kinds::is_addressable(self.kind) {
            return None;
        }
        self.d_tag
            .as_ref()
            .map(|d| AddressableId::new(self.kind, self.pubkey.clone(), d.clone()))
    }

    /// Every identifier a ranking source may use for this video
    pub fn identifiers(&self) -> Vec<String> {
        let mut ids = vec![self.id.clone()];
        ids.extend(self.coordinate().map(|c| c.to_string()));
        ids
    }
}
