use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedEntry {
    pub source_id: String,
    pub title: String,
    pub link: String,
    pub published_at: DateTime<Utc>,
}

impl FeedEntry {
    pub fn new(
        source_id: impl Into<String>,
        title: impl Into<String>,
        link: impl Into<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            title: title.into(),
            link: link.into(),
            published_at,
        }
    }
}

/// Keeps entries strictly newer than `watermark`, oldest first.
pub fn newer_than(mut entries: Vec<FeedEntry>, watermark: DateTime<Utc>) -> Vec<FeedEntry> {
    entries.retain(|entry| entry.published_at > watermark);
    entries.sort_by_key(|entry| entry.published_at);
    entries
}
