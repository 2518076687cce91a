use feed_rs::parser;
use html_escape::decode_html_entities;

use crate::app::{OctofeedError, Result};
use crate::domain::FeedEntry;

#[derive(Clone, Default)]
pub struct Normalizer;

impl Normalizer {
    pub fn new() -> Self {
        Self
    }

    /// Parses a feed document into entries, in document order.
    ///
    /// Entries without a link or without any timestamp cannot be placed
    /// against a watermark and are dropped.
    pub fn normalize(&self, source_id: &str, body: &[u8]) -> Result<Vec<FeedEntry>> {
        let feed = parser::parse(body).map_err(|e| OctofeedError::FeedParse(e.to_string()))?;

        let entries = feed
            .entries
            .into_iter()
            .filter_map(|entry| {
                let Some(link) = entry.links.first().map(|l| l.href.clone()) else {
                    tracing::debug!(source = source_id, id = %entry.id, "Skipping entry without link");
                    return None;
                };
                let Some(published_at) = entry.published.or(entry.updated) else {
                    tracing::debug!(source = source_id, %link, "Skipping entry without timestamp");
                    return None;
                };
                let title = entry
                    .title
                    .map(|t| decode_html_entities(&t.content).trim().to_string())
                    .filter(|t| !t.is_empty())
                    .unwrap_or_else(|| "(untitled)".to_string());

                Some(FeedEntry {
                    source_id: source_id.to_string(),
                    title,
                    link,
                    published_at,
                })
            })
            .collect();

        Ok(entries)
    }
}
