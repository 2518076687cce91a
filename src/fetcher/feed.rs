use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Semaphore;

use crate::app::{OctofeedError, Result};
use crate::config::Endpoints;
use crate::domain::entry::newer_than;
use crate::domain::FeedEntry;
use crate::fetcher::Fetcher;
use crate::normalizer::Normalizer;
use crate::store::SubscriptionStore;

pub const DEFAULT_WORKERS: usize = 10;

/// New entries of one source, relative to the watermark seen at fetch time.
#[derive(Debug, Clone)]
pub struct SourceBatch {
    pub source_id: String,
    pub watermark: DateTime<Utc>,
    /// Strictly newer than `watermark`, oldest first
    pub entries: Vec<FeedEntry>,
}

impl SourceBatch {
    pub fn newest(&self) -> Option<DateTime<Utc>> {
        self.entries.last().map(|e| e.published_at)
    }
}

pub struct FeedFetcher {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    store: Arc<dyn SubscriptionStore + Send + Sync>,
    normalizer: Normalizer,
    endpoints: Endpoints,
    semaphore: Arc<Semaphore>,
}

impl FeedFetcher {
    pub fn new(
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        store: Arc<dyn SubscriptionStore + Send + Sync>,
        endpoints: Endpoints,
    ) -> Self {
        Self::with_workers(fetcher, store, endpoints, DEFAULT_WORKERS)
    }

    pub fn with_workers(
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        store: Arc<dyn SubscriptionStore + Send + Sync>,
        endpoints: Endpoints,
        workers: usize,
    ) -> Self {
        Self {
            fetcher,
            store,
            normalizer: Normalizer::new(),
            endpoints,
            semaphore: Arc::new(Semaphore::new(workers.max(1))),
        }
    }

    /// Downloads and parses the source's feed, then keeps what is newer than
    /// its watermark.
    ///
    /// A source fetched for the first time gets its watermark set to now, so
    /// a new subscription never replays history. A failed fetch leaves the
    /// watermark alone.
    pub async fn fetch_new_entries(&self, source_id: &str) -> Result<SourceBatch> {
        let entries = self.fetch_all_entries(source_id).await?;

        let watermark = match self.store.get_watermark(source_id)? {
            Some(watermark) => watermark,
            None => {
                let now = Utc::now();
                self.store.set_watermark(source_id, now)?;
                tracing::info!(source = source_id, watermark = %now, "Initialized watermark");
                now
            }
        };

        let total = entries.len();
        let entries = newer_than(entries, watermark);
        tracing::debug!(
            source = source_id,
            total,
            new = entries.len(),
            "Filtered feed entries"
        );

        Ok(SourceBatch {
            source_id: source_id.to_string(),
            watermark,
            entries,
        })
    }

    /// Fetches and parses the source without touching its watermark. Used to
    /// check a source before subscribing to it.
    pub async fn fetch_all_entries(&self, source_id: &str) -> Result<Vec<FeedEntry>> {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|e| OctofeedError::Other(format!("Semaphore error: {}", e)))?;

        let url = self.endpoints.feed_url(source_id);
        let body = self.fetcher.fetch(&url).await?;
        self.normalizer.normalize(source_id, &body)
    }
}
