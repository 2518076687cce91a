pub mod feed;
pub mod http_fetcher;

use async_trait::async_trait;

use crate::app::Result;

pub use feed::{FeedFetcher, SourceBatch};
pub use http_fetcher::HttpFetcher;

/// Retrieves the raw body behind a URL. Non-success statuses are errors.
#[async_trait]
pub trait Fetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}
