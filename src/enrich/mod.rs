//! Entry enrichment.
//!
//! The entry link is classified ([`classify`]), the resources that shape
//! calls for are fetched concurrently, and the results land in an
//! [`EnrichmentBundle`]. A failed lookup only empties its own slot.

pub mod bundle;
pub mod classify;

use std::sync::Arc;

use futures::future::join_all;
use serde_json::Value;

use crate::config::Endpoints;
use crate::domain::{BinaryResource, FeedEntry};
use crate::fetcher::Fetcher;

pub use bundle::{EnrichmentBundle, Slot};
pub use classify::{Classifier, LinkKind, RepoRef, Resource};

pub struct Enricher {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    endpoints: Endpoints,
    classifier: Classifier,
}

impl Enricher {
    pub fn new(
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        endpoints: Endpoints,
        classifier: Classifier,
    ) -> Self {
        Self {
            fetcher,
            endpoints,
            classifier,
        }
    }

    pub async fn enrich(&self, entry: &FeedEntry) -> EnrichmentBundle {
        let kind = self.classifier.classify(&entry.link);
        tracing::debug!(link = %entry.link, ?kind, "Enriching entry");

        let mut bundle = EnrichmentBundle::unavailable_for(&kind);

        let image = async {
            match kind.repo() {
                Some(repo) => self.fetch_image(repo).await,
                None => None,
            }
        };
        let lookups = join_all(kind.api_requests().into_iter().map(|(resource, path)| {
            let url = self.endpoints.api_url(&path);
            async move { (resource, self.fetch_json(&url).await) }
        }));

        let (image, lookups) = futures::join!(image, lookups);

        if let Some(image) = image {
            bundle.image = Slot::Ready(Arc::new(image));
        }
        for (resource, value) in lookups {
            let Some(value) = value else {
                continue;
            };
            match resource {
                Resource::Commits => bundle.commits = Slot::from_option(commits_of(value)),
                Resource::Issue => bundle.issue = Slot::Ready(value),
                Resource::IssueComment => bundle.issue_comment = Slot::Ready(value),
                Resource::PullRequest => bundle.pull_request = Slot::Ready(value),
                Resource::PullRequestComment => bundle.pull_request_comment = Slot::Ready(value),
            }
        }

        bundle
    }

    async fn fetch_image(&self, repo: &RepoRef) -> Option<BinaryResource> {
        let url = self.endpoints.preview_url(&repo.owner, &repo.repo);
        match self.fetcher.fetch(&url).await {
            Ok(bytes) if !bytes.is_empty() => Some(BinaryResource::new(url, bytes)),
            Ok(_) => {
                tracing::warn!(%url, "Preview image was empty");
                None
            }
            Err(e) => {
                tracing::warn!(%url, error = %e, "Failed to load preview image");
                None
            }
        }
    }

    /// Fetches a JSON object. Anything else counts as unavailable.
    async fn fetch_json(&self, url: &str) -> Option<Value> {
        let body = match self.fetcher.fetch(url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url, error = %e, "Failed to load resource");
                return None;
            }
        };
        match serde_json::from_slice::<Value>(&body) {
            Ok(value @ Value::Object(_)) => Some(value),
            Ok(_) => {
                tracing::warn!(url, "Resource is not a JSON object");
                None
            }
            Err(e) => {
                tracing::warn!(url, error = %e, "Failed to decode resource");
                None
            }
        }
    }
}

fn commits_of(mut compare: Value) -> Option<Vec<Value>> {
    match compare.get_mut("commits").map(Value::take) {
        Some(Value::Array(commits)) => Some(commits),
        _ => {
            tracing::warn!("Compare response has no commit list");
            None
        }
    }
}
