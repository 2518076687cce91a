//! One polling cycle: fetch → enrich → compose → dispatch for every
//! subscribed source.
//!
//! Each source runs as its own task in a per-cycle [`JoinSet`]. Dropping the
//! cycle future (deadline) or cancelling its token (shutdown) aborts every
//! task still in flight, and because a source's watermark is only written
//! once its dispatch finished, unfinished sources keep the watermark they
//! started with.

use std::sync::Arc;

use futures::future::join_all;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::app::Result;
use crate::compose::Composer;
use crate::dispatch::Dispatcher;
use crate::enrich::Enricher;
use crate::fetcher::FeedFetcher;
use crate::store::SubscriptionStore;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceOutcome {
    Completed {
        entries: usize,
        delivered: usize,
        failed: usize,
    },
    FetchFailed,
    /// Fetched, but recording the result failed
    Failed,
    Cancelled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub sources: usize,
    pub sources_completed: usize,
    pub fetch_failures: usize,
    pub dispatch_failures: usize,
    pub entries_dispatched: usize,
    pub deliveries: usize,
    pub deliveries_failed: usize,
    pub cancelled: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: &SourceOutcome) {
        match outcome {
            SourceOutcome::Completed {
                entries,
                delivered,
                failed,
            } => {
                self.sources_completed += 1;
                self.entries_dispatched += entries;
                self.deliveries += delivered;
                self.deliveries_failed += failed;
            }
            SourceOutcome::FetchFailed => self.fetch_failures += 1,
            SourceOutcome::Failed => self.dispatch_failures += 1,
            SourceOutcome::Cancelled => self.cancelled += 1,
        }
    }
}

pub struct Pipeline {
    store: Arc<dyn SubscriptionStore + Send + Sync>,
    feeds: FeedFetcher,
    enricher: Enricher,
    composer: Composer,
    dispatcher: Dispatcher,
}

impl Pipeline {
    pub fn new(
        store: Arc<dyn SubscriptionStore + Send + Sync>,
        feeds: FeedFetcher,
        enricher: Enricher,
        composer: Composer,
        dispatcher: Dispatcher,
    ) -> Self {
        Self {
            store,
            feeds,
            enricher,
            composer,
            dispatcher,
        }
    }

    pub fn feeds(&self) -> &FeedFetcher {
        &self.feeds
    }

    /// Runs one cycle over every source that has at least one subscriber.
    ///
    /// Only a failure to list the sources is returned as an error; everything
    /// below that is isolated per source and reported in the [`CycleReport`].
    pub async fn run_cycle(self: &Arc<Self>, cancel: CancellationToken) -> Result<CycleReport> {
        let sources = self.store.list_sources()?;
        let mut report = CycleReport {
            sources: sources.len(),
            ..Default::default()
        };
        if sources.is_empty() {
            tracing::debug!("No subscribed sources");
            return Ok(report);
        }

        let mut tasks = JoinSet::new();
        for source_id in sources {
            let pipeline = Arc::clone(self);
            let cancel = cancel.clone();
            tasks.spawn(async move {
                let outcome = tokio::select! {
                    _ = cancel.cancelled() => SourceOutcome::Cancelled,
                    outcome = pipeline.process_source(&source_id) => outcome,
                };
                (source_id, outcome)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((source_id, outcome)) => {
                    if outcome == SourceOutcome::Cancelled {
                        tracing::info!(source = %source_id, "Source cancelled mid-cycle");
                    }
                    report.record(&outcome);
                }
                Err(e) => {
                    tracing::error!(error = %e, "Source task panicked");
                    report.dispatch_failures += 1;
                }
            }
        }

        Ok(report)
    }

    pub async fn process_source(&self, source_id: &str) -> SourceOutcome {
        let batch = match self.feeds.fetch_new_entries(source_id).await {
            Ok(batch) => batch,
            Err(e) => {
                tracing::warn!(source = source_id, error = %e, "Failed to fetch feed");
                return SourceOutcome::FetchFailed;
            }
        };

        if !batch.entries.is_empty() {
            tracing::info!(
                source = source_id,
                count = batch.entries.len(),
                "New entries"
            );
        }

        let bundles = join_all(batch.entries.iter().map(|entry| self.enricher.enrich(entry))).await;
        let messages: Vec<_> = batch
            .entries
            .iter()
            .zip(&bundles)
            .map(|(entry, bundle)| self.composer.compose(entry, bundle))
            .collect();
        drop(bundles);

        match self.dispatcher.dispatch(&batch, &messages).await {
            Ok(report) => SourceOutcome::Completed {
                entries: batch.entries.len(),
                delivered: report.delivered,
                failed: report.failed,
            },
            Err(e) => {
                tracing::error!(source = source_id, error = %e, "Failed to dispatch source");
                SourceOutcome::Failed
            }
        }
    }
}
