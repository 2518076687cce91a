//! Fan-out of composed messages to the subscribers of a source.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;

use crate::app::Result;
use crate::compose::{ComposedMessage, Segment, IMAGE_PLACEHOLDER};
use crate::domain::feed::advance_watermark;
use crate::domain::SubscriberKey;
use crate::fetcher::SourceBatch;
use crate::store::SubscriptionStore;
use crate::transport::{OutgoingMessage, Part, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchReport {
    pub subscribers: usize,
    pub delivered: usize,
    pub failed: usize,
    pub watermark: DateTime<Utc>,
}

pub struct Dispatcher {
    transport: Arc<dyn Transport + Send + Sync>,
    store: Arc<dyn SubscriptionStore + Send + Sync>,
}

impl Dispatcher {
    pub fn new(
        transport: Arc<dyn Transport + Send + Sync>,
        store: Arc<dyn SubscriptionStore + Send + Sync>,
    ) -> Self {
        Self { transport, store }
    }

    /// Delivers `messages` (one per entry of `batch`, in publish order) to
    /// every subscriber of the source, then advances its watermark.
    ///
    /// Subscribers are served concurrently; each one gets the messages in
    /// order. A failed delivery is logged and skipped.
    pub async fn dispatch(
        &self,
        batch: &SourceBatch,
        messages: &[ComposedMessage],
    ) -> Result<DispatchReport> {
        let subscribers = self.store.subscribers_of(&batch.source_id)?;

        let results = join_all(
            subscribers
                .iter()
                .map(|subscriber| self.deliver_all(&batch.source_id, *subscriber, messages)),
        )
        .await;

        let delivered: usize = results.iter().map(|(ok, _)| ok).sum();
        let failed: usize = results.iter().map(|(_, failed)| failed).sum();

        let watermark = advance_watermark(Some(batch.watermark), batch.newest(), Utc::now());
        self.store.set_watermark(&batch.source_id, watermark)?;

        tracing::debug!(
            source = %batch.source_id,
            subscribers = subscribers.len(),
            delivered,
            failed,
            %watermark,
            "Dispatched source"
        );

        Ok(DispatchReport {
            subscribers: subscribers.len(),
            delivered,
            failed,
            watermark,
        })
    }

    /// Returns (delivered, failed) for one subscriber.
    async fn deliver_all(
        &self,
        source_id: &str,
        subscriber: SubscriberKey,
        messages: &[ComposedMessage],
    ) -> (usize, usize) {
        let mut delivered = 0;
        let mut failed = 0;

        for message in messages {
            let outgoing = self.prepare(subscriber, message).await;
            match self.transport.deliver(subscriber, &outgoing).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        source = source_id,
                        %subscriber,
                        error = %e,
                        "Delivery failed"
                    );
                    failed += 1;
                }
            }
        }

        (delivered, failed)
    }

    /// Uploads the message's images for `subscriber`. An image that cannot be
    /// uploaded is replaced by the placeholder text.
    async fn prepare(&self, subscriber: SubscriberKey, message: &ComposedMessage) -> OutgoingMessage {
        let mut parts = Vec::with_capacity(message.segments.len());

        for segment in &message.segments {
            let part = match segment {
                Segment::Text(text) => Part::Text(text.clone()),
                Segment::Image(resource) => {
                    match self.transport.upload_binary(subscriber, resource).await {
                        Ok(reference) => Part::Image(reference),
                        Err(e) => {
                            tracing::warn!(
                                %subscriber,
                                url = %resource.source_url,
                                error = %e,
                                "Image upload failed"
                            );
                            Part::Text(format!("{}\n", IMAGE_PLACEHOLDER))
                        }
                    }
                }
            };
            parts.push(part);
        }

        OutgoingMessage {
            framing: message.framing.clone(),
            parts,
        }
    }
}
