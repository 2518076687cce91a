//! Delivery of composed messages to chat groups.
//!
//! A [`Transport`] knows how to upload binary data for a subscriber and how
//! to send a message made of text and uploaded parts. Everything above this
//! layer is transport-agnostic.

pub mod stdout;
pub mod webhook;

use async_trait::async_trait;
use serde::Serialize;

use crate::app::Result;
use crate::compose::Framing;
use crate::domain::{BinaryResource, SubscriberKey};

pub use stdout::StdoutTransport;
pub use webhook::WebhookTransport;

/// Handle to binary data already uploaded to the chat platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BinaryRef(pub String);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Part {
    Text(String),
    Image(BinaryRef),
}

/// A message ready for one subscriber: every image has been uploaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub framing: Framing,
    pub parts: Vec<Part>,
}

impl OutgoingMessage {
    pub fn render_plain(&self) -> String {
        self.parts
            .iter()
            .map(|part| match part {
                Part::Text(text) => text.clone(),
                Part::Image(reference) => format!("[image {}]\n", reference.0),
            })
            .collect()
    }
}

#[async_trait]
pub trait Transport {
    async fn upload_binary(
        &self,
        subscriber: SubscriberKey,
        resource: &BinaryResource,
    ) -> Result<BinaryRef>;

    async fn deliver(&self, subscriber: SubscriberKey, message: &OutgoingMessage) -> Result<()>;
}
