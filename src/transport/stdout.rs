use std::io::Write;

use async_trait::async_trait;

use crate::app::Result;
use crate::compose::Framing;
use crate::domain::{BinaryResource, SubscriberKey};
use crate::transport::{BinaryRef, OutgoingMessage, Transport};

/// Prints messages to standard output. Useful for trying out subscriptions
/// without a chat bridge.
#[derive(Debug, Default)]
pub struct StdoutTransport;

impl StdoutTransport {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Transport for StdoutTransport {
    async fn upload_binary(
        &self,
        _subscriber: SubscriberKey,
        resource: &BinaryResource,
    ) -> Result<BinaryRef> {
        Ok(BinaryRef(format!(
            "{} ({} bytes)",
            resource.source_url,
            resource.bytes.len()
        )))
    }

    async fn deliver(&self, subscriber: SubscriberKey, message: &OutgoingMessage) -> Result<()> {
        let mut out = std::io::stdout().lock();
        writeln!(out, "=== {} ===", subscriber)?;
        if let Framing::Forward(summary) = &message.framing {
            writeln!(out, "[{}] {}", summary.title, summary.brief)?;
        }
        writeln!(out, "{}", message.render_plain())?;
        writeln!(out)?;
        out.flush()?;
        Ok(())
    }
}
