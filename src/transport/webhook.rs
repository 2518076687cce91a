use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::app::{OctofeedError, Result};
use crate::config::HttpConfig;
use crate::domain::{BinaryResource, SubscriberKey};
use crate::transport::{BinaryRef, OutgoingMessage, Transport};

/// Hands messages to a chat bridge over HTTP.
///
/// * `POST <base>/upload?bot_id=..&group_id=..` with the raw bytes, answered
///   with `{"reference": "..."}`
/// * `POST <base>/send` with a JSON [`SendRequest`]
pub struct WebhookTransport {
    client: Client,
    base_url: String,
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    bot_id: i64,
    group_id: i64,
    #[serde(flatten)]
    message: &'a OutgoingMessage,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    reference: String,
}

impl WebhookTransport {
    pub fn new(base_url: &str, http: &HttpConfig) -> Result<Self> {
        let base = url::Url::parse(base_url)?;
        let client = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .user_agent(http.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: base.as_str().trim_end_matches('/').to_string(),
        })
    }

    fn upload_url(&self, subscriber: SubscriberKey) -> String {
        format!(
            "{}/upload?bot_id={}&group_id={}",
            self.base_url, subscriber.bot_id, subscriber.group_id
        )
    }

    fn send_url(&self) -> String {
        format!("{}/send", self.base_url)
    }
}

#[async_trait]
impl Transport for WebhookTransport {
    async fn upload_binary(
        &self,
        subscriber: SubscriberKey,
        resource: &BinaryResource,
    ) -> Result<BinaryRef> {
        let response = self
            .client
            .post(self.upload_url(subscriber))
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(resource.bytes.clone())
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(OctofeedError::Upload(format!(
                "{} answered {}",
                self.base_url,
                response.status()
            )));
        }

        let uploaded: UploadResponse = response.json().await?;
        tracing::debug!(%subscriber, url = %resource.source_url, "Uploaded binary");
        Ok(BinaryRef(uploaded.reference))
    }

    async fn deliver(&self, subscriber: SubscriberKey, message: &OutgoingMessage) -> Result<()> {
        let request = SendRequest {
            bot_id: subscriber.bot_id,
            group_id: subscriber.group_id,
            message,
        };
        let response = self
            .client
            .post(self.send_url())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(OctofeedError::Delivery(format!(
                "{} answered {} for {}",
                self.base_url, status, subscriber
            )));
        }
        Ok(())
    }
}
