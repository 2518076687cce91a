//! Test doubles for the network-facing traits.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::app::{OctofeedError, Result};
use crate::compose::Composer;
use crate::config::Endpoints;
use crate::dispatch::Dispatcher;
use crate::domain::{BinaryResource, SubscriberKey};
use crate::enrich::{Classifier, Enricher};
use crate::fetcher::{FeedFetcher, Fetcher};
use crate::pipeline::Pipeline;
use crate::store::MemoryStore;
use crate::transport::{BinaryRef, OutgoingMessage, Transport};

/// Serves canned bodies by URL. Unknown URLs fail; `hanging` URLs never
/// answer.
#[derive(Default)]
pub struct StaticFetcher {
    bodies: HashMap<String, Vec<u8>>,
    hanging: HashSet<String>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(mut self, url: &str, body: impl Into<Vec<u8>>) -> Self {
        self.bodies.insert(url.to_string(), body.into());
        self
    }

    pub fn with_hanging(mut self, url: &str) -> Self {
        self.hanging.insert(url.to_string());
        self
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        self.requests.lock().unwrap().push(url.to_string());

        if self.hanging.contains(url) {
            std::future::pending::<()>().await;
        }

        self.bodies
            .get(url)
            .cloned()
            .ok_or_else(|| OctofeedError::Other(format!("404 Not Found: {}", url)))
    }
}

/// Records every delivery. Subscribers in `failing` get an error instead;
/// deliveries to subscribers in `hanging` never complete.
#[derive(Default)]
pub struct RecordingTransport {
    failing: HashSet<SubscriberKey>,
    hanging: HashSet<SubscriberKey>,
    failing_uploads: bool,
    delivered: Mutex<Vec<(SubscriberKey, OutgoingMessage)>>,
    uploads: Mutex<Vec<(SubscriberKey, String)>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_for(mut self, subscriber: SubscriberKey) -> Self {
        self.failing.insert(subscriber);
        self
    }

    pub fn hanging_for(mut self, subscriber: SubscriberKey) -> Self {
        self.hanging.insert(subscriber);
        self
    }

    pub fn failing_uploads(mut self) -> Self {
        self.failing_uploads = true;
        self
    }

    pub fn delivered(&self) -> Vec<(SubscriberKey, OutgoingMessage)> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn delivered_to(&self, subscriber: SubscriberKey) -> Vec<OutgoingMessage> {
        self.delivered()
            .into_iter()
            .filter(|(key, _)| *key == subscriber)
            .map(|(_, message)| message)
            .collect()
    }

    pub fn uploads(&self) -> Vec<(SubscriberKey, String)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn upload_binary(
        &self,
        subscriber: SubscriberKey,
        resource: &BinaryResource,
    ) -> Result<BinaryRef> {
        if self.failing_uploads {
            return Err(OctofeedError::Upload("upload rejected".into()));
        }
        self.uploads
            .lock()
            .unwrap()
            .push((subscriber, resource.source_url.clone()));
        Ok(BinaryRef(format!("ref:{}", resource.source_url)))
    }

    async fn deliver(&self, subscriber: SubscriberKey, message: &OutgoingMessage) -> Result<()> {
        if self.failing.contains(&subscriber) {
            return Err(OctofeedError::Delivery(format!("{} is unreachable", subscriber)));
        }
        if self.hanging.contains(&subscriber) {
            std::future::pending::<()>().await;
        }
        self.delivered
            .lock()
            .unwrap()
            .push((subscriber, message.clone()));
        Ok(())
    }
}

/// Builds an Atom document the way the activity feed lays it out.
pub fn atom_feed(entries: &[(&str, &str, DateTime<Utc>)]) -> Vec<u8> {
    let mut xml = String::from(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <id>tag:github.com,2008:/test</id>
  <title>Test activity</title>
  <updated>2024-01-01T00:00:00Z</updated>
"#,
    );
    for (i, (title, link, published)) in entries.iter().enumerate() {
        xml.push_str(&format!(
            r#"  <entry>
    <id>tag:github.com,2008:Event/{i}</id>
    <published>{published}</published>
    <updated>{published}</updated>
    <link type="text/html" rel="alternate" href="{link}"/>
    <title type="html">{title}</title>
  </entry>
"#,
            i = i,
            published = published.to_rfc3339(),
            link = link,
            title = title,
        ));
    }
    xml.push_str("</feed>\n");
    xml.into_bytes()
}

pub fn endpoints() -> Endpoints {
    Endpoints {
        feed_root: "https://feeds.test".into(),
        api_root: "https://api.test/repos".into(),
        preview_root: "https://img.test".into(),
    }
}

/// A pipeline wired to test doubles, using [`endpoints`].
pub fn pipeline(
    fetcher: Arc<StaticFetcher>,
    store: Arc<MemoryStore>,
    transport: Arc<RecordingTransport>,
) -> Pipeline {
    Pipeline::new(
        store.clone(),
        FeedFetcher::new(fetcher.clone(), store.clone(), endpoints()),
        Enricher::new(fetcher, endpoints(), Classifier::default()),
        Composer::default(),
        Dispatcher::new(transport, store),
    )
}
