use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT};
use reqwest::{Client, Proxy};

use crate::app::Result;
use crate::config::{HttpConfig, ProxyConfig};
use crate::fetcher::Fetcher;

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(http: &HttpConfig, proxy: &ProxyConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        // Understood by the REST API, ignored by the feed and image hosts
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json, */*;q=0.8"),
        );

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(http.timeout_secs))
            .gzip(true)
            .brotli(true)
            .user_agent(http.user_agent.as_str())
            .default_headers(headers);

        if let Some(proxy_url) = proxy.url() {
            tracing::info!(proxy = %proxy_url, "Routing requests through proxy");
            builder = builder.proxy(Proxy::all(proxy_url.as_str())?);
        }

        Ok(Self {
            client: builder.build()?,
        })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(url, "Fetching");

        let response = self.client.get(url).send().await?;
        response.error_for_status_ref()?;

        let body = response.bytes().await?.to_vec();
        tracing::debug!(url, bytes = body.len(), "Fetched");

        Ok(body)
    }
}
