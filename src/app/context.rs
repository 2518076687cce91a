use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{OctofeedError, Result};
use crate::compose::Composer;
use crate::config::{Config, TransportKind};
use crate::dispatch::Dispatcher;
use crate::enrich::{Classifier, Enricher};
use crate::fetcher::{FeedFetcher, Fetcher, HttpFetcher};
use crate::pipeline::Pipeline;
use crate::store::{SqliteStore, SubscriptionStore};
use crate::transport::{StdoutTransport, Transport, WebhookTransport};

pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn SubscriptionStore + Send + Sync>,
    pub pipeline: Arc<Pipeline>,
}

impl AppContext {
    /// Wires the application from configuration. `db_path` overrides the
    /// configured database location.
    pub fn new(config: Config, db_path: Option<PathBuf>) -> Result<Self> {
        let db_path = match db_path.or_else(|| config.storage.database_path.clone()) {
            Some(p) => p,
            None => Self::default_db_path()?,
        };
        tracing::debug!(path = %db_path.display(), "Opening database");

        let store = Arc::new(SqliteStore::new(&db_path)?);
        let fetcher = Arc::new(HttpFetcher::new(&config.http, &config.proxy)?);
        let transport = Self::transport(&config)?;

        Ok(Self::with_parts(config, store, fetcher, transport))
    }

    pub fn with_parts(
        config: Config,
        store: Arc<dyn SubscriptionStore + Send + Sync>,
        fetcher: Arc<dyn Fetcher + Send + Sync>,
        transport: Arc<dyn Transport + Send + Sync>,
    ) -> Self {
        let endpoints = config.endpoints.clone();
        let classifier = match url::Url::parse(&endpoints.feed_root) {
            Ok(root) => root.host_str().map(Classifier::new).unwrap_or_default(),
            Err(_) => Classifier::default(),
        };

        let pipeline = Pipeline::new(
            store.clone(),
            FeedFetcher::with_workers(
                fetcher.clone(),
                store.clone(),
                endpoints.clone(),
                config.http.max_concurrency,
            ),
            Enricher::new(fetcher, endpoints, classifier),
            Composer::new(&config.compose),
            Dispatcher::new(transport, store.clone()),
        );

        Self {
            config,
            store,
            pipeline: Arc::new(pipeline),
        }
    }

    fn transport(config: &Config) -> Result<Arc<dyn Transport + Send + Sync>> {
        match config.transport.kind {
            TransportKind::Stdout => Ok(Arc::new(StdoutTransport::new())),
            TransportKind::Webhook => {
                let url = config.transport.webhook_url.as_deref().ok_or_else(|| {
                    OctofeedError::Config("transport.webhook_url is required for webhook".into())
                })?;
                Ok(Arc::new(WebhookTransport::new(url, &config.http)?))
            }
        }
    }

    fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| OctofeedError::Config("Could not find data directory".into()))?;
        let octofeed_dir = data_dir.join("octofeed");
        std::fs::create_dir_all(&octofeed_dir)?;
        Ok(octofeed_dir.join("octofeed.db"))
    }
}
