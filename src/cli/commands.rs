use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::app::{AppContext, OctofeedError, Result};
use crate::compose::local_time;
use crate::daemon::{self, PidFile};
use crate::domain::{FeedSource, SubscriberKey};
use crate::scheduler::{Scheduler, SchedulerConfig};

pub async fn add_subscription(ctx: &AppContext, subscriber: SubscriberKey, source: &str) -> Result<()> {
    FeedSource::validate_id(source)?;

    if ctx.store.is_subscribed(subscriber, source)? {
        return Err(OctofeedError::AlreadySubscribed(source.to_string()));
    }

    // Only follow feeds that can actually be read
    let entries = ctx
        .pipeline
        .feeds()
        .fetch_all_entries(source)
        .await
        .map_err(|e| OctofeedError::InvalidSource(format!("{} ({})", source, e)))?;

    ctx.store.subscribe(subscriber, source)?;
    tracing::info!(%subscriber, source, "Subscribed");
    println!(
        "Subscribed {} to {} ({} entries in feed)",
        subscriber,
        source,
        entries.len()
    );
    Ok(())
}

pub fn remove_subscription(ctx: &AppContext, subscriber: SubscriberKey, source: &str) -> Result<()> {
    if !ctx.store.unsubscribe(subscriber, source)? {
        return Err(OctofeedError::SourceNotFound(source.to_string()));
    }
    tracing::info!(%subscriber, source, "Unsubscribed");
    println!("Unsubscribed {} from {}", subscriber, source);
    Ok(())
}

pub fn list_subscriptions(ctx: &AppContext, subscriber: SubscriberKey) -> Result<()> {
    let sources = ctx.store.sources_of(subscriber)?;

    if sources.is_empty() {
        println!("No subscriptions for {}", subscriber);
        return Ok(());
    }

    println!("Subscriptions for {}:", subscriber);
    for source in sources {
        println!("  {}", source);
    }
    Ok(())
}

pub fn list_sources(ctx: &AppContext) -> Result<()> {
    let sources = ctx.store.all_sources()?;

    if sources.is_empty() {
        println!("No sources");
        return Ok(());
    }

    for source in sources {
        let subscribers = ctx.store.subscribers_of(&source.id)?.len();
        let watermark = source
            .watermark
            .map(|w| local_time(&w))
            .unwrap_or_else(|| "never fetched".to_string());
        println!(
            "{} ({} subscribers, up to {})",
            source.id, subscribers, watermark
        );
    }
    Ok(())
}

/// Schedule settings from the config file, with CLI overrides applied.
pub fn scheduler_config(
    ctx: &AppContext,
    interval: Option<&str>,
    timeout: Option<&str>,
    no_initial_run: bool,
) -> Result<SchedulerConfig> {
    let mut config = SchedulerConfig::from(&ctx.config.schedule);

    if let Some(interval) = interval {
        let secs = SchedulerConfig::parse_interval(interval).map_err(OctofeedError::Config)?;
        config.delay = Duration::from_secs(secs);
    }
    if let Some(timeout) = timeout {
        let secs = SchedulerConfig::parse_interval(timeout).map_err(OctofeedError::Config)?;
        if secs == 0 {
            return Err(OctofeedError::Config("Cycle timeout must be positive".into()));
        }
        config.timeout = Duration::from_secs(secs);
    }
    if no_initial_run {
        config.run_on_start = false;
    }

    Ok(config)
}

pub async fn run_poller(ctx: &AppContext, config: SchedulerConfig, pid_path: &Path) -> Result<()> {
    let pid_file = PidFile::acquire(pid_path)?;
    println!(
        "octofeed polling every {} (PID: {})",
        SchedulerConfig::format_interval(config.delay.as_secs()),
        std::process::id()
    );

    let shutdown = CancellationToken::new();
    daemon::cancel_on_signal(shutdown.clone())?;

    Scheduler::new(ctx.pipeline.clone(), config)
        .run(shutdown)
        .await;

    drop(pid_file);
    println!("octofeed stopped");
    Ok(())
}

pub async fn run_once(ctx: &AppContext, pid_path: &Path) -> Result<()> {
    let pid_file = PidFile::acquire(pid_path)?;

    let config = SchedulerConfig::from(&ctx.config.schedule);
    let report = Scheduler::new(ctx.pipeline.clone(), config)
        .run_once(CancellationToken::new())
        .await;
    drop(pid_file);
    let report = report?;

    println!(
        "Cycle complete: {} sources, {} new entries, {} deliveries ({} failed), {} fetch errors",
        report.sources,
        report.entries_dispatched,
        report.deliveries,
        report.deliveries_failed,
        report.fetch_failures
    );
    Ok(())
}

pub fn stop(pid_path: &Path) -> Result<()> {
    let pid = daemon::stop_daemon(pid_path)?;
    println!("Stopped poller (PID {})", pid);
    Ok(())
}

pub fn status(pid_path: &Path) {
    println!("{}", daemon::daemon_status(pid_path));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::config::Config;
    use crate::store::MemoryStore;
    use crate::testing::{self, atom_feed, RecordingTransport, StaticFetcher};
    use chrono::Utc;

    fn context(fetcher: StaticFetcher) -> AppContext {
        context_with(fetcher, Arc::new(RecordingTransport::new()))
    }

    fn context_with(fetcher: StaticFetcher, transport: Arc<RecordingTransport>) -> AppContext {
        let config = Config {
            endpoints: testing::endpoints(),
            ..Default::default()
        };
        AppContext::with_parts(config, Arc::new(MemoryStore::new()), Arc::new(fetcher), transport)
    }

    fn alice_feed() -> StaticFetcher {
        StaticFetcher::new().with_body(
            "https://feeds.test/alice.atom",
            atom_feed(&[("e1", "https://github.com/alice/repo", Utc::now())]),
        )
    }

    #[tokio::test]
    async fn test_add_then_duplicate() {
        let ctx = context(alice_feed());
        let g = SubscriberKey::new(1, 2);

        add_subscription(&ctx, g, "alice").await.unwrap();
        assert_eq!(ctx.store.sources_of(g).unwrap(), vec!["alice".to_string()]);

        let again = add_subscription(&ctx, g, "alice").await;
        assert!(matches!(again, Err(OctofeedError::AlreadySubscribed(_))));
    }

    #[tokio::test]
    async fn test_add_does_not_touch_watermark() {
        let ctx = context(alice_feed());
        add_subscription(&ctx, SubscriberKey::new(1, 2), "alice")
            .await
            .unwrap();
        assert_eq!(ctx.store.get_watermark("alice").unwrap(), None);
    }

    #[tokio::test]
    async fn test_add_rejects_unreadable_feed() {
        let ctx = context(StaticFetcher::new());
        let g = SubscriberKey::new(1, 2);

        let result = add_subscription(&ctx, g, "ghost").await;

        assert!(matches!(result, Err(OctofeedError::InvalidSource(_))));
        assert!(ctx.store.sources_of(g).unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_add_rejects_malformed_id() {
        let ctx = context(alice_feed());
        let result = add_subscription(&ctx, SubscriberKey::new(1, 2), "../etc").await;
        assert!(matches!(result, Err(OctofeedError::InvalidSource(_))));
    }

    #[tokio::test]
    async fn test_remove() {
        let ctx = context(alice_feed());
        let g = SubscriberKey::new(1, 2);
        add_subscription(&ctx, g, "alice").await.unwrap();

        remove_subscription(&ctx, g, "alice").unwrap();
        assert!(ctx.store.sources_of(g).unwrap().is_empty());

        let again = remove_subscription(&ctx, g, "alice");
        assert!(matches!(again, Err(OctofeedError::SourceNotFound(_))));
    }

    #[test]
    fn test_scheduler_overrides() {
        let ctx = context(StaticFetcher::new());

        let config = scheduler_config(&ctx, Some("30s"), Some("2m"), true).unwrap();
        assert_eq!(config.delay, Duration::from_secs(30));
        assert_eq!(config.timeout, Duration::from_secs(120));
        assert!(!config.run_on_start);

        let defaults = scheduler_config(&ctx, None, None, false).unwrap();
        assert_eq!(defaults.delay, Duration::from_secs(10));

        assert!(scheduler_config(&ctx, Some("often"), None, false).is_err());
        assert!(scheduler_config(&ctx, None, Some("0s"), false).is_err());
    }

    #[tokio::test]
    async fn test_once_releases_pid_file() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("octofeed.pid");
        let ctx = context(alice_feed());

        run_once(&ctx, &pid_path).await.unwrap();

        assert!(!pid_path.exists());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_once_refuses_while_poller_runs() {
        let dir = tempfile::tempdir().unwrap();
        let pid_path = dir.path().join("octofeed.pid");
        let transport = Arc::new(RecordingTransport::new());
        let ctx = context_with(alice_feed(), transport.clone());
        let g = SubscriberKey::new(1, 2);
        ctx.store.subscribe(g, "alice").unwrap();
        ctx.store
            .set_watermark("alice", Utc::now() - chrono::Duration::hours(1))
            .unwrap();

        let running = PidFile::acquire(&pid_path).unwrap();
        let result = run_once(&ctx, &pid_path).await;

        assert!(matches!(result, Err(OctofeedError::AlreadyRunning(_))));
        assert!(transport.delivered().is_empty());
        assert!(pid_path.exists());
        drop(running);
    }
}
