//! The long-running cycle loop.
//!
//! ```text
//! Idle -> Running -> Sleeping -> Running -> ...
//!   any state -> ShuttingDown
//! ```
//!
//! Cycles never overlap: the next one only starts after the previous one
//! returned or hit its deadline and the delay elapsed.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::app::{OctofeedError, Result};
use crate::config::ScheduleConfig;
use crate::pipeline::{CycleReport, Pipeline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Running,
    Sleeping,
    ShuttingDown,
}

/// Scheduler configuration
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Pause between cycles
    pub delay: Duration,
    /// Deadline for one cycle
    pub timeout: Duration,
    /// Whether to run a cycle immediately on start
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self::from(&ScheduleConfig::default())
    }
}

impl From<&ScheduleConfig> for SchedulerConfig {
    fn from(config: &ScheduleConfig) -> Self {
        Self {
            delay: config.delay(),
            timeout: config.timeout(),
            run_on_start: config.run_on_start,
        }
    }
}

impl SchedulerConfig {
    /// Parse interval string like "10s", "5m", "1h", "1d"
    pub fn parse_interval(s: &str) -> std::result::Result<u64, String> {
        let s = s.trim().to_lowercase();

        if let Some(hours) = s.strip_suffix('h') {
            let h = hours
                .parse::<u64>()
                .map_err(|_| format!("Invalid hours: {}", hours))?;
            h.checked_mul(3600)
                .ok_or_else(|| format!("Interval too large: {}", s))
        } else if let Some(minutes) = s.strip_suffix('m') {
            let m = minutes
                .parse::<u64>()
                .map_err(|_| format!("Invalid minutes: {}", minutes))?;
            m.checked_mul(60)
                .ok_or_else(|| format!("Interval too large: {}", s))
        } else if let Some(days) = s.strip_suffix('d') {
            let d = days
                .parse::<u64>()
                .map_err(|_| format!("Invalid days: {}", days))?;
            d.checked_mul(86400)
                .ok_or_else(|| format!("Interval too large: {}", s))
        } else if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>()
                .map_err(|_| format!("Invalid seconds: {}", secs))
        } else {
            // Raw seconds
            s.parse::<u64>()
                .map_err(|_| format!("Invalid interval: {}. Use format like '10s', '5m', '1h'", s))
        }
    }

    /// Format interval for display
    pub fn format_interval(secs: u64) -> String {
        if secs >= 86400 && secs.is_multiple_of(86400) {
            format!("{}d", secs / 86400)
        } else if secs >= 3600 && secs.is_multiple_of(3600) {
            format!("{}h", secs / 3600)
        } else if secs >= 60 && secs.is_multiple_of(60) {
            format!("{}m", secs / 60)
        } else {
            format!("{}s", secs)
        }
    }
}

pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    config: SchedulerConfig,
    state: watch::Sender<SchedulerState>,
}

impl Scheduler {
    pub fn new(pipeline: Arc<Pipeline>, config: SchedulerConfig) -> Self {
        let (state, _) = watch::channel(SchedulerState::Idle);
        Self {
            pipeline,
            config,
            state,
        }
    }

    pub fn state(&self) -> SchedulerState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<SchedulerState> {
        self.state.subscribe()
    }

    /// Runs cycles until `shutdown` is cancelled.
    ///
    /// Cancellation reaches the in-flight cycle through a child token, so
    /// every outstanding fetch and delivery stops before this returns.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            delay = %SchedulerConfig::format_interval(self.config.delay.as_secs()),
            timeout = %SchedulerConfig::format_interval(self.config.timeout.as_secs()),
            "Scheduler started"
        );

        if !self.config.run_on_start && !self.sleep(&shutdown).await {
            self.shut_down();
            return;
        }

        loop {
            self.state.send_replace(SchedulerState::Running);
            // Errors are isolated to the cycle; only shutdown ends the loop
            let _ = self.run_once(shutdown.child_token()).await;

            if shutdown.is_cancelled() || !self.sleep(&shutdown).await {
                break;
            }
        }

        self.shut_down();
    }

    /// Runs a single cycle under the configured deadline and logs how it
    /// went.
    pub async fn run_once(&self, cancel: CancellationToken) -> Result<CycleReport> {
        let started = Utc::now();
        let result = match tokio::time::timeout(self.config.timeout, self.pipeline.run_cycle(cancel))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(OctofeedError::CycleTimeout(self.config.timeout)),
        };
        let elapsed = Utc::now().signed_duration_since(started);
        let secs = elapsed.num_milliseconds() as f64 / 1000.0;

        match &result {
            Ok(report) => tracing::info!(
                sources = report.sources,
                completed = report.sources_completed,
                fetch_failures = report.fetch_failures,
                entries = report.entries_dispatched,
                deliveries = report.deliveries,
                delivery_failures = report.deliveries_failed,
                cancelled = report.cancelled,
                "Cycle complete ({:.1}s)",
                secs
            ),
            Err(OctofeedError::CycleTimeout(_)) => {
                tracing::warn!("Cycle aborted at its deadline ({:.1}s)", secs)
            }
            Err(e) => tracing::error!(error = %e, "Cycle failed ({:.1}s)", secs),
        }

        result
    }

    /// Sleeps for the configured delay. Returns `false` if shutdown was
    /// requested meanwhile.
    async fn sleep(&self, shutdown: &CancellationToken) -> bool {
        self.state.send_replace(SchedulerState::Sleeping);
        tokio::select! {
            _ = shutdown.cancelled() => false,
            _ = tokio::time::sleep(self.config.delay) => true,
        }
    }

    fn shut_down(&self) {
        self.state.send_replace(SchedulerState::ShuttingDown);
        tracing::info!("Scheduler shutting down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SubscriberKey;
    use crate::store::{MemoryStore, SubscriptionStore};
    use crate::testing::{self, atom_feed, RecordingTransport, StaticFetcher};
    use chrono::TimeZone;

    fn config(delay_ms: u64, timeout_ms: u64) -> SchedulerConfig {
        SchedulerConfig {
            delay: Duration::from_millis(delay_ms),
            timeout: Duration::from_millis(timeout_ms),
            run_on_start: true,
        }
    }

    fn scheduler(fetcher: Arc<StaticFetcher>, config: SchedulerConfig) -> Scheduler {
        let store = Arc::new(MemoryStore::new());
        store.subscribe(SubscriberKey::new(1, 1), "alice").unwrap();
        store
            .set_watermark("alice", Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .unwrap();
        let pipeline = testing::pipeline(fetcher, store, Arc::new(RecordingTransport::new()));
        Scheduler::new(Arc::new(pipeline), config)
    }

    fn alice_feed() -> Arc<StaticFetcher> {
        Arc::new(StaticFetcher::new().with_body(
            "https://feeds.test/alice.atom",
            atom_feed(&[(
                "e1",
                "https://github.com/alice/repo",
                Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            )]),
        ))
    }

    fn feed_requests(fetcher: &StaticFetcher) -> usize {
        fetcher
            .requests()
            .iter()
            .filter(|url| url.ends_with(".atom"))
            .count()
    }

    #[test]
    fn test_parse_interval() {
        assert_eq!(SchedulerConfig::parse_interval("1h").unwrap(), 3600);
        assert_eq!(SchedulerConfig::parse_interval("5m").unwrap(), 300);
        assert_eq!(SchedulerConfig::parse_interval("1d").unwrap(), 86400);
        assert_eq!(SchedulerConfig::parse_interval("10s").unwrap(), 10);
        assert_eq!(SchedulerConfig::parse_interval("30").unwrap(), 30);
        assert!(SchedulerConfig::parse_interval("soon").is_err());
    }

    #[test]
    fn test_parse_interval_rejects_overflow() {
        for huge in ["9999999999999999h", "999999999999999999m", "999999999999999d"] {
            let err = SchedulerConfig::parse_interval(huge).unwrap_err();
            assert!(err.starts_with("Interval too large"), "{}", err);
        }
        assert_eq!(
            SchedulerConfig::parse_interval(&format!("{}s", u64::MAX)).unwrap(),
            u64::MAX
        );
    }

    #[test]
    fn test_format_interval() {
        assert_eq!(SchedulerConfig::format_interval(10), "10s");
        assert_eq!(SchedulerConfig::format_interval(300), "5m");
        assert_eq!(SchedulerConfig::format_interval(7200), "2h");
        assert_eq!(SchedulerConfig::format_interval(86400), "1d");
        assert_eq!(SchedulerConfig::format_interval(90), "90s");
    }

    #[test]
    fn test_config_from_schedule() {
        let config = SchedulerConfig::default();
        assert_eq!(config.delay, Duration::from_secs(10));
        assert_eq!(config.timeout, Duration::from_secs(300));
        assert!(config.run_on_start);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_repeatedly_until_shutdown() {
        let fetcher = alice_feed();
        let scheduler = scheduler(fetcher.clone(), config(20, 1000));
        assert_eq!(scheduler.state(), SchedulerState::Idle);

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            trigger.cancel();
        });

        scheduler.run(shutdown).await;

        assert!(feed_requests(&fetcher) >= 2);
        assert_eq!(scheduler.state(), SchedulerState::ShuttingDown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_cycle_is_not_fatal() {
        let fetcher = Arc::new(StaticFetcher::new().with_hanging("https://feeds.test/alice.atom"));
        let scheduler = scheduler(fetcher.clone(), config(10, 30));

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(200)).await;
            trigger.cancel();
        });

        scheduler.run(shutdown).await;

        assert!(feed_requests(&fetcher) >= 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_once_reports_timeout() {
        let fetcher = Arc::new(StaticFetcher::new().with_hanging("https://feeds.test/alice.atom"));
        let scheduler = scheduler(fetcher, config(10, 30));

        let result = scheduler.run_once(CancellationToken::new()).await;

        assert!(matches!(result, Err(OctofeedError::CycleTimeout(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_during_cycle_stops_promptly() {
        let fetcher = Arc::new(StaticFetcher::new().with_hanging("https://feeds.test/alice.atom"));
        let scheduler = scheduler(fetcher, config(10, 60_000));

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let finished = tokio::time::timeout(Duration::from_secs(5), scheduler.run(shutdown)).await;

        assert!(finished.is_ok());
        assert_eq!(scheduler.state(), SchedulerState::ShuttingDown);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delayed_start_waits_for_first_cycle() {
        let fetcher = alice_feed();
        let mut config = config(60_000, 1000);
        config.run_on_start = false;
        let scheduler = scheduler(fetcher.clone(), config);
        let mut states = scheduler.subscribe();

        let shutdown = CancellationToken::new();
        let trigger = shutdown.clone();
        let watcher = tokio::spawn(async move {
            states.changed().await.unwrap();
            let first = *states.borrow();
            trigger.cancel();
            first
        });

        scheduler.run(shutdown).await;

        assert_eq!(watcher.await.unwrap(), SchedulerState::Sleeping);
        assert_eq!(feed_requests(&fetcher), 0);
    }
}
