//! # octofeed
//!
//! Relays GitHub activity feeds into chat groups.
//!
//! ## Architecture
//!
//! Every cycle runs one pipeline per subscribed source:
//!
//! ```text
//! Fetcher → Normalizer → Enricher → Composer → Dispatcher → Transport
//! ```
//!
//! - [`fetcher`]: HTTP client and watermark-aware feed fetching
//! - [`normalizer`]: Converts Atom/RSS documents into feed entries
//! - [`enrich`]: Link classification and secondary API lookups
//! - [`compose`]: Renders an entry and its enrichment into a message
//! - [`dispatch`]: Fans messages out to subscribers, then advances the watermark
//! - [`scheduler`]: Repeats cycles under a deadline until shutdown
//!
//! ## Quick Start
//!
//! ```bash
//! # Follow alice's activity in group 42 of bot 1
//! octofeed add 1 42 alice
//!
//! # Poll every 30 seconds
//! octofeed run --interval 30s
//!
//! # Stop the poller
//! octofeed stop
//! ```

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together the store, the
/// HTTP fetcher, the transport and the cycle pipeline.
pub mod app;

/// Command-line interface using clap.
///
/// - `add <bot> <group> <source>` - Subscribe a group to a feed
/// - `remove <bot> <group> <source>` - Unsubscribe
/// - `list <bot> <group>` - Feeds a group follows
/// - `sources` - Every known feed with its watermark
/// - `run` / `once` - Poll continuously or once
/// - `stop` / `status` - Control a running poller
pub mod cli;

/// Message rendering.
pub mod compose;

/// Configuration management.
///
/// Loads from `~/.config/octofeed/config.toml`, supporting:
/// - Cycle delay and deadline
/// - SOCKS5/HTTP proxy
/// - Feed, API and preview-image endpoints
/// - Transport selection
pub mod config;

/// PID file and signal handling for `octofeed run`.
pub mod daemon;

/// Delivery to subscribers and watermark advancement.
pub mod dispatch;

/// Core domain models.
///
/// - [`FeedSource`](domain::FeedSource): A followed feed and its watermark
/// - [`FeedEntry`](domain::FeedEntry): One activity entry
/// - [`SubscriberKey`](domain::SubscriberKey): A (bot, group) pair
/// - [`BinaryResource`](domain::BinaryResource): Downloaded bytes to upload
pub mod domain;

/// Link classification and enrichment lookups.
pub mod enrich;

/// HTTP fetching.
///
/// - [`Fetcher`](fetcher::Fetcher): Async trait for fetching a URL
/// - [`HttpFetcher`](fetcher::HttpFetcher): reqwest-based implementation with proxy support
/// - [`FeedFetcher`](fetcher::FeedFetcher): Bounded concurrent feed fetching against watermarks
pub mod fetcher;

/// Feed parsing and normalization.
pub mod normalizer;

/// The per-cycle task group.
pub mod pipeline;

/// The long-running cycle loop.
pub mod scheduler;

/// Subscription and watermark persistence.
///
/// - [`SubscriptionStore`](store::SubscriptionStore): Trait shared by the cycle and the CLI
/// - [`SqliteStore`](store::SqliteStore): SQLite implementation
pub mod store;

/// Message delivery.
///
/// - [`Transport`](transport::Transport): Async trait for uploads and sends
/// - [`StdoutTransport`](transport::StdoutTransport): Prints messages
/// - [`WebhookTransport`](transport::WebhookTransport): Posts messages to a chat bridge
pub mod transport;

#[cfg(test)]
mod testing;
