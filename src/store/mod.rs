#[cfg(test)]
mod memory;
pub mod sqlite;

use chrono::{DateTime, Utc};

use crate::app::Result;
use crate::domain::{FeedSource, SubscriberKey};

#[cfg(test)]
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Subscriptions and per-source watermarks.
///
/// Implementations are shared between the polling cycle and the CRUD
/// commands, so every method takes `&self` and synchronizes internally.
pub trait SubscriptionStore {
    // Read by the polling cycle
    fn list_sources(&self) -> Result<Vec<String>>;
    fn subscribers_of(&self, source_id: &str) -> Result<Vec<SubscriberKey>>;
    fn get_watermark(&self, source_id: &str) -> Result<Option<DateTime<Utc>>>;
    /// Stores `max(current, watermark)`.
    fn set_watermark(&self, source_id: &str, watermark: DateTime<Utc>) -> Result<()>;

    // Subscription management
    fn subscribe(&self, subscriber: SubscriberKey, source_id: &str) -> Result<bool>;
    fn unsubscribe(&self, subscriber: SubscriberKey, source_id: &str) -> Result<bool>;
    fn is_subscribed(&self, subscriber: SubscriberKey, source_id: &str) -> Result<bool>;
    fn sources_of(&self, subscriber: SubscriberKey) -> Result<Vec<String>>;
    fn all_sources(&self) -> Result<Vec<FeedSource>>;
}
