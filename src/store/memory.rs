use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};

use crate::app::{OctofeedError, Result};
use crate::domain::{FeedSource, SubscriberKey};
use crate::store::SubscriptionStore;

#[derive(Default)]
struct State {
    subscriptions: BTreeMap<SubscriberKey, BTreeSet<String>>,
    watermarks: BTreeMap<String, Option<DateTime<Utc>>>,
}

/// Non-persistent store for unit tests.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|e| OctofeedError::Other(format!("store lock poisoned: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|e| OctofeedError::Other(format!("store lock poisoned: {}", e)))
    }
}

impl SubscriptionStore for MemoryStore {
    fn list_sources(&self) -> Result<Vec<String>> {
        let state = self.read()?;
        let sources: BTreeSet<&String> = state.subscriptions.values().flatten().collect();
        Ok(sources.into_iter().cloned().collect())
    }

    fn subscribers_of(&self, source_id: &str) -> Result<Vec<SubscriberKey>> {
        let state = self.read()?;
        Ok(state
            .subscriptions
            .iter()
            .filter(|(_, sources)| sources.contains(source_id))
            .map(|(key, _)| *key)
            .collect())
    }

    fn get_watermark(&self, source_id: &str) -> Result<Option<DateTime<Utc>>> {
        let state = self.read()?;
        Ok(state.watermarks.get(source_id).copied().flatten())
    }

    fn set_watermark(&self, source_id: &str, watermark: DateTime<Utc>) -> Result<()> {
        let mut state = self.write()?;
        let slot = state.watermarks.entry(source_id.to_string()).or_default();
        *slot = Some(slot.map_or(watermark, |current| current.max(watermark)));
        Ok(())
    }

    fn subscribe(&self, subscriber: SubscriberKey, source_id: &str) -> Result<bool> {
        let mut state = self.write()?;
        state.watermarks.entry(source_id.to_string()).or_default();
        Ok(state
            .subscriptions
            .entry(subscriber)
            .or_default()
            .insert(source_id.to_string()))
    }

    fn unsubscribe(&self, subscriber: SubscriberKey, source_id: &str) -> Result<bool> {
        let mut state = self.write()?;
        let Some(sources) = state.subscriptions.get_mut(&subscriber) else {
            return Ok(false);
        };
        let removed = sources.remove(source_id);
        if sources.is_empty() {
            state.subscriptions.remove(&subscriber);
        }
        Ok(removed)
    }

    fn is_subscribed(&self, subscriber: SubscriberKey, source_id: &str) -> Result<bool> {
        let state = self.read()?;
        Ok(state
            .subscriptions
            .get(&subscriber)
            .is_some_and(|sources| sources.contains(source_id)))
    }

    fn sources_of(&self, subscriber: SubscriberKey) -> Result<Vec<String>> {
        let state = self.read()?;
        Ok(state
            .subscriptions
            .get(&subscriber)
            .map(|sources| sources.iter().cloned().collect())
            .unwrap_or_default())
    }

    fn all_sources(&self) -> Result<Vec<FeedSource>> {
        let state = self.read()?;
        Ok(state
            .watermarks
            .iter()
            .map(|(id, watermark)| FeedSource {
                id: id.clone(),
                watermark: *watermark,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_list_sources_is_distinct() {
        let store = MemoryStore::new();
        store.subscribe(SubscriberKey::new(1, 1), "alice").unwrap();
        store.subscribe(SubscriberKey::new(1, 2), "alice").unwrap();
        store.subscribe(SubscriberKey::new(2, 1), "bob").unwrap();

        assert_eq!(
            store.list_sources().unwrap(),
            vec!["alice".to_string(), "bob".to_string()]
        );
    }

    #[test]
    fn test_set_watermark_is_monotonic() {
        let store = MemoryStore::new();
        let later = Utc.timestamp_opt(200, 0).unwrap();
        let earlier = Utc.timestamp_opt(100, 0).unwrap();

        store.set_watermark("alice", later).unwrap();
        store.set_watermark("alice", earlier).unwrap();

        assert_eq!(store.get_watermark("alice").unwrap(), Some(later));
    }

    #[test]
    fn test_unsubscribe_last_source_drops_subscriber() {
        let store = MemoryStore::new();
        let group = SubscriberKey::new(1, 1);
        store.subscribe(group, "alice").unwrap();

        assert!(store.unsubscribe(group, "alice").unwrap());
        assert!(store.subscribers_of("alice").unwrap().is_empty());
        assert!(store.list_sources().unwrap().is_empty());
        // the source itself is remembered
        assert_eq!(store.all_sources().unwrap().len(), 1);
    }
}
