use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{OctofeedError, Result};
use crate::domain::{FeedSource, SubscriberKey};
use crate::store::SubscriptionStore;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;

        conn.execute("PRAGMA foreign_keys = ON", [])?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| OctofeedError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            OctofeedError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn from_millis(ms: Option<i64>) -> Option<DateTime<Utc>> {
        ms.and_then(DateTime::from_timestamp_millis)
    }
}

impl SubscriptionStore for SqliteStore {
    fn list_sources(&self) -> Result<Vec<String>> {
        let conn = self.lock()?;

        let mut stmt =
            conn.prepare("SELECT DISTINCT source_id FROM subscriptions ORDER BY source_id")?;

        let sources = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(sources)
    }

    fn subscribers_of(&self, source_id: &str) -> Result<Vec<SubscriberKey>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT bot_id, group_id FROM subscriptions
             WHERE source_id = ?1 ORDER BY bot_id, group_id",
        )?;

        let subscribers = stmt
            .query_map(params![source_id], |row| {
                Ok(SubscriberKey {
                    bot_id: row.get(0)?,
                    group_id: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(subscribers)
    }

    fn get_watermark(&self, source_id: &str) -> Result<Option<DateTime<Utc>>> {
        let conn = self.lock()?;

        let watermark: Option<Option<i64>> = conn
            .query_row(
                "SELECT watermark FROM sources WHERE id = ?1",
                params![source_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(Self::from_millis(watermark.flatten()))
    }

    fn set_watermark(&self, source_id: &str, watermark: DateTime<Utc>) -> Result<()> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO sources (id, watermark) VALUES (?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                 watermark = MAX(COALESCE(watermark, excluded.watermark), excluded.watermark)",
            params![source_id, watermark.timestamp_millis()],
        )?;

        Ok(())
    }

    fn subscribe(&self, subscriber: SubscriberKey, source_id: &str) -> Result<bool> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT OR IGNORE INTO sources (id, watermark) VALUES (?1, NULL)",
            params![source_id],
        )?;
        let inserted = tx.execute(
            "INSERT OR IGNORE INTO subscriptions (bot_id, group_id, source_id, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                subscriber.bot_id,
                subscriber.group_id,
                source_id,
                Utc::now().to_rfc3339()
            ],
        )?;

        tx.commit()?;
        Ok(inserted > 0)
    }

    fn unsubscribe(&self, subscriber: SubscriberKey, source_id: &str) -> Result<bool> {
        let conn = self.lock()?;

        // The source row and its watermark are kept for resubscription.
        let removed = conn.execute(
            "DELETE FROM subscriptions WHERE bot_id = ?1 AND group_id = ?2 AND source_id = ?3",
            params![subscriber.bot_id, subscriber.group_id, source_id],
        )?;

        Ok(removed > 0)
    }

    fn is_subscribed(&self, subscriber: SubscriberKey, source_id: &str) -> Result<bool> {
        let conn = self.lock()?;

        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM subscriptions
             WHERE bot_id = ?1 AND group_id = ?2 AND source_id = ?3",
            params![subscriber.bot_id, subscriber.group_id, source_id],
            |row| row.get(0),
        )?;

        Ok(count > 0)
    }

    fn sources_of(&self, subscriber: SubscriberKey) -> Result<Vec<String>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT source_id FROM subscriptions
             WHERE bot_id = ?1 AND group_id = ?2 ORDER BY source_id",
        )?;

        let sources = stmt
            .query_map(params![subscriber.bot_id, subscriber.group_id], |row| {
                row.get(0)
            })?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(sources)
    }

    fn all_sources(&self) -> Result<Vec<FeedSource>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare("SELECT id, watermark FROM sources ORDER BY id")?;

        let sources = stmt
            .query_map([], |row| {
                Ok(FeedSource {
                    id: row.get(0)?,
                    watermark: Self::from_millis(row.get(1)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(sources)
    }
}
