use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::{OctofeedError, Result};

/// A followed activity feed and the publish time up to which it has been
/// processed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSource {
    pub id: String,
    pub watermark: Option<DateTime<Utc>>,
}

impl FeedSource {
    /// Source ids end up in a URL path, so only account-name characters are
    /// accepted.
    pub fn validate_id(id: &str) -> Result<()> {
        let valid = !id.is_empty()
            && id.len() <= 39
            && !id.starts_with('-')
            && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');

        if valid {
            Ok(())
        } else {
            Err(OctofeedError::InvalidSource(id.to_string()))
        }
    }
}

/// Watermark after processing a batch whose newest entry was published at
/// `newest`. Never moves backward.
pub fn advance_watermark(
    current: Option<DateTime<Utc>>,
    newest: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    match (current, newest) {
        (Some(current), Some(newest)) => current.max(newest),
        (Some(current), None) => current,
        (None, Some(newest)) => newest,
        (None, None) => now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn test_validate_id() {
        assert!(FeedSource::validate_id("alice").is_ok());
        assert!(FeedSource::validate_id("rust-lang").is_ok());
        assert!(FeedSource::validate_id("").is_err());
        assert!(FeedSource::validate_id("-alice").is_err());
        assert!(FeedSource::validate_id("alice/repo").is_err());
        assert!(FeedSource::validate_id("../etc").is_err());
    }

    #[test]
    fn test_advance_takes_newest_entry() {
        assert_eq!(advance_watermark(Some(at(10)), Some(at(12)), at(99)), at(12));
    }

    #[test]
    fn test_advance_never_moves_backward() {
        assert_eq!(advance_watermark(Some(at(10)), Some(at(5)), at(99)), at(10));
    }

    #[test]
    fn test_advance_without_entries_keeps_watermark() {
        assert_eq!(advance_watermark(Some(at(10)), None, at(99)), at(10));
    }

    #[test]
    fn test_advance_fresh_source_without_entries_uses_now() {
        assert_eq!(advance_watermark(None, None, at(99)), at(99));
    }
}
