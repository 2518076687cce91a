use std::fmt;

use serde::{Deserialize, Serialize};

/// A bot session and the group it posts into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SubscriberKey {
    pub bot_id: i64,
    pub group_id: i64,
}

impl SubscriberKey {
    pub fn new(bot_id: i64, group_id: i64) -> Self {
        Self { bot_id, group_id }
    }
}

impl fmt::Display for SubscriberKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bot {} / group {}", self.bot_id, self.group_id)
    }
}
