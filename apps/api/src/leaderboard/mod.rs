// Leaderboard Aggregator: bounded, rank-ordered top-N per aggregation period,
// fed by completion events from the attempt tracker.

pub mod aggregator;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::DateKey;
use crate::progress::Identity;

pub use aggregator::{DuplicatePolicy, LeaderboardAggregator};

/// One stored leaderboard row. Rank is positional and not persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardSlot {
    pub identity: Identity,
    pub score: u32,
    pub date_key: DateKey,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub identity: Identity,
    pub score: u32,
}
