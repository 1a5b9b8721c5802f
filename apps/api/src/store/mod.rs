//! Persistence provider for the quiz core.
//!
//! The core only needs keyed get/put over four collections plus two atomic
//! primitives: create-if-absent (schedule) and version-checked
//! compare-and-set (progress, leaderboards). No multi-statement transactions
//! are assumed by callers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use tracing::debug;

use crate::calendar::{DateKey, PeriodKey};
use crate::catalog::Question;
use crate::leaderboard::LeaderboardSlot;
use crate::progress::{Identity, UserProgress};
use crate::schedule::ScheduleEntry;

pub mod memory;
pub mod postgres;

pub use memory::MemoryQuizStore;
pub use postgres::PostgresQuizStore;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be reached or rejected the operation. Retryable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("stored record could not be decoded: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::Unavailable(e.to_string())
    }
}

/// A record together with the version it was read at.
#[derive(Debug, Clone, PartialEq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: i64,
}

/// Result of a compare-and-set write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Committed,
    /// Someone else wrote first; re-read and retry.
    Conflict,
}

/// Rewrites one schedule entry from a stale id to its canonical replacement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleRepair {
    pub date_key: DateKey,
    pub from: String,
    pub to: String,
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    async fn list_questions(&self) -> Result<Vec<Question>, StoreError>;

    /// Inserts or replaces a question. Owned by the content pipeline, not the core.
    async fn publish_question(&self, question: &Question) -> Result<(), StoreError>;

    async fn get_schedule_entry(
        &self,
        date_key: DateKey,
    ) -> Result<Option<ScheduleEntry>, StoreError>;

    async fn list_schedule(&self) -> Result<Vec<ScheduleEntry>, StoreError>;

    /// Atomic create-if-absent keyed on `date_key`. Returns the persisted
    /// entry and whether this call created it.
    async fn create_schedule_entry(
        &self,
        entry: &ScheduleEntry,
    ) -> Result<(ScheduleEntry, bool), StoreError>;

    /// Applies every repair in one atomic write. Each repair only lands if
    /// the entry still references `from`. Returns how many landed.
    async fn apply_schedule_repairs(&self, repairs: &[ScheduleRepair])
        -> Result<usize, StoreError>;

    async fn get_progress(
        &self,
        identity: &Identity,
    ) -> Result<Option<Versioned<UserProgress>>, StoreError>;

    /// `expected_version = None` means "create, must not exist yet".
    async fn put_progress(
        &self,
        progress: &UserProgress,
        expected_version: Option<i64>,
    ) -> Result<WriteOutcome, StoreError>;

    async fn get_leaderboard(
        &self,
        period: &PeriodKey,
    ) -> Result<Option<Versioned<Vec<LeaderboardSlot>>>, StoreError>;

    async fn put_leaderboard(
        &self,
        period: &PeriodKey,
        slots: &[LeaderboardSlot],
        expected_version: Option<i64>,
    ) -> Result<WriteOutcome, StoreError>;
}

pub fn memory() -> Arc<dyn QuizStore> {
    Arc::new(MemoryQuizStore::default())
}

pub fn postgres(pool: PgPool) -> Arc<dyn QuizStore> {
    Arc::new(PostgresQuizStore::new(pool))
}

/// Bounded optimistic-retry schedule for compare-and-set loops.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(5),
        }
    }

    /// Sleeps before retry number `attempt` (1-based): 5ms, 10ms, 20ms, ... capped at 200ms.
    pub async fn backoff(&self, attempt: u32, resource: &str) {
        let factor = 1u32 << attempt.saturating_sub(1).min(6);
        let delay = (self.base_delay * factor).min(Duration::from_millis(200));
        debug!(
            "write to {resource} conflicted, retry {attempt} after {}ms",
            delay.as_millis()
        );
        tokio::time::sleep(delay).await;
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}
