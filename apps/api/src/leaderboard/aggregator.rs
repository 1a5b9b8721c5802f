use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::calendar::{Calendar, PeriodKey, PeriodKind};
use crate::errors::QuizError;
use crate::leaderboard::{LeaderboardEntry, LeaderboardSlot};
use crate::progress::CompletionEvent;
use crate::store::{QuizStore, RetryPolicy, WriteOutcome};

pub const DEFAULT_CAPACITY: usize = 10;

/// What to do when an identity already holds a slot in the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicatePolicy {
    /// Every completion gets its own slot; one identity may appear several
    /// times in a multi-day period. Matches the historical leaderboards.
    #[default]
    AppendEveryCompletion,
    /// Keep only each identity's best score; an equal score keeps the
    /// earlier slot.
    BestScorePerIdentity,
}

/// Pure fold of one completion into a period's slot list.
///
/// Sorts descending by score with a stable sort, so ties keep arrival order,
/// then truncates to `capacity`. Anything past the cut is discarded.
/// A slot for an identity and date already on the board is a redelivery and
/// changes nothing.
pub fn fold_completion(
    slots: &mut Vec<LeaderboardSlot>,
    slot: LeaderboardSlot,
    capacity: usize,
    policy: DuplicatePolicy,
) {
    if slots
        .iter()
        .any(|s| s.identity == slot.identity && s.date_key == slot.date_key)
    {
        return;
    }
    match policy {
        DuplicatePolicy::AppendEveryCompletion => slots.push(slot),
        DuplicatePolicy::BestScorePerIdentity => {
            match slots.iter().position(|s| s.identity == slot.identity) {
                Some(idx) if slots[idx].score >= slot.score => return,
                Some(idx) => {
                    slots.remove(idx);
                    slots.push(slot);
                }
                None => slots.push(slot),
            }
        }
    }
    slots.sort_by(|a, b| b.score.cmp(&a.score));
    slots.truncate(capacity);
}

/// Converts stored slots into ranked entries (rank 1 = best).
pub fn ranked(slots: &[LeaderboardSlot]) -> Vec<LeaderboardEntry> {
    slots
        .iter()
        .enumerate()
        .map(|(idx, slot)| LeaderboardEntry {
            rank: idx + 1,
            identity: slot.identity.clone(),
            score: slot.score,
        })
        .collect()
}

#[derive(Clone)]
pub struct LeaderboardAggregator {
    store: Arc<dyn QuizStore>,
    capacity: usize,
    policy: DuplicatePolicy,
    periods: Vec<PeriodKind>,
    retry: RetryPolicy,
}

impl LeaderboardAggregator {
    pub fn new(
        store: Arc<dyn QuizStore>,
        capacity: usize,
        policy: DuplicatePolicy,
        periods: Vec<PeriodKind>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            store,
            capacity: capacity.max(1),
            policy,
            periods,
            retry,
        }
    }

    /// Folds `(identity, score)` into the period's list as one atomic
    /// read-sort-truncate-write, retrying on lost races.
    pub async fn record_completion(
        &self,
        period: &PeriodKey,
        slot: LeaderboardSlot,
    ) -> Result<(), QuizError> {
        let resource = format!("leaderboard/{period}");
        for attempt in 1..=self.retry.max_attempts {
            let (mut slots, version) = match self.store.get_leaderboard(period).await? {
                Some(stored) => (stored.value, Some(stored.version)),
                None => (Vec::new(), None),
            };
            let before = slots.clone();
            fold_completion(&mut slots, slot.clone(), self.capacity, self.policy);
            if slots == before {
                debug!("{} with {} did not place on {period}", slot.identity, slot.score);
                return Ok(());
            }

            match self.store.put_leaderboard(period, &slots, version).await? {
                WriteOutcome::Committed => {
                    debug!("{} placed {} on {period}", slot.identity, slot.score);
                    return Ok(());
                }
                WriteOutcome::Conflict if attempt < self.retry.max_attempts => {
                    self.retry.backoff(attempt, &resource).await;
                }
                WriteOutcome::Conflict => {}
            }
        }
        Err(QuizError::ConflictRetryExhausted {
            resource,
            attempts: self.retry.max_attempts,
        })
    }

    /// Routes a completion event into every configured period bucket.
    pub async fn on_completion(
        &self,
        calendar: &dyn Calendar,
        event: &CompletionEvent,
    ) -> Result<(), QuizError> {
        let slot = LeaderboardSlot {
            identity: event.identity.clone(),
            score: event.score,
            date_key: event.date_key,
            elapsed_ms: event.elapsed_ms,
            completed_at: event.completed_at,
        };
        for kind in &self.periods {
            let period = calendar.period_key(*kind, event.date_key);
            self.record_completion(&period, slot.clone()).await?;
        }
        info!(
            "Leaderboards updated for {} ({} points on {})",
            event.identity, event.score, event.date_key
        );
        Ok(())
    }

    /// Read-only snapshot, at most `capacity` entries, best first.
    pub async fn get_leaderboard(
        &self,
        period: &PeriodKey,
    ) -> Result<Vec<LeaderboardEntry>, QuizError> {
        let slots = self
            .store
            .get_leaderboard(period)
            .await?
            .map(|stored| stored.value)
            .unwrap_or_default();
        let mut entries = ranked(&slots);
        entries.truncate(self.capacity);
        Ok(entries)
    }
}
