// Shared fixtures for unit tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;

use crate::calendar::{DateKey, PeriodKey};
use crate::catalog::{AnswerKey, Difficulty, Question};
use crate::leaderboard::LeaderboardSlot;
use crate::progress::{Identity, UserProgress};
use crate::schedule::ScheduleEntry;
use crate::store::{
    MemoryQuizStore, QuizStore, ScheduleRepair, StoreError, Versioned, WriteOutcome,
};

pub fn date(raw: &str) -> DateKey {
    raw.parse().expect("test date key")
}

pub fn written_question(id: &str, base_points: u32, answers: &[&str]) -> Question {
    Question {
        id: id.to_string(),
        prompt: format!("Prompt for {id}"),
        difficulty: Difficulty::try_from(1).expect("difficulty"),
        base_points,
        tags: vec![],
        answer: AnswerKey::Written {
            accepted_answers: answers.iter().map(|a| a.to_string()).collect(),
        },
    }
    .published()
    .expect("valid written question")
}

pub fn mcq_question(id: &str, base_points: u32, difficulty: u8, correct_index: usize) -> Question {
    Question {
        id: id.to_string(),
        prompt: format!("Prompt for {id}"),
        difficulty: Difficulty::try_from(difficulty).expect("difficulty"),
        base_points,
        tags: vec!["test".to_string()],
        answer: AnswerKey::Mcq {
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_index,
        },
    }
}

/// Delegates to a memory store but loses the first `conflicts` compare-and-set
/// races on progress and leaderboard writes, and can fail one chosen
/// leaderboard write outright.
pub struct ConflictingStore {
    inner: Arc<MemoryQuizStore>,
    remaining: AtomicU32,
    board_writes: AtomicU32,
    failing_board_write: Option<u32>,
}

impl ConflictingStore {
    pub fn new(inner: Arc<MemoryQuizStore>, conflicts: u32) -> Self {
        Self {
            inner,
            remaining: AtomicU32::new(conflicts),
            board_writes: AtomicU32::new(0),
            failing_board_write: None,
        }
    }

    /// The `nth` (1-based) call to `put_leaderboard` returns `Unavailable`.
    pub fn failing_leaderboard_write(mut self, nth: u32) -> Self {
        self.failing_board_write = Some(nth);
        self
    }

    fn lose_race(&self) -> bool {
        self.remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl QuizStore for ConflictingStore {
    async fn list_questions(&self) -> Result<Vec<Question>, StoreError> {
        self.inner.list_questions().await
    }

    async fn publish_question(&self, question: &Question) -> Result<(), StoreError> {
        self.inner.publish_question(question).await
    }

    async fn get_schedule_entry(
        &self,
        date_key: DateKey,
    ) -> Result<Option<ScheduleEntry>, StoreError> {
        self.inner.get_schedule_entry(date_key).await
    }

    async fn list_schedule(&self) -> Result<Vec<ScheduleEntry>, StoreError> {
        self.inner.list_schedule().await
    }

    async fn create_schedule_entry(
        &self,
        entry: &ScheduleEntry,
    ) -> Result<(ScheduleEntry, bool), StoreError> {
        self.inner.create_schedule_entry(entry).await
    }

    async fn apply_schedule_repairs(
        &self,
        repairs: &[ScheduleRepair],
    ) -> Result<usize, StoreError> {
        self.inner.apply_schedule_repairs(repairs).await
    }

    async fn get_progress(
        &self,
        identity: &Identity,
    ) -> Result<Option<Versioned<UserProgress>>, StoreError> {
        self.inner.get_progress(identity).await
    }

    async fn put_progress(
        &self,
        progress: &UserProgress,
        expected_version: Option<i64>,
    ) -> Result<WriteOutcome, StoreError> {
        if self.lose_race() {
            return Ok(WriteOutcome::Conflict);
        }
        self.inner.put_progress(progress, expected_version).await
    }

    async fn get_leaderboard(
        &self,
        period: &PeriodKey,
    ) -> Result<Option<Versioned<Vec<LeaderboardSlot>>>, StoreError> {
        self.inner.get_leaderboard(period).await
    }

    async fn put_leaderboard(
        &self,
        period: &PeriodKey,
        slots: &[LeaderboardSlot],
        expected_version: Option<i64>,
    ) -> Result<WriteOutcome, StoreError> {
        let call = self.board_writes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.failing_board_write == Some(call) {
            return Err(StoreError::Unavailable(format!("leaderboard write {call} dropped")));
        }
        if self.lose_race() {
            return Ok(WriteOutcome::Conflict);
        }
        self.inner.put_leaderboard(period, slots, expected_version).await
    }
}
