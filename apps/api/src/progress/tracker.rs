use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::calendar::{Calendar, DateKey};
use crate::catalog::{validate, Question, QuestionCatalog, Submission};
use crate::errors::QuizError;
use crate::progress::models::{DailyAttempt, Identity, UserProgress};
use crate::progress::points::PointsPolicy;
use crate::progress::streak::{apply_completion, replay_streaks, StreakTransition};
use crate::schedule::manager::INTEGRITY_TARGET;
use crate::schedule::ScheduleManager;
use crate::store::{QuizStore, RetryPolicy, WriteOutcome};

/// Produced on the first correct answer for a date. Redelivered on later
/// submissions or progress reads until the leaderboards confirm it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionEvent {
    pub identity: Identity,
    pub date_key: DateKey,
    pub score: u32,
    pub elapsed_ms: Option<u64>,
    pub completed_at: DateTime<Utc>,
}

/// Feedback returned to the player for one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptResult {
    pub correct: bool,
    /// The date was already solved before this submission.
    pub already_solved: bool,
    pub attempt_count: u32,
    pub solved_on_attempt: Option<u32>,
    pub points_awarded: u32,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_points: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streak: Option<StreakTransition>,
}

#[derive(Debug, Clone)]
pub struct RecordedAttempt {
    pub result: AttemptResult,
    /// Set only by the submission that solved the date.
    pub completion: Option<CompletionEvent>,
    /// The date's completion, when the leaderboards have not confirmed it yet.
    pub undelivered: Option<CompletionEvent>,
}

fn pending_event(identity: &Identity, attempt: &DailyAttempt) -> Option<CompletionEvent> {
    if !attempt.leaderboard_pending {
        return None;
    }
    Some(CompletionEvent {
        identity: identity.clone(),
        date_key: attempt.date_key,
        score: attempt.points_awarded,
        elapsed_ms: attempt.elapsed_ms,
        completed_at: attempt.solved_at?,
    })
}

/// Completions recorded in `progress` that no leaderboard has confirmed yet.
pub fn pending_completions(progress: &UserProgress) -> Vec<CompletionEvent> {
    progress
        .attempts
        .iter()
        .filter_map(|a| pending_event(&progress.identity, a))
        .collect()
}

/// A scored submission, ready to be folded into a progress record.
pub struct ScoredSubmission<'a> {
    pub date_key: DateKey,
    pub day_before: DateKey,
    pub question: &'a Question,
    pub correct: bool,
    pub elapsed_ms: Option<u64>,
    pub now: DateTime<Utc>,
}

/// Applies one submission to a progress record in memory.
///
/// Only the submission that first solves the date sets `solvedOnAttempt`,
/// awards points, moves the streak and produces a completion event. Later
/// submissions just bump `attemptCount`.
pub fn apply_submission(
    progress: &mut UserProgress,
    submission: &ScoredSubmission<'_>,
    points: &dyn PointsPolicy,
) -> RecordedAttempt {
    let identity = progress.identity.clone();
    let completion_index = progress.completions();
    let attempt = progress.attempt_for_mut(submission.date_key, &submission.question.id);
    attempt.attempt_count += 1;

    let already_solved = attempt.is_solved();
    let newly_solved = !already_solved && submission.correct;
    if newly_solved {
        attempt.solved_on_attempt = Some(attempt.attempt_count);
        attempt.elapsed_ms = submission.elapsed_ms;
        attempt.points_awarded =
            points.points(submission.question, attempt.attempt_count, submission.elapsed_ms);
        attempt.completion_index = Some(completion_index);
        attempt.solved_at = Some(submission.now);
        attempt.leaderboard_pending = true;
    }
    let attempt_count = attempt.attempt_count;
    let solved_on_attempt = attempt.solved_on_attempt;
    let points_awarded = attempt.points_awarded;
    let undelivered = pending_event(&identity, attempt);

    let mut streak = None;
    if newly_solved {
        streak = Some(apply_completion(
            progress,
            submission.date_key,
            submission.day_before,
            points_awarded,
        ));
    }
    let completion = if newly_solved { undelivered.clone() } else { None };

    RecordedAttempt {
        result: AttemptResult {
            correct: submission.correct,
            already_solved,
            attempt_count,
            solved_on_attempt,
            points_awarded,
            current_streak: progress.current_streak,
            longest_streak: progress.longest_streak,
            total_points: progress.total_points,
            streak,
        },
        completion,
        undelivered,
    }
}

/// Records attempts and maintains per-identity progress.
#[derive(Clone)]
pub struct AttemptTracker {
    store: Arc<dyn QuizStore>,
    schedule: ScheduleManager,
    points: Arc<dyn PointsPolicy>,
    retry: RetryPolicy,
    grace_days: u32,
}

impl AttemptTracker {
    pub fn new(
        store: Arc<dyn QuizStore>,
        schedule: ScheduleManager,
        points: Arc<dyn PointsPolicy>,
        retry: RetryPolicy,
        grace_days: u32,
    ) -> Self {
        Self {
            store,
            schedule,
            points,
            retry,
            grace_days,
        }
    }

    /// Fails with `NotScheduled` when `date_key` is in the future or older
    /// than the grace window allows.
    pub fn check_window(&self, calendar: &dyn Calendar, date_key: DateKey) -> Result<(), QuizError> {
        let age = calendar.today().days_since(date_key);
        if age < 0 {
            return Err(QuizError::not_scheduled(date_key, "date is in the future"));
        }
        if age > i64::from(self.grace_days) {
            return Err(QuizError::not_scheduled(
                date_key,
                "date is outside the submission window",
            ));
        }
        Ok(())
    }

    /// Scores a submission for `date_key` and folds it into the identity's
    /// progress with an optimistic compare-and-set loop. The progress record
    /// is the unit of mutual exclusion: a lost race re-reads and re-applies,
    /// so concurrent duplicates can never both award points.
    #[allow(clippy::too_many_arguments)]
    pub async fn record_attempt(
        &self,
        calendar: &dyn Calendar,
        catalog: &QuestionCatalog,
        identity: &Identity,
        date_key: DateKey,
        question_id: &str,
        submission: &Submission,
        elapsed_ms: Option<u64>,
    ) -> Result<RecordedAttempt, QuizError> {
        self.check_window(calendar, date_key)?;

        let entry = self.schedule.resolve(date_key, catalog, calendar.now()).await?;
        if entry.question_id != question_id {
            return Err(QuizError::not_scheduled(
                date_key,
                format!("question '{question_id}' is not the question for this date"),
            ));
        }
        let question = catalog.get(&entry.question_id).ok_or_else(|| {
            QuizError::not_scheduled(
                date_key,
                format!("scheduled question '{}' is not in the catalog", entry.question_id),
            )
        })?;

        let scored = ScoredSubmission {
            date_key,
            day_before: calendar.day_before(date_key),
            question,
            correct: validate(question, submission),
            elapsed_ms,
            now: calendar.now(),
        };

        let resource = format!("progress/{identity}");
        for attempt in 1..=self.retry.max_attempts {
            let (mut progress, version) = match self.store.get_progress(identity).await? {
                Some(stored) => (stored.value, Some(stored.version)),
                None => (UserProgress::new(identity.clone()), None),
            };

            let recorded = apply_submission(&mut progress, &scored, self.points.as_ref());

            match self.store.put_progress(&progress, version).await? {
                WriteOutcome::Committed => {
                    if let Some(event) = &recorded.completion {
                        info!(
                            "{identity} solved {date_key} on attempt {} for {} points (streak {})",
                            recorded.result.attempt_count,
                            event.score,
                            recorded.result.current_streak
                        );
                    } else {
                        debug!(
                            "{identity} submission {} for {date_key} (correct: {})",
                            recorded.result.attempt_count, recorded.result.correct
                        );
                    }
                    return Ok(recorded);
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

    /// Clears the leaderboard marker for `date_key` once every period holds
    /// the completion.
    pub async fn confirm_leaderboard(
        &self,
        identity: &Identity,
        date_key: DateKey,
    ) -> Result<(), QuizError> {
        let resource = format!("progress/{identity}");
        for attempt in 1..=self.retry.max_attempts {
            let Some(stored) = self.store.get_progress(identity).await? else {
                return Ok(());
            };
            let mut progress = stored.value;
            match progress
                .attempts
                .iter_mut()
                .find(|a| a.date_key == date_key && a.leaderboard_pending)
            {
                Some(record) => record.leaderboard_pending = false,
                None => return Ok(()),
            }

            match self.store.put_progress(&progress, Some(stored.version)).await? {
                WriteOutcome::Committed => return Ok(()),
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

    /// Progress for `identity`; a fresh zeroed record if it has never played.
    /// Counters are served as stored; a mismatch with the replayed history is
    /// reported on the integrity target.
    pub async fn get_progress(&self, identity: &Identity) -> Result<UserProgress, QuizError> {
        let progress = self
            .store
            .get_progress(identity)
            .await?
            .map(|stored| stored.value)
            .unwrap_or_else(|| UserProgress::new(identity.clone()));

        let replayed = replay_streaks(&progress.attempts);
        if replayed != progress.streak_summary() {
            warn!(
                target: INTEGRITY_TARGET,
                "progress counters for {identity} drifted from history: stored {:?}, replayed {:?}",
                progress.streak_summary(),
                replayed
            );
        }
        Ok(progress)
    }
}
