use std::sync::Arc;

use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::calendar::{Calendar, DateKey, PeriodKey, PeriodKind};
use crate::catalog::{PublicQuestion, Question, QuestionCatalog, Submission};
use crate::errors::QuizError;
use crate::leaderboard::{DuplicatePolicy, LeaderboardAggregator, LeaderboardEntry};
use crate::progress::tracker::pending_completions;
use crate::progress::{
    AttemptResult, AttemptTracker, CompletionEvent, Identity, PointsPolicy, UserProgress,
};
use crate::schedule::{AssignedBy, RepairReport, ScheduleEntry, ScheduleManager, SelectionPolicy};
use crate::store::{QuizStore, RetryPolicy};

/// Tunables for the quiz core, filled from `Config`.
#[derive(Debug, Clone)]
pub struct QuizSettings {
    pub grace_days: u32,
    pub max_write_retries: u32,
    pub leaderboard_size: usize,
    pub duplicate_policy: DuplicatePolicy,
    pub periods: Vec<PeriodKind>,
}

impl Default for QuizSettings {
    fn default() -> Self {
        Self {
            grace_days: 0,
            max_write_retries: 5,
            leaderboard_size: crate::leaderboard::aggregator::DEFAULT_CAPACITY,
            duplicate_policy: DuplicatePolicy::default(),
            periods: vec![PeriodKind::Daily, PeriodKind::Weekly],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyQuestion {
    pub date_key: DateKey,
    pub assigned_by: AssignedBy,
    pub question: PublicQuestion,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    #[serde(flatten)]
    pub result: AttemptResult,
    /// False only when the answer counted but the leaderboard write failed.
    pub leaderboard_updated: bool,
}

/// The surface other parts of the system call.
pub struct QuizService {
    store: Arc<dyn QuizStore>,
    calendar: Arc<dyn Calendar>,
    catalog: RwLock<Arc<QuestionCatalog>>,
    schedule: ScheduleManager,
    tracker: AttemptTracker,
    leaderboard: LeaderboardAggregator,
}

impl QuizService {
    pub fn new(
        store: Arc<dyn QuizStore>,
        calendar: Arc<dyn Calendar>,
        settings: QuizSettings,
        selection: Arc<dyn SelectionPolicy>,
        points: Arc<dyn PointsPolicy>,
    ) -> Self {
        let retry = RetryPolicy::new(settings.max_write_retries);
        let schedule = ScheduleManager::new(store.clone(), selection);
        let tracker = AttemptTracker::new(
            store.clone(),
            schedule.clone(),
            points,
            retry,
            settings.grace_days,
        );
        let leaderboard = LeaderboardAggregator::new(
            store.clone(),
            settings.leaderboard_size,
            settings.duplicate_policy,
            settings.periods,
            retry,
        );
        Self {
            store,
            calendar,
            catalog: RwLock::new(Arc::new(QuestionCatalog::default())),
            schedule,
            tracker,
            leaderboard,
        }
    }

    pub fn calendar(&self) -> &dyn Calendar {
        self.calendar.as_ref()
    }

    pub async fn catalog(&self) -> Arc<QuestionCatalog> {
        self.catalog.read().await.clone()
    }

    /// Replaces the in-process catalog snapshot with what the store holds.
    pub async fn reload_catalog(&self) -> Result<usize, QuizError> {
        let questions = self.store.list_questions().await?;
        let mut valid = Vec::with_capacity(questions.len());
        for question in questions {
            match question.published() {
                Ok(q) => valid.push(q),
                Err(e) => warn!("Skipping stored question: {e}"),
            }
        }
        let catalog = Arc::new(QuestionCatalog::new(valid));
        let count = catalog.len();
        *self.catalog.write().await = catalog;
        info!("Question catalog loaded ({count} questions)");
        Ok(count)
    }

    /// Validates, normalizes and stores questions, then reloads the catalog.
    pub async fn publish_questions(&self, questions: Vec<Question>) -> Result<usize, QuizError> {
        let published = questions
            .into_iter()
            .map(Question::published)
            .collect::<Result<Vec<_>, _>>()?;
        for question in &published {
            self.store.publish_question(question).await?;
        }
        info!("Published {} question(s)", published.len());
        self.reload_catalog().await
    }

    /// ResolveTodaysQuestion. `None` means the calendar's today.
    pub async fn resolve_todays_question(
        &self,
        date_key: Option<DateKey>,
    ) -> Result<DailyQuestion, QuizError> {
        let date_key = date_key.unwrap_or_else(|| self.calendar.today());
        self.tracker.check_window(self.calendar(), date_key)?;

        let catalog = self.catalog().await;
        let entry = self
            .schedule
            .resolve(date_key, &catalog, self.calendar.now())
            .await?;
        let question = catalog.get(&entry.question_id).ok_or_else(|| {
            QuizError::not_scheduled(
                date_key,
                format!("scheduled question '{}' is not in the catalog", entry.question_id),
            )
        })?;
        Ok(DailyQuestion {
            date_key,
            assigned_by: entry.assigned_by,
            question: question.public_view(),
        })
    }

    /// SubmitAnswer. The completion is forwarded to the leaderboards after
    /// the progress write that produced it has committed. If that forwarding
    /// fails, the completion stays pending on the attempt and is redelivered
    /// by the next submission or progress read for the identity.
    pub async fn submit_answer(
        &self,
        identity: &Identity,
        date_key: DateKey,
        question_id: &str,
        submission: &Submission,
        elapsed_ms: Option<u64>,
    ) -> Result<SubmitOutcome, QuizError> {
        let catalog = self.catalog().await;
        let recorded = self
            .tracker
            .record_attempt(
                self.calendar(),
                &catalog,
                identity,
                date_key,
                question_id,
                submission,
                elapsed_ms,
            )
            .await?;

        let leaderboard_updated = match &recorded.undelivered {
            Some(event) => self.deliver_completion(event).await,
            None => true,
        };

        Ok(SubmitOutcome {
            result: recorded.result,
            leaderboard_updated,
        })
    }

    /// Folds a completion into every period, then clears its pending marker.
    /// Returns false when some period did not record it.
    async fn deliver_completion(&self, event: &CompletionEvent) -> bool {
        if let Err(e) = self.leaderboard.on_completion(self.calendar(), event).await {
            error!(
                "Leaderboard update for {} on {} failed, left pending: {e}",
                event.identity, event.date_key
            );
            return false;
        }
        if let Err(e) = self
            .tracker
            .confirm_leaderboard(&event.identity, event.date_key)
            .await
        {
            // Boards already hold the slot; a redelivery will not add another.
            warn!(
                "Could not clear leaderboard marker for {} on {}: {e}",
                event.identity, event.date_key
            );
        }
        true
    }

    /// GetProgress. Pending completions are redelivered first.
    pub async fn get_progress(&self, identity: &Identity) -> Result<UserProgress, QuizError> {
        let progress = self.tracker.get_progress(identity).await?;
        let pending = pending_completions(&progress);
        if pending.is_empty() {
            return Ok(progress);
        }
        for event in &pending {
            self.deliver_completion(event).await;
        }
        self.tracker.get_progress(identity).await
    }

    pub async fn get_leaderboard(
        &self,
        period_key: &str,
    ) -> Result<Vec<LeaderboardEntry>, QuizError> {
        let period = PeriodKey::parse(period_key)
            .ok_or_else(|| QuizError::InvalidPeriodKey(period_key.to_string()))?;
        self.leaderboard.get_leaderboard(&period).await
    }

    pub async fn repair_legacy_references(&self) -> Result<RepairReport, QuizError> {
        let catalog = self.catalog().await;
        self.schedule.repair_legacy_references(&catalog).await
    }

    /// Admin assignment; a date that already has a question keeps it.
    pub async fn assign_question(
        &self,
        date_key: DateKey,
        question_id: &str,
        admin_id: &str,
    ) -> Result<(ScheduleEntry, bool), QuizError> {
        let catalog = self.catalog().await;
        self.schedule
            .assign(date_key, question_id, admin_id, &catalog, self.calendar.now())
            .await
    }
}
