use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::calendar::DateKey;
use crate::catalog::Submission;
use crate::errors::{AppError, QuizError};
use crate::leaderboard::LeaderboardEntry;
use crate::progress::UserProgress;
use crate::quiz::identity::{AdminId, RequestIdentity};
use crate::quiz::service::{DailyQuestion, SubmitOutcome};
use crate::schedule::{RepairReport, ScheduleEntry};
use crate::state::AppState;

fn parse_date_key(raw: &str) -> Result<DateKey, AppError> {
    raw.parse::<DateKey>()
        .map_err(|e| AppError::Quiz(QuizError::InvalidDateKey(e)))
}

/// GET /api/v1/quiz/today
pub async fn handle_today(
    State(state): State<AppState>,
) -> Result<Json<DailyQuestion>, AppError> {
    Ok(Json(state.quiz.resolve_todays_question(None).await?))
}

/// GET /api/v1/quiz/:date_key
pub async fn handle_get_question(
    State(state): State<AppState>,
    Path(date_key): Path<String>,
) -> Result<Json<DailyQuestion>, AppError> {
    let date_key = parse_date_key(&date_key)?;
    Ok(Json(state.quiz.resolve_todays_question(Some(date_key)).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRequest {
    pub question_id: String,
    /// `{"choice": n}`, `{"choices": [..]}` or `{"text": ".."}`.
    /// Anything else is scored as an incorrect attempt.
    pub answer: Value,
    pub elapsed_ms: Option<u64>,
}

/// POST /api/v1/quiz/:date_key/answer
pub async fn handle_submit_answer(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
    Path(date_key): Path<String>,
    Json(req): Json<AnswerRequest>,
) -> Result<Json<SubmitOutcome>, AppError> {
    let date_key = parse_date_key(&date_key)?;
    if req.question_id.trim().is_empty() {
        return Err(AppError::Validation("questionId must not be empty".into()));
    }
    let submission = Submission::from_value(&req.answer);
    let outcome = state
        .quiz
        .submit_answer(
            &identity,
            date_key,
            &req.question_id,
            &submission,
            req.elapsed_ms,
        )
        .await?;
    Ok(Json(outcome))
}

/// GET /api/v1/progress
pub async fn handle_get_progress(
    State(state): State<AppState>,
    RequestIdentity(identity): RequestIdentity,
) -> Result<Json<UserProgress>, AppError> {
    Ok(Json(state.quiz.get_progress(&identity).await?))
}

/// GET /api/v1/leaderboard/:period_key
pub async fn handle_get_leaderboard(
    State(state): State<AppState>,
    Path(period_key): Path<String>,
) -> Result<Json<Vec<LeaderboardEntry>>, AppError> {
    Ok(Json(state.quiz.get_leaderboard(&period_key).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignRequest {
    pub date_key: String,
    pub question_id: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignResponse {
    pub entry: ScheduleEntry,
    /// False when the date already had a question; the existing one is returned.
    pub created: bool,
}

/// POST /api/v1/admin/schedule
pub async fn handle_assign_question(
    State(state): State<AppState>,
    AdminId(admin_id): AdminId,
    Json(req): Json<AssignRequest>,
) -> Result<(StatusCode, Json<AssignResponse>), AppError> {
    let date_key = parse_date_key(&req.date_key)?;
    let (entry, created) = state
        .quiz
        .assign_question(date_key, &req.question_id, &admin_id)
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(AssignResponse { entry, created })))
}

/// POST /api/v1/admin/repair
pub async fn handle_repair(
    State(state): State<AppState>,
    AdminId(_): AdminId,
) -> Result<Json<RepairReport>, AppError> {
    Ok(Json(state.quiz.repair_legacy_references().await?))
}

#[derive(Serialize)]
pub struct ReloadResponse {
    pub questions: usize,
}

/// POST /api/v1/admin/catalog/reload
pub async fn handle_reload_catalog(
    State(state): State<AppState>,
    AdminId(_): AdminId,
) -> Result<Json<ReloadResponse>, AppError> {
    let questions = state.quiz.reload_catalog().await?;
    Ok(Json(ReloadResponse { questions }))
}
