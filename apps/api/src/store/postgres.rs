use async_trait::async_trait;
use serde::de::DeserializeOwned;
use sqlx::PgPool;
use tracing::info;

use crate::calendar::{DateKey, PeriodKey};
use crate::catalog::Question;
use crate::leaderboard::LeaderboardSlot;
use crate::models::documents::{QuestionRow, VersionedDocumentRow};
use crate::models::schedule::ScheduleRow;
use crate::progress::{Identity, UserProgress};
use crate::schedule::ScheduleEntry;
use crate::store::{QuizStore, ScheduleRepair, StoreError, Versioned, WriteOutcome};

/// Postgres-backed store. Schema: `migrations/0001_quiz_init.sql`.
pub struct PostgresQuizStore {
    pool: PgPool,
}

impl PostgresQuizStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode<T: DeserializeOwned>(row: VersionedDocumentRow) -> Result<Versioned<T>, StoreError> {
    Ok(Versioned {
        value: serde_json::from_value(row.body)?,
        version: row.version,
    })
}

fn outcome(rows_affected: u64) -> WriteOutcome {
    if rows_affected == 1 {
        WriteOutcome::Committed
    } else {
        WriteOutcome::Conflict
    }
}

#[async_trait]
impl QuizStore for PostgresQuizStore {
    async fn list_questions(&self) -> Result<Vec<Question>, StoreError> {
        let rows: Vec<QuestionRow> =
            sqlx::query_as("SELECT id, body FROM quiz_questions ORDER BY id")
                .fetch_all(&self.pool)
                .await?;
        rows.into_iter()
            .map(|row| {
                serde_json::from_value::<Question>(row.body)
                    .map_err(|e| StoreError::Corrupt(format!("question {}: {e}", row.id)))
            })
            .collect()
    }

    async fn publish_question(&self, question: &Question) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO quiz_questions (id, body)
            VALUES ($1, $2)
            ON CONFLICT (id) DO UPDATE SET body = EXCLUDED.body, published_at = NOW()
            "#,
        )
        .bind(&question.id)
        .bind(serde_json::to_value(question)?)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_schedule_entry(
        &self,
        date_key: DateKey,
    ) -> Result<Option<ScheduleEntry>, StoreError> {
        let row: Option<ScheduleRow> = sqlx::query_as(
            "SELECT date_key, question_id, assigned_at, assigned_by FROM quiz_schedule WHERE date_key = $1",
        )
        .bind(date_key.to_string())
        .fetch_optional(&self.pool)
        .await?;
        row.map(ScheduleEntry::try_from).transpose()
    }

    async fn list_schedule(&self) -> Result<Vec<ScheduleEntry>, StoreError> {
        let rows: Vec<ScheduleRow> = sqlx::query_as(
            "SELECT date_key, question_id, assigned_at, assigned_by FROM quiz_schedule ORDER BY date_key",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(ScheduleEntry::try_from).collect()
    }

    async fn create_schedule_entry(
        &self,
        entry: &ScheduleEntry,
    ) -> Result<(ScheduleEntry, bool), StoreError> {
        let inserted: Option<ScheduleRow> = sqlx::query_as(
            r#"
            INSERT INTO quiz_schedule (date_key, question_id, assigned_at, assigned_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (date_key) DO NOTHING
            RETURNING date_key, question_id, assigned_at, assigned_by
            "#,
        )
        .bind(entry.date_key.to_string())
        .bind(&entry.question_id)
        .bind(entry.assigned_at)
        .bind(entry.assigned_by.as_tag())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = inserted {
            return Ok((row.try_into()?, true));
        }

        // Lost the race: the conflicting insert has committed by now.
        let existing = self.get_schedule_entry(entry.date_key).await?.ok_or_else(|| {
            StoreError::Unavailable(format!(
                "schedule entry {} vanished after insert conflict",
                entry.date_key
            ))
        })?;
        Ok((existing, false))
    }

    async fn apply_schedule_repairs(
        &self,
        repairs: &[ScheduleRepair],
    ) -> Result<usize, StoreError> {
        let mut tx = self.pool.begin().await?;
        let mut applied = 0;
        for repair in repairs {
            let result = sqlx::query(
                "UPDATE quiz_schedule SET question_id = $1 WHERE date_key = $2 AND question_id = $3",
            )
            .bind(&repair.to)
            .bind(repair.date_key.to_string())
            .bind(&repair.from)
            .execute(&mut *tx)
            .await?;
            applied += result.rows_affected() as usize;
        }
        tx.commit().await?;
        info!("Committed {applied} schedule repair(s)");
        Ok(applied)
    }

    async fn get_progress(
        &self,
        identity: &Identity,
    ) -> Result<Option<Versioned<UserProgress>>, StoreError> {
        let row: Option<VersionedDocumentRow> =
            sqlx::query_as("SELECT body, version FROM quiz_progress WHERE identity = $1")
                .bind(identity.storage_key())
                .fetch_optional(&self.pool)
                .await?;
        row.map(decode).transpose()
    }

    async fn put_progress(
        &self,
        progress: &UserProgress,
        expected_version: Option<i64>,
    ) -> Result<WriteOutcome, StoreError> {
        let body = serde_json::to_value(progress)?;
        let key = progress.identity.storage_key();
        let result = match expected_version {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO quiz_progress (identity, body, version)
                    VALUES ($1, $2, 1)
                    ON CONFLICT (identity) DO NOTHING
                    "#,
                )
                .bind(&key)
                .bind(&body)
                .execute(&self.pool)
                .await?
            }
            Some(version) => {
                sqlx::query(
                    r#"
                    UPDATE quiz_progress
                       SET body = $2, version = version + 1, updated_at = NOW()
                     WHERE identity = $1 AND version = $3
                    "#,
                )
                .bind(&key)
                .bind(&body)
                .bind(version)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(outcome(result.rows_affected()))
    }

    async fn get_leaderboard(
        &self,
        period: &PeriodKey,
    ) -> Result<Option<Versioned<Vec<LeaderboardSlot>>>, StoreError> {
        let row: Option<VersionedDocumentRow> = sqlx::query_as(
            "SELECT entries AS body, version FROM quiz_leaderboards WHERE period_key = $1",
        )
        .bind(period.as_str())
        .fetch_optional(&self.pool)
        .await?;
        row.map(decode).transpose()
    }

    async fn put_leaderboard(
        &self,
        period: &PeriodKey,
        slots: &[LeaderboardSlot],
        expected_version: Option<i64>,
    ) -> Result<WriteOutcome, StoreError> {
        let entries = serde_json::to_value(slots)?;
        let result = match expected_version {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO quiz_leaderboards (period_key, entries, version)
                    VALUES ($1, $2, 1)
                    ON CONFLICT (period_key) DO NOTHING
                    "#,
                )
                .bind(period.as_str())
                .bind(&entries)
                .execute(&self.pool)
                .await?
            }
            Some(version) => {
                sqlx::query(
                    r#"
                    UPDATE quiz_leaderboards
                       SET entries = $2, version = version + 1, updated_at = NOW()
                     WHERE period_key = $1 AND version = $3
                    "#,
                )
                .bind(period.as_str())
                .bind(&entries)
                .bind(version)
                .execute(&self.pool)
                .await?
            }
        };
        Ok(outcome(result.rows_affected()))
    }
}
