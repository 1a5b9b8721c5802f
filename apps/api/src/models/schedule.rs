use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::schedule::{AssignedBy, ScheduleEntry};
use crate::store::StoreError;

#[derive(Debug, Clone, FromRow)]
pub struct ScheduleRow {
    pub date_key: String,
    pub question_id: String,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: String,
}

impl TryFrom<ScheduleRow> for ScheduleEntry {
    type Error = StoreError;

    fn try_from(row: ScheduleRow) -> Result<Self, Self::Error> {
        let date_key = row
            .date_key
            .parse()
            .map_err(|e| StoreError::Corrupt(format!("quiz_schedule row: {e}")))?;
        Ok(ScheduleEntry {
            date_key,
            question_id: row.question_id,
            assigned_at: row.assigned_at,
            assigned_by: AssignedBy::from_tag(&row.assigned_by),
        })
    }
}
