use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::calendar::{DateKey, PeriodKey};
use crate::catalog::Question;
use crate::leaderboard::LeaderboardSlot;
use crate::progress::{Identity, UserProgress};
use crate::schedule::ScheduleEntry;
use crate::store::{QuizStore, ScheduleRepair, StoreError, Versioned, WriteOutcome};

/// In-process store. Every operation holds the single lock for its whole
/// duration, which gives the same atomicity the Postgres store provides.
#[derive(Default)]
pub struct MemoryQuizStore {
    inner: Mutex<MemoryQuizStoreInner>,
}

#[derive(Default)]
struct MemoryQuizStoreInner {
    questions: BTreeMap<String, Question>,
    schedule: BTreeMap<DateKey, ScheduleEntry>,
    progress: HashMap<String, Versioned<UserProgress>>,
    leaderboards: HashMap<PeriodKey, Versioned<Vec<LeaderboardSlot>>>,
}

#[cfg(test)]
impl MemoryQuizStore {
    /// Writes a schedule entry unconditionally. Used to stage legacy data.
    pub async fn force_schedule_entry(&self, entry: ScheduleEntry) {
        let mut inner = self.inner.lock().await;
        inner.schedule.insert(entry.date_key, entry);
    }
}

fn compare_and_set<K, T>(
    map: &mut HashMap<K, Versioned<T>>,
    key: K,
    value: T,
    expected_version: Option<i64>,
) -> WriteOutcome
where
    K: std::hash::Hash + Eq,
{
    let current = map.get(&key).map(|v| v.version);
    if current != expected_version {
        return WriteOutcome::Conflict;
    }
    let version = current.map_or(1, |v| v + 1);
    map.insert(key, Versioned { value, version });
    WriteOutcome::Committed
}

#[async_trait]
impl QuizStore for MemoryQuizStore {
    async fn list_questions(&self) -> Result<Vec<Question>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.questions.values().cloned().collect())
    }

    async fn publish_question(&self, question: &Question) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        inner
            .questions
            .insert(question.id.clone(), question.clone());
        Ok(())
    }

    async fn get_schedule_entry(
        &self,
        date_key: DateKey,
    ) -> Result<Option<ScheduleEntry>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.schedule.get(&date_key).cloned())
    }

    async fn list_schedule(&self) -> Result<Vec<ScheduleEntry>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.schedule.values().cloned().collect())
    }

    async fn create_schedule_entry(
        &self,
        entry: &ScheduleEntry,
    ) -> Result<(ScheduleEntry, bool), StoreError> {
        let mut inner = self.inner.lock().await;
        if let Some(existing) = inner.schedule.get(&entry.date_key) {
            return Ok((existing.clone(), false));
        }
        inner.schedule.insert(entry.date_key, entry.clone());
        Ok((entry.clone(), true))
    }

    async fn apply_schedule_repairs(
        &self,
        repairs: &[ScheduleRepair],
    ) -> Result<usize, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut applied = 0;
        for repair in repairs {
            if let Some(entry) = inner.schedule.get_mut(&repair.date_key) {
                if entry.question_id == repair.from {
                    entry.question_id = repair.to.clone();
                    applied += 1;
                }
            }
        }
        Ok(applied)
    }

    async fn get_progress(
        &self,
        identity: &Identity,
    ) -> Result<Option<Versioned<UserProgress>>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.progress.get(&identity.storage_key()).cloned())
    }

    async fn put_progress(
        &self,
        progress: &UserProgress,
        expected_version: Option<i64>,
    ) -> Result<WriteOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(compare_and_set(
            &mut inner.progress,
            progress.identity.storage_key(),
            progress.clone(),
            expected_version,
        ))
    }

    async fn get_leaderboard(
        &self,
        period: &PeriodKey,
    ) -> Result<Option<Versioned<Vec<LeaderboardSlot>>>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.leaderboards.get(period).cloned())
    }

    async fn put_leaderboard(
        &self,
        period: &PeriodKey,
        slots: &[LeaderboardSlot],
        expected_version: Option<i64>,
    ) -> Result<WriteOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        Ok(compare_and_set(
            &mut inner.leaderboards,
            period.clone(),
            slots.to_vec(),
            expected_version,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schedule::AssignedBy;
    use crate::test_support::date;

    fn entry(day: &str, question_id: &str) -> ScheduleEntry {
        ScheduleEntry {
            date_key: date(day),
            question_id: question_id.into(),
            assigned_at: chrono::Utc::now(),
            assigned_by: AssignedBy::System,
        }
    }

    #[tokio::test]
    async fn test_create_schedule_entry_first_write_wins() {
        let store = MemoryQuizStore::default();
        let (first, created) = store
            .create_schedule_entry(&entry("2024-03-01", "a_q0"))
            .await
            .unwrap();
        assert!(created);
        let (second, created) = store
            .create_schedule_entry(&entry("2024-03-01", "b_q0"))
            .await
            .unwrap();
        assert!(!created);
        assert_eq!(second.question_id, first.question_id);
    }

    #[tokio::test]
    async fn test_repairs_only_land_on_expected_old_id() {
        let store = MemoryQuizStore::default();
        store.force_schedule_entry(entry("2024-03-01", "a_q1")).await;
        let applied = store
            .apply_schedule_repairs(&[
                ScheduleRepair {
                    date_key: date("2024-03-01"),
                    from: "a_q1".into(),
                    to: "a_q0".into(),
                },
                ScheduleRepair {
                    date_key: date("2024-03-02"),
                    from: "b_q1".into(),
                    to: "b_q0".into(),
                },
            ])
            .await
            .unwrap();
        assert_eq!(applied, 1);
        let stale = store
            .apply_schedule_repairs(&[ScheduleRepair {
                date_key: date("2024-03-01"),
                from: "a_q1".into(),
                to: "z_q0".into(),
            }])
            .await
            .unwrap();
        assert_eq!(stale, 0);
        let current = store.get_schedule_entry(date("2024-03-01")).await.unwrap();
        assert_eq!(current.unwrap().question_id, "a_q0");
    }

    #[tokio::test]
    async fn test_progress_compare_and_set() {
        let store = MemoryQuizStore::default();
        let progress = UserProgress::new(Identity::Player("u1".into()));
        assert_eq!(
            store.put_progress(&progress, None).await.unwrap(),
            WriteOutcome::Committed
        );
        assert_eq!(
            store.put_progress(&progress, None).await.unwrap(),
            WriteOutcome::Conflict
        );
        let read = store.get_progress(&progress.identity).await.unwrap().unwrap();
        assert_eq!(read.version, 1);
        assert_eq!(
            store.put_progress(&progress, Some(1)).await.unwrap(),
            WriteOutcome::Committed
        );
        assert_eq!(
            store.put_progress(&progress, Some(1)).await.unwrap(),
            WriteOutcome::Conflict
        );
    }
}
