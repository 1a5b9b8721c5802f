use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::calendar::DateKey;
use crate::catalog::QuestionCatalog;
use crate::errors::QuizError;
use crate::schedule::legacy::{QuestionRef, REPAIR_SCHEME_VERSION};
use crate::schedule::selection::SelectionPolicy;
use crate::schedule::{AssignedBy, ScheduleEntry};
use crate::store::{QuizStore, ScheduleRepair};

/// Operator channel for data-integrity warnings.
pub const INTEGRITY_TARGET: &str = "quiz::integrity";

/// A schedule entry that references a question the catalog does not know
/// and that could not be mapped to a valid canonical id. Non-fatal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrityWarning {
    pub date_key: DateKey,
    pub question_id: String,
    pub reason: String,
}

impl IntegrityWarning {
    fn emit(&self) {
        warn!(
            target: INTEGRITY_TARGET,
            date_key = %self.date_key,
            question_id = %self.question_id,
            "Unrepairable schedule reference: {}",
            self.reason
        );
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairReport {
    pub scheme_version: u32,
    pub scanned: usize,
    /// Repairs that were planned against the snapshot that was scanned.
    pub planned: Vec<RepairedEntry>,
    /// How many of the planned repairs actually landed.
    pub applied: usize,
    pub warnings: Vec<IntegrityWarning>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairedEntry {
    pub date_key: DateKey,
    pub from: String,
    pub to: String,
}

impl From<&ScheduleRepair> for RepairedEntry {
    fn from(r: &ScheduleRepair) -> Self {
        Self {
            date_key: r.date_key,
            from: r.from.clone(),
            to: r.to.clone(),
        }
    }
}

enum Diagnosis {
    Valid,
    Repairable(ScheduleRepair),
    Unrepairable(IntegrityWarning),
}

fn diagnose(entry: &ScheduleEntry, catalog: &QuestionCatalog) -> Diagnosis {
    if catalog.contains(&entry.question_id) {
        return Diagnosis::Valid;
    }
    let reference = QuestionRef::classify(&entry.question_id);
    match reference.canonical_candidate() {
        Some(candidate) if catalog.contains(&candidate) => Diagnosis::Repairable(ScheduleRepair {
            date_key: entry.date_key,
            from: entry.question_id.clone(),
            to: candidate,
        }),
        Some(candidate) => Diagnosis::Unrepairable(IntegrityWarning {
            date_key: entry.date_key,
            question_id: entry.question_id.clone(),
            reason: format!("canonical id '{candidate}' is not in the catalog"),
        }),
        None => Diagnosis::Unrepairable(IntegrityWarning {
            date_key: entry.date_key,
            question_id: entry.question_id.clone(),
            reason: "id is not in the catalog and has no legacy numbering".to_string(),
        }),
    }
}

/// Owns the date → question mapping.
#[derive(Clone)]
pub struct ScheduleManager {
    store: Arc<dyn QuizStore>,
    selection: Arc<dyn SelectionPolicy>,
}

impl ScheduleManager {
    pub fn new(store: Arc<dyn QuizStore>, selection: Arc<dyn SelectionPolicy>) -> Self {
        Self { store, selection }
    }

    /// Returns the entry for `date`, assigning one with the selection policy
    /// if none exists. Concurrent callers converge on the first persisted write.
    ///
    /// A stale legacy reference is repaired inline when possible; otherwise the
    /// entry is served as-is and an integrity warning is logged.
    pub async fn resolve(
        &self,
        date: DateKey,
        catalog: &QuestionCatalog,
        now: DateTime<Utc>,
    ) -> Result<ScheduleEntry, QuizError> {
        if let Some(existing) = self.store.get_schedule_entry(date).await? {
            return Ok(self.heal(existing, catalog).await);
        }

        let question_id = self
            .selection
            .select(date, catalog)
            .ok_or_else(|| QuizError::not_scheduled(date, "question catalog is empty"))?;

        let proposal = ScheduleEntry {
            date_key: date,
            question_id,
            assigned_at: now,
            assigned_by: AssignedBy::System,
        };
        let (winner, created) = self.store.create_schedule_entry(&proposal).await?;
        if created {
            info!("Assigned {} to {date}", winner.question_id);
        }
        Ok(self.heal(winner, catalog).await)
    }

    /// Admin-driven assignment. Same first-write-wins rule as `resolve`:
    /// if the date is already taken, the existing entry is returned unchanged.
    pub async fn assign(
        &self,
        date: DateKey,
        question_id: &str,
        admin_id: &str,
        catalog: &QuestionCatalog,
        now: DateTime<Utc>,
    ) -> Result<(ScheduleEntry, bool), QuizError> {
        if !catalog.contains(question_id) {
            return Err(QuizError::UnknownQuestion(question_id.to_string()));
        }
        let proposal = ScheduleEntry {
            date_key: date,
            question_id: question_id.to_string(),
            assigned_at: now,
            assigned_by: AssignedBy::Admin(admin_id.to_string()),
        };
        let (entry, created) = self.store.create_schedule_entry(&proposal).await?;
        if created {
            info!("Admin {admin_id} assigned {question_id} to {date}");
        } else {
            info!(
                "Admin {admin_id} assignment for {date} ignored; already holds {}",
                entry.question_id
            );
        }
        Ok((entry, created))
    }

    /// Scans the whole schedule and rewrites legacy numbered references to
    /// their canonical id when that id is valid. Writes once, and only when
    /// something changed. Running it twice is the same as running it once.
    pub async fn repair_legacy_references(
        &self,
        catalog: &QuestionCatalog,
    ) -> Result<RepairReport, QuizError> {
        let entries = self.store.list_schedule().await?;
        let mut report = RepairReport {
            scheme_version: REPAIR_SCHEME_VERSION,
            scanned: entries.len(),
            ..Default::default()
        };

        let mut repairs = Vec::new();
        for entry in &entries {
            match diagnose(entry, catalog) {
                Diagnosis::Valid => {}
                Diagnosis::Repairable(repair) => repairs.push(repair),
                Diagnosis::Unrepairable(warning) => {
                    warning.emit();
                    report.warnings.push(warning);
                }
            }
        }

        if !repairs.is_empty() {
            report.applied = self.store.apply_schedule_repairs(&repairs).await?;
            report.planned = repairs.iter().map(RepairedEntry::from).collect();
            info!(
                "Legacy reference repair v{REPAIR_SCHEME_VERSION}: {} planned, {} applied",
                repairs.len(),
                report.applied
            );
        }

        Ok(report)
    }

    async fn heal(&self, entry: ScheduleEntry, catalog: &QuestionCatalog) -> ScheduleEntry {
        match diagnose(&entry, catalog) {
            Diagnosis::Valid => entry,
            Diagnosis::Unrepairable(warning) => {
                warning.emit();
                entry
            }
            Diagnosis::Repairable(repair) => {
                match self.store.apply_schedule_repairs(std::slice::from_ref(&repair)).await {
                    Ok(1) => {
                        info!(
                            "Repaired schedule {}: {} -> {}",
                            repair.date_key, repair.from, repair.to
                        );
                        ScheduleEntry {
                            question_id: repair.to,
                            ..entry
                        }
                    }
                    // Someone else rewrote it first; serve whatever is there now.
                    Ok(_) => match self.store.get_schedule_entry(entry.date_key).await {
                        Ok(Some(current)) => current,
                        _ => entry,
                    },
                    Err(e) => {
                        warn!(
                            target: INTEGRITY_TARGET,
                            "Inline repair of {} failed, serving stale entry: {e}",
                            entry.date_key
                        );
                        entry
                    }
                }
            }
        }
    }
}
