// Schedule Manager: one question per calendar date, first write wins.
// Persisted entries may carry legacy question ids; see `legacy` for the repair mapping.

pub mod legacy;
pub mod manager;
pub mod selection;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::calendar::DateKey;

pub use manager::{RepairReport, ScheduleManager};
pub use selection::{RotatingSelection, SelectionPolicy};

/// Who created a schedule assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssignedBy {
    System,
    Admin(String),
}

impl AssignedBy {
    pub fn as_tag(&self) -> &str {
        match self {
            AssignedBy::System => "system",
            AssignedBy::Admin(user_id) => user_id,
        }
    }

    pub fn from_tag(tag: &str) -> Self {
        if tag == "system" {
            AssignedBy::System
        } else {
            AssignedBy::Admin(tag.to_string())
        }
    }
}

impl Serialize for AssignedBy {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_tag())
    }
}

impl<'de> Deserialize<'de> for AssignedBy {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tag = String::deserialize(deserializer)?;
        Ok(AssignedBy::from_tag(&tag))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleEntry {
    pub date_key: DateKey,
    pub question_id: String,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: AssignedBy,
}
