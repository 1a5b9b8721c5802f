use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::calendar::DateKey;

/// Opaque player reference as supplied by the session layer.
/// Stored under `player:<id>` or `guest:<token>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Identity {
    Player(String),
    Guest(String),
}

impl Identity {
    pub fn storage_key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Player(id) => write!(f, "player:{id}"),
            Identity::Guest(token) => write!(f, "guest:{token}"),
        }
    }
}

impl TryFrom<String> for Identity {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.split_once(':') {
            Some(("player", id)) if !id.is_empty() => Ok(Identity::Player(id.to_string())),
            Some(("guest", token)) if !token.is_empty() => Ok(Identity::Guest(token.to_string())),
            _ => Err(format!("unrecognised identity '{raw}'")),
        }
    }
}

impl From<Identity> for String {
    fn from(identity: Identity) -> Self {
        identity.to_string()
    }
}

/// One logical attempt record per identity per date.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyAttempt {
    pub date_key: DateKey,
    pub question_id: String,
    pub attempt_count: u32,
    /// Set on the first correct answer and never changed afterwards.
    pub solved_on_attempt: Option<u32>,
    pub elapsed_ms: Option<u64>,
    pub points_awarded: u32,
    /// 0-based position among this identity's completions; replay order for streaks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion_index: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solved_at: Option<DateTime<Utc>>,
    /// Set together with `solved_on_attempt`; cleared once every leaderboard
    /// period has recorded the completion.
    #[serde(default)]
    pub leaderboard_pending: bool,
}

impl DailyAttempt {
    pub fn new(date_key: DateKey, question_id: &str) -> Self {
        Self {
            date_key,
            question_id: question_id.to_string(),
            attempt_count: 0,
            solved_on_attempt: None,
            elapsed_ms: None,
            points_awarded: 0,
            completion_index: None,
            solved_at: None,
            leaderboard_pending: false,
        }
    }

    pub fn is_solved(&self) -> bool {
        self.solved_on_attempt.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProgress {
    pub identity: Identity,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_points: u64,
    pub last_completed_date_key: Option<DateKey>,
    /// Ordered by first submission for each date.
    pub attempts: Vec<DailyAttempt>,
}

impl UserProgress {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            current_streak: 0,
            longest_streak: 0,
            total_points: 0,
            last_completed_date_key: None,
            attempts: Vec::new(),
        }
    }

    pub fn completions(&self) -> u32 {
        self.attempts.iter().filter(|a| a.is_solved()).count() as u32
    }

    /// Returns the attempt record for `date_key`, creating it if absent.
    pub fn attempt_for_mut(&mut self, date_key: DateKey, question_id: &str) -> &mut DailyAttempt {
        let idx = match self.attempts.iter().position(|a| a.date_key == date_key) {
            Some(idx) => idx,
            None => {
                self.attempts.push(DailyAttempt::new(date_key, question_id));
                self.attempts.len() - 1
            }
        };
        &mut self.attempts[idx]
    }
}
