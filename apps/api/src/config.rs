use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::FixedOffset;

use crate::calendar::PeriodKind;
use crate::leaderboard::DuplicatePolicy;
use crate::quiz::QuizSettings;

/// Application configuration loaded from environment variables.
/// Every variable has a default; malformed values fail startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Postgres connection string. Absent means the in-memory store.
    pub database_url: Option<String>,
    pub port: u16,
    pub rust_log: String,
    /// Offset of the quiz's local day from UTC.
    pub utc_offset_minutes: i32,
    pub grace_days: u32,
    pub max_write_retries: u32,
    pub leaderboard_size: usize,
    pub leaderboard_dedup: bool,
    /// JSON array of questions published at startup.
    pub catalog_seed: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: optional_env("DATABASE_URL"),
            port: parse_env("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            utc_offset_minutes: parse_env("QUIZ_UTC_OFFSET_MINUTES", 0)?,
            grace_days: parse_env("QUIZ_SUBMISSION_GRACE_DAYS", 0)?,
            max_write_retries: parse_env("QUIZ_MAX_WRITE_RETRIES", 5)?,
            leaderboard_size: parse_env("QUIZ_LEADERBOARD_SIZE", 10)?,
            leaderboard_dedup: parse_env("QUIZ_LEADERBOARD_DEDUP", false)?,
            catalog_seed: optional_env("QUIZ_CATALOG_SEED").map(PathBuf::from),
        })
    }

    pub fn utc_offset(&self) -> Result<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes * 60).with_context(|| {
            format!(
                "QUIZ_UTC_OFFSET_MINUTES out of range: {}",
                self.utc_offset_minutes
            )
        })
    }

    pub fn quiz_settings(&self) -> QuizSettings {
        QuizSettings {
            grace_days: self.grace_days,
            max_write_retries: self.max_write_retries,
            leaderboard_size: self.leaderboard_size.max(1),
            duplicate_policy: if self.leaderboard_dedup {
                DuplicatePolicy::BestScorePerIdentity
            } else {
                DuplicatePolicy::AppendEveryCompletion
            },
            periods: vec![PeriodKind::Daily, PeriodKind::Weekly],
        }
    }
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional_env(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config {
            database_url: None,
            port: 8080,
            rust_log: "info".into(),
            utc_offset_minutes: 0,
            grace_days: 0,
            max_write_retries: 5,
            leaderboard_size: 10,
            leaderboard_dedup: false,
            catalog_seed: None,
        }
    }

    #[test]
    fn test_quiz_settings_follow_config() {
        let mut c = config();
        c.leaderboard_dedup = true;
        c.leaderboard_size = 0;
        c.grace_days = 2;
        let s = c.quiz_settings();
        assert_eq!(s.duplicate_policy, DuplicatePolicy::BestScorePerIdentity);
        assert_eq!(s.leaderboard_size, 1);
        assert_eq!(s.grace_days, 2);
    }

    #[test]
    fn test_utc_offset_bounds() {
        let mut c = config();
        c.utc_offset_minutes = -300;
        assert_eq!(c.utc_offset().unwrap().local_minus_utc(), -300 * 60);
        c.utc_offset_minutes = 24 * 60;
        assert!(c.utc_offset().is_err());
    }
}
