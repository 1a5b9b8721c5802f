use serde::Serialize;

use crate::calendar::DateKey;
use crate::progress::models::{DailyAttempt, UserProgress};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakTransition {
    Started,
    Extended,
    Reset,
    /// Completion for the date already recorded as last completed. Nothing changes.
    Duplicate,
}

/// Folds one completion into the streak counters and point total.
///
/// `day_before` is the calendar day preceding `date_key`, supplied by the
/// calendar provider.
pub fn apply_completion(
    progress: &mut UserProgress,
    date_key: DateKey,
    day_before: DateKey,
    points: u32,
) -> StreakTransition {
    let transition = match progress.last_completed_date_key {
        Some(last) if last == date_key => return StreakTransition::Duplicate,
        Some(last) if last == day_before => {
            progress.current_streak += 1;
            StreakTransition::Extended
        }
        Some(_) => {
            progress.current_streak = 1;
            StreakTransition::Reset
        }
        None => {
            progress.current_streak = 1;
            StreakTransition::Started
        }
    };
    progress.longest_streak = progress.longest_streak.max(progress.current_streak);
    progress.total_points += u64::from(points);
    progress.last_completed_date_key = Some(date_key);
    transition
}

/// Counters derived purely from the attempt history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreakSummary {
    pub current_streak: u32,
    pub longest_streak: u32,
    pub total_points: u64,
    pub last_completed_date_key: Option<DateKey>,
}

/// Rebuilds the streak counters by replaying solved attempts in completion order.
pub fn replay_streaks(attempts: &[DailyAttempt]) -> StreakSummary {
    let mut solved: Vec<&DailyAttempt> = attempts.iter().filter(|a| a.is_solved()).collect();
    // Records written before completion_index existed sort by position.
    solved.sort_by_key(|a| a.completion_index.unwrap_or(u32::MAX));

    let mut scratch = UserProgress::new(crate::progress::Identity::Guest("replay".into()));
    for attempt in solved {
        apply_completion(
            &mut scratch,
            attempt.date_key,
            attempt.date_key.pred(),
            attempt.points_awarded,
        );
    }
    StreakSummary {
        current_streak: scratch.current_streak,
        longest_streak: scratch.longest_streak,
        total_points: scratch.total_points,
        last_completed_date_key: scratch.last_completed_date_key,
    }
}

impl UserProgress {
    pub fn streak_summary(&self) -> StreakSummary {
        StreakSummary {
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            total_points: self.total_points,
            last_completed_date_key: self.last_completed_date_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Identity;
    use crate::test_support::date;

    fn progress() -> UserProgress {
        UserProgress::new(Identity::Player("u1".into()))
    }

    fn complete(p: &mut UserProgress, day: &str, points: u32) -> StreakTransition {
        let d = date(day);
        apply_completion(p, d, d.pred(), points)
    }

    #[test]
    fn test_first_completion_starts_streak() {
        let mut p = progress();
        assert_eq!(complete(&mut p, "2024-03-01", 10), StreakTransition::Started);
        assert_eq!(p.current_streak, 1);
        assert_eq!(p.longest_streak, 1);
        assert_eq!(p.total_points, 10);
    }

    #[test]
    fn test_consecutive_days_extend_and_gap_resets() {
        let mut p = progress();
        complete(&mut p, "2024-03-01", 10);
        assert_eq!(complete(&mut p, "2024-03-02", 15), StreakTransition::Extended);
        assert_eq!((p.current_streak, p.total_points), (2, 25));
        assert_eq!(complete(&mut p, "2024-03-05", 10), StreakTransition::Reset);
        assert_eq!(p.current_streak, 1);
        assert_eq!(p.longest_streak, 2);
        assert_eq!(p.total_points, 35);
    }

    #[test]
    fn test_extends_across_month_boundary() {
        let mut p = progress();
        complete(&mut p, "2024-02-29", 1);
        assert_eq!(complete(&mut p, "2024-03-01", 1), StreakTransition::Extended);
    }

    #[test]
    fn test_same_day_is_duplicate_noop() {
        let mut p = progress();
        complete(&mut p, "2024-03-01", 10);
        let before = p.clone();
        assert_eq!(complete(&mut p, "2024-03-01", 10), StreakTransition::Duplicate);
        assert_eq!(p, before);
    }

    #[test]
    fn test_out_of_order_completion_resets() {
        let mut p = progress();
        complete(&mut p, "2024-03-02", 10);
        assert_eq!(complete(&mut p, "2024-03-01", 10), StreakTransition::Reset);
        assert_eq!(p.current_streak, 1);
        assert_eq!(p.last_completed_date_key, Some(date("2024-03-01")));
    }

    #[test]
    fn test_longest_never_below_current() {
        let mut p = progress();
        let days = [
            "2024-03-01", "2024-03-02", "2024-03-03", "2024-03-07", "2024-03-08", "2024-03-09",
            "2024-03-10", "2024-03-20",
        ];
        for day in days {
            complete(&mut p, day, 1);
            assert!(p.longest_streak >= p.current_streak);
        }
        assert_eq!(p.longest_streak, 4);
        assert_eq!(p.current_streak, 1);
    }

    #[test]
    fn test_replay_matches_incremental() {
        let mut p = progress();
        for (idx, (day, pts)) in [("2024-03-01", 10), ("2024-03-02", 15), ("2024-03-05", 10)]
            .into_iter()
            .enumerate()
        {
            let d = date(day);
            let attempt = p.attempt_for_mut(d, "q");
            attempt.attempt_count = 1;
            attempt.solved_on_attempt = Some(1);
            attempt.points_awarded = pts;
            attempt.completion_index = Some(idx as u32);
            apply_completion(&mut p, d, d.pred(), pts);
        }
        // An unsolved day contributes nothing.
        p.attempt_for_mut(date("2024-03-06"), "q").attempt_count = 3;

        assert_eq!(replay_streaks(&p.attempts), p.streak_summary());
    }

    #[test]
    fn test_replay_follows_completion_order_not_record_order() {
        let mut p = progress();
        // Record for 03-01 created first (wrong answer), solved after 03-02.
        p.attempt_for_mut(date("2024-03-01"), "q").attempt_count = 1;
        let second = p.attempt_for_mut(date("2024-03-02"), "q");
        second.attempt_count = 1;
        second.solved_on_attempt = Some(1);
        second.points_awarded = 5;
        second.completion_index = Some(0);
        apply_completion(&mut p, date("2024-03-02"), date("2024-03-01"), 5);
        let first = p.attempt_for_mut(date("2024-03-01"), "q");
        first.attempt_count = 2;
        first.solved_on_attempt = Some(2);
        first.points_awarded = 3;
        first.completion_index = Some(1);
        apply_completion(&mut p, date("2024-03-01"), date("2024-02-29"), 3);

        assert_eq!(replay_streaks(&p.attempts), p.streak_summary());
        assert_eq!(p.current_streak, 1);
    }
}
