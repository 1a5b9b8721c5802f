use crate::catalog::Question;

/// Awards points for a first correct answer.
///
/// Implementations must be deterministic and must never award more for a
/// later attempt or a slower answer than for an earlier or faster one.
pub trait PointsPolicy: Send + Sync {
    fn points(&self, question: &Question, attempt_count: u32, elapsed_ms: Option<u64>) -> u32;
}

/// `basePoints` regardless of difficulty, attempts or speed.
pub struct FlatPoints;

impl PointsPolicy for FlatPoints {
    fn points(&self, question: &Question, _attempt_count: u32, _elapsed_ms: Option<u64>) -> u32 {
        question.base_points
    }
}

/// `basePoints × difficulty`, scaled down for retries and up for fast answers.
///
/// Attempt factor: 100% / 75% / 50% / 25% for attempts 1 / 2 / 3 / 4+.
/// Speed bonus: +50% under 10s, +25% under 30s, nothing otherwise or when
/// the elapsed time is unknown.
pub struct DifficultyScaledPoints;

impl DifficultyScaledPoints {
    fn attempt_percent(attempt_count: u32) -> u64 {
        match attempt_count {
            0 | 1 => 100,
            2 => 75,
            3 => 50,
            _ => 25,
        }
    }

    fn speed_bonus_percent(elapsed_ms: Option<u64>) -> u64 {
        match elapsed_ms {
            Some(ms) if ms < 10_000 => 50,
            Some(ms) if ms < 30_000 => 25,
            _ => 0,
        }
    }
}

impl PointsPolicy for DifficultyScaledPoints {
    fn points(&self, question: &Question, attempt_count: u32, elapsed_ms: Option<u64>) -> u32 {
        let base = u64::from(question.base_points) * u64::from(question.difficulty.value());
        let scaled = base
            * Self::attempt_percent(attempt_count)
            * (100 + Self::speed_bonus_percent(elapsed_ms))
            / 10_000;
        u32::try_from(scaled).unwrap_or(u32::MAX)
    }
}
