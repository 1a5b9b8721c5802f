// Attempt & Streak Tracker: one attempt record per identity per date, streak and
// point counters derived from the attempt history, completion events for the leaderboard.

pub mod models;
pub mod points;
pub mod streak;
pub mod tracker;

pub use models::{Identity, UserProgress};
pub use points::{DifficultyScaledPoints, FlatPoints, PointsPolicy};
pub use tracker::{AttemptResult, AttemptTracker, CompletionEvent};
