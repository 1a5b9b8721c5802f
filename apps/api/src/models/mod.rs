pub mod documents;
pub mod schedule;
