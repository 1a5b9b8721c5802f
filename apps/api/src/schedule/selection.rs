use crate::calendar::DateKey;
use crate::catalog::QuestionCatalog;

/// Chooses the question for a date that has no assignment yet.
///
/// Implementations must be deterministic for a given catalog and date so that
/// racing resolvers usually propose the same id; the store's create-if-absent
/// still decides the winner.
pub trait SelectionPolicy: Send + Sync {
    fn select(&self, date: DateKey, catalog: &QuestionCatalog) -> Option<String>;
}

/// Walks the catalog in id order, one question per day since the epoch.
pub struct RotatingSelection;

impl SelectionPolicy for RotatingSelection {
    fn select(&self, date: DateKey, catalog: &QuestionCatalog) -> Option<String> {
        let ids = catalog.ids();
        if ids.is_empty() {
            return None;
        }
        let idx = date.days_since_epoch().rem_euclid(ids.len() as i64) as usize;
        ids.into_iter().nth(idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::date;
    use crate::test_support::written_question;

    #[test]
    fn test_empty_catalog_selects_nothing() {
        let catalog = QuestionCatalog::default();
        assert_eq!(RotatingSelection.select(date("2024-03-01"), &catalog), None);
    }

    #[test]
    fn test_rotates_daily_and_wraps() {
        let catalog = QuestionCatalog::new(vec![
            written_question("a_q0", 10, &["a"]),
            written_question("b_q0", 10, &["b"]),
            written_question("c_q0", 10, &["c"]),
        ]);
        let d = date("2024-03-01");
        let first = RotatingSelection.select(d, &catalog).unwrap();
        let second = RotatingSelection.select(d.succ(), &catalog).unwrap();
        let wrapped = RotatingSelection
            .select(d.succ().succ().succ(), &catalog)
            .unwrap();
        assert_ne!(first, second);
        assert_eq!(first, wrapped);
    }

    #[test]
    fn test_pre_epoch_dates_do_not_panic() {
        let catalog = QuestionCatalog::new(vec![
            written_question("a_q0", 10, &["a"]),
            written_question("b_q0", 10, &["b"]),
        ]);
        assert!(RotatingSelection
            .select(date("1969-12-31"), &catalog)
            .is_some());
    }
}
