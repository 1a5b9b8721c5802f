/// Normalizes free-text answers: trims, lower-cases, and collapses internal
/// whitespace runs to a single space.
///
/// Applied both to published `acceptedAnswers` and to written submissions,
/// so validation reduces to set membership.
pub fn normalize_answer(raw: &str) -> String {
    raw.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trims_and_lowercases() {
        assert_eq!(normalize_answer("  O(N LOG N)  "), "o(n log n)");
    }

    #[test]
    fn test_collapses_internal_whitespace() {
        assert_eq!(normalize_answer("o(n \t\n  log   n)"), "o(n log n)");
    }

    #[test]
    fn test_blank_becomes_empty() {
        assert_eq!(normalize_answer(" \t "), "");
    }

    #[test]
    fn test_idempotent() {
        let once = normalize_answer("  Binary   Search ");
        assert_eq!(normalize_answer(&once), once);
    }
}
