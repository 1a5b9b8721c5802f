use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::models::{AnswerKey, Question};
use crate::catalog::normalize::normalize_answer;

/// A player's answer as submitted.
///
/// Anything that does not match one of the three shapes becomes `Malformed`
/// and is scored incorrect rather than rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Submission {
    Choice(usize),
    Choices(Vec<usize>),
    Text(String),
    Malformed,
}

impl Submission {
    /// Lenient conversion from arbitrary client JSON:
    /// `{"choice": n}`, `{"choices": [..]}` or `{"text": ".."}`.
    pub fn from_value(value: &Value) -> Self {
        let Some(obj) = value.as_object() else {
            return Submission::Malformed;
        };
        if obj.len() != 1 {
            return Submission::Malformed;
        }
        if let Some(choice) = obj.get("choice") {
            return choice
                .as_u64()
                .and_then(|n| usize::try_from(n).ok())
                .map(Submission::Choice)
                .unwrap_or(Submission::Malformed);
        }
        if let Some(Value::Array(items)) = obj.get("choices") {
            let indices: Option<Vec<usize>> = items
                .iter()
                .map(|v| v.as_u64().and_then(|n| usize::try_from(n).ok()))
                .collect();
            return indices
                .map(Submission::Choices)
                .unwrap_or(Submission::Malformed);
        }
        if let Some(Value::String(text)) = obj.get("text") {
            return Submission::Text(text.clone());
        }
        Submission::Malformed
    }
}

/// Scores a submission against a question. Pure and total: a submission of
/// the wrong shape for the question type is simply incorrect.
pub fn validate(question: &Question, submission: &Submission) -> bool {
    match (&question.answer, submission) {
        (AnswerKey::Mcq { correct_index, .. }, Submission::Choice(chosen)) => {
            chosen == correct_index
        }
        (AnswerKey::SelectAll { correct_indices, .. }, Submission::Choices(chosen)) => {
            // Duplicates in the submission collapse; order never matters.
            let chosen: BTreeSet<usize> = chosen.iter().copied().collect();
            &chosen == correct_indices
        }
        (AnswerKey::Written { accepted_answers }, Submission::Text(text)) => {
            accepted_answers.contains(&normalize_answer(text))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::Difficulty;
    use serde_json::json;

    fn question(answer: AnswerKey) -> Question {
        Question {
            id: "q".into(),
            prompt: "?".into(),
            difficulty: Difficulty::try_from(1).unwrap(),
            base_points: 10,
            tags: vec![],
            answer,
        }
        .published()
        .unwrap()
    }

    fn mcq() -> Question {
        question(AnswerKey::Mcq {
            choices: vec!["a".into(), "b".into(), "c".into()],
            correct_index: 1,
        })
    }

    fn select_all() -> Question {
        question(AnswerKey::SelectAll {
            choices: vec!["a".into(), "b".into(), "c".into(), "d".into()],
            correct_indices: BTreeSet::from([0, 2]),
        })
    }

    fn written() -> Question {
        question(AnswerKey::Written {
            accepted_answers: BTreeSet::from(["O(n log n)".to_string()]),
        })
    }

    #[test]
    fn test_mcq_exact_index() {
        assert!(validate(&mcq(), &Submission::Choice(1)));
        assert!(!validate(&mcq(), &Submission::Choice(0)));
        assert!(!validate(&mcq(), &Submission::Choice(99)));
    }

    #[test]
    fn test_select_all_order_irrelevant() {
        assert!(validate(&select_all(), &Submission::Choices(vec![2, 0])));
        assert!(validate(&select_all(), &Submission::Choices(vec![0, 2, 2])));
    }

    #[test]
    fn test_select_all_requires_exact_set() {
        assert!(!validate(&select_all(), &Submission::Choices(vec![0])));
        assert!(!validate(&select_all(), &Submission::Choices(vec![0, 1, 2])));
        assert!(!validate(&select_all(), &Submission::Choices(vec![])));
    }

    #[test]
    fn test_written_is_normalized() {
        assert!(validate(&written(), &Submission::Text("  o(N   LOG n) ".into())));
        assert!(!validate(&written(), &Submission::Text("o(n^2)".into())));
    }

    #[test]
    fn test_shape_mismatch_is_incorrect() {
        assert!(!validate(&mcq(), &Submission::Text("b".into())));
        assert!(!validate(&select_all(), &Submission::Choice(0)));
        assert!(!validate(&written(), &Submission::Choices(vec![1])));
        assert!(!validate(&written(), &Submission::Malformed));
    }

    #[test]
    fn test_from_value_shapes() {
        assert_eq!(
            Submission::from_value(&json!({"choice": 2})),
            Submission::Choice(2)
        );
        assert_eq!(
            Submission::from_value(&json!({"choices": [3, 1]})),
            Submission::Choices(vec![3, 1])
        );
        assert_eq!(
            Submission::from_value(&json!({"text": "hi"})),
            Submission::Text("hi".into())
        );
    }

    #[test]
    fn test_from_value_malformed() {
        for raw in [
            json!(2),
            json!({"choice": -1}),
            json!({"choice": "1"}),
            json!({"choices": [1, "x"]}),
            json!({"text": 5}),
            json!({"choice": 1, "text": "a"}),
            json!({}),
            json!(null),
        ] {
            assert_eq!(Submission::from_value(&raw), Submission::Malformed, "{raw}");
        }
    }
}
