use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::catalog::normalize::normalize_answer;
use crate::errors::QuizError;

/// Question difficulty tier, 1 (easy) to 3 (hard).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Difficulty(u8);

impl Difficulty {
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1..=3 => Ok(Self(value)),
            other => Err(format!("difficulty must be 1, 2 or 3 (got {other})")),
        }
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> Self {
        d.0
    }
}

/// Type-specific answer data. Serialized inline with the question under a
/// `type` tag of `mcq`, `select-all` or `written`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AnswerKey {
    #[serde(rename_all = "camelCase")]
    Mcq {
        choices: Vec<String>,
        correct_index: usize,
    },
    #[serde(rename_all = "camelCase")]
    SelectAll {
        choices: Vec<String>,
        correct_indices: BTreeSet<usize>,
    },
    #[serde(rename_all = "camelCase")]
    Written { accepted_answers: BTreeSet<String> },
}

impl AnswerKey {
    pub fn kind(&self) -> &'static str {
        match self {
            AnswerKey::Mcq { .. } => "mcq",
            AnswerKey::SelectAll { .. } => "select-all",
            AnswerKey::Written { .. } => "written",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    pub prompt: String,
    pub difficulty: Difficulty,
    pub base_points: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(flatten)]
    pub answer: AnswerKey,
}

impl Question {
    /// Checks structural well-formedness and returns the question with its
    /// accepted answers normalized. Called once, when a question is published.
    pub fn published(mut self) -> Result<Self, QuizError> {
        let invalid = |reason: String| QuizError::InvalidQuestion {
            question_id: self.id.clone(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("id must not be empty".to_string()));
        }

        match &mut self.answer {
            AnswerKey::Mcq {
                choices,
                correct_index,
            } => {
                if *correct_index >= choices.len() {
                    return Err(invalid(format!(
                        "correctIndex {correct_index} out of range for {} choices",
                        choices.len()
                    )));
                }
            }
            AnswerKey::SelectAll {
                choices,
                correct_indices,
            } => {
                if correct_indices.is_empty() {
                    return Err(invalid("correctIndices must not be empty".to_string()));
                }
                if let Some(bad) = correct_indices.iter().find(|i| **i >= choices.len()) {
                    return Err(invalid(format!(
                        "correctIndices entry {bad} out of range for {} choices",
                        choices.len()
                    )));
                }
            }
            AnswerKey::Written { accepted_answers } => {
                let normalized: BTreeSet<String> = accepted_answers
                    .iter()
                    .map(|a| normalize_answer(a))
                    .filter(|a| !a.is_empty())
                    .collect();
                if normalized.is_empty() {
                    return Err(invalid("written question needs an accepted answer".to_string()));
                }
                *accepted_answers = normalized;
            }
        }

        Ok(self)
    }

    pub fn public_view(&self) -> PublicQuestion {
        let choices = match &self.answer {
            AnswerKey::Mcq { choices, .. } | AnswerKey::SelectAll { choices, .. } => {
                Some(choices.clone())
            }
            AnswerKey::Written { .. } => None,
        };
        PublicQuestion {
            id: self.id.clone(),
            question_type: self.answer.kind(),
            prompt: self.prompt.clone(),
            choices,
            difficulty: self.difficulty.value(),
            base_points: self.base_points,
            tags: self.tags.clone(),
        }
    }
}

/// What players get to see: everything except the answer key.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    pub id: String,
    #[serde(rename = "type")]
    pub question_type: &'static str,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    pub difficulty: u8,
    pub base_points: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// Immutable snapshot of all published questions, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct QuestionCatalog {
    questions: BTreeMap<String, Question>,
}

impl QuestionCatalog {
    pub fn new(questions: impl IntoIterator<Item = Question>) -> Self {
        Self {
            questions: questions.into_iter().map(|q| (q.id.clone(), q)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.questions.contains_key(id)
    }

    /// Question ids in ascending order.
    pub fn ids(&self) -> Vec<String> {
        self.questions.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_written_question_deserializes_and_normalizes() {
        let q: Question = serde_json::from_value(json!({
            "id": "algo_q0",
            "type": "written",
            "prompt": "Complexity of merge sort?",
            "difficulty": 2,
            "basePoints": 10,
            "acceptedAnswers": ["  O(N  log N) ", "n log n"]
        }))
        .unwrap();
        let q = q.published().unwrap();
        match &q.answer {
            AnswerKey::Written { accepted_answers } => {
                assert!(accepted_answers.contains("o(n log n)"));
                assert!(accepted_answers.contains("n log n"));
            }
            other => panic!("unexpected answer key {other:?}"),
        }
    }

    #[test]
    fn test_select_all_deserializes() {
        let q: Question = serde_json::from_value(json!({
            "id": "sets_q0",
            "type": "select-all",
            "prompt": "Pick the primes",
            "choices": ["2", "4", "5", "9"],
            "correctIndices": [0, 2],
            "difficulty": 1,
            "basePoints": 5,
            "tags": ["math"]
        }))
        .unwrap();
        assert_eq!(q.answer.kind(), "select-all");
        assert!(q.published().is_ok());
    }

    #[test]
    fn test_difficulty_out_of_range_rejected() {
        let result: Result<Question, _> = serde_json::from_value(json!({
            "id": "x", "type": "mcq", "prompt": "?", "choices": ["a"],
            "correctIndex": 0, "difficulty": 4, "basePoints": 1
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_mcq_index_out_of_range_rejected() {
        let q = Question {
            id: "bad".into(),
            prompt: "?".into(),
            difficulty: Difficulty(1),
            base_points: 1,
            tags: vec![],
            answer: AnswerKey::Mcq {
                choices: vec!["a".into(), "b".into()],
                correct_index: 2,
            },
        };
        assert!(matches!(
            q.published(),
            Err(QuizError::InvalidQuestion { .. })
        ));
    }

    #[test]
    fn test_written_without_answers_rejected() {
        let q = Question {
            id: "bad".into(),
            prompt: "?".into(),
            difficulty: Difficulty(1),
            base_points: 1,
            tags: vec![],
            answer: AnswerKey::Written {
                accepted_answers: BTreeSet::from(["   ".to_string()]),
            },
        };
        assert!(q.published().is_err());
    }

    #[test]
    fn test_public_view_hides_answer_key() {
        let q = Question {
            id: "m".into(),
            prompt: "Pick".into(),
            difficulty: Difficulty(3),
            base_points: 7,
            tags: vec![],
            answer: AnswerKey::Mcq {
                choices: vec!["a".into(), "b".into()],
                correct_index: 1,
            },
        };
        let view = serde_json::to_value(q.public_view()).unwrap();
        assert_eq!(view["type"], "mcq");
        assert!(view.get("correctIndex").is_none());
        assert_eq!(view["choices"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_catalog_ids_sorted() {
        let mk = |id: &str| Question {
            id: id.into(),
            prompt: "?".into(),
            difficulty: Difficulty(1),
            base_points: 1,
            tags: vec![],
            answer: AnswerKey::Written {
                accepted_answers: BTreeSet::from(["a".to_string()]),
            },
        };
        let catalog = QuestionCatalog::new(vec![mk("c"), mk("a"), mk("b")]);
        assert_eq!(catalog.ids(), vec!["a", "b", "c"]);
        assert!(catalog.contains("b"));
        assert!(!catalog.contains("z"));
    }
}
