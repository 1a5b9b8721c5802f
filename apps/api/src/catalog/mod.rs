// Question Catalog: immutable typed question definitions plus the pure answer validator.
// Accepted written answers are normalized once at publish time.

pub mod models;
pub mod normalize;
pub mod validator;

pub use models::{AnswerKey, Difficulty, PublicQuestion, Question, QuestionCatalog};
pub use validator::{validate, Submission};
