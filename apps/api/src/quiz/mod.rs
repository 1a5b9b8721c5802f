// Quiz service facade and its HTTP surface.
// Handlers stay thin: every rule lives in the service and the components below it.

pub mod handlers;
pub mod identity;
pub mod service;

pub use service::{QuizService, QuizSettings};
