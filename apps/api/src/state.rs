use std::sync::Arc;

use crate::quiz::QuizService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub quiz: Arc<QuizService>,
}
