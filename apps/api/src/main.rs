mod calendar;
mod catalog;
mod config;
mod db;
mod errors;
mod leaderboard;
mod models;
mod progress;
mod quiz;
mod routes;
mod schedule;
mod state;
mod store;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::calendar::SystemCalendar;
use crate::catalog::Question;
use crate::config::Config;
use crate::db::create_pool;
use crate::progress::DifficultyScaledPoints;
use crate::quiz::QuizService;
use crate::routes::build_router;
use crate::schedule::RotatingSelection;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on malformed env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "daily_quiz_api={level},quiz={level}",
                level = &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Daily Quiz API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize the quiz store
    let store = match &config.database_url {
        Some(url) => {
            let pool = create_pool(url).await?;
            info!("PostgreSQL store initialized");
            store::postgres(pool)
        }
        None => {
            warn!("DATABASE_URL not set; using the in-memory store, data is lost on restart");
            store::memory()
        }
    };

    let offset = config.utc_offset()?;
    info!("Quiz day boundary at UTC{offset}");

    let quiz = QuizService::new(
        store,
        Arc::new(SystemCalendar::new(offset)),
        config.quiz_settings(),
        Arc::new(RotatingSelection),
        Arc::new(DifficultyScaledPoints),
    );

    if let Some(path) = &config.catalog_seed {
        let questions = load_seed(path)?;
        quiz.publish_questions(questions).await?;
    }
    quiz.reload_catalog().await?;

    // Heal legacy schedule references before serving traffic
    let report = quiz.repair_legacy_references().await?;
    info!(
        "Startup schedule repair: scanned {}, applied {}, {} warning(s)",
        report.scanned,
        report.applied,
        report.warnings.len()
    );

    let state = AppState {
        quiz: Arc::new(quiz),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the web client domain is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Reads a JSON array of questions to publish at startup.
fn load_seed(path: &Path) -> Result<Vec<Question>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog seed {}", path.display()))?;
    let questions: Vec<Question> = serde_json::from_str(&raw)
        .with_context(|| format!("Catalog seed {} is not a question array", path.display()))?;
    info!("Loaded {} question(s) from {}", questions.len(), path.display());
    Ok(questions)
}
