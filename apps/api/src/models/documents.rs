use serde_json::Value;
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct QuestionRow {
    pub id: String,
    pub body: Value,
}

/// A JSONB document guarded by an optimistic version counter.
#[derive(Debug, Clone, FromRow)]
pub struct VersionedDocumentRow {
    pub body: Value,
    pub version: i64,
}
