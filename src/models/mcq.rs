use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Mcq {
    pub id: Uuid,
    pub course_id: Uuid,
    pub chapter_id: Uuid,
    pub question: String,
    pub options: Json<Vec<String>>,
    /// Zero-based index into `options`.
    pub correct_answer: i32,
    pub explanation: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// What a learner sees: no answer key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McqView {
    pub id: Uuid,
    pub question: String,
    pub options: Vec<String>,
}

impl From<Mcq> for McqView {
    fn from(mcq: Mcq) -> Self {
        Self {
            id: mcq.id,
            question: mcq.question,
            options: mcq.options.0,
        }
    }
}
