use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct McqSubmission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub chapter_id: Uuid,
    pub answers: JsonValue,
    pub correct_count: i32,
    pub total_questions: i32,
    pub score: Decimal,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CodingSubmission {
    pub id: Uuid,
    pub user_id: Uuid,
    pub question_id: Uuid,
    pub chapter_id: Uuid,
    pub language: String,
    #[serde(skip_serializing)]
    pub source_code: String,
    pub results: JsonValue,
    pub passed_count: i32,
    pub total_count: i32,
    pub score: Decimal,
    pub passed: bool,
    pub submitted_at: DateTime<Utc>,
}
