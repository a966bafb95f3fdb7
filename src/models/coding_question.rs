use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CodingQuestion {
    pub id: Uuid,
    pub course_id: Uuid,
    pub chapter_id: Uuid,
    pub title: String,
    pub prompt: String,
    pub language: String,
    pub starter_code: Option<String>,
    pub test_cases: Json<Vec<TestCase>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    #[serde(default)]
    pub input: String,
    pub expected_output: String,
    #[serde(default)]
    pub is_hidden: bool,
}

/// Learner view: hidden test cases are withheld.
#[derive(Debug, Clone, Serialize)]
pub struct CodingQuestionView {
    pub id: Uuid,
    pub chapter_id: Uuid,
    pub title: String,
    pub prompt: String,
    pub language: String,
    pub starter_code: Option<String>,
    pub sample_cases: Vec<TestCase>,
    pub total_cases: usize,
}

impl From<CodingQuestion> for CodingQuestionView {
    fn from(q: CodingQuestion) -> Self {
        let cases = q.test_cases.0;
        let total_cases = cases.len();
        Self {
            id: q.id,
            chapter_id: q.chapter_id,
            title: q.title,
            prompt: q.prompt,
            language: q.language,
            starter_code: q.starter_code,
            sample_cases: cases.into_iter().filter(|c| !c.is_hidden).collect(),
            total_cases,
        }
    }
}
