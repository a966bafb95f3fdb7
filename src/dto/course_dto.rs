use crate::models::coding_question::TestCase;
use crate::models::course::{CourseStatus, PriceType};
use crate::models::lesson::Lesson;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCoursePayload {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub price_type: Option<PriceType>,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateCoursePayload {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub price_type: Option<PriceType>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateChapterPayload {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub content: Option<String>,
    #[validate(url)]
    pub media_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ReorderChaptersPayload {
    #[validate(length(min = 1))]
    pub chapter_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateLessonPayload {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    pub content: Option<String>,
    #[validate(length(min = 1, max = 40))]
    pub lesson_type: Option<String>,
    pub is_free: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_answer_index"))]
pub struct CreateMcqPayload {
    #[validate(length(min = 1))]
    pub question: String,
    #[validate(length(min = 2, message = "At least two options are required"))]
    pub options: Vec<String>,
    #[validate(range(min = 0))]
    pub correct_answer: i32,
    pub explanation: Option<String>,
}

fn validate_answer_index(payload: &CreateMcqPayload) -> Result<(), ValidationError> {
    if payload.correct_answer as usize >= payload.options.len() {
        return Err(ValidationError::new("correct_answer_out_of_range"));
    }
    if payload.options.iter().any(|o| o.trim().is_empty()) {
        return Err(ValidationError::new("empty_option"));
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UpdateMcqPayload {
    pub is_active: bool,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateCodingQuestionPayload {
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub prompt: String,
    #[validate(length(min = 1))]
    pub language: String,
    pub starter_code: Option<String>,
    #[validate(length(min = 1, message = "At least one test case is required"))]
    pub test_cases: Vec<TestCase>,
}

/// Course card for listings with per-request counters.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CourseSummary {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub status: CourseStatus,
    pub price: Decimal,
    pub price_type: PriceType,
    pub total_chapters: i64,
    pub total_lessons: i64,
    pub chapters_with_mcqs: i64,
    pub enrollment_count: i64,
    pub average_rating: Option<f64>,
    pub rating_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChapterOutline {
    pub id: Uuid,
    pub title: String,
    pub order: i32,
    pub content: Option<String>,
    pub media_url: Option<String>,
    pub lessons: Vec<Lesson>,
    pub active_mcqs: i64,
    pub coding_questions: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseDetail {
    #[serde(flatten)]
    pub summary: CourseSummary,
    pub chapters: Vec<ChapterOutline>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ListCoursesQuery {
    pub page: Option<i64>,
    pub per_page: Option<i64>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedCourses {
    pub items: Vec<CourseSummary>,
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
    pub total_pages: i64,
}
