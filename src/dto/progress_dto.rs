use crate::services::grading_service::{McqAnswer, McqResult};
use crate::services::progress_rules::ChapterState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize)]
pub struct ChapterProgressView {
    pub chapter_id: Uuid,
    pub title: String,
    pub order: i32,
    pub state: ChapterState,
    pub locked: bool,
    pub completed: bool,
    pub mcq_passed: bool,
    pub total_lessons: usize,
    pub completed_lessons: Vec<Uuid>,
    pub has_mcqs: bool,
    pub can_attempt_mcq: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseProgress {
    pub course_id: Uuid,
    pub total_chapters: usize,
    pub completed_chapters: usize,
    pub overall_progress: u32,
    pub course_completed: bool,
    pub certificate_code: Option<String>,
    pub chapters: Vec<ChapterProgressView>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CourseProgressSummary {
    pub course_id: Uuid,
    pub title: String,
    pub enrolled_at: DateTime<Utc>,
    pub total_chapters: usize,
    pub completed_chapters: usize,
    pub overall_progress: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct LessonCompletionResult {
    pub lesson_id: Uuid,
    pub chapter_id: Uuid,
    pub newly_completed: bool,
    pub completed_lessons: usize,
    pub total_lessons: usize,
    pub can_attempt_mcq: bool,
    pub chapter_completed: bool,
    pub unlocked_chapters: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitMcqPayload {
    #[validate(length(min = 1, message = "At least one answer is required"))]
    pub answers: Vec<McqAnswer>,
}

#[derive(Debug, Clone, Serialize)]
pub struct McqSubmissionResult {
    pub submission_id: Uuid,
    pub correct_count: usize,
    pub total_questions: usize,
    pub percentage: f64,
    pub threshold: f64,
    pub passed: bool,
    pub results: Vec<McqResult>,
    pub unlocked_chapters: Vec<Uuid>,
}
