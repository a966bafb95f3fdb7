use crate::services::grading_service::CaseOutcome;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SubmitCodePayload {
    #[validate(length(min = 1, max = 65536))]
    pub source_code: String,
    /// Defaults to the question's language.
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CodingSubmissionResult {
    pub submission_id: Uuid,
    pub passed_count: usize,
    pub total_count: usize,
    pub percentage: f64,
    pub passed: bool,
    pub results: Vec<CaseOutcome>,
}
