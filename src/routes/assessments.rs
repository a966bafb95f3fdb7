use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        assessment_dto::SubmitCodePayload,
        course_dto::{CreateCodingQuestionPayload, CreateMcqPayload, UpdateMcqPayload},
        progress_dto::SubmitMcqPayload,
    },
    error::Result,
    response::ApiResponse,
    services::outbox_service::Dispatch,
    utils::token::Claims,
    AppState,
};

#[axum::debug_handler]
pub async fn create_mcq(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateMcqPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let mcq = state.question_service.create_mcq(id, payload, &claims).await?;
    Ok(ApiResponse::created("MCQ created", mcq))
}

#[axum::debug_handler]
pub async fn update_mcq(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateMcqPayload>,
) -> Result<impl IntoResponse> {
    let mcq = state
        .question_service
        .set_mcq_active(id, payload.is_active, &claims)
        .await?;
    Ok(ApiResponse::ok("MCQ updated", mcq))
}

#[axum::debug_handler]
pub async fn list_chapter_mcqs(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let questions = state.question_service.list_chapter_mcqs(claims.user_id(), id).await?;
    Ok(ApiResponse::ok("Quiz retrieved", questions))
}

#[axum::debug_handler]
pub async fn submit_mcq(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitMcqPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let outcome = state
        .progress_service
        .submit_mcq(claims.user_id(), id, payload.answers)
        .await?;
    state.outbox_service.dispatch(&outcome.events, Dispatch::Immediate).await;

    let message = if outcome.value.passed {
        "Quiz passed"
    } else {
        "Quiz not passed"
    };
    Ok(ApiResponse::ok(message, outcome.value))
}

#[axum::debug_handler]
pub async fn list_mcq_submissions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let attempts = state
        .progress_service
        .list_mcq_submissions(claims.user_id(), id)
        .await?;
    Ok(ApiResponse::ok("Quiz attempts retrieved", attempts))
}

#[axum::debug_handler]
pub async fn create_coding_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateCodingQuestionPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let question = state
        .question_service
        .create_coding_question(id, payload, &claims)
        .await?;
    Ok(ApiResponse::created("Coding question created", question))
}

#[axum::debug_handler]
pub async fn list_coding_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let questions = state
        .question_service
        .list_coding_questions(claims.user_id(), id)
        .await?;
    Ok(ApiResponse::ok("Coding questions retrieved", questions))
}

#[axum::debug_handler]
pub async fn submit_code(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SubmitCodePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let result = state
        .assessment_service
        .submit_code(claims.user_id(), id, payload)
        .await?;
    Ok(ApiResponse::created("Submission graded", result))
}

#[axum::debug_handler]
pub async fn list_submissions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let submissions = state
        .assessment_service
        .list_submissions(claims.user_id(), id)
        .await?;
    Ok(ApiResponse::ok("Submissions retrieved", submissions))
}
