use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension,
};
use uuid::Uuid;

use crate::{
    error::Result, response::ApiResponse, services::outbox_service::Dispatch,
    utils::token::Claims, AppState,
};

#[axum::debug_handler]
pub async fn enroll(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let outcome = state.enrollment_service.enroll(claims.user_id(), id).await?;
    state.outbox_service.dispatch(&outcome.events, Dispatch::Immediate).await;
    Ok(ApiResponse::created("Enrolled successfully", outcome.value))
}

#[axum::debug_handler]
pub async fn list_enrollments(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let enrollments = state.enrollment_service.list_enrollments(claims.user_id()).await?;
    Ok(ApiResponse::ok("Enrollments retrieved", enrollments))
}

#[axum::debug_handler]
pub async fn dashboard(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let summary = state.progress_service.dashboard(claims.user_id()).await?;
    Ok(ApiResponse::ok("Progress retrieved", summary))
}

#[axum::debug_handler]
pub async fn course_progress(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let outcome = state.progress_service.course_progress(claims.user_id(), id).await?;
    state.outbox_service.dispatch(&outcome.events, Dispatch::Immediate).await;
    Ok(ApiResponse::ok("Course progress retrieved", outcome.value))
}

#[axum::debug_handler]
pub async fn complete_lesson(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let outcome = state
        .progress_service
        .mark_lesson_completed(claims.user_id(), id)
        .await?;
    state.outbox_service.dispatch(&outcome.events, Dispatch::Immediate).await;

    let message = if outcome.value.newly_completed {
        "Lesson completed"
    } else {
        "Lesson already completed"
    };
    Ok(ApiResponse::ok(message, outcome.value))
}
