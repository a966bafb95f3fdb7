use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::course_dto::{
        CreateChapterPayload, CreateCoursePayload, CreateLessonPayload, ListCoursesQuery,
        ReorderChaptersPayload, UpdateCoursePayload,
    },
    error::Result,
    response::ApiResponse,
    utils::token::Claims,
    AppState,
};

const DEFAULT_PAGE_SIZE: i64 = 20;

#[axum::debug_handler]
pub async fn list_courses(
    State(state): State<AppState>,
    Query(query): Query<ListCoursesQuery>,
) -> Result<impl IntoResponse> {
    let courses = state
        .course_service
        .list_courses(
            query.page.unwrap_or(1),
            query.per_page.unwrap_or(DEFAULT_PAGE_SIZE),
            query.search,
        )
        .await?;
    Ok(ApiResponse::ok("Courses retrieved", courses))
}

#[axum::debug_handler]
pub async fn get_course(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    let course = state.course_service.get_course_detail(id).await?;
    Ok(ApiResponse::ok("Course retrieved", course))
}

#[axum::debug_handler]
pub async fn create_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(payload): Json<CreateCoursePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let course = state.course_service.create_course(payload, claims.user_id()).await?;
    Ok(ApiResponse::created("Course created", course))
}

#[axum::debug_handler]
pub async fn update_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCoursePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let course = state.course_service.update_course(id, payload, &claims).await?;
    Ok(ApiResponse::ok("Course updated", course))
}

#[axum::debug_handler]
pub async fn publish_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let course = state.course_service.publish_course(id, &claims).await?;
    Ok(ApiResponse::ok("Course published", course))
}

#[axum::debug_handler]
pub async fn deactivate_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    let course = state.course_service.deactivate_course(id, &claims).await?;
    Ok(ApiResponse::ok("Course deactivated", course))
}

#[axum::debug_handler]
pub async fn list_chapters(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    let chapters = state.chapter_service.list_chapters(id).await?;
    Ok(ApiResponse::ok("Chapters retrieved", chapters))
}

#[axum::debug_handler]
pub async fn create_chapter(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateChapterPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let chapter = state.chapter_service.create_chapter(id, payload, &claims).await?;
    Ok(ApiResponse::created("Chapter created", chapter))
}

#[axum::debug_handler]
pub async fn reorder_chapters(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReorderChaptersPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let chapters = state
        .chapter_service
        .reorder_chapters(id, &payload.chapter_ids, &claims)
        .await?;
    Ok(ApiResponse::ok("Chapters reordered", chapters))
}

#[axum::debug_handler]
pub async fn delete_chapter(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.chapter_service.delete_chapter(id, &claims).await?;
    Ok(ApiResponse::message("Chapter deleted"))
}

#[axum::debug_handler]
pub async fn list_lessons(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    let lessons = state.lesson_service.list_lessons(id).await?;
    Ok(ApiResponse::ok("Lessons retrieved", lessons))
}

#[axum::debug_handler]
pub async fn create_lesson(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<CreateLessonPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let lesson = state.lesson_service.create_lesson(id, payload, &claims).await?;
    Ok(ApiResponse::created("Lesson created", lesson))
}

#[axum::debug_handler]
pub async fn delete_lesson(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse> {
    state.lesson_service.delete_lesson(id, &claims).await?;
    Ok(ApiResponse::message("Lesson deleted"))
}
