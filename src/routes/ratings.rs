use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension, Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::rating_dto::RateCoursePayload, error::Result, response::ApiResponse,
    utils::token::Claims, AppState,
};

#[axum::debug_handler]
pub async fn rate_course(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RateCoursePayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let rating = state.rating_service.rate_course(claims.user_id(), id, payload).await?;
    Ok(ApiResponse::ok("Rating saved", rating))
}

#[axum::debug_handler]
pub async fn rating_stats(State(state): State<AppState>, Path(id): Path<Uuid>) -> Result<impl IntoResponse> {
    let stats = state.rating_service.rating_stats(id).await?;
    Ok(ApiResponse::ok("Rating statistics retrieved", stats))
}
