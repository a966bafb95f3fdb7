use axum::{extract::State, response::IntoResponse, Json};
use validator::Validate;

use crate::{
    dto::auth_dto::{LoginPayload, RegisterPayload},
    error::Result,
    response::ApiResponse,
    AppState,
};

#[axum::debug_handler]
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let auth = state.auth_service.register(payload).await?;
    Ok(ApiResponse::created("Registration successful", auth))
}

#[axum::debug_handler]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<impl IntoResponse> {
    payload.validate()?;
    let auth = state.auth_service.login(payload).await?;
    Ok(ApiResponse::ok("Login successful", auth))
}
