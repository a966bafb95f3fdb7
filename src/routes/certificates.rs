use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Extension,
};

use crate::{error::Result, response::ApiResponse, utils::token::Claims, AppState};

#[axum::debug_handler]
pub async fn list_certificates(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse> {
    let certificates = state.certificate_service.list_for_user(claims.user_id()).await?;
    Ok(ApiResponse::ok("Certificates retrieved", certificates))
}

#[axum::debug_handler]
pub async fn verify_certificate(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse> {
    let certificate = state.certificate_service.verify(&code).await?;
    Ok(ApiResponse::ok("Certificate is valid", certificate))
}
