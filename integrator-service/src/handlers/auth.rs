use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::auth::{
    ChangePasswordRequest, FirstLoginRequest, LoginRequest, LoginResponse, SessionResponse,
};
use crate::dtos::MessageResponse;
use crate::middleware::CallerIdentity;
use crate::AppState;

pub async fn login(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let outcome = state.users.login(&req.username, &req.password).await?;
    Ok(Json(LoginResponse::from(outcome)))
}

/// Completes the forced password change; `username` comes from the path.
pub async fn first_login(
    State(state): State<AppState>,
    Path(username): Path<String>,
    Json(req): Json<FirstLoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let session = state
        .users
        .respond_to_new_password_challenge(&req.password, &username, &req.session)
        .await?;
    Ok(Json(SessionResponse::from(session)))
}

pub async fn change_password(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(req): Json<ChangePasswordRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    state.users.change_password(caller.id(), &req.password).await?;
    Ok(Json(MessageResponse::new("Password changed")))
}
