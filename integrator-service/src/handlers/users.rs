use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::users::{EditUserRequest, ManagerQuery, RegisterRequest, UserQuery};
use crate::dtos::{non_empty, MessageResponse};
use crate::middleware::CallerIdentity;
use crate::services::UserEdit;
use crate::AppState;

pub async fn register(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(req): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    state.users.create_user(caller.id(), req.into()).await?;
    Ok(Json(MessageResponse::new("Successfully created user!")))
}

/// A single user; defaults to the caller when `userID` is absent.
pub async fn get_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<UserQuery>,
) -> Result<impl IntoResponse, AppError> {
    let target = non_empty(query.user_id).unwrap_or_else(|| caller.id().to_string());
    let user = state.users.get_user_info(&target, caller.id()).await?;
    Ok(Json(user))
}

pub async fn get_workers(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<impl IntoResponse, AppError> {
    let workers = state.users.get_workers(caller.id()).await?;
    Ok(Json(workers))
}

pub async fn get_worker(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((_, worker_id)): Path<(String, String)>,
    Query(query): Query<ManagerQuery>,
) -> Result<impl IntoResponse, AppError> {
    let manager = query.manager().unwrap_or_else(|| caller.id().to_string());
    let relation = state
        .users
        .get_worker(caller.id(), &manager, &worker_id)
        .await?;
    Ok(Json(relation))
}

pub async fn edit_user(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(req): Json<EditUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    let edit = UserEdit::try_from(req.edit_data)?;
    let user = state.users.edit_user(caller.id(), &req.user_id, edit).await?;
    Ok(Json(user))
}
