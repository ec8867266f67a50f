use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::groups::{
    CreateGroupRequest, EditGroupRequest, GroupIntegratorRequest, GroupUserRequest, GroupsQuery,
};
use crate::dtos::non_empty;
use crate::dtos::users::ManagerQuery;
use crate::middleware::CallerIdentity;
use crate::AppState;

pub async fn create_group(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(req): Json<CreateGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner = non_empty(req.user_id);
    let group = state
        .groups
        .create_group(caller.id(), owner.as_deref(), &req.name)
        .await?;
    Ok(Json(group))
}

pub async fn get_groups(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<GroupsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let user = query.user();
    let groups = state.groups.get_groups(caller.id(), user.as_deref()).await?;
    Ok(Json(groups))
}

pub async fn get_group(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((_, group_id)): Path<(String, String)>,
    Query(query): Query<ManagerQuery>,
) -> Result<impl IntoResponse, AppError> {
    let manager = query.manager();
    let relation = state
        .groups
        .get_group(caller.id(), manager.as_deref(), &group_id)
        .await?;
    Ok(Json(relation))
}

pub async fn edit_group(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(req): Json<EditGroupRequest>,
) -> Result<impl IntoResponse, AppError> {
    let owner = non_empty(req.user_id);
    let group = state
        .groups
        .edit_group(caller.id(), owner.as_deref(), req.edit_data.into())
        .await?;
    Ok(Json(group))
}

pub async fn add_user_to_group(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(req): Json<GroupUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let manager = non_empty(req.manager_id);
    let relation = state
        .groups
        .add_user_to_group(caller.id(), manager.as_deref(), &req.group_id, &req.user_id)
        .await?;
    Ok(Json(relation))
}

pub async fn remove_user_from_group(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(req): Json<GroupUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let manager = non_empty(req.manager_id);
    let relation = state
        .groups
        .remove_user_from_group(caller.id(), manager.as_deref(), &req.group_id, &req.user_id)
        .await?;
    Ok(Json(relation))
}

pub async fn add_integrator_to_group(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(req): Json<GroupIntegratorRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let manager = non_empty(req.manager_id);
    let relation = state
        .groups
        .add_integrator_to_group(caller.id(), manager.as_deref(), &req.group_id, &req.integrator_id)
        .await?;
    Ok(Json(relation))
}

pub async fn remove_integrator_from_group(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(req): Json<GroupIntegratorRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let manager = non_empty(req.manager_id);
    let relation = state
        .groups
        .remove_integrator_from_group(caller.id(), manager.as_deref(), &req.group_id, &req.integrator_id)
        .await?;
    Ok(Json(relation))
}

pub async fn get_integrators_from_groups(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<GroupsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let group_ids = query.group_ids();
    if group_ids.is_empty() {
        return Err(AppError::BadRequest(anyhow::anyhow!("groups cannot be empty")));
    }
    let user = query.user();
    let groups = state
        .groups
        .get_integrators_from_groups(caller.id(), user.as_deref(), &group_ids)
        .await?;
    Ok(Json(groups))
}

pub async fn get_groups_for_users(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<ManagerQuery>,
) -> Result<impl IntoResponse, AppError> {
    let manager = query.manager();
    let listing = state
        .groups
        .get_groups_for_users(caller.id(), manager.as_deref())
        .await?;
    Ok(Json(listing))
}
