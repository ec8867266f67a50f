use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::integrators::{
    CreateEntriesRequest, CreateIntegratorRequest, EditIntegratorRequest, IntegratorsQuery,
};
use crate::dtos::non_empty;
use crate::dtos::users::ManagerQuery;
use crate::middleware::CallerIdentity;
use crate::AppState;

pub async fn create_integrator(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(req): Json<CreateIntegratorRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner = non_empty(req.user_id);
    let integrator = state
        .integrators
        .create_integrator(caller.id(), owner.as_deref(), &req.location, &req.serial_number)
        .await?;
    Ok(Json(integrator))
}

pub async fn get_integrators(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<IntegratorsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let owner = query.owner();
    let integrators = state
        .integrators
        .get_integrators(caller.id(), owner.as_deref())
        .await?;
    Ok(Json(integrators))
}

pub async fn get_integrator(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Path((_, integrator_id)): Path<(String, String)>,
    Query(query): Query<ManagerQuery>,
) -> Result<impl IntoResponse, AppError> {
    let manager = query.manager();
    let relation = state
        .integrators
        .get_integrator(caller.id(), manager.as_deref(), &integrator_id)
        .await?;
    Ok(Json(relation))
}

pub async fn edit_integrator(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(req): Json<EditIntegratorRequest>,
) -> Result<impl IntoResponse, AppError> {
    let owner = non_empty(req.user_id);
    let integrator = state
        .integrators
        .edit_integrator(caller.id(), owner.as_deref(), req.edit_data.into())
        .await?;
    Ok(Json(integrator))
}

pub async fn create_entries(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Json(req): Json<CreateEntriesRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner = non_empty(req.user_id);
    let entries = req
        .entries
        .into_iter()
        .map(|entry| (entry.timestamp, entry.total_crushed))
        .collect();
    let created = state
        .integrators
        .create_entries(caller.id(), owner.as_deref(), &req.integrator_id, entries)
        .await?;
    Ok(Json(created))
}
