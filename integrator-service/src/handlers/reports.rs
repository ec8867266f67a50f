use axum::{
    extract::{Query, State},
    response::IntoResponse,
    Json,
};
use service_core::error::AppError;
use validator::Validate;

use crate::dtos::reports::{CreateReportRequest, ReportQuery};
use crate::dtos::users::ManagerQuery;
use crate::middleware::CallerIdentity;
use crate::AppState;

/// Builds a report for the caller, or for `managerID` when a service user asks.
pub async fn create_report(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<ManagerQuery>,
    Json(req): Json<CreateReportRequest>,
) -> Result<impl IntoResponse, AppError> {
    req.validate()?;
    let owner = query.manager();
    let report = state
        .reports
        .create_report(caller.id(), owner.as_deref(), &req.report_name, &req.data)
        .await?;
    Ok(Json(report))
}

pub async fn get_reports(
    State(state): State<AppState>,
    caller: CallerIdentity,
) -> Result<impl IntoResponse, AppError> {
    let pointers = state.reports.get_reports(caller.id()).await?;
    Ok(Json(pointers))
}

pub async fn get_report(
    State(state): State<AppState>,
    caller: CallerIdentity,
    Query(query): Query<ReportQuery>,
) -> Result<impl IntoResponse, AppError> {
    let data = state.reports.get_report(caller.id(), &query.report_id).await?;
    Ok(Json(data))
}
