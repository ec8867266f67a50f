use serde::Deserialize;
use validator::Validate;

use crate::models::ReportRange;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateReportRequest {
    #[validate(length(min = 1, message = "reportName is required"))]
    pub report_name: String,
    #[serde(default)]
    pub data: Vec<ReportRange>,
}

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(rename = "reportID")]
    pub report_id: String,
}
