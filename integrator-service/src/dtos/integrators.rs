use serde::Deserialize;
use validator::Validate;

use super::non_empty;
use crate::models::IntegratorStatus;
use crate::services::IntegratorEdit;

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateIntegratorRequest {
    #[validate(length(min = 1, message = "location is required"))]
    pub location: String,
    #[validate(length(min = 1, message = "serialNumber is required"))]
    pub serial_number: String,
    /// Owner when a service user creates on behalf of a manager.
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct IntegratorsQuery {
    #[serde(rename = "createdFor")]
    pub created_for: Option<String>,
}

impl IntegratorsQuery {
    pub fn owner(&self) -> Option<String> {
        non_empty(self.created_for.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditIntegratorData {
    #[serde(rename = "PK")]
    pub id: String,
    pub location: Option<String>,
    pub serial_number: Option<String>,
    pub status: Option<IntegratorStatus>,
    pub is_deleted: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct EditIntegratorRequest {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
    #[serde(rename = "editData")]
    pub edit_data: EditIntegratorData,
}

impl From<EditIntegratorData> for IntegratorEdit {
    fn from(data: EditIntegratorData) -> Self {
        IntegratorEdit {
            integrator_id: data.id,
            location: data.location,
            serial_number: data.serial_number,
            status: data.status,
            is_deleted: data.is_deleted,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct EntryInput {
    #[serde(rename = "SK")]
    pub timestamp: String,
    #[serde(rename = "totalCrushed")]
    pub total_crushed: f64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateEntriesRequest {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
    #[serde(rename = "integratorID")]
    #[validate(length(min = 1, message = "integratorID is required"))]
    pub integrator_id: String,
    #[serde(rename = "integratorEntries", default)]
    pub entries: Vec<EntryInput>,
}
