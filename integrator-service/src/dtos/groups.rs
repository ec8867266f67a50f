use serde::Deserialize;
use validator::Validate;

use super::non_empty;
use crate::services::GroupEdit;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGroupRequest {
    #[serde(rename = "integratorGroupName")]
    #[validate(length(min = 1, message = "integratorGroupName is required"))]
    pub name: String,
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct GroupsQuery {
    #[serde(rename = "groupsFor")]
    pub groups_for: Option<String>,
    /// Comma separated group ids.
    pub groups: Option<String>,
}

impl GroupsQuery {
    pub fn user(&self) -> Option<String> {
        non_empty(self.groups_for.clone())
    }

    pub fn group_ids(&self) -> Vec<String> {
        self.groups
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditGroupData {
    #[serde(rename = "PK")]
    pub id: String,
    pub integrator_group_name: Option<String>,
    pub is_deleted: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct EditGroupRequest {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
    #[serde(rename = "editData")]
    pub edit_data: EditGroupData,
}

impl From<EditGroupData> for GroupEdit {
    fn from(data: EditGroupData) -> Self {
        GroupEdit {
            group_id: data.id,
            name: data.integrator_group_name,
            is_deleted: data.is_deleted,
        }
    }
}

/// Body of both add and remove user calls.
#[derive(Debug, Deserialize, Validate)]
pub struct GroupUserRequest {
    #[serde(rename = "integratorGroupID")]
    #[validate(length(min = 1, message = "integratorGroupID is required"))]
    pub group_id: String,
    #[serde(rename = "userID", alias = "addedUserID", alias = "removedUserID")]
    #[validate(length(min = 1, message = "userID is required"))]
    pub user_id: String,
    #[serde(rename = "managerID")]
    pub manager_id: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct GroupIntegratorRequest {
    #[serde(rename = "integratorGroupID")]
    #[validate(length(min = 1, message = "integratorGroupID is required"))]
    pub group_id: String,
    #[serde(rename = "integratorID")]
    #[validate(length(min = 1, message = "integratorID is required"))]
    pub integrator_id: String,
    #[serde(rename = "managerID")]
    pub manager_id: Option<String>,
}
