use serde::Deserialize;
use validator::Validate;

use super::non_empty;
use crate::models::{UserAttribute, UserRole};
use crate::services::{NewUser, ServiceError, UserEdit};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Missing username"))]
    pub username: String,
    #[serde(default)]
    pub user_attributes: Vec<UserAttribute>,
    #[serde(default)]
    pub role: UserRole,
    pub manager: Option<String>,
}

impl From<RegisterRequest> for NewUser {
    fn from(req: RegisterRequest) -> Self {
        NewUser {
            username: req.username,
            attributes: req.user_attributes,
            role: req.role,
            manager: non_empty(req.manager),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    #[serde(rename = "userID")]
    pub user_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManagerQuery {
    #[serde(rename = "managerID")]
    pub manager_id: Option<String>,
}

impl ManagerQuery {
    pub fn manager(&self) -> Option<String> {
        non_empty(self.manager_id.clone())
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EditUserData {
    pub is_deleted: Option<bool>,
    #[serde(alias = "cognitoAttributes")]
    pub user_attributes: Option<Vec<UserAttribute>>,
}

#[derive(Debug, Deserialize)]
pub struct EditUserRequest {
    #[serde(rename = "userID")]
    pub user_id: String,
    #[serde(rename = "editData")]
    pub edit_data: EditUserData,
}

impl TryFrom<EditUserData> for UserEdit {
    type Error = ServiceError;

    fn try_from(data: EditUserData) -> Result<Self, Self::Error> {
        match (data.is_deleted, data.user_attributes) {
            (Some(is_deleted), None) => Ok(UserEdit::SetDeleted(is_deleted)),
            (None, Some(attributes)) if !attributes.is_empty() => Ok(UserEdit::Attributes(attributes)),
            (Some(_), Some(_)) => Err(ServiceError::validation(
                "isDeleted cannot be changed together with userAttributes",
            )),
            _ => Err(ServiceError::validation("Nothing to change")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn legacy_attribute_key_is_accepted() {
        let data: EditUserData = serde_json::from_value(json!({
            "cognitoAttributes": [{ "Name": "name", "Value": "Ann" }]
        }))
        .unwrap();
        assert_eq!(
            UserEdit::try_from(data).unwrap(),
            UserEdit::Attributes(vec![UserAttribute::new("name", "Ann")])
        );
    }

    #[test]
    fn delete_flag_excludes_attribute_edits() {
        let data = EditUserData {
            is_deleted: Some(true),
            user_attributes: Some(vec![UserAttribute::new("name", "Ann")]),
        };
        assert!(matches!(UserEdit::try_from(data), Err(ServiceError::Validation(_))));
    }

    #[test]
    fn register_defaults_to_worker_role() {
        let req: RegisterRequest = serde_json::from_value(json!({
            "username": "w@example.com",
            "manager": ""
        }))
        .unwrap();
        let user = NewUser::from(req);
        assert_eq!(user.role, UserRole::WORKER);
        assert_eq!(user.manager, None);
    }
}
