//! User model - accounts mirrored from the identity provider.

use super::Entity;
use serde::{Deserialize, Serialize};

/// Role flags as stored on the user row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRole {
    #[serde(default)]
    pub is_service: bool,
    #[serde(default)]
    pub is_manager: bool,
}

impl UserRole {
    pub const WORKER: UserRole = UserRole {
        is_service: false,
        is_manager: false,
    };
    pub const MANAGER: UserRole = UserRole {
        is_service: false,
        is_manager: true,
    };
    pub const SERVICE: UserRole = UserRole {
        is_service: true,
        is_manager: false,
    };
}

/// Identity attribute, e.g. `email` or `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAttribute {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value")]
    pub value: String,
}

impl UserAttribute {
    pub const EMAIL: &'static str = "email";
    pub const SUB: &'static str = "sub";

    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "PK")]
    pub id: String,
    #[serde(default)]
    pub role: UserRole,
    #[serde(rename = "cognitoAttributes", default)]
    pub attributes: Vec<UserAttribute>,
    #[serde(rename = "isDeleted", skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
}

impl User {
    pub fn new(id: impl Into<String>, role: UserRole, attributes: Vec<UserAttribute>) -> Self {
        Self {
            id: id.into(),
            role,
            attributes,
            is_deleted: None,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|attr| attr.name == name)
            .map(|attr| attr.value.as_str())
    }

    /// Replaces attributes with the same name and appends new ones.
    pub fn merge_attributes(&mut self, updates: Vec<UserAttribute>) {
        for update in updates {
            match self.attributes.iter_mut().find(|attr| attr.name == update.name) {
                Some(existing) => existing.value = update.value,
                None => self.attributes.push(update),
            }
        }
    }
}

impl Entity for User {
    const SORT_KEY: &'static str = "user";

    fn id(&self) -> &str {
        &self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_table_field_names() {
        let user = User::new(
            "u1",
            UserRole::MANAGER,
            vec![UserAttribute::new("email", "m@example.com")],
        );
        let value = serde_json::to_value(&user).unwrap();
        assert_eq!(
            value,
            json!({
                "PK": "u1",
                "role": { "isService": false, "isManager": true },
                "cognitoAttributes": [{ "Name": "email", "Value": "m@example.com" }]
            })
        );
    }

    #[test]
    fn reads_attributes_from_existing_rows() {
        let user: User = serde_json::from_value(json!({
            "PK": "m1",
            "SK": "user",
            "role": { "isService": false, "isManager": true },
            "cognitoAttributes": [{ "Name": "email", "Value": "m@example.com" }]
        }))
        .unwrap();
        assert_eq!(user.attribute("email"), Some("m@example.com"));
    }

    #[test]
    fn missing_role_flags_default_to_worker() {
        let user: User = serde_json::from_value(json!({ "PK": "w1", "role": {} })).unwrap();
        assert_eq!(user.role, UserRole::WORKER);
        assert!(user.attributes.is_empty());
    }

    #[test]
    fn merge_attributes_replaces_by_name() {
        let mut user = User::new(
            "u1",
            UserRole::WORKER,
            vec![
                UserAttribute::new("email", "a@example.com"),
                UserAttribute::new("name", "Ann"),
            ],
        );
        user.merge_attributes(vec![
            UserAttribute::new("name", "Anna"),
            UserAttribute::new("phone_number", "+100"),
        ]);

        assert_eq!(user.attribute("name"), Some("Anna"));
        assert_eq!(user.attribute("phone_number"), Some("+100"));
        assert_eq!(user.attributes.len(), 3);
    }
}
