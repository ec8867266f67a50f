use super::Entity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegratorGroup {
    #[serde(rename = "PK")]
    pub id: String,
    pub integrator_group_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
}

impl IntegratorGroup {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            integrator_group_name: name.into(),
            is_deleted: None,
        }
    }
}

impl Entity for IntegratorGroup {
    const SORT_KEY: &'static str = "group";

    fn id(&self) -> &str {
        &self.id
    }
}
