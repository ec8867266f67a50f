use super::Entity;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IntegratorStatus {
    #[default]
    On,
    Off,
}

/// A tracked physical device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Integrator {
    #[serde(rename = "PK")]
    pub id: String,
    pub location: String,
    pub serial_number: String,
    #[serde(default)]
    pub status: IntegratorStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_deleted: Option<bool>,
}

impl Integrator {
    pub fn new(id: impl Into<String>, location: impl Into<String>, serial_number: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: location.into(),
            serial_number: serial_number.into(),
            status: IntegratorStatus::On,
            is_deleted: None,
        }
    }
}

impl Entity for Integrator {
    const SORT_KEY: &'static str = "integrator";

    fn id(&self) -> &str {
        &self.id
    }
}
