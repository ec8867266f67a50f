use super::UsageEntry;
use serde::{Deserialize, Serialize};

/// One requested slice of a report: a single integrator or a whole group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportRange {
    #[serde(rename = "targetID")]
    pub target_id: String,
    #[serde(rename = "isGroup", default)]
    pub is_group: bool,
    #[serde(rename = "rangeStart")]
    pub range_start: String,
    #[serde(rename = "rangeEnd")]
    pub range_end: String,
}

/// `[key, entries]` where key is `group#<id>` or `integrator#<id>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportPartition(pub String, pub Vec<UsageEntry>);

impl ReportPartition {
    pub fn key(&self) -> &str {
        &self.0
    }

    pub fn entries(&self) -> &[UsageEntry] {
        &self.1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub report_name: String,
    pub data: Vec<ReportPartition>,
}

/// Row pointing at a stored report blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPointer {
    #[serde(rename = "PK")]
    pub requester_id: String,
    #[serde(rename = "SK")]
    pub sort_key: String,
}

impl ReportPointer {
    pub const PREFIX: &'static str = "report#";

    pub fn new(requester_id: impl Into<String>, path: &str) -> Self {
        Self {
            requester_id: requester_id.into(),
            sort_key: format!("{}{}", Self::PREFIX, path),
        }
    }

    /// Object-store path without the `.json` suffix.
    pub fn path(&self) -> &str {
        self.sort_key
            .strip_prefix(Self::PREFIX)
            .unwrap_or(&self.sort_key)
    }
}
