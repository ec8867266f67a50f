use super::MemberKind;
use serde::{Deserialize, Serialize};

/// One usage sample of an integrator, keyed by a time-ordered sort key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageEntry {
    #[serde(rename = "PK")]
    pub integrator_id: String,
    #[serde(rename = "SK")]
    pub timestamp: String,
    #[serde(rename = "totalCrushed")]
    pub total_crushed: f64,
}

impl UsageEntry {
    /// True for sort keys used by the entity and adjacency rows that share an
    /// integrator's partition. Usage entries may not take these keys.
    pub fn is_reserved_key(sort_key: &str) -> bool {
        MemberKind::ALL.into_iter().any(|kind| {
            sort_key == kind.entity_sort_key() || sort_key.starts_with(kind.prefix())
        })
    }

    /// Inclusive, lexicographic range check on the sort key.
    pub fn within(&self, range_start: &str, range_end: &str) -> bool {
        self.timestamp.as_str() >= range_start && self.timestamp.as_str() <= range_end
    }
}
