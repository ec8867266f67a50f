//! Domain records as they are stored in the single table.
//!
//! Entity rows serialize to `{"PK": <id>, ...attributes}`; the sort key is
//! added by the store layer from [`Entity::SORT_KEY`].

pub mod entry;
pub mod group;
pub mod integrator;
pub mod relation;
pub mod report;
pub mod user;

pub use entry::UsageEntry;
pub use group::IntegratorGroup;
pub use integrator::{Integrator, IntegratorStatus};
pub use relation::{MemberKind, Relation};
pub use report::{Report, ReportPartition, ReportPointer, ReportRange};
pub use user::{User, UserAttribute, UserRole};

use serde::{de::DeserializeOwned, Serialize};

/// A top-level record whose sort key is a fixed type marker.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync {
    const SORT_KEY: &'static str;

    fn id(&self) -> &str;
}

/// 16 random bytes, hex encoded.
pub fn generate_id() -> String {
    hex::encode(rand::random::<[u8; 16]>())
}
