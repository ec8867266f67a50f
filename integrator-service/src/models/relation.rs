//! Adjacency rows: one-directional ownership and membership edges.
//!
//! An edge is stored as `{PK: owner, SK: "<kind>#<member>", isDeleted?}`.
//! The sort-key prefix is the only place the member kind is encoded; everything
//! above this module works with [`MemberKind`] and [`Relation`].

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MemberKind {
    User,
    Integrator,
    Group,
}

impl MemberKind {
    pub const ALL: [MemberKind; 3] = [MemberKind::User, MemberKind::Integrator, MemberKind::Group];

    /// Sort-key prefix of adjacency rows pointing at this kind.
    pub fn prefix(self) -> &'static str {
        match self {
            MemberKind::User => "user#",
            MemberKind::Integrator => "integrator#",
            MemberKind::Group => "group#",
        }
    }

    /// Sort key of the entity row itself.
    pub fn entity_sort_key(self) -> &'static str {
        match self {
            MemberKind::User => "user",
            MemberKind::Integrator => "integrator",
            MemberKind::Group => "group",
        }
    }

    pub fn sort_key(self, member_id: &str) -> String {
        format!("{}{}", self.prefix(), member_id)
    }

    /// Recovers the member id from an adjacency sort key of this kind.
    pub fn member_id(self, sort_key: &str) -> Option<&str> {
        sort_key
            .strip_prefix(self.prefix())
            .filter(|id| !id.is_empty())
    }

    pub fn parse_sort_key(sort_key: &str) -> Option<(MemberKind, &str)> {
        Self::ALL
            .into_iter()
            .find_map(|kind| kind.member_id(sort_key).map(|id| (kind, id)))
    }
}

impl fmt::Display for MemberKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entity_sort_key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "RelationRow", try_from = "RelationRow")]
pub struct Relation {
    pub owner_id: String,
    pub member_id: String,
    pub kind: MemberKind,
    pub is_deleted: Option<bool>,
}

impl Relation {
    pub fn new(owner_id: impl Into<String>, kind: MemberKind, member_id: impl Into<String>) -> Self {
        Self {
            owner_id: owner_id.into(),
            member_id: member_id.into(),
            kind,
            is_deleted: None,
        }
    }

    pub fn user(owner_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self::new(owner_id, MemberKind::User, user_id)
    }

    pub fn integrator(owner_id: impl Into<String>, integrator_id: impl Into<String>) -> Self {
        Self::new(owner_id, MemberKind::Integrator, integrator_id)
    }

    pub fn group(owner_id: impl Into<String>, group_id: impl Into<String>) -> Self {
        Self::new(owner_id, MemberKind::Group, group_id)
    }

    pub fn sort_key(&self) -> String {
        self.kind.sort_key(&self.member_id)
    }

    /// False once the edge has been soft-deleted.
    pub fn is_active(&self) -> bool {
        self.is_deleted != Some(true)
    }

    pub fn as_user(&self) -> Option<&str> {
        self.member_of(MemberKind::User)
    }

    pub fn as_integrator(&self) -> Option<&str> {
        self.member_of(MemberKind::Integrator)
    }

    pub fn as_group(&self) -> Option<&str> {
        self.member_of(MemberKind::Group)
    }

    fn member_of(&self, kind: MemberKind) -> Option<&str> {
        (self.kind == kind).then_some(self.member_id.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RelationRow {
    #[serde(rename = "PK")]
    pk: String,
    #[serde(rename = "SK")]
    sk: String,
    #[serde(rename = "isDeleted", default, skip_serializing_if = "Option::is_none")]
    is_deleted: Option<bool>,
}

impl From<Relation> for RelationRow {
    fn from(relation: Relation) -> Self {
        Self {
            sk: relation.sort_key(),
            pk: relation.owner_id,
            is_deleted: relation.is_deleted,
        }
    }
}

impl TryFrom<RelationRow> for Relation {
    type Error = String;

    fn try_from(row: RelationRow) -> Result<Self, Self::Error> {
        let (kind, member_id) = MemberKind::parse_sort_key(&row.sk)
            .ok_or_else(|| format!("Not an adjacency sort key: {}", row.sk))?;
        Ok(Self {
            member_id: member_id.to_string(),
            owner_id: row.pk,
            kind,
            is_deleted: row.is_deleted,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn sort_keys_carry_kind_prefix() {
        assert_eq!(MemberKind::User.sort_key("u1"), "user#u1");
        assert_eq!(MemberKind::Integrator.sort_key("i1"), "integrator#i1");
        assert_eq!(MemberKind::Group.sort_key("g1"), "group#g1");
    }

    #[test]
    fn member_id_requires_matching_prefix() {
        assert_eq!(MemberKind::Integrator.member_id("integrator#abc"), Some("abc"));
        assert_eq!(MemberKind::Group.member_id("integrator#abc"), None);
        assert_eq!(MemberKind::User.member_id("user#"), None);
        assert_eq!(MemberKind::User.member_id("user"), None);
    }

    #[test]
    fn parses_every_kind() {
        assert_eq!(
            MemberKind::parse_sort_key("group#g#1"),
            Some((MemberKind::Group, "g#1"))
        );
        assert_eq!(MemberKind::parse_sort_key("report#a/b"), None);
        assert_eq!(MemberKind::parse_sort_key("2024-01-01T00:00:00Z"), None);
    }

    #[test]
    fn relation_round_trips_through_row_shape() {
        let mut relation = Relation::group("u1", "g1");
        relation.is_deleted = Some(true);

        let value = serde_json::to_value(&relation).unwrap();
        assert_eq!(value, json!({ "PK": "u1", "SK": "group#g1", "isDeleted": true }));

        let back: Relation = serde_json::from_value(value).unwrap();
        assert_eq!(back, relation);
        assert_eq!(back.as_group(), Some("g1"));
        assert_eq!(back.as_user(), None);
        assert!(!back.is_active());
    }

    #[test]
    fn rejects_rows_that_are_not_edges() {
        let result: Result<Relation, _> = serde_json::from_value(json!({ "PK": "u1", "SK": "user" }));
        assert!(result.is_err());
    }
}
