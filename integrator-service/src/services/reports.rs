//! Usage reports over date ranges.
//!
//! A report is built from range queries against usage entries, partitioned by
//! the requested group or integrator, stored as a JSON blob and indexed by a
//! pointer row under the requester.

use futures::future::try_join_all;
use std::sync::Arc;

use crate::models::{MemberKind, Report, ReportPartition, ReportPointer, ReportRange, UsageEntry};

use super::authz::{Action, Authorizer};
use super::database::Database;
use super::error::{ResultExt, ServiceError};
use super::object_store::ObjectStore;
use super::resolver::Resolver;

/// One range query, tagged with the partition its rows belong to.
#[derive(Debug, Clone)]
struct RangeQuery {
    partition: String,
    integrator_id: String,
    range_start: String,
    range_end: String,
}

pub struct ReportService {
    db: Database,
    authz: Authorizer,
    resolver: Resolver,
    objects: Arc<dyn ObjectStore>,
}

impl ReportService {
    pub fn new(db: Database, objects: Arc<dyn ObjectStore>) -> Self {
        Self {
            authz: Authorizer::new(db.clone()),
            resolver: Resolver::new(db.clone()),
            db,
            objects,
        }
    }

    pub async fn create_report(
        &self,
        requester_id: &str,
        owner_id: Option<&str>,
        report_name: &str,
        ranges: &[ReportRange],
    ) -> Result<Report, ServiceError> {
        let grant = self.authz.authorize(requester_id, owner_id, Action::Inspect).await?;

        if report_name.trim().is_empty() {
            return Err(ServiceError::validation("reportName cannot be empty"));
        }
        if ranges.is_empty() {
            return Err(ServiceError::validation("Data must have length greater than 0!"));
        }

        let queries = self.plan_queries(&grant.owner_id, ranges).await?;
        let results = try_join_all(queries.iter().map(|query| {
            self.db
                .entries_between(&query.integrator_id, &query.range_start, &query.range_end)
        }))
        .await
        .context("Error querying integrator entries")?;

        let data = partition_results(ranges, &queries, results);

        let path = if grant.is_self() {
            format!("{}/{}", requester_id, report_name)
        } else {
            format!("{}/{}/{}", requester_id, grant.owner_id, report_name)
        };
        self.db
            .put_report_pointer(&ReportPointer::new(requester_id, &path))
            .await
            .context("Error saving report")?;

        let body = serde_json::to_vec(&data).map_err(|e| ServiceError::internal(e.to_string()))?;
        self.objects
            .put_object(&format!("{}.json", path), body)
            .await
            .map_err(ServiceError::from)
            .context("Error saving report")?;

        tracing::info!(
            requester_id = %requester_id,
            owner_id = %grant.owner_id,
            path = %path,
            partitions = data.len(),
            queries = queries.len(),
            "Report created"
        );
        Ok(Report {
            report_name: report_name.to_string(),
            data,
        })
    }

    async fn plan_queries(
        &self,
        owner_id: &str,
        ranges: &[ReportRange],
    ) -> Result<Vec<RangeQuery>, ServiceError> {
        let mut queries = Vec::new();

        for range in ranges {
            if range.is_group {
                let groups = self
                    .resolver
                    .integrators_from_groups(owner_id, std::slice::from_ref(&range.target_id))
                    .await
                    .context("Error in integratorsFromGroups")?;
                let partition = MemberKind::Group.sort_key(&range.target_id);
                for integrator in groups.iter().flat_map(|group| group.integrators.iter()) {
                    queries.push(RangeQuery {
                        partition: partition.clone(),
                        integrator_id: integrator.id.clone(),
                        range_start: range.range_start.clone(),
                        range_end: range.range_end.clone(),
                    });
                }
            } else {
                self.authz
                    .require_member(owner_id, MemberKind::Integrator, &range.target_id)
                    .await?;
                queries.push(RangeQuery {
                    partition: MemberKind::Integrator.sort_key(&range.target_id),
                    integrator_id: range.target_id.clone(),
                    range_start: range.range_start.clone(),
                    range_end: range.range_end.clone(),
                });
            }
        }

        Ok(queries)
    }

    pub async fn get_reports(&self, requester_id: &str) -> Result<Vec<ReportPointer>, ServiceError> {
        self.authz.authorize(requester_id, None, Action::Inspect).await?;
        self.db.report_pointers(requester_id).await
    }

    /// Loads a stored report by its path (without the `.json` suffix).
    pub async fn get_report(&self, requester_id: &str, path: &str) -> Result<Vec<ReportPartition>, ServiceError> {
        self.authz.authorize(requester_id, None, Action::Inspect).await?;

        let body = self
            .objects
            .get_object(&format!("{}.json", path))
            .await
            .map_err(ServiceError::from)?;
        serde_json::from_slice(&body)
            .map_err(|e| ServiceError::internal(format!("Stored report is not valid JSON: {}", e)))
    }
}

/// Groups the query results per partition key.
///
/// Group partitions come first, in order of first appearance, each filtered to
/// the bounds of the group's first range. Integrator partitions follow; a
/// repeated integrator keeps its first position and takes the later result.
/// Exact duplicates are dropped inside every partition.
fn partition_results(
    ranges: &[ReportRange],
    queries: &[RangeQuery],
    results: Vec<Vec<UsageEntry>>,
) -> Vec<ReportPartition> {
    let mut groups: Vec<(String, &ReportRange, Vec<UsageEntry>)> = Vec::new();
    for range in ranges.iter().filter(|range| range.is_group) {
        let key = MemberKind::Group.sort_key(&range.target_id);
        if !groups.iter().any(|(existing, _, _)| *existing == key) {
            groups.push((key, range, Vec::new()));
        }
    }

    let mut integrators: Vec<ReportPartition> = Vec::new();
    for (query, entries) in queries.iter().zip(results) {
        if let Some((_, bounds, collected)) = groups.iter_mut().find(|(key, _, _)| *key == query.partition) {
            for entry in entries {
                if entry.within(&bounds.range_start, &bounds.range_end) && !collected.contains(&entry) {
                    collected.push(entry);
                }
            }
            continue;
        }

        let entries = dedup(entries);
        match integrators.iter_mut().find(|partition| partition.0 == query.partition) {
            Some(existing) => existing.1 = entries,
            None => integrators.push(ReportPartition(query.partition.clone(), entries)),
        }
    }

    groups
        .into_iter()
        .map(|(key, _, entries)| ReportPartition(key, entries))
        .chain(integrators)
        .collect()
}

fn dedup(entries: Vec<UsageEntry>) -> Vec<UsageEntry> {
    let mut unique: Vec<UsageEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        if !unique.contains(&entry) {
            unique.push(entry);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(integrator: &str, timestamp: &str, total: f64) -> UsageEntry {
        UsageEntry {
            integrator_id: integrator.to_string(),
            timestamp: timestamp.to_string(),
            total_crushed: total,
        }
    }

    fn range(target: &str, is_group: bool, start: &str, end: &str) -> ReportRange {
        ReportRange {
            target_id: target.to_string(),
            is_group,
            range_start: start.to_string(),
            range_end: end.to_string(),
        }
    }

    fn query(partition: &str, integrator: &str, start: &str, end: &str) -> RangeQuery {
        RangeQuery {
            partition: partition.to_string(),
            integrator_id: integrator.to_string(),
            range_start: start.to_string(),
            range_end: end.to_string(),
        }
    }

    #[test]
    fn repeated_group_uses_first_bounds() {
        let ranges = vec![
            range("g1", true, "2024-01-01", "2024-01-31"),
            range("g1", true, "2024-02-01", "2024-02-28"),
        ];
        let queries = vec![
            query("group#g1", "i1", "2024-01-01", "2024-01-31"),
            query("group#g1", "i1", "2024-02-01", "2024-02-28"),
        ];
        let results = vec![
            vec![entry("i1", "2024-01-05", 1.0)],
            vec![entry("i1", "2024-02-05", 2.0)],
        ];

        let data = partition_results(&ranges, &queries, results);
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].key(), "group#g1");
        assert_eq!(data[0].entries(), &[entry("i1", "2024-01-05", 1.0)]);
    }

    #[test]
    fn groups_precede_integrators_and_duplicates_collapse() {
        let ranges = vec![
            range("i2", false, "a", "z"),
            range("g1", true, "a", "z"),
        ];
        let queries = vec![
            query("integrator#i2", "i2", "a", "z"),
            query("group#g1", "i1", "a", "z"),
            query("group#g1", "i3", "a", "z"),
        ];
        let shared = entry("i1", "m", 4.0);
        let results = vec![
            vec![entry("i2", "b", 1.0), entry("i2", "b", 1.0)],
            vec![shared.clone()],
            vec![shared.clone(), entry("i3", "n", 5.0)],
        ];

        let data = partition_results(&ranges, &queries, results);
        assert_eq!(data[0].key(), "group#g1");
        assert_eq!(data[0].entries(), &[shared, entry("i3", "n", 5.0)]);
        assert_eq!(data[1].key(), "integrator#i2");
        assert_eq!(data[1].entries(), &[entry("i2", "b", 1.0)]);
    }

    #[test]
    fn repeated_integrator_keeps_position_and_takes_last_result() {
        let ranges = vec![
            range("i1", false, "a", "c"),
            range("i2", false, "a", "z"),
            range("i1", false, "d", "z"),
        ];
        let queries = vec![
            query("integrator#i1", "i1", "a", "c"),
            query("integrator#i2", "i2", "a", "z"),
            query("integrator#i1", "i1", "d", "z"),
        ];
        let results = vec![
            vec![entry("i1", "b", 1.0)],
            vec![],
            vec![entry("i1", "e", 2.0)],
        ];

        let data = partition_results(&ranges, &queries, results);
        assert_eq!(data.len(), 2);
        assert_eq!(data[0].key(), "integrator#i1");
        assert_eq!(data[0].entries(), &[entry("i1", "e", 2.0)]);
        assert_eq!(data[1].key(), "integrator#i2");
    }

    #[test]
    fn empty_group_still_gets_a_partition() {
        let ranges = vec![range("g1", true, "a", "z")];
        let data = partition_results(&ranges, &[], vec![]);
        assert_eq!(data, vec![ReportPartition("group#g1".to_string(), vec![])]);
    }
}
