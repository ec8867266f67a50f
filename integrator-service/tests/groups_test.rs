mod common;

use common::{TestApp, MANAGER, SERVICE, WORKER};
use integrator_service::models::{IntegratorGroup, MemberKind, Relation};
use integrator_service::services::{GroupEdit, ServiceError};

async fn manager_with_group() -> TestApp {
    let app = TestApp::seeded().await;
    app.add_group("g1", MANAGER).await;
    app.add_integrator("i1", MANAGER).await;
    app
}

#[tokio::test]
async fn created_group_is_listed_for_its_owner() {
    let app = TestApp::seeded().await;

    let group = app
        .state
        .groups
        .create_group(SERVICE, Some(MANAGER), "North line")
        .await
        .unwrap();
    let groups = app.state.groups.get_groups(MANAGER, None).await.unwrap();

    assert_eq!(groups, vec![group]);
}

#[tokio::test]
async fn owner_without_groups_is_an_error() {
    let app = TestApp::seeded().await;

    let err = app.state.groups.get_groups(MANAGER, None).await.unwrap_err();

    assert_eq!(
        err.message(),
        "Error getting integrator groups: No result.Items"
    );
}

#[tokio::test]
async fn adding_user_twice_keeps_one_active_edge() {
    let app = manager_with_group().await;

    let first = app
        .state
        .groups
        .add_user_to_group(MANAGER, None, "g1", WORKER)
        .await
        .unwrap();
    let second = app
        .state
        .groups
        .add_user_to_group(MANAGER, None, "g1", WORKER)
        .await
        .unwrap();

    assert_eq!(first, second);
    assert!(second.is_active());
    let edges = app.db.relations(WORKER, MemberKind::Group).await.unwrap();
    assert_eq!(edges.len(), 1);
}

#[tokio::test]
async fn re_adding_removed_user_restores_the_edge() {
    let app = manager_with_group().await;
    app.state
        .groups
        .add_user_to_group(MANAGER, None, "g1", WORKER)
        .await
        .unwrap();
    let removed = app
        .state
        .groups
        .remove_user_from_group(MANAGER, None, "g1", WORKER)
        .await
        .unwrap();
    assert!(!removed.is_active());

    let restored = app
        .state
        .groups
        .add_user_to_group(MANAGER, None, "g1", WORKER)
        .await
        .unwrap();

    assert_eq!(restored.is_deleted, Some(false));
}

#[tokio::test]
async fn manager_cannot_be_removed_from_own_group() {
    let app = manager_with_group().await;

    let err = app
        .state
        .groups
        .remove_user_from_group(MANAGER, None, "g1", MANAGER)
        .await
        .unwrap_err();

    assert_eq!(err, ServiceError::validation("A manager cannot be removed from a group!"));
}

#[tokio::test]
async fn foreign_group_fails_integrators_lookup() {
    let app = manager_with_group().await;
    app.add_group("g9", "m2").await;
    app.link(Relation::group(WORKER, "g1")).await;
    app.link(Relation::integrator("g1", "i1")).await;

    let ok = app
        .state
        .groups
        .get_integrators_from_groups(WORKER, None, &["g1".to_string()])
        .await
        .unwrap();
    assert_eq!(ok.len(), 1);
    assert_eq!(ok[0].integrators[0].id, "i1");

    let err = app
        .state
        .groups
        .get_integrators_from_groups(WORKER, None, &["g1".to_string(), "g9".to_string()])
        .await
        .unwrap_err();
    assert_eq!(err, ServiceError::validation("User not in group: g9"));
}

#[tokio::test]
async fn manager_lookup_of_unowned_group_names_the_group() {
    let app = manager_with_group().await;
    app.add_group("g9", "m2").await;

    let err = app
        .state
        .groups
        .get_integrators_from_groups(MANAGER, Some(MANAGER), &["g9".to_string()])
        .await
        .unwrap_err();

    assert_eq!(err, ServiceError::validation("User not in group: g9"));
    assert_eq!(err.message(), "User not in group: g9");
}

#[tokio::test]
async fn first_requested_group_outside_membership_fails_the_lookup() {
    let app = manager_with_group().await;
    app.add_group("g9", "m2").await;
    app.link(Relation::integrator("g1", "i1")).await;

    let err = app
        .state
        .groups
        .get_integrators_from_groups(MANAGER, None, &["g9".to_string(), "g1".to_string()])
        .await
        .unwrap_err();

    assert_eq!(err, ServiceError::validation("User not in group: g9"));
}

#[tokio::test]
async fn overlapping_groups_stay_separate_in_request_order() {
    let app = manager_with_group().await;
    app.add_group("g2", MANAGER).await;
    app.link(Relation::integrator("g1", "i1")).await;
    app.link(Relation::integrator("g2", "i1")).await;

    let resolved = app
        .state
        .groups
        .get_integrators_from_groups(MANAGER, None, &["g2".to_string(), "g1".to_string()])
        .await
        .unwrap();

    let order: Vec<&str> = resolved.iter().map(|entry| entry.group_id.as_str()).collect();
    assert_eq!(order, vec!["g2", "g1"]);
    for entry in &resolved {
        let ids: Vec<&str> = entry.integrators.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["i1"]);
    }
    assert_eq!(
        serde_json::to_value(&resolved).unwrap()[0]["g2"][0]["PK"],
        "i1"
    );
}

#[tokio::test]
async fn integrator_membership_round_trip() {
    let app = manager_with_group().await;

    app.state
        .groups
        .add_integrator_to_group(MANAGER, None, "g1", "i1")
        .await
        .unwrap();
    app.state
        .groups
        .remove_integrator_from_group(MANAGER, None, "g1", "i1")
        .await
        .unwrap();

    let err = app
        .state
        .groups
        .remove_integrator_from_group(MANAGER, None, "g1", "i2")
        .await
        .unwrap_err();
    assert!(err.message().starts_with("Error in managerHasIntegratorWithID"));
}

#[tokio::test]
async fn renaming_and_deleting_together_is_rejected() {
    let app = manager_with_group().await;

    let err = app
        .state
        .groups
        .edit_group(
            MANAGER,
            None,
            GroupEdit {
                group_id: "g1".to_string(),
                name: Some("Renamed".to_string()),
                is_deleted: Some(true),
            },
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));

    let renamed = app
        .state
        .groups
        .edit_group(
            MANAGER,
            None,
            GroupEdit {
                group_id: "g1".to_string(),
                name: Some("Renamed".to_string()),
                is_deleted: None,
            },
        )
        .await
        .unwrap();
    let stored: Option<IntegratorGroup> = app.db.find_entity("g1").await.unwrap();
    assert_eq!(stored, Some(renamed));
}

#[tokio::test]
async fn groups_for_users_lists_workers_without_groups() {
    let app = manager_with_group().await;

    let listing = app
        .state
        .groups
        .get_groups_for_users(MANAGER, None)
        .await
        .unwrap();

    assert_eq!(listing.len(), 1);
    assert_eq!(listing[0].user.id, WORKER);
    assert!(listing[0].groups.is_empty());
}
