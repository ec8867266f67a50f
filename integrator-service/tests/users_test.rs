mod common;

use common::{TestApp, MANAGER, SERVICE, WORKER};
use integrator_service::models::{MemberKind, User, UserAttribute, UserRole};
use integrator_service::services::{LoginOutcome, NewUser, ServiceError, UserEdit};

fn new_worker(email: &str, manager: Option<&str>) -> NewUser {
    NewUser {
        username: email.to_string(),
        attributes: vec![UserAttribute::new(UserAttribute::EMAIL, email)],
        role: UserRole::WORKER,
        manager: manager.map(str::to_string),
    }
}

#[tokio::test]
async fn service_creates_worker_under_named_manager() {
    let app = TestApp::seeded().await;

    let user = app
        .state
        .users
        .create_user(SERVICE, new_worker("jane@example.com", Some(MANAGER)))
        .await
        .unwrap();

    let stored: Option<User> = app.db.find_entity(&user.id).await.unwrap();
    assert_eq!(stored.map(|u| u.role), Some(UserRole::WORKER));
    let edge = app
        .db
        .find_relation(MANAGER, MemberKind::User, &user.id)
        .await
        .unwrap()
        .unwrap();
    assert!(edge.is_active());
    assert!(app.identity.account("jane@example.com").unwrap().is_some());
}

#[tokio::test]
async fn service_cannot_create_worker_without_manager() {
    let app = TestApp::seeded().await;

    let err = app
        .state
        .users
        .create_user(SERVICE, new_worker("jane@example.com", None))
        .await
        .unwrap_err();

    assert_eq!(err, ServiceError::validation("The worker must have a manager"));
    assert!(app.identity.account("jane@example.com").unwrap().is_none());
}

#[tokio::test]
async fn manager_cannot_create_users_for_other_managers() {
    let app = TestApp::seeded().await;
    app.add_user("m2", UserRole::MANAGER, SERVICE).await;

    let err = app
        .state
        .users
        .create_user(MANAGER, new_worker("jane@example.com", Some("m2")))
        .await
        .unwrap_err();

    assert_eq!(
        err,
        ServiceError::forbidden("The manager cannot create users for other managers")
    );
}

#[tokio::test]
async fn first_login_issues_challenge_then_session() {
    let app = TestApp::seeded().await;
    app.identity.add_account(WORKER, "worker@example.com", "Temp-1234").unwrap();

    let outcome = app
        .state
        .users
        .login("worker@example.com", "Temp-1234")
        .await
        .unwrap();
    let session = match outcome {
        LoginOutcome::Challenge { name, session, .. } => {
            assert_eq!(name, "NEW_PASSWORD_REQUIRED");
            session
        }
        other => panic!("expected challenge, got {:?}", other),
    };

    let login = app
        .state
        .users
        .respond_to_new_password_challenge("Fresh-Pass-99", "worker@example.com", &session)
        .await
        .unwrap();
    assert_eq!(login.sub, WORKER);

    let again = app
        .state
        .users
        .login("worker@example.com", "Fresh-Pass-99")
        .await
        .unwrap();
    assert!(matches!(again, LoginOutcome::Session(s) if s.sub == WORKER));
}

#[tokio::test]
async fn wrong_password_is_forbidden() {
    let app = TestApp::seeded().await;
    app.identity.add_account(WORKER, "worker@example.com", "Temp-1234").unwrap();

    let err = app
        .state
        .users
        .login("worker@example.com", "nope")
        .await
        .unwrap_err();

    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn manager_lists_workers_and_worker_is_denied() {
    let app = TestApp::seeded().await;

    let workers = app.state.users.get_workers(MANAGER).await.unwrap();
    assert_eq!(workers.len(), 1);
    assert_eq!(workers[0].id, WORKER);

    let err = app.state.users.get_workers(WORKER).await.unwrap_err();
    assert!(matches!(err, ServiceError::Forbidden(_)));
}

#[tokio::test]
async fn soft_delete_disables_identity_account() {
    let app = TestApp::seeded().await;
    app.identity.add_account(WORKER, "worker@example.com", "Temp-1234").unwrap();

    let user = app
        .state
        .users
        .edit_user(MANAGER, WORKER, UserEdit::SetDeleted(true))
        .await
        .unwrap();

    assert_eq!(user.is_deleted, Some(true));
    assert!(!app.identity.account(WORKER).unwrap().unwrap().enabled);
}
