pub mod config;
pub mod dtos;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;

use axum::{
    http::{header, HeaderName, Method},
    middleware::from_fn,
    routing::{get, post, put},
    Router,
};
use service_core::middleware::tracing::{make_request_span, request_id_middleware};
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::services::{
    Database, GroupService, IdentityProvider, IntegratorService, ObjectStore, RelationStore,
    ReportService, UserService,
};

#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserService>,
    pub integrators: Arc<IntegratorService>,
    pub groups: Arc<GroupService>,
    pub reports: Arc<ReportService>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn RelationStore>,
        identity: Arc<dyn IdentityProvider>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        let db = Database::new(store);
        Self {
            users: Arc::new(UserService::new(db.clone(), identity)),
            integrators: Arc::new(IntegratorService::new(db.clone())),
            groups: Arc::new(GroupService::new(db.clone())),
            reports: Arc::new(ReportService::new(db, objects)),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let user_routes = Router::new()
        .route("/register", post(handlers::users::register))
        .route("/password", post(handlers::auth::change_password))
        .route("/user", get(handlers::users::get_user))
        .route("/edit", put(handlers::users::edit_user))
        .route("/workers", get(handlers::users::get_workers))
        .route("/workers/:workerID", get(handlers::users::get_worker))
        .route(
            "/integrators",
            post(handlers::integrators::create_integrator)
                .get(handlers::integrators::get_integrators)
                .put(handlers::integrators::edit_integrator),
        )
        .route(
            "/integrators/entries",
            post(handlers::integrators::create_entries),
        )
        .route(
            "/integrators/:integratorID",
            get(handlers::integrators::get_integrator),
        )
        .route(
            "/groups",
            post(handlers::groups::create_group)
                .get(handlers::groups::get_groups)
                .put(handlers::groups::edit_group),
        )
        .route(
            "/groups/users",
            post(handlers::groups::add_user_to_group)
                .delete(handlers::groups::remove_user_from_group)
                .get(handlers::groups::get_groups_for_users),
        )
        .route(
            "/groups/integrators",
            post(handlers::groups::add_integrator_to_group)
                .delete(handlers::groups::remove_integrator_from_group)
                .get(handlers::groups::get_integrators_from_groups),
        )
        .route("/groups/:groupID", get(handlers::groups::get_group))
        .route(
            "/reports",
            post(handlers::reports::create_report).get(handlers::reports::get_reports),
        )
        .route("/reports/content", get(handlers::reports::get_report));

    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/login", post(handlers::auth::login))
        .route("/first-login/:userID", post(handlers::auth::first_login))
        .nest("/users/:userID", user_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(from_fn(request_id_middleware))
        .layer(cors_layer())
}

/// Browser clients send credentials, so origins are mirrored rather than `*`.
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::OPTIONS,
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-amz-date"),
            HeaderName::from_static("x-api-key"),
            HeaderName::from_static("x-access-token"),
        ])
}
