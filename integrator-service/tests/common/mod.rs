//! Shared setup for integrator-service integration tests.
//!
//! Builds the router over in-memory collaborators and seeds the usual
//! hierarchy: service user `svc`, manager `m1` owned by `svc`, worker `w1`
//! owned by `m1`.

#![allow(dead_code)]

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use integrator_service::models::{
    Integrator, IntegratorGroup, MemberKind, Relation, UsageEntry, User, UserRole,
};
use integrator_service::services::{
    Database, InMemoryObjectStore, InMemoryRelationStore, MockIdentityProvider,
};
use integrator_service::{build_router, AppState};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const SERVICE: &str = "svc";
pub const MANAGER: &str = "m1";
pub const WORKER: &str = "w1";

pub struct TestApp {
    pub store: Arc<InMemoryRelationStore>,
    pub identity: Arc<MockIdentityProvider>,
    pub objects: Arc<InMemoryObjectStore>,
    pub db: Database,
    pub state: AppState,
    pub router: Router,
}

impl TestApp {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryRelationStore::new());
        let identity = Arc::new(MockIdentityProvider::new());
        let objects = Arc::new(InMemoryObjectStore::new());
        let state = AppState::new(store.clone(), identity.clone(), objects.clone());
        Self {
            db: Database::new(store.clone()),
            router: build_router(state.clone()),
            store,
            identity,
            objects,
            state,
        }
    }

    /// Service user, one manager and one worker under it.
    pub async fn seeded() -> Self {
        let app = Self::new();
        app.db
            .put_entity(&User::new(SERVICE, UserRole::SERVICE, vec![]))
            .await
            .unwrap();
        app.add_user(MANAGER, UserRole::MANAGER, SERVICE).await;
        app.add_user(WORKER, UserRole::WORKER, MANAGER).await;
        app
    }

    pub async fn add_user(&self, id: &str, role: UserRole, owner: &str) {
        self.db
            .create_owned(&User::new(id, role, vec![]), owner, MemberKind::User)
            .await
            .unwrap();
    }

    pub async fn add_integrator(&self, id: &str, owner: &str) {
        self.db
            .create_owned(&Integrator::new(id, "Hall A", format!("SN-{}", id)), owner, MemberKind::Integrator)
            .await
            .unwrap();
    }

    pub async fn add_group(&self, id: &str, owner: &str) {
        self.db
            .create_owned(&IntegratorGroup::new(id, format!("Group {}", id)), owner, MemberKind::Group)
            .await
            .unwrap();
    }

    pub async fn link(&self, relation: Relation) {
        self.db.put_relation(&relation).await.unwrap();
    }

    pub async fn add_entries(&self, integrator: &str, samples: &[(&str, f64)]) {
        let entries: Vec<UsageEntry> = samples
            .iter()
            .map(|(timestamp, total)| UsageEntry {
                integrator_id: integrator.to_string(),
                timestamp: timestamp.to_string(),
                total_crushed: *total,
            })
            .collect();
        self.db.put_entries(&entries).await.unwrap();
    }

    /// Sends a request as `caller` (bearer token with `sub = caller`).
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        caller: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(sub) = caller {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token_for(sub)));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

#[derive(Serialize)]
struct Claims<'a> {
    sub: &'a str,
    aud: &'a str,
    token_use: &'a str,
}

/// Unsigned-by-the-issuer token; the service only reads `sub`.
pub fn token_for(sub: &str) -> String {
    encode(
        &Header::default(),
        &Claims {
            sub,
            aud: "test-client",
            token_use: "access",
        },
        &EncodingKey::from_secret(b"test-secret"),
    )
    .unwrap()
}
