//! Services layer for integrator-service.
//!
//! Collaborator adapters (relation store, identity provider, object store),
//! the authorization engine and relationship resolver built on them, and the
//! domain services the handlers call.

pub mod authz;
mod database;
mod dynamo;
pub mod error;
mod groups;
mod identity;
mod integrators;
mod memory_store;
mod object_store;
mod reports;
pub mod resolver;
pub mod store;
mod users;

pub use authz::{Action, Authorizer, Grant, Role};
pub use database::Database;
pub use dynamo::DynamoRelationStore;
pub use error::{ResultExt, ServiceError};
pub use groups::{GroupEdit, GroupService, UserGroups};
pub use identity::{
    AuthChallenge, AuthOutcome, AuthTokens, CognitoIdentityProvider, IdentityError, IdentityProvider,
    MockAccount, MockIdentityProvider, NEW_PASSWORD_REQUIRED,
};
pub use integrators::{IntegratorEdit, IntegratorService};
pub use memory_store::InMemoryRelationStore;
pub use object_store::{InMemoryObjectStore, ObjectStore, ObjectStoreError, S3ObjectStore};
pub use reports::ReportService;
pub use resolver::{GroupIntegrators, Resolver};
pub use store::{Item, ItemKey, RelationStore, SortKeyCondition, StoreError};
pub use users::{LoginOutcome, LoginSession, NewUser, UserEdit, UserService};
