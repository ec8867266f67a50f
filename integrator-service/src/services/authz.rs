//! Role model and permission checks.
//!
//! Every operation resolves the acting user and an *owner scope* here before
//! touching data. Membership of a specific worker, integrator or group in that
//! scope is then confirmed through its adjacency row with [`Authorizer::require_member`].

use crate::models::{MemberKind, Relation, User, UserRole};

use super::database::Database;
use super::error::ServiceError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Service,
    Manager,
    Worker,
}

impl From<UserRole> for Role {
    fn from(role: UserRole) -> Self {
        if role.is_service {
            Role::Service
        } else if role.is_manager {
            Role::Manager
        } else {
            Role::Worker
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(ServiceError),
}

/// Permission matrix for user creation. First matching rule wins.
///
/// `manager_role` is the role of the user named by `manager`, or `None` when
/// no such user exists. It is only consulted for service actors creating workers.
pub fn evaluate_create_user(
    actor_id: &str,
    actor_role: Role,
    requested: UserRole,
    manager: Option<&str>,
    manager_role: Option<Role>,
) -> Decision {
    let deny = Decision::Deny;
    let wants_worker = !requested.is_service && !requested.is_manager;
    let wants_manager = !requested.is_service && requested.is_manager;

    match actor_role {
        Role::Worker => deny(ServiceError::forbidden("Worker cannot create users")),
        Role::Manager if requested.is_service || requested.is_manager => deny(ServiceError::forbidden(
            "Manager cannot create a manager or service user",
        )),
        Role::Service if wants_worker && manager.is_none() => {
            deny(ServiceError::validation("The worker must have a manager"))
        }
        Role::Service if wants_manager && manager.is_some() => {
            deny(ServiceError::validation("The manager cannot have a manager"))
        }
        Role::Service if wants_worker && manager_role != Some(Role::Manager) => {
            deny(ServiceError::validation("There isn't a manager with this ID"))
        }
        Role::Service if requested.is_service && manager.is_some() => {
            deny(ServiceError::validation("A service user cannot have a manager"))
        }
        Role::Service if requested.is_service && requested.is_manager => {
            deny(ServiceError::validation("A service user cannot also be a manager"))
        }
        Role::Manager if manager != Some(actor_id) => deny(ServiceError::forbidden(
            "The manager cannot create users for other managers",
        )),
        _ => Decision::Allow,
    }
}

/// What the actor is trying to do with the owner scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action<'a> {
    CreateUser {
        role: UserRole,
        manager: Option<&'a str>,
    },
    /// Create or change resources owned by a manager.
    Manage,
    /// Service or manager view over an owner scope.
    Inspect,
    /// Any role reading within its own reach: workers see themselves,
    /// managers themselves or their workers, service users anyone.
    Read,
    /// Act inside the actor's own scope; service users may name any owner.
    Operate,
    /// Load test data; service users only.
    Seed,
}

/// Outcome of a successful authorization.
#[derive(Debug, Clone)]
pub struct Grant {
    pub actor: User,
    pub role: Role,
    /// Whose resources the operation acts on.
    pub owner_id: String,
}

impl Grant {
    pub fn is_self(&self) -> bool {
        self.actor.id == self.owner_id
    }
}

#[derive(Clone)]
pub struct Authorizer {
    db: Database,
}

impl Authorizer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn authorize(
        &self,
        actor_id: &str,
        target_owner: Option<&str>,
        action: Action<'_>,
    ) -> Result<Grant, ServiceError> {
        let actor = self.db.get_user(actor_id).await?;
        let role = Role::from(actor.role);

        let result = self.resolve_owner(&actor, role, target_owner, action).await;
        match result {
            Ok(owner_id) => Ok(Grant { actor, role, owner_id }),
            Err(err) => {
                tracing::warn!(
                    actor_id = %actor_id,
                    target = ?target_owner,
                    action = ?action,
                    error = %err,
                    "Authorization denied"
                );
                Err(err)
            }
        }
    }

    async fn resolve_owner(
        &self,
        actor: &User,
        role: Role,
        target_owner: Option<&str>,
        action: Action<'_>,
    ) -> Result<String, ServiceError> {
        let target = target_owner.unwrap_or(&actor.id);

        match (action, role) {
            (Action::CreateUser { role: requested, manager }, _) => {
                let manager_role = match (role, manager) {
                    (Role::Service, Some(manager_id)) if !requested.is_service && !requested.is_manager => self
                        .db
                        .find_entity::<User>(manager_id)
                        .await?
                        .map(|user| Role::from(user.role)),
                    _ => None,
                };
                match evaluate_create_user(&actor.id, role, requested, manager, manager_role) {
                    Decision::Allow => Ok(manager.unwrap_or(&actor.id).to_string()),
                    Decision::Deny(err) => Err(err),
                }
            }

            (Action::Manage | Action::Inspect, Role::Worker) => Err(ServiceError::forbidden(
                "User is neither a service user nor a manager",
            )),
            (Action::Manage | Action::Inspect, Role::Manager) => Ok(actor.id.clone()),
            (Action::Manage, Role::Service) => {
                if target != actor.id {
                    self.require_manager(target).await?;
                }
                Ok(target.to_string())
            }
            (Action::Inspect, Role::Service) => Ok(target.to_string()),

            (Action::Read, Role::Worker) => Ok(actor.id.clone()),
            (Action::Read, Role::Manager) => {
                if target != actor.id {
                    self.require_member(&actor.id, MemberKind::User, target).await?;
                }
                Ok(target.to_string())
            }
            (Action::Read, Role::Service) => Ok(target.to_string()),

            (Action::Operate, Role::Service) => Ok(target.to_string()),
            (Action::Operate, _) => Ok(actor.id.clone()),

            (Action::Seed, Role::Service) => Ok(target.to_string()),
            (Action::Seed, _) => Err(ServiceError::forbidden("User is not a service user")),
        }
    }

    async fn require_manager(&self, user_id: &str) -> Result<(), ServiceError> {
        match self.db.find_entity::<User>(user_id).await? {
            Some(user) if Role::from(user.role) == Role::Manager => Ok(()),
            _ => Err(ServiceError::validation(format!(
                "There is no manager with PK {}",
                user_id
            ))),
        }
    }

    /// Confirms an active adjacency row `owner -> member` exists.
    pub async fn require_member(
        &self,
        owner_id: &str,
        kind: MemberKind,
        member_id: &str,
    ) -> Result<Relation, ServiceError> {
        match self.db.find_relation(owner_id, kind, member_id).await? {
            Some(relation) if relation.is_active() => Ok(relation),
            _ => {
                let what = match kind {
                    MemberKind::User => "a worker",
                    MemberKind::Integrator => "an integrator",
                    MemberKind::Group => "an integrator group",
                };
                Err(ServiceError::validation(format!(
                    "Manager does not have {} with this id: {}",
                    what, member_id
                )))
            }
        }
    }
}
