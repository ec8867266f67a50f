use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{MemberKind, Relation, User, UserAttribute, UserRole};

use super::authz::{Action, Authorizer, Role};
use super::database::Database;
use super::error::{ResultExt, ServiceError};
use super::identity::{AuthOutcome, AuthTokens, IdentityProvider};
use super::resolver::Resolver;

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub attributes: Vec<UserAttribute>,
    pub role: UserRole,
    pub manager: Option<String>,
}

/// A user edit is either a soft-delete/restore or an attribute update, never both.
#[derive(Debug, Clone, PartialEq)]
pub enum UserEdit {
    SetDeleted(bool),
    Attributes(Vec<UserAttribute>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginSession {
    pub sub: String,
    pub id_token: String,
    pub access_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    Session(LoginSession),
    Challenge {
        name: String,
        parameters: HashMap<String, String>,
        session: String,
    },
}

pub struct UserService {
    db: Database,
    authz: Authorizer,
    resolver: Resolver,
    identity: Arc<dyn IdentityProvider>,
}

impl UserService {
    pub fn new(db: Database, identity: Arc<dyn IdentityProvider>) -> Self {
        Self {
            authz: Authorizer::new(db.clone()),
            resolver: Resolver::new(db.clone()),
            db,
            identity,
        }
    }

    /// Creates the identity account, then the user row and its owner's adjacency row.
    pub async fn create_user(&self, creator_id: &str, new_user: NewUser) -> Result<User, ServiceError> {
        if new_user.username.trim().is_empty() {
            return Err(ServiceError::validation("Missing username"));
        }

        let grant = self
            .authz
            .authorize(
                creator_id,
                None,
                Action::CreateUser {
                    role: new_user.role,
                    manager: new_user.manager.as_deref(),
                },
            )
            .await?;

        if new_user.attributes.is_empty() {
            return Err(ServiceError::validation("userAttributes cannot be empty"));
        }
        if new_user
            .attributes
            .iter()
            .any(|attr| attr.name == UserAttribute::EMAIL && attr.value != new_user.username)
        {
            return Err(ServiceError::validation("username and email do not match"));
        }

        let user_id = self
            .identity
            .create_account(&new_user.username, &new_user.attributes)
            .await
            .map_err(ServiceError::from)
            .context("Error in createUser")?;

        let user = User::new(user_id, new_user.role, new_user.attributes);
        self.db
            .create_owned(&user, &grant.owner_id, MemberKind::User)
            .await
            .context("Error in createUser")?;

        tracing::info!(
            user_id = %user.id,
            owner_id = %grant.owner_id,
            creator_id = %creator_id,
            is_manager = user.role.is_manager,
            is_service = user.role.is_service,
            "User created"
        );
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginOutcome, ServiceError> {
        let outcome = self
            .identity
            .authenticate(username, password)
            .await
            .map_err(ServiceError::from)
            .context("Could not get response from identity provider")?;

        match outcome {
            AuthOutcome::Challenge(challenge) => {
                tracing::info!(challenge = %challenge.name, "Login challenge issued");
                Ok(LoginOutcome::Challenge {
                    name: challenge.name,
                    parameters: challenge.parameters,
                    session: challenge.session,
                })
            }
            AuthOutcome::Tokens(tokens) => Ok(LoginOutcome::Session(self.session_for(tokens).await?)),
        }
    }

    pub async fn respond_to_new_password_challenge(
        &self,
        new_password: &str,
        username: &str,
        session: &str,
    ) -> Result<LoginSession, ServiceError> {
        let tokens = self
            .identity
            .respond_to_new_password_challenge(username, new_password, session)
            .await
            .map_err(ServiceError::from)
            .context("Error completing challenge")?;
        self.session_for(tokens).await
    }

    async fn session_for(&self, tokens: AuthTokens) -> Result<LoginSession, ServiceError> {
        let attributes = self.identity.fetch_attributes(&tokens.access_token).await?;
        let sub = attributes
            .into_iter()
            .find(|attr| attr.name == UserAttribute::SUB && !attr.value.is_empty())
            .map(|attr| attr.value)
            .ok_or_else(|| ServiceError::internal("Could not get sub"))?;

        tracing::info!(user_id = %sub, "User logged in");
        Ok(LoginSession {
            sub,
            id_token: tokens.id_token,
            access_token: tokens.access_token,
        })
    }

    /// Self-service password change; the caller's identity is confirmed upstream.
    pub async fn change_password(&self, user_id: &str, new_password: &str) -> Result<(), ServiceError> {
        self.identity
            .set_password(user_id, new_password)
            .await
            .map_err(ServiceError::from)
            .context("Error changing password")?;
        tracing::info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    pub async fn get_user_info(&self, user_id: &str, requester_id: &str) -> Result<User, ServiceError> {
        let grant = self
            .authz
            .authorize(requester_id, Some(user_id), Action::Read)
            .await
            .context("Error in worker")?;
        if grant.role == Role::Worker {
            return Err(ServiceError::forbidden(
                "Requester is neither a service user nor a manager",
            ));
        }
        self.db.get_user(&grant.owner_id).await
    }

    /// Service users see every account; managers see their workers.
    pub async fn get_workers(&self, user_id: &str) -> Result<Vec<User>, ServiceError> {
        let grant = self.authz.authorize(user_id, None, Action::Inspect).await?;

        if grant.role == Role::Service {
            let ids = self.identity.list_accounts().await?;
            if ids.is_empty() {
                return Err(ServiceError::internal("could not get users"));
            }
            return self.db.batch_get_entities(&ids).await;
        }

        self.resolver
            .members::<User>(&grant.owner_id, MemberKind::User)
            .await
            .context("Error getting workers")
    }

    /// The `manager -> worker` adjacency row, if the manager has that worker.
    pub async fn get_worker(
        &self,
        user_id: &str,
        manager_id: &str,
        worker_id: &str,
    ) -> Result<Relation, ServiceError> {
        let grant = self
            .authz
            .authorize(user_id, Some(manager_id), Action::Inspect)
            .await?;
        self.authz
            .require_member(&grant.owner_id, MemberKind::User, worker_id)
            .await
    }

    pub async fn edit_user(
        &self,
        requester_id: &str,
        user_id: &str,
        edit: UserEdit,
    ) -> Result<User, ServiceError> {
        let grant = self
            .authz
            .authorize(requester_id, Some(user_id), Action::Read)
            .await
            .context("Error in worker")?;
        let target = grant.owner_id.as_str();

        match edit {
            UserEdit::SetDeleted(_) if grant.role == Role::Worker => Err(ServiceError::forbidden(
                "Worker cannot delete their own account",
            )),
            UserEdit::SetDeleted(is_deleted) => {
                self.db.get_user(target).await?;
                let user = self.db.set_entity_deleted::<User>(target, is_deleted).await?;
                if is_deleted {
                    self.identity.disable_account(target).await?;
                } else {
                    self.identity.enable_account(target).await?;
                }
                tracing::info!(
                    user_id = %target,
                    requester_id = %requester_id,
                    is_deleted,
                    "User deletion flag changed"
                );
                Ok(user)
            }
            UserEdit::Attributes(updates) => {
                let mut user = self.db.get_user(target).await?;
                user.merge_attributes(updates);

                let attributes = serde_json::to_value(&user.attributes)
                    .map_err(|e| ServiceError::internal(e.to_string()))?;
                let mut changes = serde_json::Map::new();
                changes.insert("cognitoAttributes".to_string(), attributes);
                let user: User = self.db.update_entity(target, changes).await?;

                tracing::info!(user_id = %target, requester_id = %requester_id, "User attributes updated");
                Ok(user)
            }
        }
    }
}
