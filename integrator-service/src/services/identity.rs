//! Identity provider boundary: account lifecycle and password authentication.

use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::error::DisplayErrorContext;
use aws_sdk_cognitoidentityprovider::types::{AttributeType, AuthFlowType, ChallengeNameType};
use aws_sdk_cognitoidentityprovider::Client;
use std::collections::HashMap;
use std::sync::Mutex;
use thiserror::Error;

use crate::models::{generate_id, UserAttribute};

pub const NEW_PASSWORD_REQUIRED: &str = "NEW_PASSWORD_REQUIRED";

#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("Identity provider request failed: {0}")]
    Request(String),

    #[error("Unexpected identity provider response: {0}")]
    UnexpectedResponse(String),

    /// Credentials or session refused.
    #[error("{0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthTokens {
    pub access_token: String,
    pub id_token: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthChallenge {
    pub name: String,
    pub parameters: HashMap<String, String>,
    pub session: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Tokens(AuthTokens),
    Challenge(AuthChallenge),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Creates the account and returns its stable id (`sub`).
    async fn create_account(
        &self,
        username: &str,
        attributes: &[UserAttribute],
    ) -> Result<String, IdentityError>;

    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthOutcome, IdentityError>;

    async fn respond_to_new_password_challenge(
        &self,
        username: &str,
        new_password: &str,
        session: &str,
    ) -> Result<AuthTokens, IdentityError>;

    async fn set_password(&self, username: &str, password: &str) -> Result<(), IdentityError>;

    async fn disable_account(&self, username: &str) -> Result<(), IdentityError>;

    async fn enable_account(&self, username: &str) -> Result<(), IdentityError>;

    /// Ids of every account in the pool.
    async fn list_accounts(&self) -> Result<Vec<String>, IdentityError>;

    async fn fetch_attributes(&self, access_token: &str) -> Result<Vec<UserAttribute>, IdentityError>;
}

pub struct CognitoIdentityProvider {
    client: Client,
    user_pool_id: String,
    client_id: String,
}

impl CognitoIdentityProvider {
    pub fn new(client: Client, user_pool_id: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            client,
            user_pool_id: user_pool_id.into(),
            client_id: client_id.into(),
        }
    }
}

fn request_failed(operation: &str, err: impl std::error::Error) -> IdentityError {
    IdentityError::Request(format!("{} failed: {}", operation, DisplayErrorContext(err)))
}

fn from_cognito_attributes(attributes: &[AttributeType]) -> Vec<UserAttribute> {
    attributes
        .iter()
        .map(|attr| UserAttribute::new(attr.name(), attr.value().unwrap_or_default()))
        .collect()
}

fn tokens_from(
    result: Option<&aws_sdk_cognitoidentityprovider::types::AuthenticationResultType>,
) -> Result<AuthTokens, IdentityError> {
    let result = result.ok_or_else(|| {
        IdentityError::UnexpectedResponse("no authentication result".to_string())
    })?;
    match (result.access_token(), result.id_token()) {
        (Some(access_token), Some(id_token)) => Ok(AuthTokens {
            access_token: access_token.to_string(),
            id_token: id_token.to_string(),
        }),
        _ => Err(IdentityError::UnexpectedResponse(
            "Could not get AccessToken or IdToken".to_string(),
        )),
    }
}

#[async_trait]
impl IdentityProvider for CognitoIdentityProvider {
    async fn create_account(
        &self,
        username: &str,
        attributes: &[UserAttribute],
    ) -> Result<String, IdentityError> {
        let attributes = attributes
            .iter()
            .map(|attr| {
                AttributeType::builder()
                    .name(&attr.name)
                    .value(&attr.value)
                    .build()
                    .map_err(|e| IdentityError::Request(format!("Invalid attribute {}: {}", attr.name, e)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let output = self
            .client
            .admin_create_user()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .set_user_attributes(Some(attributes))
            .send()
            .await
            .map_err(|e| request_failed("AdminCreateUser", e))?;

        output
            .user()
            .and_then(|user| {
                user.attributes()
                    .iter()
                    .find(|attr| attr.name() == UserAttribute::SUB)
                    .and_then(|attr| attr.value())
            })
            .map(str::to_string)
            .ok_or_else(|| {
                IdentityError::UnexpectedResponse("No user attributes found in the response".to_string())
            })
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthOutcome, IdentityError> {
        let output = self
            .client
            .initiate_auth()
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .client_id(&self.client_id)
            .auth_parameters("USERNAME", username)
            .auth_parameters("PASSWORD", password)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_not_authorized_exception() || se.is_user_not_found_exception() => {
                    IdentityError::Rejected("Incorrect username or password".to_string())
                }
                _ => request_failed("InitiateAuth", e),
            })?;

        if let (Some(name), Some(parameters), Some(session)) = (
            output.challenge_name(),
            output.challenge_parameters(),
            output.session(),
        ) {
            return Ok(AuthOutcome::Challenge(AuthChallenge {
                name: name.as_str().to_string(),
                parameters: parameters.clone(),
                session: session.to_string(),
            }));
        }

        tokens_from(output.authentication_result()).map(AuthOutcome::Tokens)
    }

    async fn respond_to_new_password_challenge(
        &self,
        username: &str,
        new_password: &str,
        session: &str,
    ) -> Result<AuthTokens, IdentityError> {
        let output = self
            .client
            .respond_to_auth_challenge()
            .challenge_name(ChallengeNameType::NewPasswordRequired)
            .client_id(&self.client_id)
            .session(session)
            .challenge_responses("NEW_PASSWORD", new_password)
            .challenge_responses("USERNAME", username)
            .send()
            .await
            .map_err(|e| match e.as_service_error() {
                Some(se) if se.is_not_authorized_exception() || se.is_code_mismatch_exception() => {
                    IdentityError::Rejected("Invalid session for the user".to_string())
                }
                _ => request_failed("RespondToAuthChallenge", e),
            })?;

        tokens_from(output.authentication_result())
    }

    async fn set_password(&self, username: &str, password: &str) -> Result<(), IdentityError> {
        self.client
            .admin_set_user_password()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .password(password)
            .permanent(true)
            .send()
            .await
            .map_err(|e| request_failed("AdminSetUserPassword", e))?;
        Ok(())
    }

    async fn disable_account(&self, username: &str) -> Result<(), IdentityError> {
        self.client
            .admin_disable_user()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .send()
            .await
            .map_err(|e| request_failed("AdminDisableUser", e))?;
        Ok(())
    }

    async fn enable_account(&self, username: &str) -> Result<(), IdentityError> {
        self.client
            .admin_enable_user()
            .user_pool_id(&self.user_pool_id)
            .username(username)
            .send()
            .await
            .map_err(|e| request_failed("AdminEnableUser", e))?;
        Ok(())
    }

    async fn list_accounts(&self) -> Result<Vec<String>, IdentityError> {
        let mut ids = Vec::new();
        let mut pagination_token = None;

        loop {
            let output = self
                .client
                .list_users()
                .user_pool_id(&self.user_pool_id)
                .set_pagination_token(pagination_token.take())
                .send()
                .await
                .map_err(|e| request_failed("ListUsers", e))?;

            for user in output.users() {
                let sub = user
                    .attributes()
                    .iter()
                    .find(|attr| attr.name() == UserAttribute::SUB)
                    .and_then(|attr| attr.value());
                if let Some(id) = sub.or(user.username()) {
                    ids.push(id.to_string());
                }
            }

            match output.pagination_token {
                Some(token) if !token.is_empty() => pagination_token = Some(token),
                _ => break,
            }
        }

        Ok(ids)
    }

    async fn fetch_attributes(&self, access_token: &str) -> Result<Vec<UserAttribute>, IdentityError> {
        let output = self
            .client
            .get_user()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| request_failed("GetUser", e))?;

        Ok(from_cognito_attributes(output.user_attributes()))
    }
}

#[derive(Debug, Clone)]
pub struct MockAccount {
    pub sub: String,
    pub username: String,
    pub attributes: Vec<UserAttribute>,
    pub password: Option<String>,
    pub enabled: bool,
    pub must_change_password: bool,
}

/// In-memory identity provider for tests and local runs.
pub struct MockIdentityProvider {
    accounts: Mutex<Vec<MockAccount>>,
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl MockIdentityProvider {
    pub fn new() -> Self {
        Self {
            accounts: Mutex::new(Vec::new()),
        }
    }

    /// Registers an account with a fixed id and a password that still has to be changed.
    pub fn add_account(&self, sub: &str, username: &str, temporary_password: &str) -> Result<(), IdentityError> {
        self.lock()?.push(MockAccount {
            sub: sub.to_string(),
            username: username.to_string(),
            attributes: vec![UserAttribute::new(UserAttribute::SUB, sub)],
            password: Some(temporary_password.to_string()),
            enabled: true,
            must_change_password: true,
        });
        Ok(())
    }

    pub fn account(&self, username_or_sub: &str) -> Result<Option<MockAccount>, IdentityError> {
        Ok(self
            .lock()?
            .iter()
            .find(|a| a.username == username_or_sub || a.sub == username_or_sub)
            .cloned())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<MockAccount>>, IdentityError> {
        self.accounts
            .lock()
            .map_err(|e| IdentityError::Request(format!("Mock identity mutex poisoned: {}", e)))
    }

    fn with_account<T>(
        &self,
        username_or_sub: &str,
        f: impl FnOnce(&mut MockAccount) -> Result<T, IdentityError>,
    ) -> Result<T, IdentityError> {
        let mut accounts = self.lock()?;
        let account = accounts
            .iter_mut()
            .find(|a| a.username == username_or_sub || a.sub == username_or_sub)
            .ok_or_else(|| IdentityError::Request(format!("User does not exist: {}", username_or_sub)))?;
        f(account)
    }

    fn tokens_for(account: &MockAccount) -> AuthTokens {
        AuthTokens {
            access_token: format!("access-{}", account.sub),
            id_token: format!("id-{}", account.sub),
        }
    }
}

#[async_trait]
impl IdentityProvider for MockIdentityProvider {
    async fn create_account(
        &self,
        username: &str,
        attributes: &[UserAttribute],
    ) -> Result<String, IdentityError> {
        let mut accounts = self.lock()?;
        if accounts.iter().any(|a| a.username == username) {
            return Err(IdentityError::Request(format!("User account already exists: {}", username)));
        }

        let sub = generate_id();
        let mut stored = attributes.to_vec();
        stored.push(UserAttribute::new(UserAttribute::SUB, sub.clone()));
        accounts.push(MockAccount {
            sub: sub.clone(),
            username: username.to_string(),
            attributes: stored,
            password: None,
            enabled: true,
            must_change_password: true,
        });
        Ok(sub)
    }

    async fn authenticate(&self, username: &str, password: &str) -> Result<AuthOutcome, IdentityError> {
        self.with_account(username, |account| {
            if !account.enabled || account.password.as_deref() != Some(password) {
                return Err(IdentityError::Rejected("Incorrect username or password".to_string()));
            }
            if account.must_change_password {
                return Ok(AuthOutcome::Challenge(AuthChallenge {
                    name: NEW_PASSWORD_REQUIRED.to_string(),
                    parameters: HashMap::from([(
                        "USER_ID_FOR_SRP".to_string(),
                        account.username.clone(),
                    )]),
                    session: format!("session-{}", account.sub),
                }));
            }
            Ok(AuthOutcome::Tokens(Self::tokens_for(account)))
        })
    }

    async fn respond_to_new_password_challenge(
        &self,
        username: &str,
        new_password: &str,
        session: &str,
    ) -> Result<AuthTokens, IdentityError> {
        self.with_account(username, |account| {
            if !account.must_change_password || session != format!("session-{}", account.sub) {
                return Err(IdentityError::Rejected("Invalid session for the user".to_string()));
            }
            account.password = Some(new_password.to_string());
            account.must_change_password = false;
            Ok(Self::tokens_for(account))
        })
    }

    async fn set_password(&self, username: &str, password: &str) -> Result<(), IdentityError> {
        self.with_account(username, |account| {
            account.password = Some(password.to_string());
            account.must_change_password = false;
            Ok(())
        })
    }

    async fn disable_account(&self, username: &str) -> Result<(), IdentityError> {
        self.with_account(username, |account| {
            account.enabled = false;
            Ok(())
        })
    }

    async fn enable_account(&self, username: &str) -> Result<(), IdentityError> {
        self.with_account(username, |account| {
            account.enabled = true;
            Ok(())
        })
    }

    async fn list_accounts(&self) -> Result<Vec<String>, IdentityError> {
        Ok(self.lock()?.iter().map(|a| a.sub.clone()).collect())
    }

    async fn fetch_attributes(&self, access_token: &str) -> Result<Vec<UserAttribute>, IdentityError> {
        let sub = access_token
            .strip_prefix("access-")
            .ok_or_else(|| IdentityError::Request("Invalid Access Token".to_string()))?;
        self.with_account(sub, |account| Ok(account.attributes.clone()))
    }
}
