use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use validator::Validate;

use crate::services::{LoginOutcome, LoginSession};

#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "Missing login or password"))]
    pub username: String,
    #[validate(length(min = 1, message = "Missing login or password"))]
    pub password: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct FirstLoginRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
    #[validate(length(min = 1, message = "Session is required"))]
    pub session: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 8, message = "Password must be at least 8 characters"))]
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct SessionResponse {
    #[serde(rename = "userID")]
    pub user_id: String,
    pub id_token: String,
    pub access_token: String,
}

impl From<LoginSession> for SessionResponse {
    fn from(session: LoginSession) -> Self {
        Self {
            user_id: session.sub,
            id_token: session.id_token,
            access_token: session.access_token,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum LoginResponse {
    Session(SessionResponse),
    #[serde(rename_all = "camelCase")]
    Challenge {
        challenge_name: String,
        challenge_parameters: HashMap<String, String>,
        session: String,
    },
}

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        match outcome {
            LoginOutcome::Session(session) => LoginResponse::Session(session.into()),
            LoginOutcome::Challenge {
                name,
                parameters,
                session,
            } => LoginResponse::Challenge {
                challenge_name: name,
                challenge_parameters: parameters,
                session,
            },
        }
    }
}
