use axum::http::StatusCode;
use service_core::error::AppError;
use thiserror::Error;

use super::identity::IdentityError;
use super::object_store::ObjectStoreError;
use super::store::StoreError;

/// Domain error returned by every service operation.
///
/// `NotFound` maps to 400, not 404.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ServiceError::NotFound(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ServiceError::Internal(message.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::Validation(_) | ServiceError::NotFound(_) => StatusCode::BAD_REQUEST,
            ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ServiceError::Validation(m)
            | ServiceError::Forbidden(m)
            | ServiceError::NotFound(m)
            | ServiceError::Internal(m) => m,
        }
    }

    /// Prefixes the message (`"<context>: <inner>"`), keeping the variant.
    pub fn context(self, context: &str) -> Self {
        let wrap = |m: String| format!("{}: {}", context, m);
        match self {
            ServiceError::Validation(m) => ServiceError::Validation(wrap(m)),
            ServiceError::Forbidden(m) => ServiceError::Forbidden(wrap(m)),
            ServiceError::NotFound(m) => ServiceError::NotFound(wrap(m)),
            ServiceError::Internal(m) => ServiceError::Internal(wrap(m)),
        }
    }
}

/// Adds [`ServiceError::context`] to any `Result<_, ServiceError>`.
pub trait ResultExt<T> {
    fn context(self, context: &str) -> Result<T, ServiceError>;
}

impl<T> ResultExt<T> for Result<T, ServiceError> {
    fn context(self, context: &str) -> Result<T, ServiceError> {
        self.map_err(|e| e.context(context))
    }
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        tracing::error!(error = %err, "Relation store failure");
        ServiceError::Internal(err.to_string())
    }
}

impl From<IdentityError> for ServiceError {
    fn from(err: IdentityError) -> Self {
        match err {
            IdentityError::Rejected(message) => ServiceError::Forbidden(message),
            other => {
                tracing::error!(error = %other, "Identity provider failure");
                ServiceError::Internal(other.to_string())
            }
        }
    }
}

impl From<ObjectStoreError> for ServiceError {
    fn from(err: ObjectStoreError) -> Self {
        match err {
            ObjectStoreError::NotFound(key) => {
                ServiceError::NotFound(format!("No report stored at {}", key))
            }
            other => {
                tracing::error!(error = %other, "Object store failure");
                ServiceError::Internal(other.to_string())
            }
        }
    }
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(m) | ServiceError::NotFound(m) => {
                AppError::BadRequest(anyhow::anyhow!(m))
            }
            ServiceError::Forbidden(m) => AppError::Forbidden(anyhow::anyhow!(m)),
            ServiceError::Internal(m) => AppError::InternalError(anyhow::anyhow!(m)),
        }
    }
}
