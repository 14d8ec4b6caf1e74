//! Error types for the transcript trust boundary.
//!
//! Errors are classified by how an outer surface must present them:
//! - NotFound: read-path denials and genuinely missing rows (indistinguishable)
//! - Forbidden: explicit denials on mutating paths (relink, admin routing)
//! - InvalidInput: malformed caller input
//! - Internal: storage, configuration and completion failures

use thiserror::Error;

use crate::db::DbError;

/// Crate-wide error type.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Storage error: {0}")]
    Storage(#[from] DbError),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found")]
    NotFound,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Completion failed: {0}")]
    Completion(String),
}

impl GateError {
    pub fn access_denied(message: impl Into<String>) -> Self {
        GateError::AccessDenied(message.into())
    }

    /// Returns true for authorization denials (distinct from generic failures).
    pub fn is_access_denied(&self) -> bool {
        matches!(self, GateError::AccessDenied(_))
    }

    /// Returns true if retrying the same call could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::Storage(_) | GateError::Completion(_))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            GateError::NotFound => ErrorKind::NotFound,
            GateError::AccessDenied(_) => ErrorKind::Forbidden,
            GateError::InvalidInput(_) => ErrorKind::InvalidInput,
            GateError::Storage(_) | GateError::Config(_) | GateError::Completion(_) => {
                ErrorKind::Internal
            }
        }
    }

    /// HTTP status an outer routing layer should answer with.
    pub fn http_status(&self) -> u16 {
        match self.kind() {
            ErrorKind::NotFound => 404,
            ErrorKind::Forbidden => 403,
            ErrorKind::InvalidInput => 400,
            ErrorKind::Internal => 500,
        }
    }
}

/// Serializable error representation for outer surfaces.
///
/// Storage details are never echoed back: internal errors carry a generic
/// message so that query text or ids of hidden rows cannot leak.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    pub message: String,
    pub kind: ErrorKind,
    pub can_retry: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Forbidden,
    InvalidInput,
    Internal,
}

impl From<&GateError> for ApiError {
    fn from(err: &GateError) -> Self {
        let kind = err.kind();
        let message = match kind {
            ErrorKind::NotFound => "Not found".to_string(),
            ErrorKind::Internal => "Internal error".to_string(),
            ErrorKind::Forbidden | ErrorKind::InvalidInput => err.to_string(),
        };

        ApiError {
            message,
            kind,
            can_retry: err.is_retryable(),
        }
    }
}

pub type Result<T, E = GateError> = std::result::Result<T, E>;
