//! Error types shared by every part of the auth core.
//!
//! Collaborators (stores, providers, gateways) report failures with the same
//! [`AuthError`] so the core can recognise `NotFound` and translate it where a
//! distinct kind would leak information.

use thiserror::Error;

/// Convenience alias for fallible auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Coarse classification of an [`AuthError`], for transport-level mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Unauthenticated,
    PermissionDenied,
    NotFound,
    AlreadyExists,
    FailedPrecondition,
    Unimplemented,
    Internal,
}

/// Authentication errors.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Failed precondition: {0}")]
    FailedPrecondition(String),

    #[error("Unimplemented: {0}")]
    Unimplemented(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AuthError {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            AuthError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            AuthError::Unauthenticated(_) => ErrorKind::Unauthenticated,
            AuthError::PermissionDenied(_) | AuthError::Token(_) => ErrorKind::PermissionDenied,
            AuthError::NotFound(_) => ErrorKind::NotFound,
            AuthError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            AuthError::FailedPrecondition(_) => ErrorKind::FailedPrecondition,
            AuthError::Unimplemented(_) => ErrorKind::Unimplemented,
            AuthError::Config(_) | AuthError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind() == ErrorKind::AlreadyExists
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(e: serde_json::Error) -> Self {
        AuthError::Internal(format!("json: {e}"))
    }
}

impl From<openssl::error::ErrorStack> for AuthError {
    fn from(e: openssl::error::ErrorStack) -> Self {
        AuthError::Config(format!("openssl: {e}"))
    }
}
