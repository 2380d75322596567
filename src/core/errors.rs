// Domain error types - user-facing messages never expose internals

use thiserror::Error;

/// Main error type for the QHSE assistant
#[derive(Error, Debug)]
pub enum QhseError {
    /// Resource not found (HTTP 404)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid input (HTTP 400)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or invalid credentials (HTTP 401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed (HTTP 403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Uniqueness violation (HTTP 409)
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error (HTTP 500)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migration error (HTTP 500)
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Cryptographic error (HTTP 500)
    #[error("Cryptographic error: {0}")]
    CryptoError(#[from] CryptoError),

    /// Configuration error (HTTP 500)
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Upstream dependency failed (HTTP 502)
    #[error("Dependency failure ({service}): {error}")]
    DependencyFailure { service: String, error: String },

    /// Dependency temporarily unavailable (HTTP 503)
    #[error("Transient error: {0}")]
    TransientError(String),
}

/// Cryptographic operation errors
#[derive(Error, Debug)]
pub enum CryptoError {
    /// Failed to load private key
    #[error("Failed to load private key: {0}")]
    KeyLoadError(String),

    /// Failed to sign payload
    #[error("Failed to sign payload: {0}")]
    SigningError(String),

    /// Signature did not verify
    #[error("Invalid signature: {0}")]
    VerificationError(String),

    /// Failed to canonicalize JSON
    #[error("Failed to canonicalize JSON: {0}")]
    CanonicalizationError(String),
}

impl QhseError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> u16 {
        match self {
            QhseError::NotFound(_) => 404,
            QhseError::Validation(_) => 400,
            QhseError::Unauthorized(_) => 401,
            QhseError::Forbidden(_) => 403,
            QhseError::Conflict(_) => 409,
            QhseError::Database(_) => 500,
            QhseError::Migration(_) => 500,
            QhseError::CryptoError(_) => 500,
            QhseError::ConfigurationError(_) => 500,
            QhseError::DependencyFailure { .. } => 502,
            QhseError::TransientError(_) => 503,
        }
    }

    /// Get user-friendly error message (no sensitive information)
    pub fn user_message(&self) -> String {
        match self {
            QhseError::NotFound(what) => format!("{} not found", what),
            QhseError::Validation(reason) => reason.clone(),
            QhseError::Unauthorized(reason) => reason.clone(),
            QhseError::Forbidden(reason) => reason.clone(),
            QhseError::Conflict(reason) => reason.clone(),
            QhseError::Database(_) => "Internal error".to_string(),
            QhseError::Migration(_) => "Internal error".to_string(),
            QhseError::CryptoError(_) => "Internal error".to_string(),
            QhseError::ConfigurationError(_) => "Internal error".to_string(),
            QhseError::DependencyFailure { .. } => "Service unavailable".to_string(),
            QhseError::TransientError(_) => "Service temporarily unavailable".to_string(),
        }
    }
}
