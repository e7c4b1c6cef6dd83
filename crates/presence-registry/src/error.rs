//! Registry error types

use presence_types::RegistrationId;
use thiserror::Error;

/// Registry errors
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Registration not found: {0}")]
    RegistrationNotFound(RegistrationId),

    #[error("Registration rejected: {0}")]
    Rejected(String),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),
}

/// Result type for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;
