//! Error types for presence-tracker crate.

use presence_types::UserId;
use thiserror::Error;

/// Errors raised while resolving an identity against the directory.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Directory could not be reached.
    #[error("directory unavailable: {0}")]
    Unavailable(String),

    /// Directory refused to open a privileged session.
    #[error("session refused: {0}")]
    SessionRefused(String),

    /// Directory answered with something that is not a valid entry.
    #[error("malformed directory entry for {user_id}: {reason}")]
    Malformed { user_id: UserId, reason: String },
}

/// Errors that can occur while managing presence trackers.
#[derive(Debug, Error)]
pub enum TrackerError {
    /// A tracker already runs for this user.
    #[error("tracker already exists for user {0}")]
    TrackerAlreadyExists(UserId),

    /// No tracker runs for this user.
    #[error("tracker not found for user {0}")]
    TrackerNotFound(UserId),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Configuration(String),
}

/// Result type for tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;
