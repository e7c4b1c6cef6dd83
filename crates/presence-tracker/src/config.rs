//! Tracker configuration.

use presence_types::UserId;
use serde::{Deserialize, Serialize};

use crate::error::{TrackerError, TrackerResult};

/// Configuration of one tracker instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackerConfig {
    /// Name of the user to track.
    #[serde(alias = "userId")]
    pub user_id: String,
}

impl TrackerConfig {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// Validate the configuration and return the tracked user.
    ///
    /// The id is used exactly as configured; surrounding whitespace is an
    /// error rather than being stripped.
    pub fn validate(&self) -> TrackerResult<UserId> {
        if self.user_id.trim().is_empty() {
            return Err(TrackerError::Configuration(
                "userId must not be empty".to_string(),
            ));
        }
        if self.user_id.trim() != self.user_id {
            return Err(TrackerError::Configuration(format!(
                "userId '{}' has surrounding whitespace",
                self.user_id
            )));
        }
        Ok(UserId::new(self.user_id.as_str()))
    }
}
