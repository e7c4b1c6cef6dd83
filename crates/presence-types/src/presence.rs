//! Published presence records

use crate::{IdentitySnapshot, RegistrationId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Attributes a presence record is published and looked up by
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceAttributes {
    pub user_id: UserId,
    pub disabled: bool,
    pub system_user: bool,
}

impl From<&IdentitySnapshot> for PresenceAttributes {
    fn from(snapshot: &IdentitySnapshot) -> Self {
        Self {
            user_id: snapshot.name.clone(),
            disabled: snapshot.disabled,
            system_user: snapshot.is_system,
        }
    }
}

/// An active registration in the presence registry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresenceRecord {
    pub registration_id: RegistrationId,
    pub attributes: PresenceAttributes,
    pub registered_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PresenceRecord {
    pub fn new(registration_id: RegistrationId, attributes: PresenceAttributes) -> Self {
        let now = Utc::now();
        Self {
            registration_id,
            attributes,
            registered_at: now,
            updated_at: now,
        }
    }
}
