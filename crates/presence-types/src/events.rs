//! Presence events
//!
//! Emitted by the registry whenever a record appears, changes or goes away.

use crate::{PresenceAttributes, RegistrationId};
use serde::{Deserialize, Serialize};

/// Registry-side presence notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PresenceEvent {
    /// A record was registered
    Published {
        registration_id: RegistrationId,
        attributes: PresenceAttributes,
    },

    /// A record's attributes were replaced
    Updated {
        registration_id: RegistrationId,
        previous: PresenceAttributes,
        attributes: PresenceAttributes,
    },

    /// A record was unregistered
    Retracted {
        registration_id: RegistrationId,
        attributes: PresenceAttributes,
    },
}

impl PresenceEvent {
    pub fn registration_id(&self) -> RegistrationId {
        match self {
            PresenceEvent::Published {
                registration_id, ..
            }
            | PresenceEvent::Updated {
                registration_id, ..
            }
            | PresenceEvent::Retracted {
                registration_id, ..
            } => *registration_id,
        }
    }

    pub fn attributes(&self) -> &PresenceAttributes {
        match self {
            PresenceEvent::Published { attributes, .. }
            | PresenceEvent::Updated { attributes, .. }
            | PresenceEvent::Retracted { attributes, .. } => attributes,
        }
    }
}
