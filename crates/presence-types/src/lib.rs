//! Presence Types - Core types for user presence tracking
//!
//! A presence tracker watches one named user in an identity directory and
//! republishes the user's current state as a presence record in a registry.
//!
//! ## Key Concepts
//!
//! - **UserId**: Name of the tracked identity
//! - **IdentitySnapshot**: Resolved state of a user at one point in time
//! - **PresenceAttributes**: The published `{userId, disabled, systemUser}` triple
//! - **PresenceRecord**: An active registration holding those attributes
//! - **ChangeBatch**: One path's worth of changes delivered by the transport
//! - **PresenceEvent**: Registry-side notifications for consumers

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod change;
pub mod events;
pub mod identity;
pub mod ids;
pub mod presence;

// Re-export main types
pub use change::{
    properties, ChangeBatch, ChangeKind, CommitInfo, NodeKind, Subscription, USERS_PATH,
};
pub use events::PresenceEvent;
pub use identity::{DirectoryEntry, EntryKind, IdentitySnapshot};
pub use ids::{RegistrationId, UserId};
pub use presence::{PresenceAttributes, PresenceRecord};
