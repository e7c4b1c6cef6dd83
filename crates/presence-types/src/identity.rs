//! Identity directory vocabulary
//!
//! The directory answers lookups with a [`DirectoryEntry`]; only user and
//! system-user entries turn into an [`IdentitySnapshot`].

use crate::UserId;
use serde::{Deserialize, Serialize};

/// Kind of entry stored in the identity directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    /// Regular user
    User,
    /// Service/system user
    SystemUser,
    /// Group of users
    Group,
    /// Anything else the directory knows about
    Other,
}

impl EntryKind {
    pub fn is_user(&self) -> bool {
        matches!(self, EntryKind::User | EntryKind::SystemUser)
    }
}

/// Raw answer of a directory lookup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub id: UserId,
    pub kind: EntryKind,
    pub disabled: bool,
}

impl DirectoryEntry {
    pub fn user(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            kind: EntryKind::User,
            disabled: false,
        }
    }

    pub fn system_user(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            kind: EntryKind::SystemUser,
            disabled: false,
        }
    }

    pub fn group(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            kind: EntryKind::Group,
            disabled: false,
        }
    }

    /// Snapshot of this entry, or `None` when it is not a user.
    pub fn snapshot(&self) -> Option<IdentitySnapshot> {
        if !self.kind.is_user() {
            return None;
        }
        Some(IdentitySnapshot {
            name: self.id.clone(),
            disabled: self.disabled,
            is_system: self.kind == EntryKind::SystemUser,
        })
    }
}

/// Resolved state of a user at one point in time
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdentitySnapshot {
    pub name: UserId,
    pub disabled: bool,
    pub is_system: bool,
}

impl IdentitySnapshot {
    pub fn new(name: impl Into<UserId>, disabled: bool, is_system: bool) -> Self {
        Self {
            name: name.into(),
            disabled,
            is_system,
        }
    }
}
