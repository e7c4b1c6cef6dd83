//! Change batches delivered by the notification transport
//!
//! The transport watches a subtree of the repository and delivers, per
//! commit, one batch for every affected path. A batch carries the names of
//! added, deleted and changed properties plus a snapshot of the watched
//! property values of that path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// Root of the subtree holding user nodes
pub const USERS_PATH: &str = "/home/users";

/// Property names understood by the presence tracker
pub mod properties {
    /// Node type of the changed path
    pub const PRIMARY_TYPE: &str = "jcr:primaryType";
    /// Id of the authorizable stored at the path
    pub const AUTHORIZABLE_ID: &str = "rep:authorizableId";
    /// Present when the authorizable is disabled
    pub const DISABLED: &str = "rep:disabled";

    /// Node type of a regular user
    pub const NT_USER: &str = "rep:User";
    /// Node type of a system user
    pub const NT_SYSTEM_USER: &str = "rep:SystemUser";
    /// Node type of a group
    pub const NT_GROUP: &str = "rep:Group";
}

/// What happened to the path a batch describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Changed,
    Deleted,
}

impl std::fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChangeKind::Added => f.write_str("added"),
            ChangeKind::Changed => f.write_str("changed"),
            ChangeKind::Deleted => f.write_str("deleted"),
        }
    }
}

/// Node kinds the presence tracker reacts to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeKind {
    User,
    SystemUser,
}

impl NodeKind {
    /// Map a primary type value to a watched node kind.
    pub fn from_primary_type(value: &str) -> Option<Self> {
        match value {
            properties::NT_USER => Some(NodeKind::User),
            properties::NT_SYSTEM_USER => Some(NodeKind::SystemUser),
            _ => None,
        }
    }

    pub fn primary_type(&self) -> &'static str {
        match self {
            NodeKind::User => properties::NT_USER,
            NodeKind::SystemUser => properties::NT_SYSTEM_USER,
        }
    }
}

/// Commit metadata; passed through, never interpreted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitInfo {
    pub session_id: Option<String>,
    pub user_id: Option<String>,
    pub external: bool,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    pub fn local(session_id: impl Into<String>) -> Self {
        Self {
            session_id: Some(session_id.into()),
            user_id: None,
            external: false,
            timestamp: Utc::now(),
        }
    }
}

impl Default for CommitInfo {
    fn default() -> Self {
        Self {
            session_id: None,
            user_id: None,
            external: false,
            timestamp: Utc::now(),
        }
    }
}

/// Changes of one path within one commit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeBatch {
    pub kind: ChangeKind,
    pub path: String,
    pub added: BTreeSet<String>,
    pub deleted: BTreeSet<String>,
    pub changed: BTreeSet<String>,
    pub properties: HashMap<String, String>,
    pub commit: CommitInfo,
}

impl ChangeBatch {
    pub fn new(kind: ChangeKind, path: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            added: BTreeSet::new(),
            deleted: BTreeSet::new(),
            changed: BTreeSet::new(),
            properties: HashMap::new(),
            commit: CommitInfo::default(),
        }
    }

    /// Batch for a user node, with the id and node type properties filled in.
    pub fn for_user(kind: ChangeKind, user_id: &str, node: NodeKind) -> Self {
        Self::new(kind, format!("{}/{}", USERS_PATH, user_id))
            .with_property(properties::AUTHORIZABLE_ID, user_id)
            .with_property(properties::PRIMARY_TYPE, node.primary_type())
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_added(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.added.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_deleted(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.deleted.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_changed(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.changed.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_commit(mut self, commit: CommitInfo) -> Self {
        self.commit = commit;
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }
}

/// Subscription key for the notification transport
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Subtree to watch
    pub root_path: String,

    /// Properties whose values are reported with every batch
    pub properties: Vec<String>,
}

impl Subscription {
    pub fn new(root_path: impl Into<String>, properties: Vec<String>) -> Self {
        Self {
            root_path: root_path.into(),
            properties,
        }
    }

    /// Whether `path` lies at or below the watched root.
    pub fn covers(&self, path: &str) -> bool {
        let root = self.root_path.trim_end_matches('/');
        if root.is_empty() {
            return path.starts_with('/');
        }
        match path.strip_prefix(root) {
            Some(rest) => rest.is_empty() || rest.starts_with('/'),
            None => false,
        }
    }
}

impl Default for Subscription {
    fn default() -> Self {
        Self {
            root_path: USERS_PATH.to_string(),
            properties: vec![
                properties::PRIMARY_TYPE.to_string(),
                properties::AUTHORIZABLE_ID.to_string(),
                properties::DISABLED.to_string(),
            ],
        }
    }
}
