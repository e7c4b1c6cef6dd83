//! In-memory identity directory.
//!
//! Suitable for development and testing. Every mutation is also emitted as a
//! [`ChangeBatch`], so the directory doubles as a notification transport.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use presence_types::{
    properties, ChangeBatch, ChangeKind, CommitInfo, DirectoryEntry, EntryKind, UserId, USERS_PATH,
};
use tokio::sync::broadcast;
use tracing::debug;

use crate::directory::{DirectorySession, IdentityDirectory};
use crate::error::LookupError;

const GROUPS_PATH: &str = "/home/groups";
const COMMIT_SESSION: &str = "in-memory-directory";

/// Shared between the directory and its sessions.
struct DirectoryState {
    entries: DashMap<UserId, DirectoryEntry>,
    available: AtomicBool,
    lookups_failing: AtomicBool,
    open_sessions: AtomicUsize,
    logins: AtomicUsize,
}

/// In-memory identity directory
pub struct InMemoryDirectory {
    state: Arc<DirectoryState>,
    change_tx: broadcast::Sender<ChangeBatch>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(1024);
        Self {
            state: Arc::new(DirectoryState {
                entries: DashMap::new(),
                available: AtomicBool::new(true),
                lookups_failing: AtomicBool::new(false),
                open_sessions: AtomicUsize::new(0),
                logins: AtomicUsize::new(0),
            }),
            change_tx,
        }
    }

    /// Subscribe to change batches for every mutation.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeBatch> {
        self.change_tx.subscribe()
    }

    /// Take the directory offline (logins fail) or bring it back.
    pub fn set_available(&self, available: bool) {
        self.state.available.store(available, Ordering::SeqCst);
    }

    /// Make lookups inside open sessions fail.
    pub fn set_lookups_failing(&self, failing: bool) {
        self.state.lookups_failing.store(failing, Ordering::SeqCst);
    }

    /// Sessions currently open.
    pub fn open_sessions(&self) -> usize {
        self.state.open_sessions.load(Ordering::SeqCst)
    }

    /// Sessions opened since creation.
    pub fn logins(&self) -> usize {
        self.state.logins.load(Ordering::SeqCst)
    }

    pub fn get(&self, id: &UserId) -> Option<DirectoryEntry> {
        self.state.entries.get(id).map(|e| e.clone())
    }

    /// Add an entry. Returns `false` if the id is taken.
    pub fn insert(&self, entry: DirectoryEntry) -> bool {
        let id = entry.id.clone();
        if self.state.entries.contains_key(&id) {
            return false;
        }
        self.state.entries.insert(id, entry.clone());

        let mut batch = batch_for(ChangeKind::Added, &entry)
            .with_added([properties::PRIMARY_TYPE, properties::AUTHORIZABLE_ID]);
        if entry.disabled {
            batch = batch.with_added([properties::DISABLED]);
        }
        self.emit(batch);
        true
    }

    pub fn create_user(&self, id: &str) -> bool {
        self.insert(DirectoryEntry::user(id))
    }

    pub fn create_system_user(&self, id: &str) -> bool {
        self.insert(DirectoryEntry::system_user(id))
    }

    pub fn create_group(&self, id: &str) -> bool {
        self.insert(DirectoryEntry::group(id))
    }

    /// Disable an entry. Returns `false` if missing or already disabled.
    pub fn disable(&self, id: &str, reason: &str) -> bool {
        let Some(entry) = self.set_disabled(id, true) else {
            return false;
        };
        self.emit(
            batch_for(ChangeKind::Changed, &entry)
                .with_property(properties::DISABLED, reason)
                .with_added([properties::DISABLED]),
        );
        true
    }

    /// Enable an entry. Returns `false` if missing or not disabled.
    pub fn enable(&self, id: &str) -> bool {
        let Some(entry) = self.set_disabled(id, false) else {
            return false;
        };
        self.emit(batch_for(ChangeKind::Changed, &entry).with_deleted([properties::DISABLED]));
        true
    }

    /// Remove an entry. Returns `false` if missing.
    pub fn remove(&self, id: &str) -> bool {
        let Some((_, entry)) = self.state.entries.remove(&UserId::new(id)) else {
            return false;
        };
        let mut batch = batch_for(ChangeKind::Deleted, &entry)
            .with_deleted([properties::PRIMARY_TYPE, properties::AUTHORIZABLE_ID]);
        if entry.disabled {
            batch = batch.with_deleted([properties::DISABLED]);
        }
        self.emit(batch);
        true
    }

    fn set_disabled(&self, id: &str, disabled: bool) -> Option<DirectoryEntry> {
        let mut entry = self.state.entries.get_mut(&UserId::new(id))?;
        if entry.disabled == disabled {
            return None;
        }
        entry.disabled = disabled;
        Some(entry.clone())
    }

    fn emit(&self, batch: ChangeBatch) {
        debug!(path = %batch.path, kind = %batch.kind, "Directory change");
        let _ = self.change_tx.send(batch);
    }
}

impl Default for InMemoryDirectory {
    fn default() -> Self {
        Self::new()
    }
}

fn batch_for(kind: ChangeKind, entry: &DirectoryEntry) -> ChangeBatch {
    let (root, primary_type) = match entry.kind {
        EntryKind::User => (USERS_PATH, properties::NT_USER),
        EntryKind::SystemUser => (USERS_PATH, properties::NT_SYSTEM_USER),
        EntryKind::Group => (GROUPS_PATH, properties::NT_GROUP),
        EntryKind::Other => (USERS_PATH, "nt:unstructured"),
    };

    ChangeBatch::new(kind, format!("{}/{}", root, entry.id))
        .with_property(properties::PRIMARY_TYPE, primary_type)
        .with_property(properties::AUTHORIZABLE_ID, entry.id.as_str())
        .with_commit(CommitInfo::local(COMMIT_SESSION))
}

#[async_trait]
impl IdentityDirectory for InMemoryDirectory {
    async fn login(&self) -> Result<Box<dyn DirectorySession>, LookupError> {
        if !self.state.available.load(Ordering::SeqCst) {
            return Err(LookupError::Unavailable("directory offline".to_string()));
        }
        self.state.open_sessions.fetch_add(1, Ordering::SeqCst);
        self.state.logins.fetch_add(1, Ordering::SeqCst);

        Ok(Box::new(InMemorySession {
            state: self.state.clone(),
            open: true,
        }))
    }
}

struct InMemorySession {
    state: Arc<DirectoryState>,
    open: bool,
}

#[async_trait]
impl DirectorySession for InMemorySession {
    async fn lookup_by_name(&self, name: &UserId) -> Result<Option<DirectoryEntry>, LookupError> {
        if !self.open {
            return Err(LookupError::SessionRefused("session closed".to_string()));
        }
        if !self.state.available.load(Ordering::SeqCst)
            || self.state.lookups_failing.load(Ordering::SeqCst)
        {
            return Err(LookupError::Unavailable("lookup failed".to_string()));
        }
        Ok(self.state.entries.get(name).map(|e| e.clone()))
    }

    fn logout(&mut self) {
        if self.open {
            self.open = false;
            self.state.open_sessions.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::{DirectoryResolver, IdentityResolver};
    use presence_types::IdentitySnapshot;

    fn resolver(directory: &Arc<InMemoryDirectory>) -> DirectoryResolver {
        DirectoryResolver::new(directory.clone())
    }

    #[tokio::test]
    async fn test_resolve_user_kinds() {
        let directory = Arc::new(InMemoryDirectory::new());
        directory.create_user("alice");
        directory.create_system_user("sling-readall");
        directory.create_group("admins");
        let resolver = resolver(&directory);

        assert_eq!(
            resolver.resolve(&UserId::new("alice")).await.unwrap(),
            Some(IdentitySnapshot::new("alice", false, false))
        );
        assert_eq!(
            resolver.resolve(&UserId::new("sling-readall")).await.unwrap(),
            Some(IdentitySnapshot::new("sling-readall", false, true))
        );
        assert_eq!(resolver.resolve(&UserId::new("admins")).await.unwrap(), None);
        assert_eq!(resolver.resolve(&UserId::new("nobody")).await.unwrap(), None);
        assert_eq!(directory.open_sessions(), 0);
        assert_eq!(directory.logins(), 4);
    }

    #[tokio::test]
    async fn test_session_released_on_lookup_error() {
        let directory = Arc::new(InMemoryDirectory::new());
        directory.create_user("alice");
        directory.set_lookups_failing(true);

        let result = resolver(&directory).resolve(&UserId::new("alice")).await;

        assert!(matches!(result, Err(LookupError::Unavailable(_))));
        assert_eq!(directory.logins(), 1);
        assert_eq!(directory.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_login_refused_when_offline() {
        let directory = Arc::new(InMemoryDirectory::new());
        directory.set_available(false);

        let result = resolver(&directory).resolve(&UserId::new("alice")).await;

        assert!(result.is_err());
        assert_eq!(directory.logins(), 0);
    }

    #[tokio::test]
    async fn test_mutations_emit_batches() {
        let directory = InMemoryDirectory::new();
        let mut changes = directory.subscribe();

        assert!(directory.create_user("alice"));
        assert!(!directory.create_user("alice"));
        assert!(directory.disable("alice", "no reason"));
        assert!(!directory.disable("alice", "again"));
        assert!(directory.remove("alice"));
        assert!(!directory.remove("alice"));

        let added = changes.recv().await.unwrap();
        assert_eq!(added.kind, ChangeKind::Added);
        assert_eq!(added.path, "/home/users/alice");
        assert_eq!(added.property(properties::PRIMARY_TYPE), Some(properties::NT_USER));

        let changed = changes.recv().await.unwrap();
        assert_eq!(changed.kind, ChangeKind::Changed);
        assert!(changed.added.contains(properties::DISABLED));
        assert_eq!(changed.property(properties::DISABLED), Some("no reason"));

        let deleted = changes.recv().await.unwrap();
        assert_eq!(deleted.kind, ChangeKind::Deleted);
        assert_eq!(deleted.property(properties::AUTHORIZABLE_ID), Some("alice"));
        assert!(changes.try_recv().is_err());
    }
}
