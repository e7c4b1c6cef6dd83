//! Identity resolver.
//!
//! Turns a directory lookup into an [`IdentitySnapshot`]. Missing entries and
//! entries that are not users (groups, anything else) both resolve to `None`.

use std::sync::Arc;

use async_trait::async_trait;
use presence_types::{IdentitySnapshot, UserId};
use tracing::{debug, instrument};

use crate::directory::{IdentityDirectory, ScopedSession};
use crate::error::LookupError;

/// Resolves the current state of a user.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, name: &UserId) -> Result<Option<IdentitySnapshot>, LookupError>;
}

/// Resolver backed by an [`IdentityDirectory`].
pub struct DirectoryResolver {
    directory: Arc<dyn IdentityDirectory>,
}

impl DirectoryResolver {
    pub fn new(directory: Arc<dyn IdentityDirectory>) -> Self {
        Self { directory }
    }
}

#[async_trait]
impl IdentityResolver for DirectoryResolver {
    #[instrument(skip(self), fields(user_id = %name))]
    async fn resolve(&self, name: &UserId) -> Result<Option<IdentitySnapshot>, LookupError> {
        let session = ScopedSession::open(self.directory.as_ref()).await?;
        let entry = session.lookup_by_name(name).await?;

        if let Some(ref entry) = entry {
            if entry.id.is_empty() {
                return Err(LookupError::Malformed {
                    user_id: name.clone(),
                    reason: "entry has no authorizable id".to_string(),
                });
            }
        }

        let snapshot = entry.and_then(|entry| entry.snapshot()).map(|snapshot| IdentitySnapshot {
            name: name.clone(),
            ..snapshot
        });
        debug!(found = snapshot.is_some(), "Resolved identity");

        Ok(snapshot)
    }
}
