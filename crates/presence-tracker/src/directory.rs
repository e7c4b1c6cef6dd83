//! Identity directory seam.
//!
//! Lookups run inside a privileged, short-lived session. [`ScopedSession`]
//! logs the session out when it goes out of scope, so every exit path of a
//! lookup releases it.

use std::ops::Deref;

use async_trait::async_trait;
use presence_types::{DirectoryEntry, UserId};

use crate::error::LookupError;

/// Source of truth for users.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    /// Open a privileged session.
    async fn login(&self) -> Result<Box<dyn DirectorySession>, LookupError>;
}

/// An open directory session.
#[async_trait]
pub trait DirectorySession: Send + Sync {
    /// Look up an entry by name.
    async fn lookup_by_name(&self, name: &UserId) -> Result<Option<DirectoryEntry>, LookupError>;

    /// Release the session. Must tolerate being called more than once.
    fn logout(&mut self);
}

/// Session that is logged out on drop.
pub struct ScopedSession {
    inner: Box<dyn DirectorySession>,
}

impl ScopedSession {
    pub async fn open(directory: &dyn IdentityDirectory) -> Result<Self, LookupError> {
        let inner = directory.login().await?;
        Ok(Self { inner })
    }
}

impl Deref for ScopedSession {
    type Target = dyn DirectorySession;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl Drop for ScopedSession {
    fn drop(&mut self) {
        self.inner.logout();
    }
}
