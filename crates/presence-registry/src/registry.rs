//! Presence registry trait
//!
//! A registration is owned by whoever created it; only the owner updates or
//! unregisters it. Consumers only look records up.

use crate::error::Result;
use crate::query::PresenceQuery;
use async_trait::async_trait;
use presence_types::{PresenceAttributes, PresenceRecord, RegistrationId};

/// Registry of published presence records
#[async_trait]
pub trait PresenceRegistry: Send + Sync {
    /// Publish a new record and return its handle
    async fn register(&self, attributes: PresenceAttributes) -> Result<RegistrationId>;

    /// Replace the attributes of an existing record, keeping its handle
    async fn update_attributes(
        &self,
        id: &RegistrationId,
        attributes: PresenceAttributes,
    ) -> Result<()>;

    /// Retract a record
    async fn unregister(&self, id: &RegistrationId) -> Result<()>;

    /// Get a record by handle
    async fn get(&self, id: &RegistrationId) -> Result<Option<PresenceRecord>>;

    /// Find all active records matching the query
    async fn lookup(&self, query: &PresenceQuery) -> Result<Vec<PresenceRecord>>;

    /// Count active records matching the query
    async fn count(&self, query: &PresenceQuery) -> Result<usize> {
        Ok(self.lookup(query).await?.len())
    }
}
