//! In-memory presence registry
//!
//! Suitable for development and testing. Every mutation is broadcast as a
//! [`PresenceEvent`] to subscribers.

use crate::error::{RegistryError, Result};
use crate::query::PresenceQuery;
use crate::registry::PresenceRegistry;
use async_trait::async_trait;
use dashmap::DashMap;
use presence_types::{PresenceAttributes, PresenceEvent, PresenceRecord, RegistrationId};
use tokio::sync::broadcast;
use tracing::debug;

/// In-memory presence registry
pub struct InMemoryPresenceRegistry {
    records: DashMap<RegistrationId, PresenceRecord>,
    event_tx: broadcast::Sender<PresenceEvent>,
}

impl InMemoryPresenceRegistry {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(1024);
        Self {
            records: DashMap::new(),
            event_tx,
        }
    }

    /// Subscribe to presence events.
    pub fn subscribe(&self) -> broadcast::Receiver<PresenceEvent> {
        self.event_tx.subscribe()
    }

    /// Number of active records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryPresenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PresenceRegistry for InMemoryPresenceRegistry {
    async fn register(&self, attributes: PresenceAttributes) -> Result<RegistrationId> {
        let id = RegistrationId::generate();

        self.records
            .insert(id, PresenceRecord::new(id, attributes.clone()));
        debug!(registration_id = %id, user_id = %attributes.user_id, "Registered presence");

        let _ = self.event_tx.send(PresenceEvent::Published {
            registration_id: id,
            attributes,
        });

        Ok(id)
    }

    async fn update_attributes(
        &self,
        id: &RegistrationId,
        attributes: PresenceAttributes,
    ) -> Result<()> {
        let previous = {
            let mut record = self
                .records
                .get_mut(id)
                .ok_or(RegistryError::RegistrationNotFound(*id))?;
            let previous = std::mem::replace(&mut record.attributes, attributes.clone());
            record.updated_at = chrono::Utc::now();
            previous
        };
        debug!(registration_id = %id, user_id = %attributes.user_id, "Updated presence");

        let _ = self.event_tx.send(PresenceEvent::Updated {
            registration_id: *id,
            previous,
            attributes,
        });

        Ok(())
    }

    async fn unregister(&self, id: &RegistrationId) -> Result<()> {
        let (_, record) = self
            .records
            .remove(id)
            .ok_or(RegistryError::RegistrationNotFound(*id))?;
        debug!(registration_id = %id, user_id = %record.attributes.user_id, "Unregistered presence");

        let _ = self.event_tx.send(PresenceEvent::Retracted {
            registration_id: *id,
            attributes: record.attributes,
        });

        Ok(())
    }

    async fn get(&self, id: &RegistrationId) -> Result<Option<PresenceRecord>> {
        Ok(self.records.get(id).map(|r| r.clone()))
    }

    async fn lookup(&self, query: &PresenceQuery) -> Result<Vec<PresenceRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| query.matches(&r.attributes))
            .map(|r| r.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use presence_types::UserId;

    fn attributes(user: &str, disabled: bool, system_user: bool) -> PresenceAttributes {
        PresenceAttributes {
            user_id: UserId::new(user),
            disabled,
            system_user,
        }
    }

    #[tokio::test]
    async fn test_register_and_lookup() {
        let registry = InMemoryPresenceRegistry::new();
        registry.register(attributes("alice", false, false)).await.unwrap();
        registry.register(attributes("bob", false, true)).await.unwrap();

        let alice = registry.lookup(&PresenceQuery::for_user("alice")).await.unwrap();
        assert_eq!(alice.len(), 1);
        assert_eq!(alice[0].attributes.user_id.as_str(), "alice");

        let system = PresenceQuery::parse("(systemUser=true)").unwrap();
        assert_eq!(registry.count(&system).await.unwrap(), 1);
        assert_eq!(registry.count(&PresenceQuery::any()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_update_keeps_handle() {
        let registry = InMemoryPresenceRegistry::new();
        let id = registry.register(attributes("alice", false, false)).await.unwrap();

        registry
            .update_attributes(&id, attributes("alice", true, false))
            .await
            .unwrap();

        let record = registry.get(&id).await.unwrap().unwrap();
        assert!(record.attributes.disabled);
        assert!(record.updated_at >= record.registered_at);
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_handle() {
        let registry = InMemoryPresenceRegistry::new();
        let id = RegistrationId::generate();

        assert!(matches!(
            registry.unregister(&id).await,
            Err(RegistryError::RegistrationNotFound(_))
        ));
        assert!(matches!(
            registry
                .update_attributes(&id, attributes("alice", false, false))
                .await,
            Err(RegistryError::RegistrationNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_events_follow_lifecycle() {
        let registry = InMemoryPresenceRegistry::new();
        let mut events = registry.subscribe();

        let id = registry.register(attributes("alice", false, false)).await.unwrap();
        registry
            .update_attributes(&id, attributes("alice", true, false))
            .await
            .unwrap();
        registry.unregister(&id).await.unwrap();

        assert!(matches!(events.recv().await.unwrap(), PresenceEvent::Published { .. }));
        match events.recv().await.unwrap() {
            PresenceEvent::Updated {
                previous,
                attributes,
                ..
            } => {
                assert!(!previous.disabled);
                assert!(attributes.disabled);
            }
            other => panic!("unexpected event {:?}", other),
        }
        let retracted = events.recv().await.unwrap();
        assert!(matches!(retracted, PresenceEvent::Retracted { .. }));
        assert_eq!(retracted.registration_id(), id);
        assert!(registry.is_empty());
    }
}
