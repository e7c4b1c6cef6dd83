//! End-to-end presence scenarios against the in-memory directory and registry.

use std::sync::Arc;
use std::time::Duration;

use presence_registry::{InMemoryPresenceRegistry, PresenceQuery, PresenceRegistry};
use presence_tracker::{
    DirectoryResolver, InMemoryDirectory, PresenceService, PresenceState, Reconciliation,
    TrackerConfig,
};
use presence_types::{ChangeBatch, ChangeKind, NodeKind, PresenceEvent, Subscription, UserId};
use tokio::sync::broadcast;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(5);

/// Next presence event, failing the test instead of waiting forever.
async fn next_event(events: &mut broadcast::Receiver<PresenceEvent>) -> PresenceEvent {
    timeout(WAIT, events.recv())
        .await
        .expect("no presence event within timeout")
        .unwrap()
}

struct Harness {
    directory: Arc<InMemoryDirectory>,
    registry: Arc<InMemoryPresenceRegistry>,
    service: Arc<PresenceService>,
    changes: broadcast::Receiver<ChangeBatch>,
}

impl Harness {
    async fn tracking(users: &[&str]) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        let registry = Arc::new(InMemoryPresenceRegistry::new());
        let service = Arc::new(PresenceService::new(
            Subscription::default(),
            Arc::new(DirectoryResolver::new(directory.clone())),
            registry.clone(),
        ));
        for user in users {
            service.add_tracker(TrackerConfig::new(*user)).await.unwrap();
        }
        let changes = directory.subscribe();

        Self {
            directory,
            registry,
            service,
            changes,
        }
    }

    /// Deliver the next pending change batch to the service.
    async fn deliver(&mut self) -> Vec<(UserId, Reconciliation)> {
        let batch = self.changes.recv().await.unwrap();
        self.service.dispatch(&batch).await
    }

    async fn count(&self, user: &str, disabled: bool, system_user: bool) -> usize {
        let query = PresenceQuery::for_user(user)
            .disabled(disabled)
            .system_user(system_user);
        self.registry.count(&query).await.unwrap()
    }

    async fn count_all(&self, user: &str) -> usize {
        self.registry
            .count(&PresenceQuery::for_user(user))
            .await
            .unwrap()
    }

    async fn state(&self, user: &str) -> PresenceState {
        self.service
            .tracker(&UserId::new(user))
            .unwrap()
            .state()
            .await
    }
}

#[tokio::test]
async fn absent_user_is_not_present_after_activation() {
    let harness = Harness::tracking(&["alice"]).await;

    assert_eq!(harness.count_all("alice").await, 0);
    assert_eq!(harness.state("alice").await, PresenceState::Unpublished);
}

#[tokio::test]
async fn user_lifecycle_is_mirrored_in_registry() {
    let mut harness = Harness::tracking(&["alice"]).await;

    // created
    harness.directory.create_user("alice");
    harness.deliver().await;
    assert_eq!(harness.count("alice", false, false).await, 1);
    let published = harness.state("alice").await.registration_id().unwrap();

    // disabled
    harness.directory.disable("alice", "no reason");
    let outcomes = harness.deliver().await;
    assert_eq!(outcomes, vec![(UserId::new("alice"), Reconciliation::Updated(published))]);
    assert_eq!(harness.count("alice", true, false).await, 1);
    assert_eq!(harness.count_all("alice").await, 1);
    assert_eq!(
        harness.state("alice").await.registration_id(),
        Some(published)
    );

    // removed
    harness.directory.remove("alice");
    let outcomes = harness.deliver().await;
    assert_eq!(
        outcomes,
        vec![(UserId::new("alice"), Reconciliation::Retracted(published))]
    );
    assert_eq!(harness.count_all("alice").await, 0);
    assert_eq!(harness.directory.open_sessions(), 0);
}

#[tokio::test]
async fn existing_system_user_is_present_at_activation() {
    let directory = Arc::new(InMemoryDirectory::new());
    directory.create_system_user("sling-readall");
    let registry = Arc::new(InMemoryPresenceRegistry::new());
    let service = PresenceService::new(
        Subscription::default(),
        Arc::new(DirectoryResolver::new(directory.clone())),
        registry.clone(),
    );

    service
        .add_tracker(TrackerConfig::new("sling-readall"))
        .await
        .unwrap();

    let query = PresenceQuery::parse("(&(userId=sling-readall)(disabled=false)(systemUser=true))")
        .unwrap();
    assert_eq!(registry.count(&query).await.unwrap(), 1);
}

#[tokio::test]
async fn batch_for_other_user_changes_nothing() {
    let mut harness = Harness::tracking(&["alice"]).await;
    let logins = harness.directory.logins();

    harness.directory.create_user("bob");
    let outcomes = harness.deliver().await;

    assert!(outcomes.is_empty());
    assert_eq!(harness.directory.logins(), logins);
    assert!(harness.registry.is_empty());
}

#[tokio::test]
async fn group_with_tracked_name_is_not_published() {
    let mut harness = Harness::tracking(&["alice"]).await;

    harness.directory.create_group("alice");
    assert!(harness.deliver().await.is_empty());
    assert!(harness.registry.is_empty());
}

#[tokio::test]
async fn lookup_failure_leaves_registry_untouched() {
    let mut harness = Harness::tracking(&["alice"]).await;
    harness.directory.create_user("alice");
    harness.deliver().await;

    harness.directory.set_lookups_failing(true);
    harness.directory.disable("alice", "no reason");
    let batch = harness.changes.recv().await.unwrap();
    let outcomes = harness.service.dispatch(&batch).await;

    assert!(matches!(outcomes[0].1, Reconciliation::Failed(_)));
    assert_eq!(harness.count("alice", false, false).await, 1);
    assert_eq!(harness.directory.open_sessions(), 0);

    harness.directory.set_lookups_failing(false);
    let outcomes = harness.service.dispatch(&batch).await;

    assert!(matches!(outcomes[0].1, Reconciliation::Updated(_)));
    assert_eq!(harness.count("alice", true, false).await, 1);
    assert_eq!(harness.count_all("alice").await, 1);
}

#[tokio::test]
async fn trackers_for_different_users_are_independent() {
    let mut harness = Harness::tracking(&["alice", "bob"]).await;

    harness.directory.create_user("alice");
    harness.directory.create_system_user("bob");
    harness.deliver().await;
    harness.deliver().await;
    harness.directory.remove("alice");
    harness.deliver().await;

    assert_eq!(harness.count_all("alice").await, 0);
    assert_eq!(harness.count("bob", false, true).await, 1);
}

#[tokio::test]
async fn run_loop_follows_stream_until_closed() {
    let harness = Harness::tracking(&["alice"]).await;
    let mut events = harness.registry.subscribe();
    let (tx, rx) = broadcast::channel(16);

    let service = harness.service.clone();
    let runner = tokio::spawn(async move { service.run(rx).await });

    let mut changes = harness.directory.subscribe();
    harness.directory.create_user("alice");
    tx.send(changes.recv().await.unwrap()).unwrap();

    let published = next_event(&mut events).await;
    assert!(matches!(published, PresenceEvent::Published { .. }));
    assert!(!published.attributes().disabled);

    harness.directory.disable("alice", "no reason");
    tx.send(changes.recv().await.unwrap()).unwrap();

    let updated = next_event(&mut events).await;
    assert!(matches!(updated, PresenceEvent::Updated { .. }));
    assert!(updated.attributes().disabled);
    assert_eq!(updated.registration_id(), published.registration_id());

    drop(tx);
    timeout(WAIT, runner)
        .await
        .expect("run loop did not stop after the stream closed")
        .unwrap();

    harness.service.shutdown().await;
    assert!(matches!(
        next_event(&mut events).await,
        PresenceEvent::Retracted { .. }
    ));
    assert!(harness.registry.is_empty());
}

#[tokio::test]
async fn deleted_batch_for_existing_user_keeps_record() {
    let mut harness = Harness::tracking(&["alice"]).await;
    harness.directory.create_user("alice");
    harness.deliver().await;

    // e.g. a sub-property removal reported as a deletion on the user node
    let batch = ChangeBatch::for_user(ChangeKind::Deleted, "alice", NodeKind::User);
    let outcomes = harness.service.dispatch(&batch).await;

    assert_eq!(outcomes, vec![(UserId::new("alice"), Reconciliation::Unchanged)]);
    assert_eq!(harness.count_all("alice").await, 1);
}
