//! Presence tracker.
//!
//! A [`PresenceTracker`] owns the presence record of exactly one user. It is
//! driven by lifecycle calls and by change batches; every relevant trigger
//! re-resolves the user and reconciles the result with the registration it
//! holds. Reconciliation is serialized per tracker.

use std::fmt;
use std::sync::Arc;

use presence_registry::{PresenceRegistry, RegistryError};
use presence_types::{
    ChangeBatch, ChangeKind, IdentitySnapshot, PresenceAttributes, RegistrationId, UserId,
};
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::filter::ChangeFilter;
use crate::resolver::IdentityResolver;

/// Published state of a tracked user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceState {
    /// No record is registered.
    Unpublished,

    /// A record is registered with the attributes of `snapshot`.
    Published {
        registration_id: RegistrationId,
        snapshot: IdentitySnapshot,
    },
}

impl PresenceState {
    pub fn is_published(&self) -> bool {
        matches!(self, PresenceState::Published { .. })
    }

    pub fn registration_id(&self) -> Option<RegistrationId> {
        match self {
            PresenceState::Published {
                registration_id, ..
            } => Some(*registration_id),
            PresenceState::Unpublished => None,
        }
    }
}

/// Outcome of handling one trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reconciliation {
    /// Trigger was filtered out or the tracker is inactive; nothing resolved.
    Ignored,

    /// Resolved, but the registry already reflects the result.
    Unchanged,

    /// A new record was registered.
    Published(RegistrationId),

    /// The record's attributes were replaced.
    Updated(RegistrationId),

    /// The record was unregistered.
    Retracted(RegistrationId),

    /// Lookup or registry failure; state left as it was.
    Failed(String),
}

/// What caused a reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Activation,
    Batch(ChangeKind),
    Refresh,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::Activation => f.write_str("activation"),
            Trigger::Batch(kind) => write!(f, "{} batch", kind),
            Trigger::Refresh => f.write_str("refresh"),
        }
    }
}

/// Registry mutation decided for a resolved snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    None,
    Publish(IdentitySnapshot),
    Update(IdentitySnapshot),
    Retract,
}

/// Decide the registry mutation for a trigger.
///
/// Only deleted batches and refreshes retract, and deleted batches never
/// publish. Updates happen only when the snapshot actually changed.
fn plan(state: &PresenceState, trigger: Trigger, resolved: Option<IdentitySnapshot>) -> Action {
    let deleted = trigger == Trigger::Batch(ChangeKind::Deleted);

    match (state, resolved) {
        (PresenceState::Unpublished, Some(_)) if deleted => Action::None,
        (PresenceState::Unpublished, Some(snapshot)) => Action::Publish(snapshot),
        (PresenceState::Unpublished, None) => Action::None,
        (PresenceState::Published { .. }, Some(_)) if deleted => Action::None,
        (PresenceState::Published { snapshot, .. }, Some(resolved)) => {
            if *snapshot == resolved {
                Action::None
            } else {
                Action::Update(resolved)
            }
        }
        (PresenceState::Published { .. }, None) => {
            if deleted || trigger == Trigger::Refresh {
                Action::Retract
            } else {
                Action::None
            }
        }
    }
}

struct TrackerInner {
    active: bool,
    state: PresenceState,
}

/// Tracks one user and keeps its presence record in sync.
pub struct PresenceTracker {
    user_id: UserId,
    filter: ChangeFilter,
    resolver: Arc<dyn IdentityResolver>,
    registry: Arc<dyn PresenceRegistry>,
    inner: Mutex<TrackerInner>,
}

impl PresenceTracker {
    /// Create an inactive tracker for `user_id`.
    pub fn new(
        user_id: UserId,
        resolver: Arc<dyn IdentityResolver>,
        registry: Arc<dyn PresenceRegistry>,
    ) -> Self {
        Self {
            filter: ChangeFilter::new(user_id.clone()),
            user_id,
            resolver,
            registry,
            inner: Mutex::new(TrackerInner {
                active: false,
                state: PresenceState::Unpublished,
            }),
        }
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub async fn is_active(&self) -> bool {
        self.inner.lock().await.active
    }

    pub async fn state(&self) -> PresenceState {
        self.inner.lock().await.state.clone()
    }

    pub async fn registration_id(&self) -> Option<RegistrationId> {
        self.inner.lock().await.state.registration_id()
    }

    /// Start tracking and publish the user if it exists.
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn activate(&self) -> Reconciliation {
        let mut inner = self.inner.lock().await;
        if inner.active {
            debug!("Tracker already active");
            return Reconciliation::Ignored;
        }

        info!("Activating user presence tracker");
        inner.active = true;
        self.reconcile(&mut inner, Trigger::Activation).await
    }

    /// Stop tracking and retract any registered record.
    ///
    /// Idempotent. The local registration is dropped even when the registry
    /// rejects the retraction.
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn deactivate(&self) -> Reconciliation {
        let mut inner = self.inner.lock().await;
        if !inner.active && !inner.state.is_published() {
            return Reconciliation::Ignored;
        }

        info!("Deactivating user presence tracker");
        inner.active = false;

        let state = std::mem::replace(&mut inner.state, PresenceState::Unpublished);
        let PresenceState::Published {
            registration_id, ..
        } = state
        else {
            return Reconciliation::Unchanged;
        };

        match self.registry.unregister(&registration_id).await {
            Ok(()) => {
                info!(registration_id = %registration_id, "User presence unregistered");
                Reconciliation::Retracted(registration_id)
            }
            Err(e) => {
                error!(
                    registration_id = %registration_id,
                    error = %e,
                    "Failed to unregister user presence; discarding registration"
                );
                Reconciliation::Failed(e.to_string())
            }
        }
    }

    /// React to one change batch from the notification transport.
    pub async fn handle_change_batch(&self, batch: &ChangeBatch) -> Reconciliation {
        if !self.filter.is_relevant(batch) {
            trace!(user_id = %self.user_id, path = %batch.path, "Ignoring irrelevant batch");
            return Reconciliation::Ignored;
        }

        let mut inner = self.inner.lock().await;
        if !inner.active {
            debug!(user_id = %self.user_id, path = %batch.path, "Tracker inactive, ignoring batch");
            return Reconciliation::Ignored;
        }

        debug!(
            user_id = %self.user_id,
            path = %batch.path,
            kind = %batch.kind,
            "Relevant change batch"
        );
        self.reconcile(&mut inner, Trigger::Batch(batch.kind)).await
    }

    /// Resolve unconditionally and bring the registry fully in line,
    /// including retraction when the user is gone.
    #[instrument(skip(self), fields(user_id = %self.user_id))]
    pub async fn refresh(&self) -> Reconciliation {
        let mut inner = self.inner.lock().await;
        if !inner.active {
            return Reconciliation::Ignored;
        }
        self.reconcile(&mut inner, Trigger::Refresh).await
    }

    async fn reconcile(&self, inner: &mut TrackerInner, trigger: Trigger) -> Reconciliation {
        let resolved = match self.resolver.resolve(&self.user_id).await {
            Ok(resolved) => resolved,
            Err(e) => {
                error!(
                    user_id = %self.user_id,
                    trigger = %trigger,
                    error = %e,
                    "Identity lookup failed; keeping current presence"
                );
                return Reconciliation::Failed(e.to_string());
            }
        };

        match plan(&inner.state, trigger, resolved) {
            Action::None => Reconciliation::Unchanged,
            Action::Publish(snapshot) => self.publish(inner, snapshot).await,
            Action::Update(snapshot) => self.update(inner, snapshot).await,
            Action::Retract => self.retract(inner).await,
        }
    }

    async fn publish(&self, inner: &mut TrackerInner, snapshot: IdentitySnapshot) -> Reconciliation {
        match self
            .registry
            .register(PresenceAttributes::from(&snapshot))
            .await
        {
            Ok(registration_id) => {
                info!(
                    user_id = %self.user_id,
                    registration_id = %registration_id,
                    disabled = snapshot.disabled,
                    system_user = snapshot.is_system,
                    "User presence registered"
                );
                inner.state = PresenceState::Published {
                    registration_id,
                    snapshot,
                };
                Reconciliation::Published(registration_id)
            }
            Err(e) => {
                error!(user_id = %self.user_id, error = %e, "Failed to register user presence");
                Reconciliation::Failed(e.to_string())
            }
        }
    }

    async fn update(&self, inner: &mut TrackerInner, snapshot: IdentitySnapshot) -> Reconciliation {
        let Some(registration_id) = inner.state.registration_id() else {
            return self.publish(inner, snapshot).await;
        };

        match self
            .registry
            .update_attributes(&registration_id, PresenceAttributes::from(&snapshot))
            .await
        {
            Ok(()) => {
                info!(
                    user_id = %self.user_id,
                    registration_id = %registration_id,
                    disabled = snapshot.disabled,
                    system_user = snapshot.is_system,
                    "User presence updated"
                );
                inner.state = PresenceState::Published {
                    registration_id,
                    snapshot,
                };
                Reconciliation::Updated(registration_id)
            }
            Err(RegistryError::RegistrationNotFound(_)) => {
                // Registry lost the record behind our back.
                warn!(
                    user_id = %self.user_id,
                    registration_id = %registration_id,
                    "Registration vanished from registry, publishing again"
                );
                inner.state = PresenceState::Unpublished;
                self.publish(inner, snapshot).await
            }
            Err(e) => {
                error!(
                    user_id = %self.user_id,
                    registration_id = %registration_id,
                    error = %e,
                    "Failed to update user presence"
                );
                Reconciliation::Failed(e.to_string())
            }
        }
    }

    async fn retract(&self, inner: &mut TrackerInner) -> Reconciliation {
        let Some(registration_id) = inner.state.registration_id() else {
            return Reconciliation::Unchanged;
        };

        match self.registry.unregister(&registration_id).await {
            Ok(()) | Err(RegistryError::RegistrationNotFound(_)) => {
                info!(
                    user_id = %self.user_id,
                    registration_id = %registration_id,
                    "User presence unregistered"
                );
                inner.state = PresenceState::Unpublished;
                Reconciliation::Retracted(registration_id)
            }
            Err(e) => {
                error!(
                    user_id = %self.user_id,
                    registration_id = %registration_id,
                    error = %e,
                    "Failed to unregister user presence"
                );
                Reconciliation::Failed(e.to_string())
            }
        }
    }
}

impl Drop for PresenceTracker {
    fn drop(&mut self) {
        if let Some(registration_id) = self.inner.get_mut().state.registration_id() {
            warn!(
                user_id = %self.user_id,
                registration_id = %registration_id,
                "Presence tracker dropped without deactivation; record left registered"
            );
        }
    }
}
