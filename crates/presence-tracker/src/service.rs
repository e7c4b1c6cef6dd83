//! Presence service.
//!
//! Runs one [`PresenceTracker`] per configured user and fans change batches
//! out to all of them. Trackers share no mutable state; each serializes its
//! own reconciliation.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use presence_registry::PresenceRegistry;
use presence_types::{ChangeBatch, Subscription, UserId};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, info, instrument, trace, warn};

use crate::config::TrackerConfig;
use crate::error::{TrackerError, TrackerResult};
use crate::resolver::IdentityResolver;
use crate::tracker::{PresenceTracker, Reconciliation};

/// Owns the trackers for all configured users.
pub struct PresenceService {
    subscription: Subscription,
    resolver: Arc<dyn IdentityResolver>,
    registry: Arc<dyn PresenceRegistry>,
    trackers: DashMap<UserId, Arc<PresenceTracker>>,
}

impl PresenceService {
    pub fn new(
        subscription: Subscription,
        resolver: Arc<dyn IdentityResolver>,
        registry: Arc<dyn PresenceRegistry>,
    ) -> Self {
        Self {
            subscription,
            resolver,
            registry,
            trackers: DashMap::new(),
        }
    }

    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }

    /// Create and activate a tracker for a configured user.
    #[instrument(skip(self))]
    pub async fn add_tracker(&self, config: TrackerConfig) -> TrackerResult<Arc<PresenceTracker>> {
        let user_id = config.validate()?;

        let tracker = match self.trackers.entry(user_id.clone()) {
            Entry::Occupied(_) => return Err(TrackerError::TrackerAlreadyExists(user_id)),
            Entry::Vacant(vacant) => {
                let tracker = Arc::new(PresenceTracker::new(
                    user_id,
                    self.resolver.clone(),
                    self.registry.clone(),
                ));
                vacant.insert(tracker.clone());
                tracker
            }
        };

        tracker.activate().await;
        Ok(tracker)
    }

    /// Deactivate and drop the tracker of a user whose configuration was removed.
    #[instrument(skip(self))]
    pub async fn remove_tracker(&self, user_id: &UserId) -> TrackerResult<()> {
        let (_, tracker) = self
            .trackers
            .remove(user_id)
            .ok_or_else(|| TrackerError::TrackerNotFound(user_id.clone()))?;

        tracker.deactivate().await;
        Ok(())
    }

    pub fn tracker(&self, user_id: &UserId) -> Option<Arc<PresenceTracker>> {
        self.trackers.get(user_id).map(|t| t.value().clone())
    }

    /// Tracked users, sorted.
    pub fn tracked_users(&self) -> Vec<UserId> {
        let mut users: Vec<_> = self.trackers.iter().map(|t| t.key().clone()).collect();
        users.sort();
        users
    }

    fn snapshot(&self) -> Vec<Arc<PresenceTracker>> {
        self.trackers.iter().map(|t| t.value().clone()).collect()
    }

    /// Hand one batch to every tracker.
    ///
    /// Returns the outcome of each tracker that found the batch relevant.
    pub async fn dispatch(&self, batch: &ChangeBatch) -> Vec<(UserId, Reconciliation)> {
        if !self.subscription.covers(&batch.path) {
            trace!(path = %batch.path, "Batch outside watched subtree");
            return Vec::new();
        }

        let trackers = self.snapshot();
        let outcomes = join_all(trackers.iter().map(|tracker| async move {
            let outcome = tracker.handle_change_batch(batch).await;
            (tracker.user_id().clone(), outcome)
        }))
        .await;

        outcomes
            .into_iter()
            .filter(|(_, outcome)| *outcome != Reconciliation::Ignored)
            .collect()
    }

    /// Re-resolve every tracked user.
    pub async fn refresh_all(&self) -> Vec<(UserId, Reconciliation)> {
        let trackers = self.snapshot();
        join_all(trackers.iter().map(|tracker| async move {
            (tracker.user_id().clone(), tracker.refresh().await)
        }))
        .await
    }

    /// Consume change batches until the stream closes.
    ///
    /// A lagging receiver has lost batches, so every tracker is refreshed.
    pub async fn run(&self, mut batches: broadcast::Receiver<ChangeBatch>) {
        info!(
            root_path = %self.subscription.root_path,
            trackers = self.trackers.len(),
            "Presence service listening for changes"
        );

        loop {
            match batches.recv().await {
                Ok(batch) => {
                    for (user_id, outcome) in self.dispatch(&batch).await {
                        debug!(user_id = %user_id, outcome = ?outcome, "Reconciled");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Change stream lagged, refreshing all trackers");
                    self.refresh_all().await;
                }
                Err(RecvError::Closed) => {
                    info!("Change stream closed");
                    break;
                }
            }
        }
    }

    /// Deactivate and drop every tracker.
    pub async fn shutdown(&self) {
        let users: Vec<UserId> = self.trackers.iter().map(|t| t.key().clone()).collect();
        let trackers: Vec<_> = users
            .iter()
            .filter_map(|user_id| self.trackers.remove(user_id).map(|(_, t)| t))
            .collect();

        info!(trackers = trackers.len(), "Shutting down presence trackers");
        join_all(trackers.iter().map(|tracker| tracker.deactivate())).await;
    }
}
