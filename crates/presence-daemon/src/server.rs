//! Daemon wiring and lifecycle management

use std::future::Future;
use std::sync::Arc;

use presence_registry::InMemoryPresenceRegistry;
use presence_tracker::{DirectoryResolver, InMemoryDirectory, PresenceService};
use presence_types::PresenceEvent;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::DaemonConfig;
use crate::error::DaemonResult;

/// Presence daemon
pub struct Daemon {
    config: DaemonConfig,
    directory: Arc<InMemoryDirectory>,
    registry: Arc<InMemoryPresenceRegistry>,
    service: Arc<PresenceService>,
}

impl Daemon {
    /// Create a daemon with a seeded in-memory directory
    pub fn new(config: DaemonConfig) -> Self {
        let directory = Arc::new(InMemoryDirectory::new());
        for user in &config.directory.users {
            if !directory.insert(user.entry()) {
                warn!(user_id = %user.id, "Duplicate seed user ignored");
            }
        }

        let registry = Arc::new(InMemoryPresenceRegistry::new());
        let service = Arc::new(PresenceService::new(
            config.subscription.clone(),
            Arc::new(DirectoryResolver::new(directory.clone())),
            registry.clone(),
        ));

        Self {
            config,
            directory,
            registry,
            service,
        }
    }

    pub fn directory(&self) -> &Arc<InMemoryDirectory> {
        &self.directory
    }

    pub fn registry(&self) -> &Arc<InMemoryPresenceRegistry> {
        &self.registry
    }

    pub fn service(&self) -> &Arc<PresenceService> {
        &self.service
    }

    /// Run until Ctrl+C or SIGTERM
    pub async fn run(self) -> DaemonResult<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Start every configured tracker and follow directory changes until
    /// `shutdown` completes, then retract all presence records.
    pub async fn run_until<F>(self, shutdown: F) -> DaemonResult<()>
    where
        F: Future<Output = ()>,
    {
        for tracker in &self.config.trackers {
            tracker.validate()?;
        }

        let event_logger = spawn_event_logger(self.registry.subscribe());

        // Subscribe before activation so no change between the two is lost.
        let batches = self.directory.subscribe();
        if let Err(e) = self.start_trackers().await {
            error!(error = %e, "Failed to start trackers, retracting published presence");
            self.service.shutdown().await;
            event_logger.abort();
            return Err(e);
        }

        info!(
            trackers = self.service.tracked_users().len(),
            seeded = self.config.directory.users.len(),
            "Presence daemon started"
        );

        tokio::select! {
            _ = self.service.run(batches) => {
                warn!("Change stream ended");
            }
            _ = shutdown => {}
        }

        self.service.shutdown().await;
        event_logger.abort();

        info!(remaining = self.registry.len(), "Presence daemon stopped");
        Ok(())
    }

    async fn start_trackers(&self) -> DaemonResult<()> {
        for tracker in &self.config.trackers {
            self.service.add_tracker(tracker.clone()).await?;
        }
        Ok(())
    }
}

fn spawn_event_logger(mut events: broadcast::Receiver<PresenceEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => info!(
                        registration_id = %event.registration_id(),
                        event = %json,
                        "Presence event"
                    ),
                    Err(e) => warn!(error = %e, "Failed to encode presence event"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Presence event logger lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, initiating graceful shutdown");
        }
    }
}
