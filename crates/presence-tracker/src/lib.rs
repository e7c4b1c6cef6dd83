//! # Presence Tracker - Directory-backed user presence
//!
//! Watches a user in an identity directory and keeps a presence record for
//! it in a [`PresenceRegistry`](presence_registry::PresenceRegistry).
//!
//! ## Overview
//!
//! - [`ChangeFilter`]: Admits only batches about the tracked user's node
//! - [`IdentityResolver`]: Resolves the user's current state
//! - [`PresenceTracker`]: Reconciles resolved state with the published record
//! - [`PresenceService`]: One tracker per configured user, fed by a batch stream
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use presence_registry::InMemoryPresenceRegistry;
//! use presence_tracker::{
//!     DirectoryResolver, InMemoryDirectory, PresenceService, TrackerConfig,
//! };
//! use presence_types::Subscription;
//!
//! # async fn example() {
//! let directory = Arc::new(InMemoryDirectory::new());
//! let registry = Arc::new(InMemoryPresenceRegistry::new());
//! let service = PresenceService::new(
//!     Subscription::default(),
//!     Arc::new(DirectoryResolver::new(directory.clone())),
//!     registry.clone(),
//! );
//!
//! service.add_tracker(TrackerConfig::new("alice")).await.unwrap();
//! directory.create_user("alice");
//! # }
//! ```
//!
//! ## State Machine
//!
//! A tracker is either unpublished or holds exactly one registration. Lookup
//! and registry failures are logged and leave the state untouched; the next
//! relevant batch (or a refresh) heals it.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod config;
pub mod directory;
pub mod error;
pub mod filter;
pub mod memory;
pub mod resolver;
pub mod service;
pub mod tracker;

// Re-export main types
pub use config::TrackerConfig;
pub use directory::{DirectorySession, IdentityDirectory, ScopedSession};
pub use error::{LookupError, TrackerError, TrackerResult};
pub use filter::{is_relevant, ChangeFilter};
pub use memory::InMemoryDirectory;
pub use resolver::{DirectoryResolver, IdentityResolver};
pub use service::PresenceService;
pub use tracker::{PresenceState, PresenceTracker, Reconciliation};
