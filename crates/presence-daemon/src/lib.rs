//! Presence daemon library
//!
//! Wires an in-memory directory, an in-memory presence registry and a
//! [`PresenceService`](presence_tracker::PresenceService) together for the
//! `presenced` binary.

#![deny(unsafe_code)]

pub mod config;
pub mod error;
pub mod server;

pub use config::{DaemonConfig, DirectoryConfig, LoggingConfig, SeedUser};
pub use error::{DaemonError, DaemonResult};
pub use server::Daemon;
