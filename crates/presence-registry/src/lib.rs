//! Presence Registry - Registry traits and implementations
//!
//! This crate provides the publish/lookup side of user presence:
//!
//! - **PresenceRegistry**: Registers, updates and unregisters presence records
//! - **PresenceQuery**: Exact-match attribute filter used by consumers
//!
//! ## In-Memory vs Persistent
//!
//! The crate provides an in-memory implementation suitable for development and
//! testing. Other backends implement the same trait.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod error;
pub mod memory;
pub mod query;
pub mod registry;

// Re-exports
pub use error::{RegistryError, Result};
pub use memory::InMemoryPresenceRegistry;
pub use query::PresenceQuery;
pub use registry::PresenceRegistry;
