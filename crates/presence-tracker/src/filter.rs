//! Change filter.
//!
//! Admission control for change batches: only batches describing a user or
//! system-user node whose authorizable id is the tracked user are relevant.

use std::collections::HashMap;

use presence_types::{properties, ChangeBatch, NodeKind, UserId};

/// Whether a path's properties describe the tracked user.
pub fn is_relevant(tracked: &UserId, values: &HashMap<String, String>) -> bool {
    match values.get(properties::AUTHORIZABLE_ID) {
        Some(id) if id == tracked.as_str() => values
            .get(properties::PRIMARY_TYPE)
            .and_then(|primary_type| NodeKind::from_primary_type(primary_type))
            .is_some(),
        _ => false,
    }
}

/// Relevance filter bound to one tracked user.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    tracked: UserId,
}

impl ChangeFilter {
    pub fn new(tracked: UserId) -> Self {
        Self { tracked }
    }

    pub fn tracked(&self) -> &UserId {
        &self.tracked
    }

    pub fn is_relevant(&self, batch: &ChangeBatch) -> bool {
        is_relevant(&self.tracked, &batch.properties)
    }
}
