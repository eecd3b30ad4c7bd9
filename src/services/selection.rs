//! Selection index — what each connection currently has selected.
//!
//! DESIGN
//! ======
//! Nested map: scope key -> connection id -> selection entry. At most one
//! entry per connection per scope, last write wins. An update with no entity
//! ids and no primary id is an explicit clear, not an upsert of empty state —
//! otherwise zero-width selection ghosts would linger in the index.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::protocol::{EntityType, ScopeKey, SelectionMode};

// =============================================================================
// TYPES
// =============================================================================

/// One connection's selection within a scope. Identity fields are
/// denormalized from the connection context at write time so a cleared or
/// retracted entry can still be attributed when broadcast.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionEntry {
    pub connection_id: Uuid,
    pub user_id: String,
    pub display_name: String,
    pub color: String,
    pub entity_type: EntityType,
    /// Deduplicated, order-preserving.
    pub entity_ids: Vec<String>,
    pub primary_id: Option<String>,
    pub mode: SelectionMode,
    pub updated_at: i64,
}

impl SelectionEntry {
    /// The entry with its selection emptied, used as the "cleared" event
    /// payload so the owner's identity stays intact.
    #[must_use]
    pub fn cleared(mut self) -> Self {
        self.entity_ids.clear();
        self.primary_id = None;
        self
    }
}

// =============================================================================
// INDEX
// =============================================================================

/// Scope key -> connection id -> selection entry.
#[derive(Debug, Default)]
pub struct SelectionIndex {
    scopes: HashMap<ScopeKey, HashMap<Uuid, SelectionEntry>>,
}

impl SelectionIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Upsert, replacing any prior entry for the connection.
    pub fn set(&mut self, key: &ScopeKey, entry: SelectionEntry) {
        self.scopes
            .entry(key.clone())
            .or_default()
            .insert(entry.connection_id, entry);
    }

    /// Remove and return the prior entry, if any. Empty inner maps are
    /// dropped on the way out.
    pub fn clear(&mut self, key: &ScopeKey, connection_id: Uuid) -> Option<SelectionEntry> {
        let entries = self.scopes.get_mut(key)?;
        let prev = entries.remove(&connection_id);
        if entries.is_empty() {
            self.scopes.remove(key);
        }
        prev
    }

    /// Read-only view of every live selection in a scope.
    #[must_use]
    pub fn snapshot(&self, key: &ScopeKey) -> Vec<SelectionEntry> {
        self.scopes
            .get(key)
            .map(|entries| entries.values().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

/// Deduplicate while preserving first-occurrence order.
#[must_use]
pub fn dedup_entity_ids(ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}

#[cfg(test)]
#[path = "selection_test.rs"]
mod tests;
