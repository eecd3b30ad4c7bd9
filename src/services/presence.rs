//! Presence index — who is in which scope, with how many tabs.
//!
//! DESIGN
//! ======
//! Nested map: scope key -> user id -> aggregated connection set. One browser
//! tab is one connection; a user with N tabs in one scope has a single entry
//! with |connections| = N. The nested maps are private so the empty-cleanup
//! invariant (no user entry with zero connections, no scope entry with zero
//! users) cannot be violated by a caller forgetting the cleanup step.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::protocol::ScopeKey;

// =============================================================================
// TYPES
// =============================================================================

/// Aggregated presence for one user within one scope.
#[derive(Debug, Clone)]
pub struct PresenceUser {
    pub user_id: String,
    pub display_name: String,
    pub color: String,
    /// Never empty while the entry is indexed.
    pub connections: HashSet<Uuid>,
}

/// Wire view of a presence entry. `tab_count` is the connection-set size;
/// zero means the user just left the scope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEvent {
    pub user_id: String,
    pub display_name: String,
    pub color: String,
    pub tab_count: usize,
}

impl PresenceUser {
    fn event(&self) -> PresenceEvent {
        PresenceEvent {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            color: self.color.clone(),
            tab_count: self.connections.len(),
        }
    }
}

// =============================================================================
// INDEX
// =============================================================================

/// Scope key -> user id -> presence entry.
#[derive(Debug, Default)]
pub struct PresenceIndex {
    scopes: HashMap<ScopeKey, HashMap<String, PresenceUser>>,
}

impl PresenceIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Idempotent add of a connection to a user's set. Display name and color
    /// are refreshed to the latest values (last writer wins for metadata,
    /// union for membership). Returns the resulting aggregated entry for
    /// event emission.
    pub fn register(
        &mut self,
        key: &ScopeKey,
        user_id: &str,
        display_name: &str,
        color: &str,
        connection_id: Uuid,
    ) -> PresenceEvent {
        let users = self.scopes.entry(key.clone()).or_default();
        let entry = users
            .entry(user_id.to_string())
            .or_insert_with(|| PresenceUser {
                user_id: user_id.to_string(),
                display_name: display_name.to_string(),
                color: color.to_string(),
                connections: HashSet::new(),
            });
        entry.display_name = display_name.to_string();
        entry.color = color.to_string();
        entry.connections.insert(connection_id);
        entry.event()
    }

    /// Remove a connection from a user's set. Deletes the user entry when the
    /// set becomes empty and the scope entry when the scope has no users
    /// left. Returns the entry as it stood after the removal (tab count may
    /// be zero), or `None` if the user was not present.
    pub fn unregister(
        &mut self,
        key: &ScopeKey,
        user_id: &str,
        connection_id: Uuid,
    ) -> Option<PresenceEvent> {
        let users = self.scopes.get_mut(key)?;
        let entry = users.get_mut(user_id)?;
        entry.connections.remove(&connection_id);
        let event = entry.event();

        if entry.connections.is_empty() {
            users.remove(user_id);
        }
        if users.is_empty() {
            self.scopes.remove(key);
        }
        Some(event)
    }

    /// Read-only view of everyone in a scope.
    #[must_use]
    pub fn snapshot(&self, key: &ScopeKey) -> Vec<PresenceEvent> {
        self.scopes
            .get(key)
            .map(|users| users.values().map(PresenceUser::event).collect())
            .unwrap_or_default()
    }

    /// True if nothing is indexed anywhere. Test and diagnostics helper.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}

#[cfg(test)]
#[path = "presence_test.rs"]
mod tests;
