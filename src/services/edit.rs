//! Edit-intent index — which fields each connection is actively editing.
//!
//! DESIGN
//! ======
//! Nested map: scope key -> connection id -> edit entry. The entry carries a
//! per-field value bag that accumulates across edits and one `active_field`
//! marking the field currently under live edit. `blur` clears the active
//! field but still commits the last value typed; the entry itself survives
//! until an explicit `end`, a scope change, or disconnect. Late joiners get
//! the full accumulated field map from `snapshot`, not just the current
//! keystroke.

use std::collections::HashMap;

use serde::Serialize;
use uuid::Uuid;

use crate::protocol::{EditState, EntityType, ScopeKey, now_ms};

// =============================================================================
// TYPES
// =============================================================================

/// One connection's in-flight edit within a scope.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditIntentEntry {
    pub connection_id: Uuid,
    pub user_id: String,
    pub display_name: String,
    pub color: String,
    pub entity_type: EntityType,
    pub entity_id: String,
    /// Field name -> last-known value. Never implicitly cleared.
    pub fields: HashMap<String, serde_json::Value>,
    /// The field between start/focus/change and a matching blur/end.
    pub active_field: Option<String>,
    pub updated_at: i64,
}

/// Identity fields refreshed on every upsert.
#[derive(Debug, Clone)]
pub struct EditIdentity {
    pub user_id: String,
    pub display_name: String,
    pub color: String,
}

// =============================================================================
// INDEX
// =============================================================================

/// Scope key -> connection id -> edit entry.
#[derive(Debug, Default)]
pub struct EditIntentIndex {
    scopes: HashMap<ScopeKey, HashMap<Uuid, EditIntentEntry>>,
}

impl EditIntentIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a non-terminal edit transition, creating the entry on first
    /// touch. Entity, identity, and `updated_at` are always refreshed. With a
    /// field: the value is committed and the field becomes active unless the
    /// state is `blur`. Without a field, `blur` only clears the active field.
    /// Returns a clone of the resulting entry for event emission.
    #[allow(clippy::too_many_arguments)]
    pub fn upsert_field(
        &mut self,
        key: &ScopeKey,
        connection_id: Uuid,
        identity: &EditIdentity,
        entity_type: EntityType,
        entity_id: &str,
        field: Option<&str>,
        value: serde_json::Value,
        state: EditState,
    ) -> EditIntentEntry {
        let entries = self.scopes.entry(key.clone()).or_default();
        let entry = entries.entry(connection_id).or_insert_with(|| EditIntentEntry {
            connection_id,
            user_id: identity.user_id.clone(),
            display_name: identity.display_name.clone(),
            color: identity.color.clone(),
            entity_type,
            entity_id: entity_id.to_string(),
            fields: HashMap::new(),
            active_field: None,
            updated_at: now_ms(),
        });

        entry.user_id = identity.user_id.clone();
        entry.display_name = identity.display_name.clone();
        entry.color = identity.color.clone();
        entry.entity_type = entity_type;
        entry.entity_id = entity_id.to_string();
        entry.updated_at = now_ms();

        match field {
            Some(field) => {
                entry.fields.insert(field.to_string(), value);
                entry.active_field = if state == EditState::Blur {
                    None
                } else {
                    Some(field.to_string())
                };
            }
            None => {
                if state == EditState::Blur {
                    entry.active_field = None;
                }
            }
        }

        entry.clone()
    }

    /// Remove the entry entirely. Used for explicit end-of-edit and for the
    /// cleanup paths (disconnect, scope change). Returns the removed entry so
    /// the end event can name the field that stopped being edited.
    pub fn end(&mut self, key: &ScopeKey, connection_id: Uuid) -> Option<EditIntentEntry> {
        let entries = self.scopes.get_mut(key)?;
        let prev = entries.remove(&connection_id);
        if entries.is_empty() {
            self.scopes.remove(key);
        }
        prev
    }

    /// Read-only view of every in-flight edit in a scope, full field maps
    /// included.
    #[must_use]
    pub fn snapshot(&self, key: &ScopeKey) -> Vec<EditIntentEntry> {
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

#[cfg(test)]
#[path = "edit_test.rs"]
mod tests;
