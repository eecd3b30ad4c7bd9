//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor. All
//! collaboration state lives in one `CollabState` behind a single `RwLock`:
//! the connection context store, the per-connection sender map, and the three
//! scope indices (presence, selection, edit intent). The session controller's
//! retract-then-reinsert transitions span all of them, so they share one
//! mutual-exclusion domain — per-index locking could expose a half-migrated
//! connection.
//!
//! Everything here is ephemeral by design: memory-only, lost on restart.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};
use uuid::Uuid;

use crate::config::Config;
use crate::protocol::{Scope, ScopeKey, ServerMessage};
use crate::services::edit::{EditIdentity, EditIntentIndex};
use crate::services::presence::PresenceIndex;
use crate::services::relay::DomainEventBus;
use crate::services::selection::SelectionIndex;

/// Outbound channel depth per connection. A client that falls this far behind
/// starts losing deltas (fire-and-forget, at most once).
pub const CLIENT_CHANNEL_CAPACITY: usize = 256;

// =============================================================================
// CONNECTION CONTEXT
// =============================================================================

/// Per-connection mutable record. Created with computed defaults on connect,
/// mutated in place by `session.hello` and `presence.update`, deleted on
/// disconnect. Owned exclusively by the session controller; the indices only
/// ever copy identity fields out of it.
#[derive(Debug, Clone)]
pub struct ConnectionContext {
    pub connection_id: Uuid,
    pub user_id: String,
    pub display_name: String,
    pub color: String,
    pub scope: Scope,
    pub board_id: Option<String>,
}

impl ConnectionContext {
    /// Build a context with defaults derived from the connection id. Used
    /// until the client identifies itself via `session.hello`.
    #[must_use]
    pub fn with_defaults(connection_id: Uuid) -> Self {
        let user_id = connection_id.simple().to_string();
        Self {
            connection_id,
            display_name: default_display_name(&user_id),
            color: default_color(&user_id),
            user_id,
            scope: Scope::default(),
            board_id: None,
        }
    }

    /// The index key this connection currently resolves to.
    #[must_use]
    pub fn scope_key(&self) -> ScopeKey {
        ScopeKey::new(self.scope, self.board_id.as_deref())
    }

    #[must_use]
    pub fn identity(&self) -> EditIdentity {
        EditIdentity {
            user_id: self.user_id.clone(),
            display_name: self.display_name.clone(),
            color: self.color.clone(),
        }
    }
}

/// Default display name: `"User "` + first 6 chars of the user id.
#[must_use]
pub fn default_display_name(user_id: &str) -> String {
    let prefix: String = user_id.chars().take(6).collect();
    format!("User {prefix}")
}

/// Deterministic HSL color hashed from the user id. Reproducible across
/// reconnects so a user keeps their color; not a contract beyond that.
#[must_use]
pub fn default_color(user_id: &str) -> String {
    let hue = user_id.bytes().fold(0u32, |acc, b| (acc + u32::from(b)) % 360);
    format!("hsl({hue}, 70%, 45%)")
}

// =============================================================================
// COLLAB STATE
// =============================================================================

/// The single mutual-exclusion domain for all collaboration state.
#[derive(Default)]
pub struct CollabState {
    /// Connection context store, keyed by connection id.
    pub contexts: HashMap<Uuid, ConnectionContext>,
    /// Connected clients: connection id -> sender for outgoing messages.
    pub clients: HashMap<Uuid, mpsc::Sender<ServerMessage>>,
    pub presence: PresenceIndex,
    pub selections: SelectionIndex,
    pub edits: EditIntentIndex,
}

impl CollabState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the existing context or insert one with computed defaults.
    /// A message arriving before any context exists never errors.
    pub fn get_or_create_context(&mut self, connection_id: Uuid) -> &mut ConnectionContext {
        self.contexts
            .entry(connection_id)
            .or_insert_with(|| ConnectionContext::with_defaults(connection_id))
    }

    /// Delete a context. No-op if absent.
    pub fn remove_context(&mut self, connection_id: Uuid) {
        self.contexts.remove(&connection_id);
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum — all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub collab: Arc<RwLock<CollabState>>,
    /// Upstream domain-event bus fed by the CRUD layer.
    pub events: DomainEventBus,
    pub config: Arc<Config>,
}

impl AppState {
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            collab: Arc::new(RwLock::new(CollabState::new())),
            events: DomainEventBus::new(),
            config: Arc::new(config),
        }
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================

#[cfg(test)]
pub mod test_helpers {
    use super::*;

    /// Create a test `AppState` with default configuration.
    #[must_use]
    pub fn test_app_state() -> AppState {
        AppState::new(Config::default())
    }

    /// Insert a live connection (context + sender) directly into the collab
    /// state, bypassing the websocket transport. Returns the receiving half.
    pub async fn attach_client(
        state: &AppState,
        connection_id: Uuid,
        scope: Scope,
        board_id: Option<&str>,
    ) -> mpsc::Receiver<ServerMessage> {
        let (tx, rx) = mpsc::channel(32);
        let mut collab = state.collab.write().await;
        collab.clients.insert(connection_id, tx);
        let ctx = collab.get_or_create_context(connection_id);
        ctx.scope = scope;
        ctx.board_id = board_id.map(ToString::to_string);
        rx
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
