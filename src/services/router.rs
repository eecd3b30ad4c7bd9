//! Broadcast router — scoped fan-out and per-connection snapshot delivery.
//!
//! DESIGN
//! ======
//! Membership is resolved by scanning the connection context store: a
//! connection receives a broadcast iff its context resolves to the target
//! scope key right now. At the expected scale (tens to low hundreds of
//! concurrent editors) the scan beats maintaining a secondary
//! scope -> connection index that every transition would have to keep in
//! sync.
//!
//! Delivery is fire-and-forget `try_send`, at most once per call: a client
//! whose channel is full or gone simply misses the delta and resyncs from its
//! next snapshot.

use serde_json::json;
use uuid::Uuid;

use crate::protocol::{ScopeKey, ServerMessage, events};
use crate::state::CollabState;

/// Deliver a message to every connection whose context resolves to `key`,
/// optionally excluding one (normally the originator).
pub fn broadcast(collab: &CollabState, key: &ScopeKey, exclude: Option<Uuid>, message: &ServerMessage) {
    for ctx in collab.contexts.values() {
        if exclude == Some(ctx.connection_id) {
            continue;
        }
        if ctx.scope_key() != *key {
            continue;
        }
        if let Some(tx) = collab.clients.get(&ctx.connection_id) {
            // Best-effort: if a client's channel is full, skip it.
            let _ = tx.try_send(message.clone());
        }
    }
}

/// Deliver a message to exactly one connection.
pub fn unicast(collab: &CollabState, connection_id: Uuid, message: ServerMessage) {
    if let Some(tx) = collab.clients.get(&connection_id) {
        let _ = tx.try_send(message);
    }
}

/// Send the three full-state snapshots (presence, selection, edit) of a scope
/// to one connection. Used on (re)join: connect, identity change, and scope
/// change all end with this.
pub fn unicast_snapshots(collab: &CollabState, connection_id: Uuid, key: &ScopeKey) {
    unicast(
        collab,
        connection_id,
        ServerMessage::new(events::PRESENCE_SNAPSHOT, json!({ "users": collab.presence.snapshot(key) })),
    );
    unicast(
        collab,
        connection_id,
        ServerMessage::new(
            events::SELECTION_SNAPSHOT,
            json!({ "selections": collab.selections.snapshot(key) }),
        ),
    );
    unicast(
        collab,
        connection_id,
        ServerMessage::new(events::EDIT_SNAPSHOT, json!({ "edits": collab.edits.snapshot(key) })),
    );
}

#[cfg(test)]
#[path = "router_test.rs"]
mod tests;
