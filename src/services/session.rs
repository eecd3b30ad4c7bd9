//! Session lifecycle controller — connect, identify, rescope, disconnect.
//!
//! DESIGN
//! ======
//! Every transition takes the collab write guard once and runs to completion
//! with no `.await` inside it, so no other message can ever observe a
//! half-migrated connection. Outbound delivery is non-blocking `try_send`
//! through the router, which is safe under the guard.
//!
//! LIFECYCLE
//! =========
//! connect -> active(scope, user) -> [identify | rescope]* -> disconnect.
//! Any transition that changes identity or scope follows a strict order:
//! retract the old presence/selection/edit footprint FIRST (keyed by the old
//! scope key and user id), mutate the context SECOND, re-register presence
//! THIRD, then unicast fresh snapshots. Doing it in any other order would
//! index entries under the wrong scope key and orphan them.
//!
//! Delta broadcasts exclude the originating connection — it already holds its
//! own optimistic state and resyncs from snapshots.

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::protocol::{
    Data, EditState, EntityType, Scope, SelectionMode, ServerMessage, data_str, data_str_list,
    events, now_ms,
};
use crate::services::edit::EditIntentEntry;
use crate::services::router;
use crate::services::selection::{SelectionEntry, dedup_entity_ids};
use crate::state::{AppState, CollabState, ConnectionContext, default_color, default_display_name};

// =============================================================================
// CONNECT / DISCONNECT
// =============================================================================

/// Register a new connection: default context, presence registration, welcome
/// message, and the three scope snapshots. Always succeeds.
pub async fn connect(state: &AppState, connection_id: Uuid, tx: mpsc::Sender<ServerMessage>) {
    let mut collab = state.collab.write().await;
    collab.clients.insert(connection_id, tx);

    let ctx = collab.get_or_create_context(connection_id).clone();
    let key = ctx.scope_key();
    let event = collab
        .presence
        .register(&key, &ctx.user_id, &ctx.display_name, &ctx.color, connection_id);
    router::broadcast(
        &collab,
        &key,
        Some(connection_id),
        &ServerMessage::new(events::PRESENCE_UPDATE, &event),
    );
    router::unicast(
        &collab,
        connection_id,
        ServerMessage::new(
            events::SESSION_CONNECTED,
            json!({ "connectionId": connection_id, "userId": ctx.user_id }),
        ),
    );
    router::unicast_snapshots(&collab, connection_id, &key);

    info!(%connection_id, scope = %key, "collab: client connected");
}

/// Retract the full footprint using the context's last-known scope, then
/// delete the context. No snapshots are sent — there is no recipient.
pub async fn disconnect(state: &AppState, connection_id: Uuid) {
    let mut collab = state.collab.write().await;
    collab.clients.remove(&connection_id);

    if let Some(ctx) = collab.contexts.get(&connection_id).cloned() {
        retract_footprint(&mut collab, &ctx);
        collab.remove_context(connection_id);
    }

    info!(%connection_id, "collab: client disconnected");
}

// =============================================================================
// IDENTIFY (session.hello)
// =============================================================================

/// Apply a `session.hello`. If the candidate identity matches the current one
/// this is a no-op; otherwise the old footprint is retracted under the old
/// user id, the context is re-identified, presence is re-registered under the
/// same scope key, and fresh snapshots are unicast.
pub async fn handle_hello(state: &AppState, connection_id: Uuid, data: &Data) {
    let mut collab = state.collab.write().await;
    let ctx = collab.get_or_create_context(connection_id).clone();

    let candidate_user = data_str(data, "userId")
        .map(ToString::to_string)
        .unwrap_or_else(|| ctx.user_id.clone());
    let user_changed = candidate_user != ctx.user_id;
    // Name/color defaults follow the user id: a re-identified connection gets
    // fresh derived values unless the client supplies its own.
    let candidate_name = data_str(data, "name").map(ToString::to_string).unwrap_or_else(|| {
        if user_changed { default_display_name(&candidate_user) } else { ctx.display_name.clone() }
    });
    let candidate_color = data_str(data, "color").map(ToString::to_string).unwrap_or_else(|| {
        if user_changed { default_color(&candidate_user) } else { ctx.color.clone() }
    });

    if !user_changed && candidate_name == ctx.display_name && candidate_color == ctx.color {
        return;
    }

    retract_footprint(&mut collab, &ctx);
    {
        let stored = collab.get_or_create_context(connection_id);
        stored.user_id = candidate_user;
        stored.display_name = candidate_name;
        stored.color = candidate_color;
    }
    reestablish(&mut collab, connection_id);

    debug!(%connection_id, "collab: identity changed");
}

// =============================================================================
// RESCOPE (presence.update)
// =============================================================================

/// Apply a `presence.update`. Unknown scope values fall back to the current
/// scope; an absent `boardId` key keeps the current board while an explicit
/// null clears it. No-op when nothing changes.
pub async fn handle_rescope(state: &AppState, connection_id: Uuid, data: &Data) {
    let mut collab = state.collab.write().await;
    let ctx = collab.get_or_create_context(connection_id).clone();

    let candidate_scope = data_str(data, "scope").and_then(Scope::parse).unwrap_or(ctx.scope);
    let candidate_board = if data.contains_key("boardId") {
        data.get("boardId")
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(ToString::to_string)
    } else {
        ctx.board_id.clone()
    };

    if candidate_scope == ctx.scope && candidate_board == ctx.board_id {
        return;
    }

    retract_footprint(&mut collab, &ctx);
    {
        let stored = collab.get_or_create_context(connection_id);
        stored.scope = candidate_scope;
        stored.board_id = candidate_board;
    }
    reestablish(&mut collab, connection_id);

    debug!(%connection_id, scope = %candidate_scope, "collab: scope changed");
}

// =============================================================================
// SELECTION (selection.update)
// =============================================================================

/// Upsert or clear the connection's selection and broadcast the delta to the
/// current scope. Messages with an unrecognized entity type are dropped.
pub async fn handle_selection(state: &AppState, connection_id: Uuid, data: &Data) {
    let mut collab = state.collab.write().await;

    let Some(entity_type) = data_str(data, "entityType").and_then(EntityType::parse) else {
        debug!(%connection_id, "collab: selection.update with invalid entityType dropped");
        return;
    };

    let entity_ids = dedup_entity_ids(data_str_list(data, "entityIds"));
    let primary_id = data_str(data, "primaryId")
        .map(ToString::to_string)
        .filter(|p| entity_ids.contains(p));

    let ctx = collab.get_or_create_context(connection_id).clone();
    let key = ctx.scope_key();

    // Empty ids + no primary is an explicit clear, not an upsert of nothing.
    if entity_ids.is_empty() && primary_id.is_none() {
        if let Some(prev) = collab.selections.clear(&key, connection_id) {
            router::broadcast(
                &collab,
                &key,
                Some(connection_id),
                &ServerMessage::new(events::SELECTION_UPDATE, prev.cleared()),
            );
        }
        return;
    }

    let entry = SelectionEntry {
        connection_id,
        user_id: ctx.user_id.clone(),
        display_name: ctx.display_name.clone(),
        color: ctx.color.clone(),
        entity_type,
        entity_ids,
        primary_id,
        mode: data_str(data, "mode").and_then(SelectionMode::parse).unwrap_or_default(),
        updated_at: now_ms(),
    };
    collab.selections.set(&key, entry.clone());
    router::broadcast(
        &collab,
        &key,
        Some(connection_id),
        &ServerMessage::new(events::SELECTION_UPDATE, entry),
    );
}

// =============================================================================
// EDIT (edit.update)
// =============================================================================

/// Apply a field-level edit transition and broadcast the delta. `end` removes
/// the entry; everything else upserts it. Messages with an unrecognized
/// entity type or state, or without an entity id, are dropped.
pub async fn handle_edit(state: &AppState, connection_id: Uuid, data: &Data) {
    let mut collab = state.collab.write().await;

    let Some(entity_type) = data_str(data, "entityType").and_then(EntityType::parse) else {
        debug!(%connection_id, "collab: edit.update with invalid entityType dropped");
        return;
    };
    let Some(edit_state) = data_str(data, "state").and_then(EditState::parse) else {
        debug!(%connection_id, "collab: edit.update with invalid state dropped");
        return;
    };
    let Some(entity_id) = data_str(data, "entityId").map(ToString::to_string) else {
        debug!(%connection_id, "collab: edit.update without entityId dropped");
        return;
    };
    let field = data_str(data, "field").map(ToString::to_string);

    let ctx = collab.get_or_create_context(connection_id).clone();
    let key = ctx.scope_key();

    if edit_state == EditState::End {
        let prev = collab.edits.end(&key, connection_id);
        // The end event names the field that stopped being edited: the
        // entry's last active field, falling back to the message's.
        let ended_field = prev.as_ref().and_then(|p| p.active_field.clone()).or(field);
        let payload = match prev {
            Some(prev) => edit_end_payload(&prev, ended_field.as_deref()),
            None => json!({
                "connectionId": connection_id,
                "userId": ctx.user_id,
                "displayName": ctx.display_name,
                "color": ctx.color,
                "entityType": entity_type,
                "entityId": entity_id,
                "field": ended_field,
                "state": "end",
                "updatedAt": now_ms(),
            }),
        };
        router::broadcast(
            &collab,
            &key,
            Some(connection_id),
            &ServerMessage::new(events::EDIT_UPDATE, payload),
        );
        return;
    }

    let value = data.get("value").cloned().unwrap_or(serde_json::Value::Null);
    let entry = collab.edits.upsert_field(
        &key,
        connection_id,
        &ctx.identity(),
        entity_type,
        &entity_id,
        field.as_deref(),
        value.clone(),
        edit_state,
    );
    router::broadcast(
        &collab,
        &key,
        Some(connection_id),
        &ServerMessage::new(
            events::EDIT_UPDATE,
            json!({
                "connectionId": connection_id,
                "userId": entry.user_id,
                "displayName": entry.display_name,
                "color": entry.color,
                "entityType": entry.entity_type,
                "entityId": entry.entity_id,
                "field": field,
                "value": value,
                "state": edit_state.as_str(),
                "updatedAt": entry.updated_at,
            }),
        ),
    );
}

// =============================================================================
// CURSOR (cursor.update)
// =============================================================================

/// Stateless pointer-position fan-out to scope peers. No index mutation.
pub async fn handle_cursor(state: &AppState, connection_id: Uuid, data: &Data) {
    let mut collab = state.collab.write().await;
    let ctx = collab.get_or_create_context(connection_id).clone();
    let key = ctx.scope_key();

    let payload = json!({
        "connectionId": connection_id,
        "userId": ctx.user_id,
        "displayName": ctx.display_name,
        "color": ctx.color,
        "entityType": data_str(data, "entityType").and_then(EntityType::parse),
        "entityId": data_str(data, "entityId"),
    });
    router::broadcast(
        &collab,
        &key,
        Some(connection_id),
        &ServerMessage::new(events::CURSOR_UPDATE, payload),
    );
}

// =============================================================================
// HELPERS
// =============================================================================

/// Retract a connection's presence/selection/edit footprint from its current
/// scope key, broadcasting the resulting deltas to the peers it leaves
/// behind. Must run BEFORE the context is mutated.
fn retract_footprint(collab: &mut CollabState, ctx: &ConnectionContext) {
    let key = ctx.scope_key();

    if let Some(prev) = collab.selections.clear(&key, ctx.connection_id) {
        router::broadcast(
            collab,
            &key,
            Some(ctx.connection_id),
            &ServerMessage::new(events::SELECTION_UPDATE, prev.cleared()),
        );
    }

    if let Some(prev) = collab.edits.end(&key, ctx.connection_id) {
        let ended_field = prev.active_field.clone();
        router::broadcast(
            collab,
            &key,
            Some(ctx.connection_id),
            &ServerMessage::new(events::EDIT_UPDATE, edit_end_payload(&prev, ended_field.as_deref())),
        );
    }

    if let Some(event) = collab.presence.unregister(&key, &ctx.user_id, ctx.connection_id) {
        router::broadcast(
            collab,
            &key,
            Some(ctx.connection_id),
            &ServerMessage::new(events::PRESENCE_UPDATE, &event),
        );
    }
}

/// Re-register presence under the connection's (possibly new) scope key and
/// unicast fresh snapshots. Must run AFTER the context mutation.
fn reestablish(collab: &mut CollabState, connection_id: Uuid) {
    let Some(ctx) = collab.contexts.get(&connection_id).cloned() else {
        return;
    };
    let key = ctx.scope_key();
    let event = collab
        .presence
        .register(&key, &ctx.user_id, &ctx.display_name, &ctx.color, connection_id);
    router::broadcast(
        collab,
        &key,
        Some(connection_id),
        &ServerMessage::new(events::PRESENCE_UPDATE, &event),
    );
    router::unicast_snapshots(collab, connection_id, &key);
}

fn edit_end_payload(entry: &EditIntentEntry, field: Option<&str>) -> serde_json::Value {
    json!({
        "connectionId": entry.connection_id,
        "userId": entry.user_id,
        "displayName": entry.display_name,
        "color": entry.color,
        "entityType": entry.entity_type,
        "entityId": entry.entity_id,
        "field": field,
        "state": "end",
        "updatedAt": now_ms(),
    })
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
