use super::*;
use crate::protocol::{EditState, EntityType, Scope};
use crate::state::ConnectionContext;
use serde_json::json;
use tokio::sync::mpsc;

fn attach(collab: &mut CollabState, scope: Scope, board_id: Option<&str>) -> (Uuid, mpsc::Receiver<ServerMessage>) {
    let connection_id = Uuid::new_v4();
    let (tx, rx) = mpsc::channel(8);
    collab.clients.insert(connection_id, tx);
    let mut ctx = ConnectionContext::with_defaults(connection_id);
    ctx.scope = scope;
    ctx.board_id = board_id.map(ToString::to_string);
    collab.contexts.insert(connection_id, ctx);
    (connection_id, rx)
}

#[test]
fn broadcast_reaches_only_matching_scope() {
    // Delivery reaches the target scope's connections and no other scope.
    let mut collab = CollabState::new();
    let (_a, mut rx_a) = attach(&mut collab, Scope::Orders, None);
    let (_b, mut rx_b) = attach(&mut collab, Scope::Orders, None);
    let (_c, mut rx_c) = attach(&mut collab, Scope::Templates, None);
    let (_d, mut rx_d) = attach(&mut collab, Scope::Orders, Some("board-1"));

    let key = ScopeKey::new(Scope::Orders, None);
    broadcast(&collab, &key, None, &ServerMessage::new("presence.update", json!({"userId": "u1"})));

    assert!(rx_a.try_recv().is_ok());
    assert!(rx_b.try_recv().is_ok());
    assert!(rx_c.try_recv().is_err());
    assert!(rx_d.try_recv().is_err());
}

#[test]
fn broadcast_excludes_sender() {
    let mut collab = CollabState::new();
    let (sender, mut sender_rx) = attach(&mut collab, Scope::Orders, None);
    let (_peer, mut peer_rx) = attach(&mut collab, Scope::Orders, None);

    let key = ScopeKey::new(Scope::Orders, None);
    broadcast(&collab, &key, Some(sender), &ServerMessage::new("cursor.update", json!({})));

    assert!(sender_rx.try_recv().is_err());
    assert!(peer_rx.try_recv().is_ok());
}

#[test]
fn broadcast_skips_connections_without_channel() {
    let mut collab = CollabState::new();
    let (conn, rx) = attach(&mut collab, Scope::Orders, None);
    drop(rx);
    collab.clients.remove(&conn);

    let key = ScopeKey::new(Scope::Orders, None);
    // Must not panic or error with a context that has no sender.
    broadcast(&collab, &key, None, &ServerMessage::new("presence.update", json!({})));
}

#[test]
fn unicast_snapshots_sends_three_payload_kinds() {
    let mut collab = CollabState::new();
    let (conn, mut rx) = attach(&mut collab, Scope::Orders, None);
    let key = ScopeKey::new(Scope::Orders, None);

    collab.presence.register(&key, "u1", "Alice", "c", conn);
    let ctx = collab.contexts.get(&conn).expect("context").clone();
    collab.edits.upsert_field(
        &key,
        conn,
        &ctx.identity(),
        EntityType::Order,
        "O1",
        Some("name"),
        json!("Foo"),
        EditState::Change,
    );

    unicast_snapshots(&collab, conn, &key);

    let presence = rx.try_recv().expect("presence snapshot");
    assert_eq!(presence.event, "presence.snapshot");
    assert_eq!(presence.data["users"].as_array().map(Vec::len), Some(1));

    let selection = rx.try_recv().expect("selection snapshot");
    assert_eq!(selection.event, "selection.snapshot");
    assert_eq!(selection.data["selections"].as_array().map(Vec::len), Some(0));

    let edit = rx.try_recv().expect("edit snapshot");
    assert_eq!(edit.event, "edit.snapshot");
    let edits = edit.data["edits"].as_array().expect("edits array");
    assert_eq!(edits.len(), 1);
    assert_eq!(edits[0]["fields"]["name"], "Foo");
}

#[test]
fn unicast_to_unknown_connection_is_noop() {
    let collab = CollabState::new();
    unicast(&collab, Uuid::new_v4(), ServerMessage::new("presence.snapshot", json!({})));
}
