//! WebSocket handler — transport shell around the session controller.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection ID and enters a `select!` loop:
//! - Incoming client messages → parse + dispatch by event name
//! - Messages from the controller (broadcasts, snapshots) → forward to client
//!
//! The handler never touches collaboration state directly. All mutation goes
//! through `services::session`, which also decides who hears about it; this
//! loop only shuttles bytes.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade (origin-checked) → `session::connect` → welcome + snapshots
//! 2. Client sends messages → dispatch → controller mutates + broadcasts
//! 3. Close or socket error → `session::disconnect` → footprint retracted

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use tokio::sync::mpsc;
use tracing::warn;
use uuid::Uuid;

use crate::protocol::{ClientEnvelope, ServerMessage, events};
use crate::services::session;
use crate::state::{AppState, CLIENT_CHANNEL_CAPACITY};

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(State(state): State<AppState>, headers: HeaderMap, ws: WebSocketUpgrade) -> Response {
    let origin = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok());
    if !state.config.origin_allowed(origin) {
        warn!(origin = origin.unwrap_or("-"), "ws: origin rejected");
        return (StatusCode::FORBIDDEN, "origin not allowed").into_response();
    }

    ws.on_upgrade(move |socket| run_ws(socket, state))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState) {
    let connection_id = Uuid::new_v4();

    // Per-connection channel: the controller pushes everything outbound
    // (welcome, snapshots, peer deltas) through here.
    let (client_tx, mut client_rx) = mpsc::channel::<ServerMessage>(CLIENT_CHANNEL_CAPACITY);

    session::connect(&state, connection_id, client_tx).await;

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                match msg {
                    Message::Text(text) => {
                        dispatch_message(&state, connection_id, &text).await;
                    }
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            Some(message) = client_rx.recv() => {
                if send_message(&mut socket, connection_id, &message).await.is_err() {
                    break;
                }
            }
        }
    }

    session::disconnect(&state, connection_id).await;
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Parse an inbound text frame and route it to the session controller.
/// Malformed or unknown messages are dropped; a bad message from one client
/// must never take down the relay loop.
async fn dispatch_message(state: &AppState, connection_id: Uuid, text: &str) {
    let envelope = match ClientEnvelope::parse(text) {
        Ok(envelope) => envelope,
        Err(e) => {
            warn!(%connection_id, error = %e, "ws: invalid inbound message");
            return;
        }
    };

    match envelope.event.as_str() {
        events::SESSION_HELLO => session::handle_hello(state, connection_id, &envelope.data).await,
        events::PRESENCE_UPDATE => session::handle_rescope(state, connection_id, &envelope.data).await,
        events::SELECTION_UPDATE => session::handle_selection(state, connection_id, &envelope.data).await,
        events::EDIT_UPDATE => session::handle_edit(state, connection_id, &envelope.data).await,
        events::CURSOR_UPDATE => session::handle_cursor(state, connection_id, &envelope.data).await,
        other => {
            warn!(%connection_id, event = other, "ws: unknown event");
        }
    }
}

async fn send_message(socket: &mut WebSocket, connection_id: Uuid, message: &ServerMessage) -> Result<(), ()> {
    let json = match serde_json::to_string(message) {
        Ok(j) => j,
        Err(e) => {
            warn!(%connection_id, error = %e, "ws: failed to serialize message");
            return Err(());
        }
    };
    socket.send(Message::Text(json.into())).await.map_err(|_| ())
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
